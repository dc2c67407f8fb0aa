//! Vector store adapter for a Marqo-style HTTP API.
//!
//! Owns the wire format end to end: the cores only ever see [`Document`],
//! [`Hit`], and [`IndexStats`]. One long-lived client carries the optional
//! `x-api-key` header on every request.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::config::StoreConfig;
use crate::models::{BackendUsage, Document, Hit, IndexStats};
use crate::traits::VectorStore;

pub struct MarqoStore {
    host: String,
    index: String,
    model: String,
    page_size: usize,
    client: reqwest::Client,
}

impl MarqoStore {
    pub fn new(config: &StoreConfig, page_size: usize) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert(
                "x-api-key",
                HeaderValue::from_str(key).context("store.api_key is not a valid header value")?,
            );
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("building vector store client")?;

        Ok(Self {
            host: config.host.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            model: config.model.clone(),
            page_size: page_size.max(1),
            client,
        })
    }

    fn index_url(&self, suffix: &str) -> String {
        format!("{}/indexes/{}{}", self.host, self.index, suffix)
    }
}

fn wire_document(doc: &Document) -> serde_json::Value {
    json!({
        "_id": doc.id,
        "id": doc.id,
        "filename": doc.filename,
        "content": doc.content,
        "title": doc.title,
        "summary": doc.summary,
        "createdAt": doc.created_at,
        "updatedAt": doc.updated_at,
        "closedAt": doc.closed_at,
    })
}

#[derive(Debug, Deserialize)]
struct StoredDocument {
    #[serde(default)]
    id: String,
    #[serde(rename = "_id", default)]
    store_id: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(rename = "createdAt", default)]
    created_at: Option<i64>,
    #[serde(rename = "updatedAt", default)]
    updated_at: Option<i64>,
    #[serde(rename = "closedAt", default)]
    closed_at: Option<i64>,
}

impl StoredDocument {
    fn into_document(self) -> Document {
        let id = if self.id.is_empty() {
            self.store_id
        } else {
            self.id
        };
        Document {
            id,
            filename: self.filename,
            content: self.content,
            title: self.title,
            summary: self.summary,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<WireHit>,
}

#[derive(Debug, Deserialize)]
struct WireHit {
    #[serde(default)]
    id: String,
    #[serde(rename = "_id", default)]
    store_id: String,
    #[serde(rename = "_score", default)]
    score: f32,
    #[serde(rename = "_highlights", default)]
    highlights: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    title: String,
}

impl WireHit {
    fn into_hit(self) -> Hit {
        let id = if self.id.is_empty() {
            self.store_id
        } else {
            self.id
        };
        let highlights = self
            .highlights
            .iter()
            .flat_map(|fields| fields.values())
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect();
        Hit {
            id,
            score: self.score,
            highlights,
            content: self.content,
            summary: self.summary,
            title: self.title,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    number_of_documents: i64,
    #[serde(default)]
    number_of_vectors: i64,
    #[serde(default)]
    backend: Option<BackendResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendResponse {
    memory_used_percentage: f64,
    storage_used_percentage: f64,
}

#[derive(Debug, Deserialize)]
struct IndexListResponse {
    #[serde(default)]
    results: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    #[serde(rename = "indexName")]
    index_name: String,
}

#[async_trait]
impl VectorStore for MarqoStore {
    async fn ensure_index(&self) -> Result<()> {
        let body = json!({ "type": "unstructured", "model": self.model });
        let response = self
            .client
            .post(self.index_url(""))
            .json(&body)
            .send()
            .await
            .context("creating index")?;

        // An index that already exists comes back as a conflict.
        if !response.status().is_success() && response.status() != StatusCode::CONFLICT {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            bail!("failed to initialize index: {status}, {detail}");
        }
        Ok(())
    }

    async fn upsert(&self, documents: &[Document]) -> Result<()> {
        let documents: Vec<serde_json::Value> = documents.iter().map(wire_document).collect();
        let body = json!({
            "documents": documents,
            "tensorFields": ["title", "summary"],
        });

        self.client
            .post(self.index_url("/documents"))
            .json(&body)
            .send()
            .await
            .context("sending document batch")?
            .error_for_status()
            .context("document batch rejected")?;
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Document>> {
        let response = self
            .client
            .get(self.index_url(&format!("/documents/{id}")))
            .send()
            .await
            .context("fetching stored document")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let stored: StoredDocument = response
            .error_for_status()
            .context("stored document request rejected")?
            .json()
            .await
            .context("decoding stored document")?;
        Ok(Some(stored.into_document()))
    }

    async fn search(&self, text: &str, offset: usize) -> Result<Vec<Hit>> {
        let body = json!({
            "q": text,
            "limit": self.page_size,
            "showHighlights": true,
            "searchMethod": "TENSOR",
            "offset": offset,
            "attributesToRetrieve": ["id", "title", "summary", "content"],
        });

        let response: SearchResponse = self
            .client
            .post(self.index_url("/search"))
            .json(&body)
            .send()
            .await
            .context("sending search request")?
            .error_for_status()
            .context("search request rejected")?
            .json()
            .await
            .context("decoding search response")?;

        Ok(response.hits.into_iter().map(WireHit::into_hit).collect())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let response: StatsResponse = self
            .client
            .get(self.index_url("/stats"))
            .send()
            .await
            .context("fetching index stats")?
            .error_for_status()
            .context("index stats request rejected")?
            .json()
            .await
            .context("decoding index stats")?;

        Ok(IndexStats {
            documents: response.number_of_documents,
            vectors: response.number_of_vectors,
            backend: response.backend.map(|b| BackendUsage {
                memory_pct: b.memory_used_percentage,
                storage_pct: b.storage_used_percentage,
            }),
        })
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let response: IndexListResponse = self
            .client
            .get(format!("{}/indexes", self.host))
            .send()
            .await
            .context("listing indexes")?
            .error_for_status()
            .context("index list request rejected")?
            .json()
            .await
            .context("decoding index list")?;

        Ok(response
            .results
            .into_iter()
            .map(|entry| entry.index_name)
            .collect())
    }
}
