//! Sync pipeline: bring the vector store in line with the document source.
//!
//! A state-free procedure: fetch the mirrored documents, summarise them under
//! a bounded worker pool, then reconcile with the store in fixed-size batches
//! and upsert whatever actually changed. Rerunning against an unchanged
//! source performs no completion calls and no upserts.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::Failure;
use crate::models::{Document, SourceDocument};
use crate::summary_cache::SummaryCache;
use crate::traits::{CompletionProvider, DocumentSource, VectorStore};

/// Counters reported after a sync pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncOutcome {
    pub fetched: usize,
    /// Summaries created through the completion provider this pass.
    pub summarised: usize,
    /// Summaries served from the on-disk cache.
    pub cache_hits: usize,
    /// Documents the store already held with identical content.
    pub skipped: usize,
    pub upserted: usize,
    /// Documents dropped from this pass because summarisation failed.
    pub failed: usize,
}

pub struct SyncPipeline {
    source: Arc<dyn DocumentSource>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn CompletionProvider>,
    cache: Arc<SummaryCache>,
    summary_concurrency: usize,
    upsert_batch: usize,
}

enum Prepared {
    Ready { document: Document, summarised: bool },
    Skipped,
}

impl SyncPipeline {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn CompletionProvider>,
        cache: Arc<SummaryCache>,
        summary_concurrency: usize,
        upsert_batch: usize,
    ) -> Self {
        Self {
            source,
            store,
            llm,
            cache,
            summary_concurrency: summary_concurrency.max(1),
            upsert_batch: upsert_batch.max(1),
        }
    }

    /// Run one full sync pass. With `reindex` set, every document is upserted
    /// without probing the store first. Summarisation failures skip the
    /// affected document; an upsert failure aborts the pass.
    pub async fn run(&self, reindex: bool) -> Result<SyncOutcome> {
        self.source.refresh().await?;
        let raw = self.source.fetch_all().await?;

        let mut outcome = SyncOutcome {
            fetched: raw.len(),
            ..Default::default()
        };

        // Summaries come back in completion order, not source order. The
        // semaphore bounds in-flight completion calls only; cache lookups and
        // title derivation run ahead of it.
        let semaphore = Arc::new(Semaphore::new(self.summary_concurrency));
        let mut tasks: JoinSet<Prepared> = JoinSet::new();
        for doc in raw {
            let cache = Arc::clone(&self.cache);
            let llm = Arc::clone(&self.llm);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(prepare(doc, cache, llm, semaphore));
        }

        let mut documents = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Prepared::Ready {
                    document,
                    summarised,
                }) => {
                    if summarised {
                        outcome.summarised += 1;
                    } else {
                        outcome.cache_hits += 1;
                    }
                    documents.push(document);
                }
                Ok(Prepared::Skipped) => outcome.failed += 1,
                Err(join_err) => {
                    warn!("summarisation task aborted: {join_err}");
                    outcome.failed += 1;
                }
            }
        }

        for batch in documents.chunks(self.upsert_batch) {
            let survivors = if reindex {
                batch.to_vec()
            } else {
                self.reconcile_batch(batch).await
            };
            outcome.skipped += batch.len() - survivors.len();

            if survivors.is_empty() {
                continue;
            }
            self.store
                .upsert(&survivors)
                .await
                .map_err(|cause| Failure::Upsert { cause })?;
            outcome.upserted += survivors.len();
            info!(count = survivors.len(), "updated documents in the index");
        }

        Ok(outcome)
    }

    /// Probe a batch against the store and keep only documents the store is
    /// missing or holds with different content. Probes fan out without a
    /// bound — they are cheap reads, unlike the gated completion calls — and
    /// a failed probe keeps its document in the batch.
    async fn reconcile_batch(&self, batch: &[Document]) -> Vec<Document> {
        let mut probes: JoinSet<Option<Document>> = JoinSet::new();
        for document in batch {
            let store = Arc::clone(&self.store);
            let document = document.clone();
            probes.spawn(async move {
                match store.fetch(&document.id).await {
                    Ok(Some(stored)) if stored.content == document.content => None,
                    _ => Some(document),
                }
            });
        }

        let mut survivors = Vec::new();
        while let Some(probed) = probes.join_next().await {
            if let Ok(Some(document)) = probed {
                survivors.push(document);
            }
        }
        survivors
    }
}

async fn prepare(
    doc: SourceDocument,
    cache: Arc<SummaryCache>,
    llm: Arc<dyn CompletionProvider>,
    semaphore: Arc<Semaphore>,
) -> Prepared {
    let title = derive_title(&doc.body);

    let (summary, summarised) = match cache.lookup(&doc.id, doc.modified_at).await {
        Some(cached) => (cached, false),
        None => {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Prepared::Skipped,
            };
            let started = Instant::now();
            info!(id = %doc.id, "creating summary");
            match cache.create(&doc.id, &doc.body, llm.as_ref()).await {
                Ok(summary) => {
                    info!(id = %doc.id, elapsed = ?started.elapsed(), "created summary");
                    (summary, true)
                }
                Err(failure) => {
                    warn!("{failure}; document skipped for this pass");
                    return Prepared::Skipped;
                }
            }
        }
    };

    Prepared::Ready {
        document: Document {
            filename: format!("{}.markdown", doc.id),
            content: doc.body,
            title,
            summary,
            created_at: doc.created_at.map(millis),
            updated_at: doc.updated_at.map(millis),
            closed_at: doc.closed_at.map(millis),
            id: doc.id,
        },
        summarised,
    }
}

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// First non-blank line of the body, heading markers stripped.
pub fn derive_title(body: &str) -> String {
    body.lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().trim_start_matches('#').trim().to_string())
        .unwrap_or_default()
}
