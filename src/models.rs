//! Core data types that flow through the sync pipeline and the retrieval
//! session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw document yielded by a [`crate::traits::DocumentSource`] before the
/// pipeline derives a title and summary for it.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: String,
    pub body: String,
    /// When the local mirror copy was last written. Drives the summary-cache
    /// freshness check.
    pub modified_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// A fully-derived document, ready to upsert. Identity is `id`, stable across
/// syncs; a value is immutable once built for a sync pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub content: String,
    pub title: String,
    pub summary: String,
    /// Unix milliseconds, when known.
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub closed_at: Option<i64>,
}

/// A ranked search hit returned by the vector store. Read-only; lives only as
/// long as the query result set it came from.
#[derive(Debug, Clone)]
pub struct Hit {
    pub id: String,
    pub score: f32,
    pub highlights: Vec<String>,
    pub content: String,
    pub summary: String,
    pub title: String,
}

/// The session's current search text and result offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub offset: usize,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            offset: 0,
        }
    }
}

/// Read capability shared by documents and search hits, so menu and summary
/// rendering does not care which shape it was handed.
pub trait DocumentFields {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn content(&self) -> &str;
    fn summary(&self) -> &str;
}

impl DocumentFields for Document {
    fn id(&self) -> &str {
        &self.id
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn content(&self) -> &str {
        &self.content
    }
    fn summary(&self) -> &str {
        &self.summary
    }
}

impl DocumentFields for Hit {
    fn id(&self) -> &str {
        &self.id
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn content(&self) -> &str {
        &self.content
    }
    fn summary(&self) -> &str {
        &self.summary
    }
}

/// Chat message roles as the completion wire format spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn in a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Display-only snapshot of the store's index.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub documents: i64,
    pub vectors: i64,
    pub backend: Option<BackendUsage>,
}

/// Backend capacity figures, when the store reports them.
#[derive(Debug, Clone, Copy)]
pub struct BackendUsage {
    pub memory_pct: f64,
    pub storage_pct: f64,
}
