//! Provider seams for the sync pipeline and the retrieval session.
//!
//! The cores only ever talk to these three traits. Concrete adapters live in
//! [`crate::source_github`], [`crate::llm`], and [`crate::marqo`]; tests swap
//! in in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, Hit, IndexStats, Message, SourceDocument};

/// Something that can mirror an external tracker into a local folder and hand
/// back its raw documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Bring the local mirror up to date with the remote tracker. Called once
    /// at the start of a sync pass; a no-op for sources that are already
    /// local.
    async fn refresh(&self) -> Result<()>;

    /// Return every mirrored document: stable id, raw body, and timestamps.
    /// Order is not significant.
    async fn fetch_all(&self) -> Result<Vec<SourceDocument>>;

    /// The canonical URL for a document, when the tracker has one.
    fn resolve_url(&self, id: &str) -> Option<String>;
}

/// A chat-completion backend: an ordered message list in, one reply out.
/// The wire format is the adapter's business.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}

/// A remote semantic index over [`Document`]s.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the index if it does not exist. Idempotent.
    async fn ensure_index(&self) -> Result<()>;

    /// Write a batch of documents. The store replaces existing documents with
    /// the same id.
    async fn upsert(&self, documents: &[Document]) -> Result<()>;

    /// Fetch the stored copy of a document, `None` if the store does not hold
    /// it. Used as a cheap existence/content probe during reconciliation.
    async fn fetch(&self, id: &str) -> Result<Option<Document>>;

    /// Free-text search, one page of ranked hits starting at `offset`.
    async fn search(&self, text: &str, offset: usize) -> Result<Vec<Hit>>;

    async fn stats(&self) -> Result<IndexStats>;

    async fn list_indexes(&self) -> Result<Vec<String>>;
}
