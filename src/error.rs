//! Failure kinds for the sync and session cores.
//!
//! Provider errors are translated into one of these kinds at the call site;
//! the cores never inspect provider-specific payloads. Summarization and
//! completion failures are recoverable (skip the document, or hand the user
//! an empty reply); upsert and query failures are fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Failure {
    /// The completion provider failed while summarising a document for the
    /// index. The sync pipeline skips the document and continues.
    #[error("summarising issue {id} failed: {cause}")]
    Summarization { id: String, cause: anyhow::Error },

    /// The completion provider failed during interactive Q&A. The session
    /// shows an empty reply and leaves the conversation thread untouched.
    #[error("chat completion failed: {cause}")]
    Completion { cause: anyhow::Error },

    /// The vector store rejected a batch write. Aborts the sync pass.
    #[error("vector store upsert failed: {cause}")]
    Upsert { cause: anyhow::Error },

    /// The vector store rejected a search. Ends the session; a broken query
    /// path makes the rest of the session meaningless.
    #[error("vector store query failed: {cause}")]
    Query { cause: anyhow::Error },
}

impl Failure {
    /// Whether the session or pipeline may continue after this failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Failure::Summarization { .. } | Failure::Completion { .. }
        )
    }
}
