//! On-disk cache of per-issue summaries.
//!
//! Sits between the sync pipeline and the completion provider: a document is
//! only summarised again when its mirror copy is newer than the cached entry.
//! Entries live next to the mirrored files as `<id>.markdown.summary`.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::Failure;
use crate::models::Message;
use crate::traits::CompletionProvider;

static INLINE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(data:image/\w+;base64,[^)]+\)").expect("inline image pattern"));

/// Flatten a document body into a single prompt line: inline base64 images
/// dropped, carriage returns stripped, newlines collapsed to spaces.
pub fn flatten_for_prompt(text: &str) -> String {
    INLINE_IMAGE
        .replace_all(text, "()")
        .replace('\r', "")
        .replace('\n', " ")
}

pub struct SummaryCache {
    folder: PathBuf,
    summarise_prompt: String,
}

impl SummaryCache {
    pub fn new(folder: impl Into<PathBuf>, summarise_prompt: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            summarise_prompt: summarise_prompt.into(),
        }
    }

    /// Where the cache entry for `id` lives.
    pub fn entry_path(&self, id: &str) -> PathBuf {
        self.folder.join(format!("{id}.markdown.summary"))
    }

    /// The cached summary, if one exists and is at least as new as the
    /// source document.
    pub async fn lookup(&self, id: &str, modified_at: DateTime<Utc>) -> Option<String> {
        let path = self.entry_path(id);
        let meta = tokio::fs::metadata(&path).await.ok()?;
        let entry_written = meta.modified().ok()?;
        if entry_written >= SystemTime::from(modified_at) {
            tokio::fs::read_to_string(&path).await.ok()
        } else {
            None
        }
    }

    /// Summarise `body` via the provider and persist the result. The write is
    /// atomic: a failure part-way never leaves an entry newer than the
    /// source.
    pub async fn create(
        &self,
        id: &str,
        body: &str,
        provider: &dyn CompletionProvider,
    ) -> Result<String, Failure> {
        let messages = [
            Message::system(&self.summarise_prompt),
            Message::user(flatten_for_prompt(body)),
        ];

        let summary = provider
            .complete(&messages)
            .await
            .map_err(|cause| Failure::Summarization {
                id: id.to_string(),
                cause,
            })?;

        self.persist(id, &summary)
            .await
            .map_err(|cause| Failure::Summarization {
                id: id.to_string(),
                cause,
            })?;

        debug!(id, "cached new summary");
        Ok(summary)
    }

    /// The cached summary when fresh, a newly-created one otherwise.
    pub async fn get_or_create(
        &self,
        id: &str,
        body: &str,
        modified_at: DateTime<Utc>,
        provider: &dyn CompletionProvider,
    ) -> Result<String, Failure> {
        if let Some(cached) = self.lookup(id, modified_at).await {
            return Ok(cached);
        }
        self.create(id, body, provider).await
    }

    /// Drop the entry for `id`, if any. Used when the source withdraws a
    /// document.
    pub async fn remove(&self, id: &str) {
        let _ = tokio::fs::remove_file(self.entry_path(id)).await;
    }

    async fn persist(&self, id: &str, summary: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.folder)
            .await
            .with_context(|| format!("creating cache folder {}", self.folder.display()))?;

        let path = self.entry_path(id);
        let staging = staging_path(&path);
        tokio::fs::write(&staging, summary)
            .await
            .with_context(|| format!("writing {}", staging.display()))?;
        tokio::fs::rename(&staging, &path)
            .await
            .with_context(|| format!("moving summary into place at {}", path.display()))?;
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
