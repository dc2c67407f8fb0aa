//! GitHub issue source: mirrors a repository's issues into a local folder and
//! serves them back as raw documents.
//!
//! Each issue lands as `<number>.markdown` with a `<number>.metadata` JSON
//! sidecar carrying timestamps and assignees. Pull requests surfaced by the
//! issues API are filtered out, and their mirror and summary files are
//! deleted so the index stops carrying them.
//!
//! Paging walks newest-first and stops once a full page of issues yields
//! nothing new or updated — deep historical edits past an untouched stretch
//! are only caught with a full refresh.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::Glob;
use serde::{Deserialize, Serialize};
use tracing::info;
use walkdir::WalkDir;

use crate::config::GithubConfig;
use crate::models::SourceDocument;
use crate::summary_cache::SummaryCache;
use crate::traits::DocumentSource;

const ISSUES_PER_PAGE: usize = 30;

pub struct GithubIssueSource {
    owner: String,
    repo: String,
    token: Option<String>,
    folder: PathBuf,
    full_refresh: bool,
    cache: Arc<SummaryCache>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WireIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<WireLabel>,
    #[serde(default)]
    assignees: Vec<WireUser>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
    /// Present when the "issue" is really a pull request.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    login: String,
}

/// Sidecar persisted next to each mirrored issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueMetadata {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignees: Vec<String>,
}

impl GithubIssueSource {
    pub fn new(
        config: &GithubConfig,
        folder: impl Into<PathBuf>,
        full_refresh: bool,
        cache: Arc<SummaryCache>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("issue-harness")
            .build()
            .context("building tracker client")?;

        Ok(Self {
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            token: config.token.clone(),
            folder: folder.into(),
            full_refresh,
            cache,
            client,
        })
    }

    fn markdown_path(&self, id: &str) -> PathBuf {
        self.folder.join(format!("{id}.markdown"))
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.folder.join(format!("{id}.metadata"))
    }

    async fn fetch_page(&self, page: usize) -> Result<Vec<WireIssue>> {
        let url = format!(
            "https://api.github.com/repos/{}/{}/issues",
            self.owner, self.repo
        );
        let query: Vec<(&str, String)> = vec![
            ("state", "all".to_string()),
            ("sort", "created".to_string()),
            ("direction", "desc".to_string()),
            ("per_page", ISSUES_PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];

        let mut request = self
            .client
            .get(&url)
            .query(&query)
            .header("accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let issues = request
            .send()
            .await
            .context("requesting issue page")?
            .error_for_status()
            .context("issue page request rejected")?
            .json()
            .await
            .context("decoding issue page")?;
        Ok(issues)
    }

    /// Delete the mirror and summary files of a pull request that the issues
    /// API surfaced. Only logs when there actually was a mirror copy.
    async fn remove_pull_request(&self, number: u64) {
        let id = number.to_string();
        let path = self.markdown_path(&id);
        if !path.exists() {
            return;
        }
        let _ = tokio::fs::remove_file(&path).await;
        let _ = tokio::fs::remove_file(self.metadata_path(&id)).await;
        self.cache.remove(&id).await;
        info!(number, "removed pull request from the mirror");
    }

    /// Write one issue's mirror and metadata files. Returns whether anything
    /// was new or updated on this page.
    async fn mirror_issue(&self, issue: &WireIssue) -> Result<bool> {
        let id = issue.number.to_string();
        let path = self.markdown_path(&id);
        let metadata_path = self.metadata_path(&id);

        let metadata_was_missing = !metadata_path.exists();
        let metadata = IssueMetadata {
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            closed_at: issue.closed_at,
            assignees: issue.assignees.iter().map(|u| u.login.clone()).collect(),
        };
        tokio::fs::write(&metadata_path, serde_json::to_string(&metadata)?)
            .await
            .with_context(|| format!("writing {}", metadata_path.display()))?;

        if path.exists() {
            let Some(updated_at) = issue.updated_at else {
                return Ok(metadata_was_missing);
            };
            let mirrored_at = std::fs::metadata(&path)?.modified()?;
            if SystemTime::from(updated_at) < mirrored_at {
                return Ok(metadata_was_missing);
            }
        } else {
            // A fresh mirror file must not inherit a summary of older content.
            self.cache.remove(&id).await;
        }

        let mut content = format!("# {}\n", issue.title);
        if !issue.labels.is_empty() {
            let labels: Vec<&str> = issue.labels.iter().map(|l| l.name.as_str()).collect();
            content.push_str(&format!("Labels: {}\n\n", labels.join(", ")));
        }
        content.push_str(&format!(
            "Date added: {}\n\n",
            issue.created_at.format("%Y-%m-%d")
        ));
        if let Some(body) = &issue.body {
            content.push_str(body);
            content.push('\n');
        }

        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!(number = issue.number, path = %path.display(), "saved issue");
        Ok(true)
    }

    async fn read_metadata(&self, id: &str) -> Option<IssueMetadata> {
        let raw = tokio::fs::read_to_string(self.metadata_path(id)).await.ok()?;
        serde_json::from_str(&raw).ok()
    }
}

#[async_trait]
impl DocumentSource for GithubIssueSource {
    async fn refresh(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.folder)
            .await
            .with_context(|| format!("creating mirror folder {}", self.folder.display()))?;

        let mut page = 1usize;
        loop {
            let issues = self.fetch_page(page).await?;
            if issues.is_empty() {
                break;
            }

            for pr in issues.iter().filter(|i| i.pull_request.is_some()) {
                self.remove_pull_request(pr.number).await;
            }

            let to_save: Vec<&WireIssue> =
                issues.iter().filter(|i| i.pull_request.is_none()).collect();
            let mut any_new_or_updated = false;
            for issue in &to_save {
                if self.mirror_issue(issue).await? {
                    any_new_or_updated = true;
                }
            }

            // Walking back in time: a whole page of untouched issues means
            // the history beyond it has almost certainly been seen already.
            if !self.full_refresh && to_save.len() > 1 && !any_new_or_updated {
                break;
            }
            page += 1;
        }
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<SourceDocument>> {
        let matcher = Glob::new("*.markdown")
            .context("building mirror file pattern")?
            .compile_matcher();

        let mut documents = Vec::new();
        for entry in WalkDir::new(&self.folder)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
                continue;
            }

            let path = entry.path();
            let id = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) if !stem.is_empty() => stem.to_string(),
                _ => continue,
            };

            let body = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let modified_at: DateTime<Utc> = entry.metadata()?.modified()?.into();
            let metadata = self.read_metadata(&id).await;

            documents.push(SourceDocument {
                id,
                body,
                modified_at,
                created_at: metadata.as_ref().map(|m| m.created_at),
                updated_at: metadata.as_ref().and_then(|m| m.updated_at),
                closed_at: metadata.as_ref().and_then(|m| m.closed_at),
            });
        }

        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    fn resolve_url(&self, id: &str) -> Option<String> {
        Some(format!(
            "https://github.com/{}/{}/issues/{}",
            self.owner, self.repo, id
        ))
    }
}
