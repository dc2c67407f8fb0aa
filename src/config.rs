use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub github: GithubConfig,
    pub sync: SyncConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub prompts: Prompts,
}

/// Completion endpoints, ordered. Kept as a list so different tasks can later
/// be routed to different models (cheap summaries, expensive Q&A); today the
/// first entry is used for everything, and older config files keep working.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub endpoints: Vec<ApiEndpoint>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiEndpoint {
    pub url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub index: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_store_model")]
    pub model: String,
}

fn default_store_model() -> String {
    "hf/e5-base-v2".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Folder holding the mirrored `<number>.markdown` files and their
    /// `.metadata` / `.summary` sidecars.
    pub folder: PathBuf,
    /// Width of the summarization worker pool — at most this many completion
    /// calls in flight at once.
    #[serde(default = "default_summary_concurrency")]
    pub summary_concurrency: usize,
    /// Documents per reconcile/upsert batch.
    #[serde(default = "default_upsert_batch")]
    pub upsert_batch: usize,
}

fn default_summary_concurrency() -> usize {
    1
}

fn default_upsert_batch() -> usize {
    25
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    8
}

/// Prompt text for every completion-provider call. All overridable from the
/// config file; the defaults match what the tool ships with.
#[derive(Debug, Deserialize, Clone)]
pub struct Prompts {
    /// Prefix for a question about one document.
    #[serde(default = "default_question_about_document")]
    pub question_about_document: String,
    /// Prefix for a question about the cross-match summary.
    #[serde(default = "default_question_about_summary")]
    pub question_about_summary: String,
    /// System prompt for the summarize-for-later-search call.
    #[serde(default = "default_summarise_document")]
    pub summarise_document: String,
    /// System framing for document Q&A conversations.
    #[serde(default = "default_system_questions")]
    pub system_questions: String,
    /// System framing for Q&A conversations about the aggregate summary.
    #[serde(default = "default_system_summary_questions")]
    pub system_summary_questions: String,
    /// System prompt for the summary-of-all-matches call.
    #[serde(default = "default_system_matches_summary")]
    pub system_matches_summary: String,
    /// Final user message of the summary-of-all-matches call; the search text
    /// is appended.
    #[serde(default = "default_matches_summary_request")]
    pub matches_summary_request: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            question_about_document: default_question_about_document(),
            question_about_summary: default_question_about_summary(),
            summarise_document: default_summarise_document(),
            system_questions: default_system_questions(),
            system_summary_questions: default_system_summary_questions(),
            system_matches_summary: default_system_matches_summary(),
            matches_summary_request: default_matches_summary_request(),
        }
    }
}

fn default_question_about_document() -> String {
    "I'm going to give you a document, and I need you to answer the following question".to_string()
}

fn default_question_about_summary() -> String {
    "I'm going to give you a set of documents, and I need you to answer the following question \
     about them"
        .to_string()
}

fn default_summarise_document() -> String {
    "You are going to be given a document, which specifies a feature or describes a bug. You are \
     required to summarise it for later searching. You need to include the names of the affected \
     parts of the system and a short but detailed summary of either the changes requested, or the \
     bug being reported. Try as hard as possible to include all detail without including \
     extraneous or generic details."
        .to_string()
}

fn default_system_questions() -> String {
    "You are a helpful assistant who specialises in answering questions about design documents, \
     which include details of features for a software library. Answer the question as best you \
     can with the details in the issue, as succinctly as possible, without adding anything you \
     are unsure about"
        .to_string()
}

fn default_system_summary_questions() -> String {
    "You are a helpful assistant who answers questions about a summary of related issues from an \
     issue tracker. Answer as succinctly as possible using only the summarised issues you are \
     given, without adding anything you are unsure about"
        .to_string()
}

fn default_system_matches_summary() -> String {
    "You are a helpful assistant who searches through a database of documents for a user. The \
     user will give you documents, then ask you a question, you will give a short summary to the \
     user explaining how the issues relate to the user's search."
        .to_string()
}

fn default_matches_summary_request() -> String {
    "Please give a short summary of all of the above issues, with one bullet point per issue. \
     Please also comment on how the issues relate to each other (particularly if they are bugs), \
     and how they relate to this search"
        .to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.api.endpoints.is_empty() {
        anyhow::bail!("api.endpoints must list at least one completion endpoint");
    }

    if config.sync.summary_concurrency == 0 {
        anyhow::bail!("sync.summary_concurrency must be > 0");
    }

    if config.sync.upsert_batch == 0 {
        anyhow::bail!("sync.upsert_batch must be > 0");
    }

    if config.session.page_size == 0 || config.session.page_size > 9 {
        anyhow::bail!("session.page_size must be between 1 and 9 (results are picked with a single keystroke)");
    }

    if config.store.host.is_empty() || config.store.index.is_empty() {
        anyhow::bail!("store.host and store.index must be set");
    }

    Ok(config)
}
