//! # Issue Harness CLI (`issues`)
//!
//! Mirrors a GitHub repository's issues into a semantic search index and
//! opens an interactive console session over it.
//!
//! ```bash
//! issues --config ./config/issues.toml --refresh
//! ```
//!
//! Without `--refresh` the binary searches whatever is already indexed. With
//! it, the tracker mirror is refreshed, new or changed issues are summarised
//! and upserted, and the session starts afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use issue_harness::config;
use issue_harness::console::TerminalConsole;
use issue_harness::llm::OpenAiCompletions;
use issue_harness::marqo::MarqoStore;
use issue_harness::session::RetrievalSession;
use issue_harness::source_github::GithubIssueSource;
use issue_harness::stats;
use issue_harness::summary_cache::SummaryCache;
use issue_harness::sync::{SyncOutcome, SyncPipeline};
use issue_harness::traits::{CompletionProvider, DocumentSource, VectorStore};

/// Issue Harness — search an issue tracker semantically from the console.
///
/// All settings are read from a TOML configuration file; see
/// `config/issues.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "issues",
    about = "Mirror an issue tracker into a semantic search index and explore it from the console",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, default_value = "./config/issues.toml")]
    config: PathBuf,

    /// Refresh the issue mirror, summarise and index before searching.
    #[arg(long)]
    refresh: bool,

    /// With --refresh: upsert every document without probing the index first.
    #[arg(long)]
    reindex: bool,

    /// With --refresh: check every tracker page instead of stopping at the
    /// first page with nothing new.
    #[arg(long)]
    full_refresh: bool,

    /// Override the summarization pool width from config.
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if (cli.reindex || cli.full_refresh) && !cli.refresh {
        anyhow::bail!("--reindex and --full-refresh require --refresh");
    }

    if !cli.refresh {
        println!("Run with --refresh to refresh issues, summarise and index; add --reindex to reindex existing summaries");
        println!("and --full-refresh to check updates on all tracker issues");
        println!();
    }

    let cfg = config::load_config(&cli.config)?;

    let llm: Arc<dyn CompletionProvider> = Arc::new(OpenAiCompletions::from_config(&cfg.api)?);
    let store: Arc<dyn VectorStore> =
        Arc::new(MarqoStore::new(&cfg.store, cfg.session.page_size)?);
    let cache = Arc::new(SummaryCache::new(
        &cfg.sync.folder,
        cfg.prompts.summarise_document.clone(),
    ));
    let source: Arc<dyn DocumentSource> = Arc::new(GithubIssueSource::new(
        &cfg.github,
        &cfg.sync.folder,
        cli.full_refresh,
        Arc::clone(&cache),
    )?);

    store.ensure_index().await?;

    let mut do_refresh = cli.refresh;
    if !do_refresh && mirror_is_empty(&cfg.sync.folder) {
        println!(
            "Issue mirror not found at {} and --refresh not given, refresh y/[N]?",
            cfg.sync.folder.display()
        );
        let key = console::Term::stdout().read_char()?;
        if !key.eq_ignore_ascii_case(&'y') {
            return Ok(());
        }
        do_refresh = true;
    }

    if do_refresh {
        println!(
            "Syncing issues from {}/{}",
            cfg.github.owner, cfg.github.repo
        );
        let pipeline = SyncPipeline::new(
            Arc::clone(&source),
            Arc::clone(&store),
            Arc::clone(&llm),
            Arc::clone(&cache),
            cli.concurrency.unwrap_or(cfg.sync.summary_concurrency),
            cfg.sync.upsert_batch,
        );
        let outcome = pipeline.run(cli.reindex).await?;
        print_sync_report(&outcome);
    }

    stats::show_stats(store.as_ref(), &cfg.store.index).await?;

    let console = TerminalConsole::new();
    let mut session = RetrievalSession::new(
        store,
        llm,
        source,
        console,
        cfg.session.page_size,
        cfg.prompts.clone(),
    );
    session.run().await
}

/// True when the mirror folder holds no issue files yet.
fn mirror_is_empty(folder: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(folder) else {
        return true;
    };
    !entries.filter_map(|e| e.ok()).any(|e| {
        e.path()
            .extension()
            .map(|ext| ext == "markdown")
            .unwrap_or(false)
    })
}

fn print_sync_report(outcome: &SyncOutcome) {
    println!("sync github");
    println!("  fetched: {} issues", outcome.fetched);
    println!("  summaries created: {}", outcome.summarised);
    println!("  summaries reused: {}", outcome.cache_hits);
    println!("  unchanged in index: {}", outcome.skipped);
    println!("  upserted documents: {}", outcome.upserted);
    if outcome.failed > 0 {
        println!("  skipped (summarisation failed): {}", outcome.failed);
    }
    println!("ok");
}
