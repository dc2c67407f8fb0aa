//! # Issue Harness
//!
//! Mirror an issue tracker into a semantic search index and explore it from
//! an interactive console session.
//!
//! The `issues` binary keeps a local mirror of a GitHub repository's issues,
//! summarises each one through a chat-completion endpoint, indexes the
//! results in a Marqo-style vector store, and then drops into a console
//! session with paginated semantic search, AI-generated summaries, and
//! threaded Q&A grounded in the retrieved issues.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//! │ GitHub issue │──▶│ SyncPipeline   │──▶│ Vector store │
//! │ mirror       │   │ summarise+dedup│   │ (Marqo HTTP) │
//! └──────────────┘   └───────┬───────┘   └──────┬───────┘
//!                            │                  │
//!                     ┌──────┴─────┐            │
//!                     │ Summary    │     ┌──────┴────────┐
//!                     │ cache      │     │ Retrieval      │
//!                     └────────────┘     │ session (CLI)  │
//!                                        └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! issues --refresh                # mirror, summarise, index, then search
//! issues                         # search what is already indexed
//! issues --refresh --reindex     # force-reindex every document
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and prompt text |
//! | [`models`] | Core data types |
//! | [`traits`] | Provider seams (source, completions, vector store) |
//! | [`sync`] | Incremental sync/indexing pipeline |
//! | [`summary_cache`] | On-disk per-issue summary cache |
//! | [`session`] | Interactive retrieval state machine |
//! | [`conversation`] | Append-only Q&A thread |
//! | [`console`] | Keystroke menus and terminal rendering |
//! | [`source_github`] | GitHub issue mirror |
//! | [`llm`] | OpenAI-compatible completion adapter |
//! | [`marqo`] | Marqo-style vector store adapter |
//! | [`stats`] | Index overview display |

pub mod config;
pub mod console;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod marqo;
pub mod models;
pub mod session;
pub mod source_github;
pub mod stats;
pub mod summary_cache;
pub mod sync;
pub mod traits;
