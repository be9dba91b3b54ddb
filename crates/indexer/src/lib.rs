//! # archrag Indexer
//!
//! Builds and updates the vector index from a docs folder or a Confluence space.
//!
//! ## Pipeline
//!
//! ```text
//! docs/ folder                      Confluence space
//!     │                                   │
//!     ├──> DocumentScanner               ├──> PageSource::fetch_pages
//!     │      └─> Markdown files           │      └─> pages (title, id, version)
//!     │                                   │
//!     └──────────────┬────────────────────┘
//!                    ├──> TextSplitter (1000 chars, 200 overlap)
//!                    │
//!                    └──> VectorStore (fresh build or merge) ──> save_local
//! ```
//!
//! Every write holds an exclusive lock on `<index_dir>.lock`.
//!
//! ## Example
//!
//! ```no_run
//! use archrag_indexer::{ingest_documents, IngestConfig};
//! use archrag_vector_store::EmbeddingConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = EmbeddingConfig::from_env()?.build()?;
//!     let (_store, stats) = ingest_documents(&IngestConfig::default(), provider).await?;
//!
//!     println!("Indexed {} documents, {} chunks", stats.documents, stats.chunks);
//!     Ok(())
//! }
//! ```

mod confluence;
mod error;
mod index_lock;
mod ingest;
mod scanner;
mod stats;

pub use confluence::{ingest_from_confluence, ConfluencePage, JsonExportSource, PageSource, SyncOutcome};
pub use error::{IndexerError, Result};
pub use ingest::{ingest_documents, IngestConfig, DEFAULT_DOCS_PATH, DEFAULT_INDEX_PATH};
pub use scanner::{DocumentScanner, DEFAULT_EXTENSIONS};
pub use stats::IngestStats;
