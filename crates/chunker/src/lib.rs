//! # archrag Chunker
//!
//! Splits architecture documents (standards, ADRs, policies) into overlapping, bounded-size
//! chunks for embedding.
//!
//! ## Algorithm
//!
//! ```text
//! Document text
//!     │
//!     ├──> Recursive split: "\n\n" → "\n" → " " → raw characters
//!     │      (finer separators only for pieces still over chunk_size)
//!     │
//!     └──> Greedy merge up to chunk_size
//!            └─> each new chunk starts with the previous chunk's tail (chunk_overlap)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use archrag_chunker::{Document, SplitterConfig, TextSplitter};
//!
//! let splitter = TextSplitter::new(SplitterConfig::default()).unwrap();
//! let doc = Document::new("# ADR-007\n\nAll PII is stored in eu-west-1.").with_source("adr-007.md");
//!
//! let chunks = splitter.split_documents(&[doc]);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].source(), Some("adr-007.md"));
//! ```

mod config;
mod error;
mod splitter;
mod types;

pub use config::SplitterConfig;
pub use error::{ChunkerError, Result};
pub use splitter::TextSplitter;
pub use types::{Chunk, Document, Metadata, SOURCE_KEY};
