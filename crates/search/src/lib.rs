//! # archrag Search
//!
//! Question-time retrieval over the saved index.
//!
//! ```text
//! question
//!     │
//!     ├──> k = 10 for listing questions, else 6
//!     │
//!     ├──> KnowledgeBase (lazy-loaded Arc<VectorStore>)
//!     │      └─> similarity_search_with_score
//!     │
//!     ├──> KeywordReranker (only when the question names a keyword)
//!     │
//!     └──> RetrievedSource { source, filename, content, distance, confidence }
//! ```
//!
//! A design audit fetches 15 chunks for the whole design text, puts chunks naming a
//! priority ADR first and keeps at most 10 of the rest.

mod confidence;
mod error;
mod knowledge_base;
mod rerank;
mod retriever;

pub use confidence::{Confidence, ConfidenceThresholds};
pub use error::{Result, SearchError};
pub use knowledge_base::KnowledgeBase;
pub use rerank::{KeywordReranker, DEFAULT_KEYWORDS};
pub use retriever::{build_context, RetrievedSource, Retriever, RetrieverConfig};
