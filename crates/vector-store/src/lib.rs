//! # archrag Vector Store
//!
//! Exact L2 similarity search over embedded document chunks, with on-disk persistence.
//!
//! ## Features
//!
//! - **Exact search** over a flat L2 index (no approximation, deterministic tie order)
//! - **Pluggable embeddings** via the [`EmbeddingProvider`] trait (OpenAI, OpenWebUI, stub)
//! - **Incremental updates**: new chunks are appended without re-embedding old ones
//! - **Crash-safe saves**: both files are written to a staging directory and swapped in
//! - **Legacy import** of `index.faiss` + `index.pkl` (or `index.json`) directories
//!
//! ## Architecture
//!
//! ```text
//! Chunk[]
//!     │
//!     ├──> EmbeddingProvider::embed_documents
//!     │      └─> Vec<f32>[dimension]
//!     │
//!     ├──> FlatL2Index (slot i = i-th vector)
//!     │
//!     ├──> DocumentStore (slot i -> Chunk)
//!     │
//!     └──> save_local / load_local
//!            └─> vectors.bin + docstore.json
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use archrag_chunker::Chunk;
//! use archrag_vector_store::{EmbeddingConfig, VectorStore};
//!
//! #[tokio::main]
//! async fn main() -> archrag_vector_store::Result<()> {
//!     let embedder = EmbeddingConfig::from_env()?.build()?;
//!     let chunks: Vec<Chunk> = Vec::new(); // from archrag_chunker::TextSplitter
//!     let store = VectorStore::from_documents(chunks, embedder).await?;
//!     store.save_local("faiss_index").await?;
//!
//!     for (chunk, distance) in store.similarity_search_with_score("PII storage", 5).await? {
//!         println!("{distance:.3} {:?}", chunk.source());
//!     }
//!     Ok(())
//! }
//! ```

mod docstore;
mod embeddings;
mod error;
mod flat_index;
mod legacy;
mod persist;
mod store;

pub use docstore::DocumentStore;
pub use embeddings::{
    EmbeddingConfig, EmbeddingFingerprint, EmbeddingProvider, OpenAiEmbedder, StubEmbedder,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, DEFAULT_STUB_DIMENSION,
};
pub use error::{Result, VectorStoreError};
pub use flat_index::FlatL2Index;
pub use legacy::LegacyDecodeWarning;
pub use persist::{
    detect_generation, has_index_files, index_exists, IndexGeneration, DOCSTORE_FILE,
    DOCSTORE_SCHEMA_VERSION, LEGACY_DOCSTORE_FILE, LEGACY_INDEX_FILE, LEGACY_JSON_DOCSTORE_FILE,
    VECTORS_FILE,
};
pub use store::{LoadReport, VectorStore};
