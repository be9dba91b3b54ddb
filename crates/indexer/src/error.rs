use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] archrag_chunker::ChunkerError),

    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] archrag_vector_store::VectorStoreError),

    #[error("Documents folder not found at {} (create it and add Markdown files, then run ingestion)", .0.display())]
    MissingCorpus(PathBuf),

    #[error("No indexable documents found in {}", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("Existing index at {} could not be loaded; refusing to overwrite it ({source})", .path.display())]
    UnreadableIndex {
        path: PathBuf,
        source: archrag_vector_store::VectorStoreError,
    },

    #[error("Page source error: {0}")]
    PageSource(String),

    #[error("{0}")]
    Other(String),
}
