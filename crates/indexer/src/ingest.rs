use crate::error::{IndexerError, Result};
use crate::index_lock::acquire_index_write_lock;
use crate::scanner::{DocumentScanner, DEFAULT_EXTENSIONS};
use crate::stats::IngestStats;
use archrag_chunker::{Document, SplitterConfig, TextSplitter};
use archrag_vector_store::{EmbeddingProvider, VectorStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_DOCS_PATH: &str = "docs";
pub const DEFAULT_INDEX_PATH: &str = "faiss_index";

/// Where documents come from and where the index goes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub docs_path: PathBuf,
    pub index_path: PathBuf,
    pub extensions: Vec<String>,
    pub splitter: SplitterConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            docs_path: PathBuf::from(DEFAULT_DOCS_PATH),
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            splitter: SplitterConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn new(docs_path: impl Into<PathBuf>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            docs_path: docs_path.into(),
            index_path: index_path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_splitter(mut self, splitter: SplitterConfig) -> Self {
        self.splitter = splitter;
        self
    }

    pub(crate) fn splitter(&self) -> Result<TextSplitter> {
        Ok(TextSplitter::new(self.splitter.clone())?)
    }
}

/// Rebuild the index from every document under `docs_path`, replacing any previous index.
///
/// Callers holding a loaded store (see `KnowledgeBase`) must invalidate it afterwards.
pub async fn ingest_documents(
    config: &IngestConfig,
    provider: Arc<dyn EmbeddingProvider>,
) -> Result<(VectorStore, IngestStats)> {
    let start = Instant::now();
    let docs_path = &config.docs_path;
    if !docs_path.is_dir() {
        return Err(IndexerError::MissingCorpus(docs_path.clone()));
    }

    let splitter = config.splitter()?;
    let mut stats = IngestStats::new();

    log::info!("Loading documents from {}", docs_path.display());
    let files = DocumentScanner::new(docs_path)
        .with_extensions(&config.extensions)
        .scan();

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        match load_document(&path).await {
            Ok(doc) => {
                stats.add_document();
                documents.push(doc);
            }
            Err(err) => {
                log::warn!("Skipping {}: {err}", path.display());
                stats.add_error(format!("{}: {err}", path.display()));
            }
        }
    }

    if documents.is_empty() {
        return Err(IndexerError::EmptyCorpus(docs_path.clone()));
    }

    let chunks = splitter.split_documents(&documents);
    stats.add_chunks(chunks.len());
    log::info!("Split {} documents into {} chunks", documents.len(), chunks.len());

    let _lock = acquire_index_write_lock(&config.index_path).await?;
    let store = VectorStore::from_documents(chunks, provider).await?;
    store.save_local(&config.index_path).await?;

    stats.index_size = store.len();
    stats.time_ms = start.elapsed().as_millis() as u64;
    log::info!(
        "Indexed {} chunks into {} in {} ms",
        store.len(),
        config.index_path.display(),
        stats.time_ms
    );
    Ok((store, stats))
}

async fn load_document(path: &Path) -> std::io::Result<Document> {
    let content = tokio::fs::read_to_string(path).await?;
    let mut doc = Document::new(content).with_source(path.display().to_string());
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        doc = doc.with_meta("filename", name);
    }
    Ok(doc)
}
