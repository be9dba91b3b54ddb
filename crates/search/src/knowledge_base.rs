use crate::error::Result;
use archrag_vector_store::{EmbeddingProvider, VectorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Owns the on-disk index location and a lazily loaded copy of it.
///
/// The first query loads the index; later queries share the same `Arc<VectorStore>`.
/// Ingestion replaces the files on disk and must call [`KnowledgeBase::invalidate`] so the
/// next query reloads.
pub struct KnowledgeBase {
    index_path: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    loaded: RwLock<Option<Arc<VectorStore>>>,
}

impl KnowledgeBase {
    pub fn new(index_path: impl AsRef<Path>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            index_path: index_path.as_ref().to_path_buf(),
            provider,
            loaded: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    #[must_use]
    pub fn provider(&self) -> Arc<dyn EmbeddingProvider> {
        self.provider.clone()
    }

    /// The loaded store, reading it from disk on first use
    pub async fn store(&self) -> Result<Arc<VectorStore>> {
        if let Some(store) = self.loaded.read().await.as_ref() {
            return Ok(store.clone());
        }

        let mut slot = self.loaded.write().await;
        if let Some(store) = slot.as_ref() {
            return Ok(store.clone());
        }

        log::debug!("Loading index from {}", self.index_path.display());
        let store = Arc::new(VectorStore::load_local(&self.index_path, self.provider.clone()).await?);
        *slot = Some(store.clone());
        Ok(store)
    }

    /// Drop the cached store; the next [`KnowledgeBase::store`] call reloads from disk
    pub async fn invalidate(&self) {
        if self.loaded.write().await.take().is_some() {
            log::info!("Knowledge base cache invalidated");
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.loaded.read().await.is_some()
    }
}
