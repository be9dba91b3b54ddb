use crate::docstore::DocumentStore;
use crate::embeddings::{EmbeddingFingerprint, EmbeddingProvider};
use crate::error::{Result, VectorStoreError};
use crate::flat_index::FlatL2Index;
use crate::legacy::{self, DocstoreEncoding, LegacyDecodeWarning};
use crate::persist::{self, IndexGeneration, DOCSTORE_FILE, LEGACY_INDEX_FILE, VECTORS_FILE};
use archrag_chunker::Chunk;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

/// What `load_local_with_report` found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub generation: IndexGeneration,
    /// Fingerprint recorded at save time (current generation only)
    pub saved_with: Option<EmbeddingFingerprint>,
    /// Legacy records replaced by empty chunks
    pub warnings: Vec<LegacyDecodeWarning>,
}

/// Embedding index plus the chunks behind each slot.
///
/// Slot `i` of the index always has a chunk at key `i` in the docstore.
pub struct VectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    index: FlatL2Index,
    docstore: DocumentStore,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("embedder", &self.embedder.fingerprint())
            .field("dimension", &self.index.dimension())
            .field("len", &self.index.len())
            .finish()
    }
}

impl VectorStore {
    /// An empty store; the dimension is fixed by the first batch added
    #[must_use]
    pub fn empty(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            index: FlatL2Index::new(),
            docstore: DocumentStore::new(),
        }
    }

    /// Embed every chunk in one batch and build a fresh store
    pub async fn from_documents(
        chunks: Vec<Chunk>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let mut store = Self::empty(embedder);
        store.add_documents(chunks).await?;
        log::info!(
            "Built vector store with {} chunks (dimension {:?})",
            store.len(),
            store.dimension()
        );
        Ok(store)
    }

    /// Embed and append chunks, returning the slots they now occupy.
    ///
    /// Existing vectors are never re-embedded. On any failure the store is unchanged.
    pub async fn add_documents(&mut self, chunks: Vec<Chunk>) -> Result<Range<usize>> {
        let before = chunks.len();
        let chunks: Vec<Chunk> = chunks.into_iter().filter(|c| !c.is_blank()).collect();
        if chunks.len() < before {
            log::debug!("Dropped {} blank chunks", before - chunks.len());
        }

        let start = self.len();
        if chunks.is_empty() {
            return Ok(start..start);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(VectorStoreError::embedding(format!(
                "Provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let slots = self.index.add(&vectors)?;
        for (slot, chunk) in slots.clone().zip(chunks) {
            self.docstore.insert(slot, chunk);
        }
        log::debug!("Added slots {slots:?}");
        Ok(slots)
    }

    /// The `k` chunks nearest to `query`, nearest first
    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        Ok(self
            .similarity_search_with_score(query, k)
            .await?
            .into_iter()
            .map(|(chunk, _)| chunk)
            .collect())
    }

    /// Like [`VectorStore::similarity_search`] with the squared L2 distance of each hit
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Chunk, f32)>> {
        if self.is_empty() {
            return Err(VectorStoreError::EmptyIndex);
        }
        let vector = self.embedder.embed_query(query).await?;
        self.search_by_vector(&vector, k)
    }

    pub fn search_by_vector(&self, vector: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>> {
        let hits = self.index.search(vector, k)?;
        let mut results = Vec::with_capacity(hits.len());
        for (slot, distance) in hits {
            match self.docstore.get(slot) {
                Some(chunk) => results.push((chunk.clone(), distance)),
                None => log::warn!("Slot {slot} has no document; skipping"),
            }
        }
        Ok(results)
    }

    /// Persist to `dir`, replacing whatever index was there
    pub async fn save_local(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let vectors = persist::encode_vectors(&self.index);
        let docstore =
            persist::encode_docstore(&self.docstore, &self.index, self.embedder.fingerprint())?;
        persist::write_index_dir(dir, &[(VECTORS_FILE, vectors), (DOCSTORE_FILE, docstore)])
            .await?;
        log::info!("Saved {} vectors to {}", self.len(), dir.display());
        Ok(())
    }

    /// Load a saved index of either generation
    pub async fn load_local(
        dir: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let (store, _) = Self::load_local_with_report(dir, embedder).await?;
        Ok(store)
    }

    pub async fn load_local_with_report(
        dir: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<(Self, LoadReport)> {
        let dir = dir.as_ref();
        let generation = persist::detect_generation(dir)?;

        let (index, docstore, report) = match generation {
            IndexGeneration::Current => {
                let vectors = tokio::fs::read(dir.join(VECTORS_FILE)).await?;
                let docstore_bytes = tokio::fs::read(dir.join(DOCSTORE_FILE)).await?;
                let index = persist::decode_vectors(&vectors)?;
                let (docstore, record) = persist::decode_docstore(&docstore_bytes, &index)?;
                let saved_with = record.map(|r| r.fingerprint());
                if let Some(saved) = &saved_with {
                    let active = embedder.fingerprint();
                    if *saved != active {
                        log::warn!(
                            "Index at {} was built with {saved} but queries will use {active}; \
                             results may be meaningless",
                            dir.display()
                        );
                    }
                }
                let report = LoadReport {
                    generation,
                    saved_with,
                    warnings: Vec::new(),
                };
                (index, docstore, report)
            }
            IndexGeneration::Legacy => {
                let encoding = DocstoreEncoding::locate(dir).ok_or_else(|| {
                    VectorStoreError::MissingIndexFiles {
                        path: dir.to_path_buf(),
                        missing: persist::LEGACY_DOCSTORE_FILE.to_string(),
                    }
                })?;
                let index_bytes = tokio::fs::read(dir.join(LEGACY_INDEX_FILE)).await?;
                let docstore_bytes = tokio::fs::read(dir.join(encoding.file_name())).await?;
                let legacy = legacy::decode(&index_bytes, &docstore_bytes, encoding)?;
                let report = LoadReport {
                    generation,
                    saved_with: None,
                    warnings: legacy.warnings,
                };
                (legacy.index, legacy.docstore, report)
            }
        };

        log::info!(
            "Loaded {} index from {} ({} vectors)",
            generation,
            dir.display(),
            index.len()
        );

        Ok((
            Self {
                embedder,
                index,
                docstore,
            },
            report,
        ))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub const fn dimension(&self) -> Option<usize> {
        self.index.dimension()
    }

    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&Chunk> {
        self.docstore.get(slot)
    }

    #[must_use]
    pub const fn docstore(&self) -> &DocumentStore {
        &self.docstore
    }

    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }
}
