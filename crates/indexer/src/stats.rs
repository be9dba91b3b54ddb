use serde::{Deserialize, Serialize};

/// Statistics about one ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestStats {
    /// Documents loaded (files or pages)
    pub documents: usize,

    /// Chunks embedded into the index
    pub chunks: usize,

    /// Vectors in the saved index (includes merged-in existing vectors)
    pub index_size: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Per-document failures that were skipped
    pub errors: Vec<String>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self) {
        self.documents += 1;
    }

    pub fn add_chunks(&mut self, count: usize) {
        self.chunks += count;
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}
