use serde::{Deserialize, Serialize};

/// Configuration for recursive character splitting.
///
/// Sizes are measured in characters (Unicode scalar values), not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Maximum characters per chunk (soft limit: an overlap seed may push a chunk past it)
    pub chunk_size: usize,

    /// Trailing characters of a chunk carried into the next one
    pub chunk_overlap: usize,

    /// Boundaries tried from coarsest to finest. `""` splits by raw character count.
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: default_separators(),
        }
    }
}

impl SplitterConfig {
    /// Config with the given size and overlap and the default separator ladder
    #[must_use]
    pub fn with_size(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }

        Ok(())
    }
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", " ", ""]
        .into_iter()
        .map(str::to_string)
        .collect()
}
