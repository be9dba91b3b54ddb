use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form provenance attached to documents and chunks (source path, title, page id, ...)
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Metadata key every ingested chunk carries
pub const SOURCE_KEY: &str = "source";

/// A whole source document before splitting
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Full document text
    pub content: String,

    /// Provenance copied onto every chunk cut from this document
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with empty metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Builder: set a metadata entry
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Builder: set the `source` entry
    #[must_use]
    pub fn with_source(self, source: impl Into<String>) -> Self {
        self.with_meta(SOURCE_KEY, source.into())
    }
}

/// An immutable unit of retrievable text
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The chunk's text
    pub content: String,

    /// Provenance inherited from the source document
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    /// Create a chunk
    #[must_use]
    pub const fn new(content: String, metadata: Metadata) -> Self {
        Self { content, metadata }
    }

    /// Builder: set a metadata entry
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata entry, if it is a string
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(serde_json::Value::as_str)
    }

    /// Number of characters in the content
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Whether the chunk carries no indexable text
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

impl From<Document> for Chunk {
    fn from(doc: Document) -> Self {
        Self {
            content: doc.content,
            metadata: doc.metadata,
        }
    }
}
