use anyhow::{bail, Context, Result};
use archrag_chunker::SplitterConfig;
use archrag_indexer::{IngestConfig, DEFAULT_DOCS_PATH, DEFAULT_EXTENSIONS, DEFAULT_INDEX_PATH};
use archrag_search::{ConfidenceThresholds, KeywordReranker, RetrieverConfig, DEFAULT_KEYWORDS};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "archrag.toml";

/// Application settings: TOML file, then environment, then command-line flags
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub docs_path: PathBuf,
    pub index_path: PathBuf,
    pub extensions: Vec<String>,
    pub chunking: SplitterConfig,
    pub reranking_keywords: Vec<String>,
    pub confidence: ConfidenceThresholds,
    pub default_k: usize,
    pub listing_k: usize,
    /// ADR identifiers an audit must surface first, e.g. `["ADR-001", "ADR-007"]`
    pub priority_adrs: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            docs_path: PathBuf::from(DEFAULT_DOCS_PATH),
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            chunking: SplitterConfig::default(),
            reranking_keywords: DEFAULT_KEYWORDS.iter().map(|k| (*k).to_string()).collect(),
            confidence: ConfidenceThresholds::default(),
            default_k: 6,
            listing_k: 10,
            priority_adrs: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load `path` (must exist) or, without one, `archrag.toml` if present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !required && !path.is_file() {
            log::debug!("No {DEFAULT_CONFIG_FILE}; using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `DOCS_PATH`, `INDEX_PATH`, `RERANKING_KEYWORDS` and `PRIORITY_ADRS` overrides
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(docs) = lookup("DOCS_PATH").filter(|v| !v.trim().is_empty()) {
            self.docs_path = PathBuf::from(docs);
        }
        if let Some(index) = lookup("INDEX_PATH").filter(|v| !v.trim().is_empty()) {
            self.index_path = PathBuf::from(index);
        }
        if let Some(keywords) = lookup("RERANKING_KEYWORDS") {
            self.reranking_keywords = KeywordReranker::from_csv(&keywords).keywords().to_vec();
        }
        if let Some(adrs) = lookup("PRIORITY_ADRS") {
            self.priority_adrs = adrs
                .split(',')
                .map(str::trim)
                .filter(|adr| !adr.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Err(msg) = self.chunking.validate() {
            bail!("chunking: {msg}");
        }
        if let Err(msg) = self.confidence.validate() {
            bail!("confidence: {msg}");
        }
        if self.default_k == 0 || self.listing_k == 0 {
            bail!("default_k and listing_k must be > 0");
        }
        if self.extensions.is_empty() {
            bail!("extensions must not be empty");
        }
        Ok(())
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            docs_path: self.docs_path.clone(),
            index_path: self.index_path.clone(),
            extensions: self.extensions.clone(),
            splitter: self.chunking.clone(),
        }
    }

    pub fn retriever_config(&self) -> RetrieverConfig {
        RetrieverConfig {
            reranker: KeywordReranker::new(&self.reranking_keywords),
            thresholds: self.confidence,
            default_k: self.default_k,
            listing_k: self.listing_k,
            priority_adrs: self.priority_adrs.clone(),
            ..RetrieverConfig::default()
        }
    }
}
