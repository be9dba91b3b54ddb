use crate::confidence::{Confidence, ConfidenceThresholds};
use crate::error::{Result, SearchError};
use crate::knowledge_base::KnowledgeBase;
use crate::rerank::KeywordReranker;
use archrag_chunker::Chunk;
use archrag_vector_store::VectorStoreError;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

const LISTING_WORDS: &[&str] = &["list", "all", "show", "enumerate"];

/// Retrieval knobs
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub reranker: KeywordReranker,
    pub thresholds: ConfidenceThresholds,
    /// Chunks fetched for ordinary questions
    pub default_k: usize,
    /// Chunks fetched for listing questions ("list all standards", ...)
    pub listing_k: usize,
    /// ADR identifiers whose chunks lead an audit context, matched case-sensitively
    pub priority_adrs: Vec<String>,
    /// Chunks fetched for a design audit
    pub audit_k: usize,
    /// Non-priority chunks kept in an audit context
    pub audit_standards_limit: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            reranker: KeywordReranker::default(),
            thresholds: ConfidenceThresholds::default(),
            default_k: 6,
            listing_k: 10,
            priority_adrs: Vec::new(),
            audit_k: 15,
            audit_standards_limit: 10,
        }
    }
}

/// One chunk handed to the answering model, with provenance for citation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedSource {
    pub source: String,
    pub filename: String,
    pub content: String,
    pub distance: f32,
    pub confidence: Confidence,
}

pub struct Retriever {
    knowledge_base: Arc<KnowledgeBase>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(knowledge_base: Arc<KnowledgeBase>, config: RetrieverConfig) -> Self {
        Self {
            knowledge_base,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// How many chunks to fetch for this question
    pub fn select_k(&self, question: &str) -> usize {
        // Whole words only: "install" or "shown" are not listing questions, unlike a plain
        // substring test which would match them.
        let lowered = question.to_lowercase();
        let listing = lowered
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| LISTING_WORDS.contains(&word));
        if listing {
            self.config.listing_k
        } else {
            self.config.default_k
        }
    }

    /// Retrieve, rerank and annotate the chunks relevant to `question`.
    ///
    /// An empty index yields no sources rather than an error.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedSource>> {
        self.retrieve_k(question, self.select_k(question)).await
    }

    /// Like [`Retriever::retrieve`] with an explicit `k`
    pub async fn retrieve_k(&self, question: &str, k: usize) -> Result<Vec<RetrievedSource>> {
        let question = question.trim();
        let hits = self.search(question, k).await?;

        let hits = self
            .config
            .reranker
            .rerank(question, hits, |(chunk, _)| chunk.content.as_str());

        Ok(hits
            .into_iter()
            .map(|(chunk, distance)| self.annotate(chunk, distance))
            .collect())
    }

    /// Standards and ADRs to audit a solution design against.
    ///
    /// Fetches `audit_k` chunks by similarity to the whole design. Chunks whose content or
    /// source mentions a priority ADR come first, in similarity order, followed by at most
    /// `audit_standards_limit` of the others. No keyword rerank is applied.
    pub async fn retrieve_for_audit(&self, design_text: &str) -> Result<Vec<RetrievedSource>> {
        let design_text = design_text.trim();
        let hits = self.search(design_text, self.config.audit_k).await?;

        let (priority, standards): (Vec<_>, Vec<_>) = hits
            .into_iter()
            .partition(|(chunk, _)| self.mentions_priority_adr(chunk));
        log::debug!(
            "Audit context: {} priority ADR chunks, {} other standards",
            priority.len(),
            standards.len()
        );

        Ok(priority
            .into_iter()
            .chain(standards.into_iter().take(self.config.audit_standards_limit))
            .map(|(chunk, distance)| self.annotate(chunk, distance))
            .collect())
    }

    fn mentions_priority_adr(&self, chunk: &Chunk) -> bool {
        let source = chunk.source().unwrap_or_default();
        self.config
            .priority_adrs
            .iter()
            .any(|adr| chunk.content.contains(adr.as_str()) || source.contains(adr.as_str()))
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<(Chunk, f32)>> {
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let store = self.knowledge_base.store().await?;
        match store.similarity_search_with_score(query, k).await {
            Ok(hits) => {
                log::debug!("Retrieved {} chunks for {query:?} (k={k})", hits.len());
                Ok(hits)
            }
            Err(VectorStoreError::EmptyIndex) => {
                log::info!("Index is empty; no sources for {query:?}");
                Ok(Vec::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn annotate(&self, chunk: Chunk, distance: f32) -> RetrievedSource {
        let source = chunk.source().unwrap_or("unknown").to_string();
        let filename = Path::new(&source)
            .file_name()
            .map_or_else(|| source.clone(), |n| n.to_string_lossy().into_owned());
        RetrievedSource {
            confidence: self.config.thresholds.classify(distance),
            source,
            filename,
            content: chunk.content,
            distance,
        }
    }
}

/// Join retrieved contents with blank lines, in retrieval order, for prompt assembly
pub fn build_context(sources: &[RetrievedSource]) -> String {
    sources
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
