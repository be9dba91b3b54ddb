use archrag_indexer::{IngestStats, SyncOutcome};
use archrag_search::{Confidence, RetrievedSource};
use archrag_vector_store::{LoadReport, VectorStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

const PREVIEW_CHARS: usize = 160;

/// Summary of a saved index, printed by `archrag stats`
#[derive(Debug, Serialize)]
pub struct IndexSummary {
    pub path: String,
    pub generation: String,
    pub vectors: usize,
    pub dimension: Option<usize>,
    pub embedding: Option<String>,
    pub legacy_warnings: usize,
    pub sources: BTreeMap<String, usize>,
}

impl IndexSummary {
    pub fn new(path: &Path, store: &VectorStore, report: &LoadReport) -> Self {
        let mut sources = BTreeMap::new();
        for (_, chunk) in store.docstore().iter() {
            let source = chunk.source().unwrap_or("unknown").to_string();
            *sources.entry(source).or_insert(0) += 1;
        }

        Self {
            path: path.display().to_string(),
            generation: report.generation.to_string(),
            vectors: store.len(),
            dimension: store.dimension(),
            embedding: report.saved_with.as_ref().map(ToString::to_string),
            legacy_warnings: report.warnings.len(),
            sources,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Index:      {} ({} format)", self.path, self.generation);
        let _ = writeln!(out, "Vectors:    {}", self.vectors);
        let dimension = self
            .dimension
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        let _ = writeln!(out, "Dimension:  {dimension}");
        if let Some(embedding) = &self.embedding {
            let _ = writeln!(out, "Embedding:  {embedding}");
        }
        if self.legacy_warnings > 0 {
            let _ = writeln!(out, "Recovered:  {} unreadable legacy records", self.legacy_warnings);
        }
        let _ = writeln!(out, "Sources:    {}", self.sources.len());
        for (source, chunks) in &self.sources {
            let _ = writeln!(out, "  {chunks:>4}  {source}");
        }
        out
    }
}

pub fn render_ingest(index_path: &Path, stats: &IngestStats) -> String {
    let mut out = format!(
        "Indexed {} documents into {} chunks at {} ({} ms)\n",
        stats.documents,
        stats.chunks,
        index_path.display(),
        stats.time_ms
    );
    for error in &stats.errors {
        let _ = writeln!(out, "  skipped {error}");
    }
    out
}

pub fn render_sync(outcome: &SyncOutcome) -> String {
    let marker = if outcome.success { "ok" } else { "failed" };
    format!("[{marker}] {}\n", outcome.message)
}

pub fn render_sources(sources: &[RetrievedSource]) -> String {
    if sources.is_empty() {
        return "No results. Has the index been built? Run `archrag ingest`.\n".to_string();
    }

    let mut out = String::new();
    for (rank, source) in sources.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. [{}] {:.3}  {}",
            rank + 1,
            confidence_label(source.confidence),
            source.distance,
            source.source
        );
        let _ = writeln!(out, "   {}", preview(&source.content));
    }
    out
}

const fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "high",
        Confidence::Medium => "med ",
        Confidence::Low => "low ",
    }
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}
