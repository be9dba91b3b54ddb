use crate::error::{IndexerError, Result};
use crate::index_lock::acquire_index_write_lock;
use crate::ingest::IngestConfig;
use archrag_chunker::Document;
use archrag_vector_store::{has_index_files, EmbeddingProvider, VectorStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One page fetched from a Confluence space, body already converted to plain text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfluencePage {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default = "default_version")]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

const fn default_version() -> u64 {
    1
}

impl ConfluencePage {
    fn into_document(self) -> Document {
        Document::new(self.content)
            .with_source(format!("confluence:{}", self.title))
            .with_meta("title", self.title)
            .with_meta("confluence_id", self.id)
            .with_meta("version", self.version)
    }
}

/// Where Confluence pages come from.
///
/// `labels` are conjunctive: a page must carry every requested label.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_pages(&self, space_key: &str, labels: &[String]) -> Result<Vec<ConfluencePage>>;
}

/// Pages read from a JSON export (an array of [`ConfluencePage`] objects)
pub struct JsonExportSource {
    path: PathBuf,
}

impl JsonExportSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl PageSource for JsonExportSource {
    async fn fetch_pages(&self, space_key: &str, labels: &[String]) -> Result<Vec<ConfluencePage>> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            IndexerError::PageSource(format!("read {}: {e}", self.path.display()))
        })?;
        let pages: Vec<ConfluencePage> = serde_json::from_slice(&raw).map_err(|e| {
            IndexerError::PageSource(format!("parse {}: {e}", self.path.display()))
        })?;

        Ok(pages
            .into_iter()
            .filter(|page| page.space_key.as_deref().map_or(true, |s| s == space_key))
            .filter(|page| labels.iter().all(|label| page.labels.contains(label)))
            .collect())
    }
}

/// Result of a Confluence sync, reported to the user rather than raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
    pub page_count: usize,
}

impl SyncOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            page_count: 0,
        }
    }
}

/// Fetch pages from `source` and index them.
///
/// With `merge_with_existing` and an index already on disk, the pages are appended to it.
/// If the index directory holds anything that does not load as an index, the sync fails and
/// leaves the directory untouched. Without `merge_with_existing` the index is replaced. Never returns an error: failures are reported in the outcome.
pub async fn ingest_from_confluence(
    config: &IngestConfig,
    provider: Arc<dyn EmbeddingProvider>,
    source: &dyn PageSource,
    space_key: &str,
    labels: &[String],
    merge_with_existing: bool,
) -> SyncOutcome {
    let pages = match source.fetch_pages(space_key, labels).await {
        Ok(pages) => pages,
        Err(err) => {
            log::error!("Confluence fetch failed: {err}");
            return SyncOutcome::failure(format!("Failed to fetch Confluence pages: {err}"));
        }
    };
    if pages.is_empty() {
        return SyncOutcome::failure("No pages found matching the criteria");
    }
    log::info!("Fetched {} pages from space {space_key}", pages.len());

    let page_count = pages.len();
    match index_pages(config, provider, pages, merge_with_existing).await {
        Ok(chunks) => SyncOutcome {
            success: true,
            message: format!("Synced {page_count} pages ({chunks} chunks) from Confluence"),
            page_count,
        },
        Err(err) => {
            log::error!("Confluence sync failed: {err}");
            SyncOutcome::failure(format!("Sync failed: {err}"))
        }
    }
}

async fn index_pages(
    config: &IngestConfig,
    provider: Arc<dyn EmbeddingProvider>,
    pages: Vec<ConfluencePage>,
    merge_with_existing: bool,
) -> Result<usize> {
    let documents: Vec<Document> = pages.into_iter().map(ConfluencePage::into_document).collect();
    let chunks = config.splitter()?.split_documents(&documents);
    if chunks.iter().all(|c| c.is_blank()) {
        return Err(IndexerError::Other("fetched pages contain no text".to_string()));
    }
    let chunk_count = chunks.len();

    let index_path = &config.index_path;
    let _lock = acquire_index_write_lock(index_path).await?;

    // Anything already in the directory must load before a merge may rewrite it.
    let store = if merge_with_existing && holds_existing_data(index_path).await? {
        let mut existing = VectorStore::load_local(index_path, provider.clone())
            .await
            .map_err(|source| IndexerError::UnreadableIndex {
                path: index_path.clone(),
                source,
            })?;
        let slots = existing.add_documents(chunks).await?;
        log::info!("Merged {} chunks into existing index", slots.len());
        existing
    } else {
        VectorStore::from_documents(chunks, provider).await?
    };

    store.save_local(index_path).await?;
    Ok(chunk_count)
}

async fn holds_existing_data(dir: &Path) -> Result<bool> {
    if has_index_files(dir) {
        return Ok(true);
    }
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => Ok(entries.next_entry().await?.is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(id: &str, title: &str, labels: &[&str]) -> ConfluencePage {
        ConfluencePage {
            id: id.to_string(),
            title: title.to_string(),
            content: format!("{title} body"),
            version: 3,
            space_key: Some("ARCH".to_string()),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
        }
    }

    #[test]
    fn page_metadata() {
        let doc = page("42", "ADR-9 Caching", &[]).into_document();
        let get = |key: &str| doc.metadata.get(key).cloned();
        assert_eq!(get("source"), Some(serde_json::json!("confluence:ADR-9 Caching")));
        assert_eq!(get("title"), Some(serde_json::json!("ADR-9 Caching")));
        assert_eq!(get("confluence_id"), Some(serde_json::json!("42")));
        assert_eq!(get("version"), Some(serde_json::json!(3)));
    }

    #[tokio::test]
    async fn json_export_filters_space_and_labels() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("pages.json");
        let mut other_space = page("3", "Elsewhere", &["adr"]);
        other_space.space_key = Some("OPS".to_string());
        let pages = vec![
            page("1", "Both", &["adr", "approved"]),
            page("2", "One", &["adr"]),
            other_space,
        ];
        std::fs::write(&path, serde_json::to_vec(&pages).unwrap()).unwrap();

        let source = JsonExportSource::new(&path);
        let all = source.fetch_pages("ARCH", &[]).await.unwrap();
        assert_eq!(all.len(), 2);

        let labelled = source
            .fetch_pages("ARCH", &["adr".to_string(), "approved".to_string()])
            .await
            .unwrap();
        assert_eq!(labelled.len(), 1);
        assert_eq!(labelled[0].title, "Both");
    }

    #[test]
    fn version_defaults_to_one() {
        let page: ConfluencePage =
            serde_json::from_str(r#"{"id":"1","title":"T","content":"c"}"#).unwrap();
        assert_eq!(page.version, 1);
        assert!(page.labels.is_empty());
    }
}
