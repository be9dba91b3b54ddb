use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Default set of document extensions to ingest
pub const DEFAULT_EXTENSIONS: &[&str] = &["md"];

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

const IGNORED_SCOPES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    "node_modules",
    "target",
    ".venv",
    "__pycache__",
    "faiss_index",
];

/// Scanner for finding documents under a docs folder
pub struct DocumentScanner {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DocumentScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
        }
    }

    /// Replace the accepted extensions (matched case-insensitively, without the dot)
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Scan for documents (ignore-file aware), sorted by path
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true);
        builder.filter_entry(move |entry| !Self::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if !self.has_accepted_extension(path) {
                        continue;
                    }

                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > MAX_FILE_SIZE_BYTES {
                            log::warn!(
                                "Skipping large document {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                MAX_FILE_SIZE_BYTES
                            );
                            continue;
                        }
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} documents in {}", files.len(), self.root.display());
        files
    }

    fn has_accepted_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|candidate| candidate == &ext)
            })
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    let lowered = name.to_string_lossy().to_lowercase();
                    if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentScanner;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_markdown_sorted() {
        let temp = tempdir().unwrap();
        let adr = temp.path().join("adr");
        fs::create_dir_all(&adr).unwrap();
        fs::write(adr.join("002-events.md"), b"# ADR 2").unwrap();
        fs::write(adr.join("001-postgres.MD"), b"# ADR 1").unwrap();
        fs::write(temp.path().join("policy.md"), b"# Policy").unwrap();
        fs::write(temp.path().join("diagram.png"), b"\x89PNG").unwrap();

        let files = DocumentScanner::new(temp.path()).scan();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(temp.path()).unwrap().display().to_string())
            .collect();

        assert_eq!(
            names,
            vec![
                "adr/001-postgres.MD".to_string(),
                "adr/002-events.md".to_string(),
                "policy.md".to_string(),
            ]
        );
    }

    #[test]
    fn skips_ignored_directories_and_large_files() {
        let temp = tempdir().unwrap();
        let modules = temp.path().join("node_modules").join("pkg");
        fs::create_dir_all(&modules).unwrap();
        fs::write(modules.join("README.md"), b"# vendored").unwrap();
        fs::write(temp.path().join("huge.md"), vec![b'a'; 1_048_577]).unwrap();
        fs::write(temp.path().join("ok.md"), b"# fine").unwrap();

        let files = DocumentScanner::new(temp.path()).scan();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("ok.md"));
    }

    #[test]
    fn custom_extensions() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.md"), b"a").unwrap();
        fs::write(temp.path().join("b.txt"), b"b").unwrap();
        fs::write(temp.path().join("c.rst"), b"c").unwrap();

        let files = DocumentScanner::new(temp.path())
            .with_extensions([".txt", "RST"])
            .scan();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| !p.ends_with("a.md")));
    }
}
