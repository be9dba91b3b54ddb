use crate::{IndexerError, Result};
use fs2::FileExt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Exclusive advisory lock held for the duration of an index write
pub(crate) struct IndexWriteLock {
    file: std::fs::File,
    path: PathBuf,
}

impl Drop for IndexWriteLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            log::debug!("release index lock {}: {err}", self.path.display());
        }
    }
}

/// `<index_dir>.lock`, next to the index rather than inside it, since saves swap the directory
pub(crate) fn lock_path_for_index(index_dir: &Path) -> PathBuf {
    let mut name = index_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "index".into());
    name.push(".lock");
    index_dir.with_file_name(name)
}

pub(crate) async fn acquire_index_write_lock(index_dir: &Path) -> Result<IndexWriteLock> {
    let path = lock_path_for_index(index_dir);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let lock = tokio::task::spawn_blocking(move || -> Result<IndexWriteLock> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                IndexerError::Other(format!("open index lock {}: {err}", path.display()))
            })?;

        let start = Instant::now();
        file.lock_exclusive().map_err(|err| {
            IndexerError::Other(format!("acquire index lock {}: {err}", path.display()))
        })?;
        let waited = start.elapsed();
        if waited.as_millis() > 100 {
            log::info!("Waited {waited:?} for index lock {}", path.display());
        }

        Ok(IndexWriteLock { file, path })
    })
    .await
    .map_err(|err| IndexerError::Other(format!("join index lock task: {err}")))??;

    Ok(lock)
}
