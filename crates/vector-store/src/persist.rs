//! On-disk layout of a saved index directory.
//!
//! ```text
//! <index_dir>/
//!   vectors.bin     "AFV1" | u32 dimension | u64 count | count*dimension f32 | u32 crc32
//!   docstore.json   { schema_version, vector_count, embedding, docstore, index_to_docstore_id }
//! ```
//!
//! All integers and floats are little-endian. The checksum covers every byte before it.

use crate::docstore::DocumentStore;
use crate::embeddings::EmbeddingFingerprint;
use crate::error::{Result, VectorStoreError};
use crate::flat_index::FlatL2Index;
use archrag_chunker::Chunk;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const DOCSTORE_FILE: &str = "docstore.json";
pub const LEGACY_INDEX_FILE: &str = "index.faiss";
pub const LEGACY_DOCSTORE_FILE: &str = "index.pkl";
pub const LEGACY_JSON_DOCSTORE_FILE: &str = "index.json";

pub const DOCSTORE_SCHEMA_VERSION: u32 = 2;

const VECTORS_MAGIC: &[u8; 4] = b"AFV1";
const VECTORS_HEADER_LEN: usize = 4 + 4 + 8;

/// Which generation of files an index directory holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexGeneration {
    /// `vectors.bin` + `docstore.json`
    Current,
    /// `index.faiss` + `index.pkl` (or its `index.json` export) written by the previous tooling
    Legacy,
}

impl std::fmt::Display for IndexGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

/// Inspect `dir` and decide which loader applies.
///
/// A half-written pair of either generation is reported as missing files rather than
/// silently falling through to the other generation.
pub fn detect_generation(dir: &Path) -> Result<IndexGeneration> {
    let pair = |vectors: &str, docstore: &str| {
        (dir.join(vectors).is_file(), dir.join(docstore).is_file())
    };

    match pair(VECTORS_FILE, DOCSTORE_FILE) {
        (true, true) => return Ok(IndexGeneration::Current),
        (true, false) => return Err(missing(dir, DOCSTORE_FILE)),
        (false, true) => return Err(missing(dir, VECTORS_FILE)),
        (false, false) => {}
    }

    let legacy_docstore = [LEGACY_DOCSTORE_FILE, LEGACY_JSON_DOCSTORE_FILE]
        .iter()
        .any(|file| dir.join(file).is_file());
    match (dir.join(LEGACY_INDEX_FILE).is_file(), legacy_docstore) {
        (true, true) => Ok(IndexGeneration::Legacy),
        (true, false) => Err(missing(dir, LEGACY_DOCSTORE_FILE)),
        (false, true) => Err(missing(dir, LEGACY_INDEX_FILE)),
        (false, false) => Err(missing(dir, &format!("{VECTORS_FILE}, {DOCSTORE_FILE}"))),
    }
}

/// Whether `dir` holds any file of either generation, complete or not
#[must_use]
pub fn has_index_files(dir: &Path) -> bool {
    [
        VECTORS_FILE,
        DOCSTORE_FILE,
        LEGACY_INDEX_FILE,
        LEGACY_DOCSTORE_FILE,
        LEGACY_JSON_DOCSTORE_FILE,
    ]
    .iter()
    .any(|file| dir.join(file).exists())
}

/// Whether `dir` holds a complete index of either generation
#[must_use]
pub fn index_exists(dir: &Path) -> bool {
    detect_generation(dir).is_ok()
}

fn missing(dir: &Path, files: &str) -> VectorStoreError {
    VectorStoreError::MissingIndexFiles {
        path: dir.to_path_buf(),
        missing: files.to_string(),
    }
}

pub(crate) fn encode_vectors(index: &FlatL2Index) -> Vec<u8> {
    let data = index.as_slice();
    let mut bytes = Vec::with_capacity(VECTORS_HEADER_LEN + data.len() * 4 + 4);
    bytes.extend_from_slice(VECTORS_MAGIC);
    bytes.extend_from_slice(&(index.dimension().unwrap_or(0) as u32).to_le_bytes());
    bytes.extend_from_slice(&(index.len() as u64).to_le_bytes());
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    let crc = crc32fast::hash(&bytes);
    bytes.extend_from_slice(&crc.to_le_bytes());
    bytes
}

pub(crate) fn decode_vectors(bytes: &[u8]) -> Result<FlatL2Index> {
    if bytes.len() < VECTORS_HEADER_LEN + 4 {
        return Err(VectorStoreError::format(format!(
            "{VECTORS_FILE} is truncated ({} bytes)",
            bytes.len()
        )));
    }

    let (body, footer) = bytes.split_at(bytes.len() - 4);
    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(footer);
    let expected = u32::from_le_bytes(crc_bytes);
    let actual = crc32fast::hash(body);
    if expected != actual {
        return Err(VectorStoreError::format(format!(
            "{VECTORS_FILE} checksum mismatch (stored {expected:08x}, computed {actual:08x})"
        )));
    }

    let mut reader = ByteReader::new(body);
    if reader.take(4)? != VECTORS_MAGIC {
        return Err(VectorStoreError::format(format!("{VECTORS_FILE} has bad magic")));
    }
    let dimension = reader.u32()? as usize;
    let count = reader.u64()? as usize;
    let floats = count
        .checked_mul(dimension)
        .ok_or_else(|| VectorStoreError::format("Vector count overflows"))?;
    let data = reader.f32_vec(floats)?;
    if !reader.is_exhausted() {
        return Err(VectorStoreError::format(format!(
            "{VECTORS_FILE} has {} trailing bytes",
            reader.remaining()
        )));
    }

    FlatL2Index::from_raw(dimension, data)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct EmbeddingRecord {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub dimension: Option<usize>,
}

impl EmbeddingRecord {
    pub fn fingerprint(&self) -> EmbeddingFingerprint {
        EmbeddingFingerprint {
            provider: self.provider.clone(),
            model: self.model.clone(),
        }
    }
}

#[derive(Serialize)]
struct DocstoreFileRef<'a> {
    schema_version: u32,
    vector_count: usize,
    embedding: EmbeddingRecord,
    docstore: &'a DocumentStore,
    index_to_docstore_id: BTreeMap<usize, usize>,
}

#[derive(Deserialize)]
struct DocstoreFile {
    schema_version: u32,
    vector_count: usize,
    #[serde(default)]
    embedding: Option<EmbeddingRecord>,
    docstore: BTreeMap<usize, Chunk>,
    index_to_docstore_id: BTreeMap<usize, usize>,
}

pub(crate) fn encode_docstore(
    docstore: &DocumentStore,
    index: &FlatL2Index,
    fingerprint: EmbeddingFingerprint,
) -> Result<Vec<u8>> {
    let file = DocstoreFileRef {
        schema_version: DOCSTORE_SCHEMA_VERSION,
        vector_count: index.len(),
        embedding: EmbeddingRecord {
            provider: fingerprint.provider,
            model: fingerprint.model,
            dimension: index.dimension(),
        },
        docstore,
        index_to_docstore_id: docstore.iter().map(|(slot, _)| (slot, slot)).collect(),
    };
    Ok(serde_json::to_vec_pretty(&file)?)
}

/// Parse `docstore.json` and align it with the already-decoded vectors
pub(crate) fn decode_docstore(
    bytes: &[u8],
    index: &FlatL2Index,
) -> Result<(DocumentStore, Option<EmbeddingRecord>)> {
    let mut file: DocstoreFile = serde_json::from_slice(bytes)?;

    if file.schema_version != DOCSTORE_SCHEMA_VERSION {
        return Err(VectorStoreError::format(format!(
            "Unsupported {DOCSTORE_FILE} schema_version {} (expected {DOCSTORE_SCHEMA_VERSION})",
            file.schema_version
        )));
    }
    if file.vector_count != index.len() {
        return Err(VectorStoreError::format(format!(
            "{DOCSTORE_FILE} describes {} vectors but {VECTORS_FILE} holds {}",
            file.vector_count,
            index.len()
        )));
    }
    if let (Some(record), Some(dimension)) = (&file.embedding, index.dimension()) {
        if record.dimension.is_some_and(|d| d != dimension) {
            return Err(VectorStoreError::format(format!(
                "{DOCSTORE_FILE} records dimension {:?} but vectors have {dimension}",
                record.dimension
            )));
        }
    }

    let mut docstore = DocumentStore::new();
    for slot in 0..file.vector_count {
        let key = file.index_to_docstore_id.get(&slot).copied().unwrap_or(slot);
        let chunk = file.docstore.remove(&key).ok_or_else(|| {
            VectorStoreError::format(format!("{DOCSTORE_FILE} has no document for slot {slot}"))
        })?;
        docstore.insert(slot, chunk);
    }

    Ok((docstore, file.embedding))
}

/// Write both files into a staging directory next to `target`, then swap it into place.
///
/// Readers never observe a directory holding one new file and one old file. Replacing an
/// existing index takes two renames, and between them `target` briefly does not exist, so a
/// concurrent load in that window fails with missing index files rather than reading a mix.
pub(crate) async fn write_index_dir(target: &Path, files: &[(&str, Vec<u8>)]) -> Result<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            VectorStoreError::config(format!("Invalid index path {}", target.display()))
        })?;
    tokio::fs::create_dir_all(&parent).await?;

    let pid = std::process::id();
    let staging = parent.join(format!(".{name}.staging-{pid}"));
    let backup = parent.join(format!(".{name}.old-{pid}"));

    remove_dir_if_exists(&staging).await?;
    tokio::fs::create_dir_all(&staging).await?;
    for (file_name, bytes) in files {
        tokio::fs::write(staging.join(file_name), bytes).await?;
    }

    if tokio::fs::try_exists(target).await? {
        remove_dir_if_exists(&backup).await?;
        tokio::fs::rename(target, &backup).await?;
        if let Err(e) = tokio::fs::rename(&staging, target).await {
            tokio::fs::rename(&backup, target).await?;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::remove_dir_all(&backup).await {
            log::warn!("Failed to remove previous index {}: {e}", backup.display());
        }
    } else {
        tokio::fs::rename(&staging, target).await?;
    }

    Ok(())
}

async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Little-endian cursor over a byte slice
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                VectorStoreError::format(format!(
                    "Unexpected end of data at offset {} (wanted {n} bytes)",
                    self.pos
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    pub fn f32_vec(&mut self, count: usize) -> Result<Vec<f32>> {
        let len = count
            .checked_mul(4)
            .ok_or_else(|| VectorStoreError::format("Vector length overflows"))?;
        let raw = self.take(len)?;
        Ok(raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archrag_chunker::Metadata;
    use pretty_assertions::assert_eq;

    fn two_vectors() -> FlatL2Index {
        FlatL2Index::from_raw(3, vec![0.5, -1.0, 2.0, 0.0, 0.25, 8.0]).unwrap()
    }

    #[test]
    fn test_vectors_codec_is_bit_exact() {
        let index = two_vectors();
        let bytes = encode_vectors(&index);
        assert_eq!(&bytes[..4], b"AFV1");
        assert_eq!(bytes.len(), VECTORS_HEADER_LEN + 6 * 4 + 4);
        assert_eq!(decode_vectors(&bytes).unwrap(), index);
    }

    #[test]
    fn test_corrupt_vectors_rejected() {
        let mut bytes = encode_vectors(&two_vectors());
        bytes[VECTORS_HEADER_LEN + 1] ^= 0xff;
        let err = decode_vectors(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum"));

        let err = decode_vectors(&bytes[..10]).unwrap_err();
        assert!(matches!(err, VectorStoreError::IndexFormat(_)));
    }

    #[test]
    fn test_empty_index_encodes() {
        let bytes = encode_vectors(&FlatL2Index::new());
        assert!(decode_vectors(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_docstore_count_mismatch_rejected() {
        let index = two_vectors();
        let docstore: DocumentStore = [(0, Chunk::new("only one".to_string(), Metadata::new()))]
            .into_iter()
            .collect();
        let fingerprint = EmbeddingFingerprint {
            provider: "stub".to_string(),
            model: "stub-3".to_string(),
        };
        let bytes = encode_docstore(&docstore, &index, fingerprint).unwrap();
        let err = decode_docstore(&bytes, &index).unwrap_err();
        assert!(matches!(err, VectorStoreError::IndexFormat(_)));
    }

    #[test]
    fn test_detect_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();

        let err = detect_generation(path).unwrap_err();
        assert!(matches!(err, VectorStoreError::MissingIndexFiles { .. }));

        std::fs::write(path.join(LEGACY_INDEX_FILE), b"x").unwrap();
        match detect_generation(path).unwrap_err() {
            VectorStoreError::MissingIndexFiles { missing, .. } => {
                assert_eq!(missing, LEGACY_DOCSTORE_FILE);
            }
            other => panic!("unexpected error {other:?}"),
        }

        std::fs::write(path.join(LEGACY_JSON_DOCSTORE_FILE), b"{}").unwrap();
        assert_eq!(detect_generation(path).unwrap(), IndexGeneration::Legacy);
        std::fs::remove_file(path.join(LEGACY_JSON_DOCSTORE_FILE)).unwrap();
        std::fs::write(path.join(LEGACY_DOCSTORE_FILE), b"\x80\x04N.").unwrap();
        assert_eq!(detect_generation(path).unwrap(), IndexGeneration::Legacy);

        std::fs::write(path.join(VECTORS_FILE), b"x").unwrap();
        assert!(detect_generation(path).is_err());
        std::fs::write(path.join(DOCSTORE_FILE), b"{}").unwrap();
        assert_eq!(detect_generation(path).unwrap(), IndexGeneration::Current);
    }

    #[test]
    fn test_has_index_files_sees_partial_pairs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_index_files(dir.path()));

        std::fs::write(dir.path().join("README.md"), b"notes").unwrap();
        assert!(!has_index_files(dir.path()));

        std::fs::write(dir.path().join(LEGACY_DOCSTORE_FILE), b"junk").unwrap();
        assert!(has_index_files(dir.path()));
        assert!(!index_exists(dir.path()));
    }

    #[tokio::test]
    async fn test_write_index_dir_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("faiss_index");

        write_index_dir(&target, &[("a.txt", b"first".to_vec())]).await.unwrap();
        write_index_dir(&target, &[("b.txt", b"second".to_vec())]).await.unwrap();

        assert!(!target.join("a.txt").exists());
        assert_eq!(std::fs::read(target.join("b.txt")).unwrap(), b"second");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }
}
