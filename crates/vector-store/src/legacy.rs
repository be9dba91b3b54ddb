//! Reader for indexes written by the previous tooling.
//!
//! The vectors live in a FAISS `IndexFlatL2` dump (`index.faiss`). The documents live in
//! `index.pkl`, a Python pickle of the docstore and its `index_to_docstore_id` mapping, or
//! in `index.json`, a JSON export of the same data. Pickled objects decode to their state
//! dicts, so both encodings are turned into one JSON value tree. Several generations of
//! that data exist, so both the top-level shape and each document record are matched
//! against the known layouts instead of being decoded against one schema.

use crate::docstore::DocumentStore;
use crate::error::{Result, VectorStoreError};
use crate::flat_index::FlatL2Index;
use crate::persist::{
    ByteReader, LEGACY_DOCSTORE_FILE, LEGACY_INDEX_FILE, LEGACY_JSON_DOCSTORE_FILE,
};
use archrag_chunker::{Chunk, Metadata};
use serde_json::{Map, Value};
use serde_pickle::{DeOptions, HashableValue};
use std::collections::BTreeMap;
use std::path::Path;

const FAISS_FLAT_L2: &[u8; 4] = b"IxF2";
const METRIC_L2: i32 = 1;

/// A document record that could not be recovered and was replaced by an empty chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyDecodeWarning {
    pub slot: usize,
    pub reason: String,
}

impl std::fmt::Display for LegacyDecodeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot {}: {}", self.slot, self.reason)
    }
}

pub(crate) struct LegacyIndex {
    pub index: FlatL2Index,
    pub docstore: DocumentStore,
    pub warnings: Vec<LegacyDecodeWarning>,
}

/// How the legacy docstore file was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocstoreEncoding {
    Pickle,
    Json,
}

impl DocstoreEncoding {
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Pickle => LEGACY_DOCSTORE_FILE,
            Self::Json => LEGACY_JSON_DOCSTORE_FILE,
        }
    }

    /// The docstore file present in `dir`, pickle first
    pub fn locate(dir: &Path) -> Option<Self> {
        [Self::Pickle, Self::Json]
            .into_iter()
            .find(|encoding| dir.join(encoding.file_name()).is_file())
    }

    fn parse(self, bytes: &[u8]) -> Result<Value> {
        match self {
            Self::Pickle => {
                let options = DeOptions::new().replace_unresolved_globals();
                let value = serde_pickle::value_from_slice(bytes, options).map_err(|e| {
                    VectorStoreError::format(format!(
                        "{LEGACY_DOCSTORE_FILE} is not a readable pickle: {e}"
                    ))
                })?;
                Ok(pickle_to_json(value))
            }
            Self::Json => serde_json::from_slice(bytes).map_err(|e| {
                VectorStoreError::format(format!("{LEGACY_JSON_DOCSTORE_FILE} is not valid JSON: {e}"))
            }),
        }
    }
}

pub(crate) fn decode(
    index_bytes: &[u8],
    docstore_bytes: &[u8],
    encoding: DocstoreEncoding,
) -> Result<LegacyIndex> {
    let index = read_faiss_flat_l2(index_bytes)?;
    let value = encoding.parse(docstore_bytes)?;
    let (docstore, warnings) = decode_docstore(value, index.len())?;

    for warning in &warnings {
        log::warn!("Legacy document recovered as empty: {warning}");
    }

    Ok(LegacyIndex {
        index,
        docstore,
        warnings,
    })
}

/// Parse a FAISS `IndexFlatL2` written with `faiss.write_index`
pub(crate) fn read_faiss_flat_l2(bytes: &[u8]) -> Result<FlatL2Index> {
    let mut reader = ByteReader::new(bytes);

    let fourcc = reader.take(4)?;
    if fourcc != FAISS_FLAT_L2 {
        return Err(VectorStoreError::format(format!(
            "{LEGACY_INDEX_FILE} holds unsupported index type {:?} (only IndexFlatL2 is readable)",
            String::from_utf8_lossy(fourcc)
        )));
    }

    let dimension = reader.i32()?;
    let ntotal = reader.i64()?;
    let _dummy_a = reader.i64()?;
    let _dummy_b = reader.i64()?;
    let _is_trained = reader.u8()?;
    let metric = reader.i32()?;
    if metric > METRIC_L2 {
        let _metric_arg = reader.f32()?;
    }
    if metric != METRIC_L2 {
        return Err(VectorStoreError::format(format!(
            "{LEGACY_INDEX_FILE} uses metric {metric}, expected L2"
        )));
    }

    let (Ok(dimension), Ok(ntotal)) = (usize::try_from(dimension), usize::try_from(ntotal)) else {
        return Err(VectorStoreError::format(format!(
            "{LEGACY_INDEX_FILE} header is corrupt (d={dimension}, ntotal={ntotal})"
        )));
    };

    let floats = reader.u64()? as usize;
    let expected = dimension
        .checked_mul(ntotal)
        .ok_or_else(|| VectorStoreError::format("FAISS header overflows"))?;
    if floats != expected {
        return Err(VectorStoreError::format(format!(
            "{LEGACY_INDEX_FILE} stores {floats} floats, header implies {expected}"
        )));
    }
    let data = reader.f32_vec(floats)?;

    FlatL2Index::from_raw(dimension, data)
}

/// Record lookup strategy for one of the known top-level layouts
enum Layout {
    /// Records keyed by docstore id, plus a slot -> id mapping
    Mapped {
        records: Map<String, Value>,
        mapping: BTreeMap<usize, String>,
    },
    /// Records keyed directly by slot
    Direct { records: Map<String, Value> },
}

impl Layout {
    fn detect(value: Value) -> Result<Self> {
        match value {
            Value::Array(mut items) if items.len() == 2 => {
                let mapping = items.pop().unwrap_or(Value::Null);
                let docstore = items.pop().unwrap_or(Value::Null);
                Self::mapped(docstore, mapping)
            }
            Value::Object(mut map)
                if map.contains_key("docstore") && map.contains_key("index_to_docstore_id") =>
            {
                let docstore = map.remove("docstore").unwrap_or(Value::Null);
                let mapping = map.remove("index_to_docstore_id").unwrap_or(Value::Null);
                Self::mapped(docstore, mapping)
            }
            Value::Object(map) if map.keys().all(|k| k.parse::<usize>().is_ok()) => {
                Ok(Self::Direct { records: map })
            }
            other => Err(VectorStoreError::format(format!(
                "Legacy docstore has an unrecognized layout ({})",
                describe(&other)
            ))),
        }
    }

    fn mapped(docstore: Value, mapping: Value) -> Result<Self> {
        Ok(Self::Mapped {
            records: unwrap_docstore(docstore)?,
            mapping: parse_mapping(mapping)?,
        })
    }

    fn record_count(&self) -> usize {
        match self {
            Self::Mapped { records, .. } | Self::Direct { records } => records.len(),
        }
    }

    fn record(&self, slot: usize) -> std::result::Result<&Value, String> {
        match self {
            Self::Mapped { records, mapping } => {
                let id = mapping
                    .get(&slot)
                    .ok_or_else(|| "no docstore id mapped to this slot".to_string())?;
                records
                    .get(id)
                    .ok_or_else(|| format!("docstore id {id:?} not found"))
            }
            Self::Direct { records } => records
                .get(&slot.to_string())
                .ok_or_else(|| "no record for this slot".to_string()),
        }
    }
}

/// The docstore object is either the id -> record map itself or an in-memory store
/// wrapper holding it under `_dict`
fn unwrap_docstore(value: Value) -> Result<Map<String, Value>> {
    let Value::Object(mut map) = value else {
        return Err(VectorStoreError::format(format!(
            "Legacy docstore is {}, expected an object",
            describe(&value)
        )));
    };

    if let Some(Value::Object(inner)) = map.remove("_dict") {
        return Ok(inner);
    }
    if let Some(Value::Object(mut attrs)) = map.remove("__dict__") {
        if let Some(Value::Object(inner)) = attrs.remove("_dict") {
            return Ok(inner);
        }
        return Ok(attrs);
    }
    Ok(map)
}

fn parse_mapping(value: Value) -> Result<BTreeMap<usize, String>> {
    let mut mapping = BTreeMap::new();
    match value {
        Value::Object(map) => {
            for (key, id) in map {
                match (key.parse::<usize>(), id_string(&id)) {
                    (Ok(slot), Some(id)) => {
                        mapping.insert(slot, id);
                    }
                    _ => log::warn!("Skipping unreadable mapping entry {key:?} -> {id}"),
                }
            }
        }
        Value::Array(items) => {
            for (position, item) in items.iter().enumerate() {
                match item {
                    Value::Array(pair) if pair.len() == 2 => {
                        let slot = pair[0].as_u64().and_then(|s| usize::try_from(s).ok());
                        match (slot, id_string(&pair[1])) {
                            (Some(slot), Some(id)) => {
                                mapping.insert(slot, id);
                            }
                            _ => log::warn!("Skipping unreadable mapping entry {item}"),
                        }
                    }
                    other => match id_string(other) {
                        Some(id) => {
                            mapping.insert(position, id);
                        }
                        None => log::warn!("Skipping unreadable mapping entry {other}"),
                    },
                }
            }
        }
        other => {
            return Err(VectorStoreError::format(format!(
                "Legacy index_to_docstore_id is {}, expected an object or array",
                describe(&other)
            )))
        }
    }
    Ok(mapping)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build a slot-aligned docstore for `vector_count` slots.
///
/// Unknown top-level layouts are fatal. Individual records that cannot be recovered
/// become empty chunks so slot alignment is preserved.
pub(crate) fn decode_docstore(
    value: Value,
    vector_count: usize,
) -> Result<(DocumentStore, Vec<LegacyDecodeWarning>)> {
    let layout = Layout::detect(value)?;
    let mut docstore = DocumentStore::new();
    let mut warnings = Vec::new();

    for slot in 0..vector_count {
        let chunk = match layout.record(slot) {
            Ok(record) => normalize_record(record).unwrap_or_else(|| {
                warnings.push(LegacyDecodeWarning {
                    slot,
                    reason: format!("unrecognized record layout ({})", describe(record)),
                });
                Chunk::default()
            }),
            Err(reason) => {
                warnings.push(LegacyDecodeWarning { slot, reason });
                Chunk::default()
            }
        };
        docstore.insert(slot, chunk);
    }

    if layout.record_count() > vector_count {
        log::warn!(
            "Legacy docstore has {} records for {vector_count} vectors; extras ignored",
            layout.record_count()
        );
    }

    Ok((docstore, warnings))
}

/// Known record layouts, tried in order: `(wrapper key, content key)`
const RECORD_LAYOUTS: &[(Option<&str>, &str)] = &[
    (None, "page_content"),
    (None, "content"),
    (Some("kwargs"), "page_content"),
    (Some("__dict__"), "page_content"),
    (Some("__dict__"), "content"),
];

/// Recover a chunk from one serialized document record
pub(crate) fn normalize_record(record: &Value) -> Option<Chunk> {
    if let Value::String(text) = record {
        return Some(Chunk::new(text.clone(), Metadata::new()));
    }
    let fields = record.as_object()?;

    RECORD_LAYOUTS.iter().find_map(|(wrapper, content_key)| {
        let fields = match wrapper {
            None => fields,
            Some(key) => fields.get(*key)?.as_object()?,
        };
        let content = fields.get(*content_key)?.as_str()?;
        let metadata = fields
            .get("metadata")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Some(Chunk::new(content.to_string(), metadata))
    })
}

/// Pickled class instances arrive as their state dicts; unresolvable globals as `None`
fn pickle_to_json(value: serde_pickle::Value) -> Value {
    use serde_pickle::Value as Pickle;

    match value {
        Pickle::None => Value::Null,
        Pickle::Bool(b) => Value::Bool(b),
        Pickle::I64(i) => Value::from(i),
        Pickle::Int(big) => {
            let digits = big.to_string();
            digits.parse::<i64>().map_or(Value::String(digits), Value::from)
        }
        Pickle::F64(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        Pickle::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        Pickle::String(s) => Value::String(s),
        Pickle::List(items) | Pickle::Tuple(items) => {
            Value::Array(items.into_iter().map(pickle_to_json).collect())
        }
        Pickle::Set(items) | Pickle::FrozenSet(items) => Value::Array(
            items
                .into_iter()
                .map(|item| pickle_to_json(item.into_value()))
                .collect(),
        ),
        Pickle::Dict(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (pickle_key(key), pickle_to_json(value)))
                .collect(),
        ),
    }
}

fn pickle_key(key: HashableValue) -> String {
    match key {
        HashableValue::String(s) => s,
        HashableValue::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        other => other.to_string(),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
