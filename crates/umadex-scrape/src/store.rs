//! JSON corpus persistence: append-with-dedup and upsert-by-key.
//!
//! Every corpus is a single JSON array on disk. Reads are lossy: a missing,
//! unparsable or non-array file is treated as an empty collection so a
//! corrupt file never stops a run. Writes are atomic: the new array is
//! staged in a temporary file next to the destination and renamed over it,
//! so readers only ever see a complete document.
//!
//! Read-modify-write is not locked. Two processes writing the same path
//! race and the later rename wins.

use crate::error::StoreError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Ordered set of dotted field paths whose joint projection must be unique
/// among the records of an append-only corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupKey(Vec<String>);

impl DedupKey {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    /// Project a record through every path. A missing segment yields `null`.
    pub fn project(&self, record: &Value) -> Vec<Value> {
        self.0
            .iter()
            .map(|path| pluck(record, path).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

fn pluck<'a>(record: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .try_fold(record, |cur, part| cur.as_object()?.get(part))
}

/// Load a corpus, treating anything unreadable as empty.
pub fn load(path: &Path) -> Vec<Value> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!("unreadable corpus {}, starting empty: {e}", path.display());
            return Vec::new();
        }
    };

    match serde_json::from_str::<Value>(text.trim_start_matches('\u{feff}')) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            tracing::warn!("corpus {} is not a JSON array, starting empty", path.display());
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("corrupt corpus {}, starting empty: {e}", path.display());
            Vec::new()
        }
    }
}

/// Append `record` unless a record with the same dedup projection exists.
///
/// Returns `true` when the record was inserted. A skipped insert does not
/// touch the file.
pub fn append<T: Serialize>(
    path: &Path,
    record: &T,
    dedup: Option<&DedupKey>,
) -> Result<bool, StoreError> {
    let record = serde_json::to_value(record)?;
    let mut data = load(path);

    if let Some(key) = dedup {
        let projected = key.project(&record);
        if data.iter().any(|existing| key.project(existing) == projected) {
            return Ok(false);
        }
    }

    data.push(record);
    write_atomic(path, &data)?;
    Ok(true)
}

/// Shallow-merge `patch` into the first record whose `match_field` equals
/// `match_value`, or append `{match_field: match_value, ..patch}`.
pub fn upsert<T: Serialize>(
    path: &Path,
    match_field: &str,
    match_value: &str,
    patch: &T,
) -> Result<(), StoreError> {
    let patch = match serde_json::to_value(patch)? {
        Value::Object(map) => map,
        _ => return Err(StoreError::PatchNotObject(path.display().to_string())),
    };
    let mut data = load(path);

    let existing = data.iter_mut().find_map(|item| match item {
        Value::Object(obj) if obj.get(match_field).and_then(Value::as_str) == Some(match_value) => {
            Some(obj)
        }
        _ => None,
    });

    match existing {
        Some(obj) => obj.extend(patch),
        None => {
            let mut fresh = Map::new();
            fresh.insert(match_field.to_string(), Value::String(match_value.to_string()));
            fresh.extend(patch);
            data.push(Value::Object(fresh));
        }
    }

    write_atomic(path, &data)
}

/// A fully written temporary file waiting to replace its destination.
///
/// Dropping it without calling [`Staged::commit`] deletes the temporary and
/// leaves the destination untouched.
pub struct Staged {
    tmp: NamedTempFile,
    dest: PathBuf,
}

impl Staged {
    /// Atomically replace the destination with the staged content.
    pub fn commit(self) -> Result<(), StoreError> {
        let dest = self.dest;
        self.tmp.persist(&dest).map_err(|e| StoreError::Io {
            path: dest.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}

/// Serialize `data` into a temporary file in the destination's directory.
pub fn stage(path: &Path, data: &[Value]) -> Result<Staged, StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(&dir).map_err(io_err)?;
    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    let body = serde_json::to_vec_pretty(data)?;
    tmp.write_all(&body).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;

    Ok(Staged {
        tmp,
        dest: path.to_path_buf(),
    })
}

fn write_atomic(path: &Path, data: &[Value]) -> Result<(), StoreError> {
    stage(path, data)?.commit()
}
