//! Event index built from the scraped corpora.
//!
//! Support events, the events embedded in each character record, and
//! career events are merged by trimmed event name. Every popup row adds one
//! reward group (its reward lines) under its option label, so an event seen
//! on several cards keeps every variant.

use crate::error::LookupError;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use umadex_scrape::records::reward_lines;

/// Input files, read in this order.
pub const SUPPORT_FILE: &str = "support_card.json";
pub const UMA_FILE: &str = "uma_data.json";
pub const CAREER_FILE: &str = "career.json";

/// One merged event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventEntry {
    pub event_name: String,
    /// Option label → reward groups, one group per source row.
    pub options: BTreeMap<String, Vec<Vec<String>>>,
}

/// A scored candidate name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored {
    pub event_name: String,
    pub score: f64,
}

/// Immutable name → event map.
#[derive(Debug, Clone, Default)]
pub struct EventIndex {
    events: BTreeMap<String, EventEntry>,
}

impl EventIndex {
    /// Load all three corpora from `dir`. Any missing file is an error.
    pub fn load(dir: &Path) -> Result<Self, LookupError> {
        let paths: Vec<PathBuf> = [SUPPORT_FILE, UMA_FILE, CAREER_FILE]
            .iter()
            .map(|f| dir.join(f))
            .collect();
        if let Some(missing) = paths.iter().find(|p| !p.exists()) {
            return Err(LookupError::MissingFile(missing.clone()));
        }

        let mut index = Self::default();
        index.add_rows(&read_array(&paths[0])?);
        for uma in read_array(&paths[1])? {
            if let Some(Value::Array(rows)) = uma.get("UmaEvents") {
                index.add_rows(rows);
            }
        }
        index.add_rows(&read_array(&paths[2])?);

        tracing::info!(events = index.len(), dir = %dir.display(), "event index built");
        Ok(index)
    }

    /// Build from flat event rows, for callers that already hold them.
    pub fn from_rows(rows: &[Value]) -> Self {
        let mut index = Self::default();
        index.add_rows(rows);
        index
    }

    /// Merge `{EventName, EventOptions}` rows. Rows without a name or with
    /// non-object options are skipped.
    fn add_rows(&mut self, rows: &[Value]) {
        for row in rows {
            let name = row
                .get("EventName")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default();
            let Some(Value::Object(options)) = row.get("EventOptions") else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let entry = self
                .events
                .entry(name.to_string())
                .or_insert_with(|| EventEntry {
                    event_name: name.to_string(),
                    options: BTreeMap::new(),
                });
            for (label, blob) in options {
                let text = match blob {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                entry
                    .options
                    .entry(label.trim().to_string())
                    .or_default()
                    .push(reward_lines(&text));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&EventEntry> {
        self.events.get(name)
    }

    /// Best `limit` names by score, then those under `min_score` dropped.
    /// Equal scores keep name order.
    pub fn search(&self, query: &str, limit: usize, min_score: f64) -> Vec<Scored> {
        let mut scored: Vec<Scored> = self
            .names()
            .map(|name| Scored {
                event_name: name.to_string(),
                score: score(query, name),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        scored.retain(|s| s.score >= min_score);
        scored
    }
}

/// Normalized Indel similarity on a 0 to 100 scale.
pub fn score(a: &str, b: &str) -> f64 {
    rapidfuzz::fuzz::ratio(a.chars(), b.chars()) * 100.0
}

fn read_array(path: &Path) -> Result<Vec<Value>, LookupError> {
    let text = std::fs::read_to_string(path).map_err(|source| LookupError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value =
        serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|source| LookupError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(match value {
        Value::Array(items) => items,
        _ => {
            tracing::warn!("{} is not a JSON array, ignoring it", path.display());
            Vec::new()
        }
    })
}
