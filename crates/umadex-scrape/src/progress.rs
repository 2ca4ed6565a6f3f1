//! Progress events for a scrape run.
//!
//! Pipelines emit `ProgressEvent`s through a `tokio::sync::broadcast`
//! channel; the CLI subscribes and prints one line per item. With no
//! subscriber the events are dropped.

use serde::{Deserialize, Serialize};

/// A progress event emitted by a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    pub event: ProgressEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// A category listing was read.
    CategoryStarted { category: Category, total: usize },
    /// An item was extracted and persisted.
    ItemDone {
        category: Category,
        index: usize,
        total: usize,
        label: String,
        detail: String,
    },
    /// An item ran out of retries.
    ItemSkipped {
        category: Category,
        index: usize,
        total: usize,
        label: String,
        reason: String,
    },
    CategoryCompleted {
        category: Category,
        done: usize,
        skipped: usize,
        elapsed_ms: u64,
    },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Content category scraped by one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Characters,
    Supports,
    Career,
    Races,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Characters => write!(f, "UMA"),
            Self::Supports => write!(f, "SUPPORT"),
            Self::Career => write!(f, "CAREER"),
            Self::Races => write!(f, "RACE"),
        }
    }
}

impl std::fmt::Display for ProgressEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CategoryStarted { category, total } => {
                write!(f, "[{category}] {total} items")
            }
            Self::ItemDone {
                category,
                index,
                total,
                label,
                detail,
            } => write!(f, "[{index}/{total}] {category} ✓ {label}  ({detail})"),
            Self::ItemSkipped {
                category,
                index,
                total,
                label,
                reason,
            } => write!(f, "[{index}/{total}] {category} ✗ {label}: {reason}"),
            Self::CategoryCompleted {
                category,
                done,
                skipped,
                elapsed_ms,
            } => write!(
                f,
                "[{category}] done: {done} saved, {skipped} skipped in {:.1}s",
                *elapsed_ms as f64 / 1000.0
            ),
            Self::Warning { message } => write!(f, "warning: {message}"),
        }
    }
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, ignoring send errors (no receivers).
pub fn emit(tx: &Option<ProgressSender>, run_id: &str, seq: &mut u64, event: ProgressEventKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent {
            run_id: run_id.to_string(),
            seq: *seq,
            event,
        });
    }
}

/// Emitter bound to one run, tracking its own sequence.
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: Option<ProgressSender>,
    run_id: String,
    seq: u64,
}

impl Reporter {
    pub fn new(tx: Option<ProgressSender>, run_id: impl Into<String>) -> Self {
        Self {
            tx,
            run_id: run_id.into(),
            seq: 0,
        }
    }

    /// A reporter nobody listens to.
    pub fn silent() -> Self {
        Self::new(None, "")
    }

    pub fn emit(&mut self, event: ProgressEventKind) {
        emit(&self.tx, &self.run_id, &mut self.seq, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_serialization() {
        let event = ProgressEvent {
            run_id: "run-1".to_string(),
            seq: 1,
            event: ProgressEventKind::CategoryStarted {
                category: Category::Supports,
                total: 212,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("CategoryStarted"));
        assert!(json.contains("Supports"));

        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, "run-1");
        assert_eq!(parsed.seq, 1);
    }

    #[test]
    fn test_item_lines() {
        let done = ProgressEventKind::ItemDone {
            category: Category::Characters,
            index: 3,
            total: 90,
            label: "Special Week (Special Dreamer)".to_string(),
            detail: "★3 | 12 events".to_string(),
        };
        assert_eq!(
            done.to_string(),
            "[3/90] UMA ✓ Special Week (Special Dreamer)  (★3 | 12 events)"
        );

        let skipped = ProgressEventKind::ItemSkipped {
            category: Category::Races,
            index: 1,
            total: 2,
            label: "Arima Kinen".to_string(),
            reason: "navigation timeout".to_string(),
        };
        assert!(skipped.to_string().contains("RACE ✗ Arima Kinen"));
    }

    #[test]
    fn test_reporter_sequences() {
        let (tx, mut rx) = channel();
        let mut reporter = Reporter::new(Some(tx), "run-7");
        reporter.emit(ProgressEventKind::Warning {
            message: "a".to_string(),
        });
        reporter.emit(ProgressEventKind::Warning {
            message: "b".to_string(),
        });
        assert_eq!(rx.try_recv().unwrap().seq, 1);
        assert_eq!(rx.try_recv().unwrap().seq, 2);
    }

    #[test]
    fn test_emit_without_receivers() {
        let (tx, rx) = channel();
        drop(rx);
        emit(
            &Some(tx),
            "test",
            &mut 0,
            ProgressEventKind::Warning {
                message: "test".to_string(),
            },
        );
        Reporter::silent().emit(ProgressEventKind::Warning {
            message: "ignored".to_string(),
        });
    }
}
