//! Error types for the extraction pipeline.
//!
//! Faults coming out of the browser session are split into two classes.
//! The four transient kinds (navigation timeout, stale element reference,
//! generic driver fault, read timeout) are retried by
//! [`crate::retry::RetryController`] with a full session restart; every
//! other kind aborts the run.

use std::path::PathBuf;

/// All errors that can occur while scraping.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("navigation timed out: {0}")]
    NavigationTimeout(String),

    #[error("stale element reference: {0}")]
    StaleElement(String),

    #[error("browser session fault: {0}")]
    Driver(String),

    #[error("read timed out: {0}")]
    ReadTimeout(String),

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("page script returned an unexpected value: {0}")]
    Script(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScrapeError {
    /// Whether this fault belongs to the retryable whitelist.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScrapeError::NavigationTimeout(_)
                | ScrapeError::StaleElement(_)
                | ScrapeError::Driver(_)
                | ScrapeError::ReadTimeout(_)
        )
    }

    /// Short machine-friendly name of the fault kind, used in progress output.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::NavigationTimeout(_) => "navigation-timeout",
            ScrapeError::StaleElement(_) => "stale-element",
            ScrapeError::Driver(_) => "driver",
            ScrapeError::ReadTimeout(_) => "read-timeout",
            ScrapeError::Launch(_) => "launch",
            ScrapeError::Script(_) => "script",
            ScrapeError::Config(_) => "config",
            ScrapeError::Store(_) => "store",
        }
    }
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        match e {
            chromiumoxide::error::CdpError::Timeout => ScrapeError::ReadTimeout(e.to_string()),
            other => ScrapeError::Driver(other.to_string()),
        }
    }
}

/// Errors raised by [`crate::store`] writes.
///
/// Reads never fail: an unreadable corpus is treated as empty.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("upsert patch for {0} must serialize to a JSON object")]
    PatchNotObject(String),
}

pub type Result<T, E = ScrapeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_whitelist() {
        assert!(ScrapeError::NavigationTimeout("x".into()).is_transient());
        assert!(ScrapeError::StaleElement("x".into()).is_transient());
        assert!(ScrapeError::Driver("x".into()).is_transient());
        assert!(ScrapeError::ReadTimeout("x".into()).is_transient());

        assert!(!ScrapeError::Launch("x".into()).is_transient());
        assert!(!ScrapeError::Script("x".into()).is_transient());
        assert!(!ScrapeError::Config("x".into()).is_transient());
        assert!(!ScrapeError::Store(StoreError::PatchNotObject("a.json".into())).is_transient());
    }

    #[test]
    fn test_cdp_timeout_maps_to_read_timeout() {
        let err: ScrapeError = chromiumoxide::error::CdpError::Timeout.into();
        assert_eq!(err.kind(), "read-timeout");
        assert!(err.is_transient());
    }
}
