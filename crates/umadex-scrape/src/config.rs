//! Run configuration.
//!
//! Values resolve in three layers: built-in defaults, then `UMADEX_*`
//! environment variables, then command-line flags (applied by the binary).

use crate::renderer::BrowserOptions;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Game server whose data the site should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Server {
    Global,
    Japan,
}

impl Server {
    /// Value stored in the site's `localStorage` keys.
    pub fn storage_value(self) -> &'static str {
        match self {
            Server::Global => "global",
            Server::Japan => "japan",
        }
    }

    /// Settings labels that select this server, tried in order.
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Server::Global => &["Global", "EN (Global)", "English (Global)"],
            Server::Japan => &["Japan", "JP", "Japanese"],
        }
    }
}

impl std::str::FromStr for Server {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Server::Global),
            "japan" | "jp" => Ok(Server::Japan),
            other => Err(format!("unknown server '{other}'")),
        }
    }
}

/// Output locations for every corpus.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub uma: PathBuf,
    pub supports: PathBuf,
    pub support_hints: PathBuf,
    pub career: PathBuf,
    pub races: PathBuf,
    pub thumb_dir: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            uma: PathBuf::from("Assets/uma_data.json"),
            supports: PathBuf::from("Assets/support_card.json"),
            support_hints: PathBuf::from("Assets/support_hints.json"),
            career: PathBuf::from("Assets/career.json"),
            races: PathBuf::from("Assets/races.json"),
            thumb_dir: PathBuf::from("assets/support_thumbs"),
        }
    }
}

/// Page settle delays and waits.
#[derive(Debug, Clone)]
pub struct Timing {
    /// Pause after a click that opens or switches a view.
    pub click_settle: Duration,
    /// Pause after showing a tooltip before it is read.
    pub popup_settle: Duration,
    /// How long to poll for a selector to appear.
    pub ready_timeout: Duration,
    /// Download timeout for thumbnails.
    pub thumb_timeout: Duration,
    /// Pause after each thumbnail download.
    pub thumb_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            click_settle: Duration::from_millis(250),
            popup_settle: Duration::from_millis(50),
            ready_timeout: Duration::from_secs(10),
            thumb_timeout: Duration::from_secs(20),
            thumb_delay: Duration::from_millis(50),
        }
    }
}

/// Everything a scrape run needs.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Site origin, e.g. `https://gametora.com`.
    pub base_url: String,
    pub server: Server,
    pub outputs: OutputPaths,
    pub retry: RetryPolicy,
    pub browser: BrowserOptions,
    pub timing: Timing,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gametora.com".to_string(),
            server: Server::Global,
            outputs: OutputPaths::default(),
            retry: RetryPolicy::default(),
            browser: BrowserOptions::default(),
            timing: Timing::default(),
        }
    }
}

impl ScrapeConfig {
    /// Defaults overridden by the environment.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env(|name| std::env::var(name).ok());
        cfg
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = read("UMADEX_BASE_URL") {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(server) = read("UMADEX_SERVER") {
            match server.parse() {
                Ok(s) => self.server = s,
                Err(e) => tracing::warn!("ignoring UMADEX_SERVER: {e}"),
            }
        }
        if let Some(path) = read("UMADEX_CHROMIUM_PATH") {
            self.browser.chromium_path = Some(PathBuf::from(path));
        }
        if let Some(n) = read("UMADEX_RETRIES").and_then(|v| v.parse().ok()) {
            self.retry.max_retries = n;
        }
        if let Some(secs) = read("UMADEX_NAV_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.browser.nav_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = read("UMADEX_THUMB_DIR") {
            self.outputs.thumb_dir = PathBuf::from(dir);
        }
    }

    /// Absolute URL of a site path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_corpus_layout() {
        let cfg = ScrapeConfig::default();
        assert_eq!(cfg.outputs.uma, PathBuf::from("Assets/uma_data.json"));
        assert_eq!(cfg.outputs.thumb_dir, PathBuf::from("assets/support_thumbs"));
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.server, Server::Global);
        assert_eq!(cfg.url("/umamusume/races"), "https://gametora.com/umamusume/races");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("UMADEX_BASE_URL", "http://localhost:8080/"),
            ("UMADEX_SERVER", "JP"),
            ("UMADEX_RETRIES", "5"),
            ("UMADEX_THUMB_DIR", "  "),
        ]
        .into_iter()
        .collect();

        let mut cfg = ScrapeConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.base_url, "http://localhost:8080");
        assert_eq!(cfg.server, Server::Japan);
        assert_eq!(cfg.retry.max_retries, 5);
        // Blank values are ignored.
        assert_eq!(cfg.outputs.thumb_dir, PathBuf::from("assets/support_thumbs"));
    }

    #[test]
    fn test_bad_server_is_ignored() {
        let mut cfg = ScrapeConfig::default();
        cfg.apply_env(|k| (k == "UMADEX_SERVER").then(|| "mars".to_string()));
        assert_eq!(cfg.server, Server::Global);
    }
}
