//! Renderer abstraction for the browser session.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (Chromium via chromiumoxide). Everything above this
//! layer talks to a page only through script evaluation, so tests can
//! stand in a scripted context.

pub mod chromium;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken until the load finished or was cut short.
    pub load_time_ms: u64,
    /// The load event never fired and loading was stopped.
    pub stopped_early: bool,
}

/// Launch options for the browser.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub window: (u32, u32),
    pub user_agent: String,
    /// Explicit Chromium binary; searched for when unset.
    pub chromium_path: Option<PathBuf>,
    pub nav_timeout: Duration,
    pub script_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window: (1920, 1080),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36"
                .to_string(),
            chromium_path: None,
            nav_timeout: Duration::from_secs(45),
            script_timeout: Duration::from_secs(45),
        }
    }
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine and its event handler.
    async fn shutdown(self: Box<Self>) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout. A load that overruns the timeout
    /// is stopped and reported with `stopped_early` rather than failing.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Reload the current page.
    async fn reload(&mut self, timeout_ms: u64) -> Result<()>;
    /// Execute JavaScript in the page context and return the result
    /// (`null` for `undefined`).
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}
