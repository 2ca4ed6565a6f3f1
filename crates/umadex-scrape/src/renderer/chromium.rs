//! Chromium-based renderer using chromiumoxide.

use super::{BrowserOptions, NavigationResult, RenderContext, Renderer};
use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. UMADEX_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("UMADEX_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    options: BrowserOptions,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance with `options`.
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let chrome_path = options
            .chromium_path
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| {
                ScrapeError::Launch("Chromium not found; set UMADEX_CHROMIUM_PATH".into())
            })?;

        let (width, height) = options.window;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(width, height)
            .request_timeout(options.nav_timeout)
            .arg(format!("--window-size={width},{height}"))
            .arg(format!("--user-agent={}", options.user_agent))
            .arg("--enable-unsafe-swiftshader")
            .arg("--use-gl=swiftshader")
            .arg("--use-angle=swiftshader")
            .arg("--ignore-gpu-blocklist")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--log-level=3");
        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| ScrapeError::Launch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Launch(format!("failed to launch Chromium: {e}")))?;

        // Drive the CDP connection for the lifetime of the browser.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("browser handler event error: {e}");
                }
            }
        });

        tracing::debug!(headless = options.headless, "launched Chromium");

        Ok(Self {
            browser,
            handler,
            options: options.clone(),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

impl Drop for ChromiumRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self.browser.new_page("about:blank").await?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            script_timeout: self.options.script_timeout,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(mut self: Box<Self>) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            tracing::debug!("browser close failed: {e}");
        }
        let _ = self.browser.wait().await;
        // The handler is aborted when `self` drops.
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    script_timeout: Duration,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn stop_loading(&self) {
        if let Err(e) = self.page.evaluate("window.stop();").await {
            tracing::debug!("window.stop() failed: {e}");
        }
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        let stopped_early = match result {
            Ok(Ok(_)) => false,
            Ok(Err(e)) => {
                let err = ScrapeError::from(e);
                if !matches!(err, ScrapeError::ReadTimeout(_)) {
                    return Err(err);
                }
                self.stop_loading().await;
                true
            }
            Err(_) => {
                tracing::debug!("load of {url} exceeded {timeout_ms}ms, stopping");
                self.stop_loading().await;
                true
            }
        };

        let final_url = self
            .page
            .url()
            .await?
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
            stopped_early,
        })
    }

    async fn reload(&mut self, timeout_ms: u64) -> Result<()> {
        match tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.reload()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                self.stop_loading().await;
                Ok(())
            }
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = tokio::time::timeout(self.script_timeout, self.page.evaluate(script))
            .await
            .map_err(|_| {
                ScrapeError::ReadTimeout(format!(
                    "script exceeded {}ms",
                    self.script_timeout.as_millis()
                ))
            })??;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.page.url().await?.map(|u| u.to_string()).unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}
