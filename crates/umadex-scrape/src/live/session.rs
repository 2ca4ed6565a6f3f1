//! The single browser session a pipeline drives.
//!
//! A session owns one renderer and one page. Restarting throws both away,
//! launches a fresh browser and replays the baseline: open the category's
//! landing view, optionally seed `localStorage`, and select the server.

use super::controls;
use crate::config::{ScrapeConfig, Server};
use crate::dom::locator::Controls;
use crate::error::{Result, ScrapeError};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{BrowserOptions, RenderContext, Renderer};
use crate::retry;
use async_trait::async_trait;
use std::time::Duration;

/// Where a restarted session is brought back to.
#[derive(Debug, Clone)]
pub struct Baseline {
    pub url: String,
    /// Selector that must be present once the view has loaded.
    pub ready_css: String,
    pub server: Server,
    /// `localStorage` entries written before the server is selected.
    pub preset: Vec<(String, String)>,
}

pub struct BrowserSession {
    options: BrowserOptions,
    controls: Controls,
    ready_timeout: Duration,
    baseline: Baseline,
    renderer: Option<Box<dyn Renderer>>,
    page: Option<Box<dyn RenderContext>>,
}

impl BrowserSession {
    /// Launch a browser and apply `baseline`.
    pub async fn start(config: &ScrapeConfig, controls: &Controls, baseline: Baseline) -> Result<Self> {
        let mut session = Self {
            options: config.browser.clone(),
            controls: controls.clone(),
            ready_timeout: config.timing.ready_timeout,
            baseline,
            renderer: None,
            page: None,
        };
        session.launch().await?;
        session.apply_baseline().await?;
        Ok(session)
    }

    async fn launch(&mut self) -> Result<()> {
        let renderer = ChromiumRenderer::launch(&self.options).await?;
        let page = renderer.new_context().await?;
        self.renderer = Some(Box::new(renderer));
        self.page = Some(page);
        Ok(())
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn page(&self) -> Result<&dyn RenderContext> {
        self.page
            .as_deref()
            .ok_or_else(|| ScrapeError::Driver("session is closed".into()))
    }

    pub fn page_mut(&mut self) -> Result<&mut (dyn RenderContext + 'static)> {
        self.page
            .as_deref_mut()
            .ok_or_else(|| ScrapeError::Driver("session is closed".into()))
    }

    fn nav_timeout_ms(&self) -> u64 {
        self.options.nav_timeout.as_millis() as u64
    }

    /// Navigate and wait for `ready_css`. A page that never shows it is
    /// reported as a navigation timeout.
    pub async fn goto(&mut self, url: &str, ready_css: &str) -> Result<()> {
        let timeout_ms = self.nav_timeout_ms();
        let ready_timeout = self.ready_timeout;
        let page = self.page_mut()?;

        let nav = page.navigate(url, timeout_ms).await?;
        if nav.stopped_early {
            tracing::debug!(url, "load stopped after {}ms", nav.load_time_ms);
        }
        if !controls::wait_for(page, ready_css, ready_timeout).await? {
            return Err(ScrapeError::NavigationTimeout(format!(
                "no {ready_css} at {url}"
            )));
        }
        Ok(())
    }

    /// Refresh the current page.
    pub async fn reload(&mut self) -> Result<()> {
        let timeout_ms = self.nav_timeout_ms();
        self.page_mut()?.reload(timeout_ms).await
    }

    /// Reselect the server on the current page.
    pub async fn ensure_server(&mut self) -> Result<()> {
        let timeout_ms = self.nav_timeout_ms();
        let server = self.baseline.server;
        let controls = self.controls.clone();
        controls::ensure_server(self.page_mut()?, &controls, server, timeout_ms).await
    }

    async fn apply_baseline(&mut self) -> Result<()> {
        let Baseline {
            url,
            ready_css,
            preset,
            ..
        } = self.baseline.clone();
        self.goto(&url, &ready_css).await?;

        if !preset.is_empty() {
            let entries: Vec<(&str, &str)> = preset
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            controls::set_local_storage(self.page()?, &entries).await?;
            self.reload().await?;
        }
        self.ensure_server().await
    }

    /// Drop the page and the browser. Errors are logged, never raised.
    async fn discard(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!("page close failed: {e}");
            }
        }
        if let Some(renderer) = self.renderer.take() {
            if let Err(e) = renderer.shutdown().await {
                tracing::debug!("browser shutdown failed: {e}");
            }
        }
    }

    /// End the session.
    pub async fn close(mut self) {
        self.discard().await;
    }
}

#[async_trait]
impl retry::Session for BrowserSession {
    async fn restart(&mut self) -> Result<()> {
        tracing::info!(url = %self.baseline.url, "restarting browser session");
        self.discard().await;
        self.launch().await?;
        self.apply_baseline().await
    }
}
