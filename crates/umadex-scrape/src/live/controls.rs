//! Small live-page operations: snapshots, clicks, waits and the site
//! settings dance that selects a server.

use crate::config::Server;
use crate::dom::locator::Controls;
use crate::dom::snapshot::{handle_expr, snapshot_script, SnapshotRoot};
use crate::dom::{Document, Handle};
use crate::error::{Result, ScrapeError};
use crate::renderer::RenderContext;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Snapshot the subtree at `root`, or `None` when it no longer exists.
pub async fn snapshot(page: &dyn RenderContext, root: SnapshotRoot<'_>) -> Result<Option<Document>> {
    let value = page.execute_js(&snapshot_script(root)).await?;
    Document::from_snapshot_json(&value)
}

/// Snapshot the whole page body.
pub async fn snapshot_body(page: &dyn RenderContext) -> Result<Document> {
    snapshot(page, SnapshotRoot::Body)
        .await?
        .ok_or_else(|| ScrapeError::StaleElement("document has no body".into()))
}

/// JavaScript string literal for `s`.
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Click the first element matching `css`. Returns whether one was found.
pub async fn click_css(page: &dyn RenderContext, css: &str) -> Result<bool> {
    let script = format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
        js_str(css)
    );
    Ok(page.execute_js(&script).await?.as_bool().unwrap_or(false))
}

/// Click a snapshotted element.
pub async fn click_handle(page: &dyn RenderContext, handle: Handle) -> Result<bool> {
    let script = format!(
        "(() => {{ const el = {}; if (!el || !el.isConnected) return false; el.click(); return true; }})()",
        handle_expr(handle)
    );
    Ok(page.execute_js(&script).await?.as_bool().unwrap_or(false))
}

/// Click the first element matching `css` whose text contains any of the
/// candidates (case-insensitive), trying candidates per element in order.
pub async fn click_by_text(page: &dyn RenderContext, css: &str, candidates: &[&str]) -> Result<bool> {
    let wanted = serde_json::to_string(candidates).map_err(|e| ScrapeError::Script(e.to_string()))?;
    let script = format!(
        r#"(() => {{
  const wanted = {wanted}.map(w => w.toLowerCase());
  for (const el of document.querySelectorAll({css})) {{
    const t = (el.innerText || '').trim().toLowerCase();
    if (wanted.some(w => t.includes(w))) {{ el.click(); return true; }}
  }}
  return false;
}})()"#,
        css = js_str(css)
    );
    Ok(page.execute_js(&script).await?.as_bool().unwrap_or(false))
}

/// Whether `css` currently matches anything.
pub async fn exists(page: &dyn RenderContext, css: &str) -> Result<bool> {
    let script = format!("document.querySelector({}) !== null", js_str(css));
    Ok(page.execute_js(&script).await?.as_bool().unwrap_or(false))
}

/// Poll until `css` matches or `timeout` passes.
pub async fn wait_for(page: &dyn RenderContext, css: &str, timeout: Duration) -> Result<bool> {
    let start = Instant::now();
    loop {
        if exists(page, css).await? {
            return Ok(true);
        }
        if start.elapsed() >= timeout {
            return Ok(false);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Write `localStorage` entries. Storage errors in the page are swallowed.
pub async fn set_local_storage(page: &dyn RenderContext, entries: &[(&str, &str)]) -> Result<()> {
    let body: String = entries
        .iter()
        .map(|(k, v)| format!("localStorage.setItem({}, {});", js_str(k), js_str(v)))
        .collect();
    page.execute_js(&format!("(() => {{ try {{ {body} }} catch (e) {{}} }})()"))
        .await?;
    Ok(())
}

/// Accept the cookie banner, pick the server in the settings menu, keep
/// raw English labels, persist the choice and reload.
pub async fn ensure_server(
    page: &mut dyn RenderContext,
    controls: &Controls,
    server: Server,
    reload_timeout_ms: u64,
) -> Result<()> {
    if !click_css(page, &controls.cookie_accept).await? {
        tracing::debug!("no cookie banner");
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    click_css(page, &controls.settings_button).await?;
    tokio::time::sleep(Duration::from_millis(150)).await;

    if click_by_text(page, &controls.settings_labels, server.labels()).await? {
        tokio::time::sleep(Duration::from_millis(100)).await;
    } else {
        tracing::debug!(?server, "server label not found in settings");
    }
    click_css(page, &controls.keep_raw_en).await?;

    let value = server.storage_value();
    set_local_storage(
        page,
        &[
            ("i18nextLng", "en"),
            ("umamusume_server", value),
            ("u-eh-server", value),
            ("u-eh-region", value),
            ("server", value),
        ],
    )
    .await?;

    click_css(page, "body").await?;
    tokio::time::sleep(Duration::from_millis(150)).await;
    page.reload(reload_timeout_ms).await?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::renderer::NavigationResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted page: answers each script with the first responder whose
    /// needle it contains, and records every script it ran.
    #[derive(Default)]
    pub(crate) struct ScriptedPage {
        pub responders: Vec<(String, serde_json::Value)>,
        pub log: Mutex<Vec<String>>,
        pub reloads: Mutex<u32>,
    }

    impl ScriptedPage {
        pub fn respond(mut self, needle: &str, value: serde_json::Value) -> Self {
            self.responders.push((needle.to_string(), value));
            self
        }

        pub fn ran(&self, needle: &str) -> usize {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.contains(needle))
                .count()
        }
    }

    #[async_trait]
    impl RenderContext for ScriptedPage {
        async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
            self.log.lock().unwrap().push(format!("navigate {url}"));
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 1,
                stopped_early: false,
            })
        }

        async fn reload(&mut self, _timeout_ms: u64) -> Result<()> {
            *self.reloads.lock().unwrap() += 1;
            Ok(())
        }

        async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
            self.log.lock().unwrap().push(script.to_string());
            Ok(self
                .responders
                .iter()
                .find(|(needle, _)| script.contains(needle.as_str()))
                .map(|(_, v)| v.clone())
                .unwrap_or(serde_json::Value::Null))
        }

        async fn get_url(&self) -> Result<String> {
            Ok("about:blank".into())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_js_str_escapes() {
        assert_eq!(js_str(r#"a[id="1"]"#), r#""a[id=\"1\"]""#);
    }

    #[tokio::test]
    async fn test_click_reports_presence() {
        let page = ScriptedPage::default().respond("#boxScenario", serde_json::json!(true));
        assert!(click_css(&page, "#boxScenario").await.unwrap());
        assert!(!click_css(&page, "#missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_server_persists_choice_and_reloads() {
        let controls = crate::dom::LocatorSet::embedded().unwrap().controls;
        let mut page = ScriptedPage::default();
        ensure_server(&mut page, &controls, Server::Japan, 1_000)
            .await
            .unwrap();

        assert_eq!(page.ran(r#"localStorage.setItem("u-eh-server", "japan")"#), 1);
        assert_eq!(page.ran(r#"localStorage.setItem("i18nextLng", "en")"#), 1);
        assert_eq!(page.ran(r#"["Japan","JP","Japanese"]"#), 1);
        assert_eq!(*page.reloads.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let page = ScriptedPage::default();
        let found = wait_for(&page, "main main", Duration::from_millis(1)).await.unwrap();
        assert!(!found);
    }
}
