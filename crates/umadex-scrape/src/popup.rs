//! Tooltip popups attached to event names and skill tiles.
//!
//! The site builds its tooltips with tippy.js; each anchor element carries
//! an `_tippy` instance. Popups are forced open in manual mode, their
//! popper element is snapshotted, and they are always hidden again.

use crate::dom::locator::EventLocators;
use crate::dom::snapshot::{handle_expr, SnapshotRoot};
use crate::dom::{Document, Handle};
use crate::error::Result;
use crate::live::controls;
use crate::renderer::RenderContext;
use std::time::Duration;

/// One popup row: option label (empty for bare values) and reward text.
pub type PopupRow = (String, String);

pub struct PopupResolver<'a> {
    page: &'a dyn RenderContext,
    settle: Duration,
}

impl<'a> PopupResolver<'a> {
    pub fn new(page: &'a dyn RenderContext, settle: Duration) -> Self {
        Self { page, settle }
    }

    /// Show the anchor's popup and snapshot it. `None` when the anchor is
    /// gone or has no tooltip.
    pub async fn open(&self, anchor: Handle) -> Result<Option<Document>> {
        let script = format!(
            r#"(() => {{
  const el = {};
  if (!el || !el._tippy) return false;
  el._tippy.setProps({{ trigger: 'manual', allowHTML: true, interactive: true, placement: 'bottom' }});
  el._tippy.show();
  return true;
}})()"#,
            handle_expr(anchor)
        );
        let shown = self.page.execute_js(&script).await?.as_bool().unwrap_or(false);
        if !shown {
            return Ok(None);
        }
        tokio::time::sleep(self.settle).await;
        controls::snapshot(self.page, SnapshotRoot::Popper(anchor)).await
    }

    pub async fn close(&self, anchor: Handle) -> Result<()> {
        let script = format!(
            "(() => {{ const el = {}; if (el && el._tippy) el._tippy.hide(); }})()",
            handle_expr(anchor)
        );
        self.page.execute_js(&script).await?;
        Ok(())
    }

    /// Open, snapshot and close. The popup is hidden on every path; an
    /// error from `open` wins over one from `close`.
    pub async fn read_snapshot(&self, anchor: Handle) -> Result<Option<Document>> {
        let opened = self.open(anchor).await;
        let closed = self.close(anchor).await;
        let doc = opened?;
        closed?;
        Ok(doc)
    }

    /// Read an event popup into rows.
    pub async fn read(&self, anchor: Handle, loc: &EventLocators) -> Result<Vec<PopupRow>> {
        Ok(self
            .read_snapshot(anchor)
            .await?
            .map(|doc| parse(&doc, loc))
            .unwrap_or_default())
    }
}

/// Rows of a popup snapshot.
///
/// A two-column table gives one row per table row; otherwise every child
/// of the value cells is a bare value; otherwise a single cell is. Labels
/// may repeat, so rows are never merged.
pub fn parse(popup: &Document, loc: &EventLocators) -> Vec<PopupRow> {
    let mut rows = Vec::new();

    let table_rows: Vec<_> = popup
        .find_all(&loc.popup_table)
        .into_iter()
        .flat_map(|table| {
            popup
                .element_children(table)
                .filter(|&c| popup.tag(c) == Some("tbody"))
                .flat_map(|body| popup.element_children(body).filter(|&r| popup.tag(r) == Some("tr")))
                .collect::<Vec<_>>()
        })
        .collect();

    if !table_rows.is_empty() {
        for tr in table_rows {
            let (Some(label), Some(value)) = (
                popup.child_of_type(tr, "td", 1),
                popup.child_of_type(tr, "td", 2),
            ) else {
                continue;
            };
            let (label, value) = (popup.text(label), popup.text(value));
            if !label.is_empty() || !value.is_empty() {
                rows.push((label, value));
            }
        }
        return rows;
    }

    let cells: Vec<_> = popup
        .find_all(&loc.popup_cells)
        .into_iter()
        .flat_map(|cell| {
            popup
                .element_children(cell)
                .filter(|&c| popup.tag(c) == Some("div"))
                .collect::<Vec<_>>()
        })
        .collect();

    if !cells.is_empty() {
        rows.extend(
            cells
                .into_iter()
                .map(|c| popup.text(c))
                .filter(|t| !t.is_empty())
                .map(|t| (String::new(), t)),
        );
        return rows;
    }

    if let Some(single) = popup.find(&loc.popup_cell) {
        let text = popup.text(single);
        if !text.is_empty() {
            rows.push((String::new(), text));
        }
    }
    rows
}
