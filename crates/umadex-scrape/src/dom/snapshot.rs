//! Copying the live DOM into a [`Document`].
//!
//! A single script walks the chosen root in preorder and returns a flat
//! JSON list. Every element gets a numeric handle stored in a page-side
//! registry (`window.__umaRefs`) so later clicks and overlay calls can
//! address it again without re-querying.

use super::{Document, Element, Handle, NodeId, NodeKind};
use crate::error::ScrapeError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Where a snapshot starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotRoot<'a> {
    /// `document.body`.
    Body,
    /// First element matching a CSS selector.
    Query(&'a str),
    /// A previously snapshotted element.
    Element(Handle),
    /// The overlay popper owned by a previously snapshotted element.
    Popper(Handle),
}

/// One node as emitted by the page script.
#[derive(Debug, Clone, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub parent: Option<usize>,
    /// `None` for text nodes.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub rendered: bool,
    #[serde(default)]
    pub overlay: bool,
    #[serde(default)]
    pub handle: Option<u64>,
}

/// JavaScript expression resolving a handle to its live element (or
/// `undefined` once the page has navigated away).
pub fn handle_expr(handle: Handle) -> String {
    format!("(window.__umaRefs && window.__umaRefs.map.get({}))", handle.0)
}

const SNAPSHOT_JS: &str = r#"(() => {
  const root = __ROOT__;
  if (!root) return null;
  const refs = (window.__umaRefs = window.__umaRefs || { next: 1, map: new Map() });
  const out = [];
  const rendered = (el) => {
    const cs = getComputedStyle(el);
    if (cs.display === 'none' || cs.visibility === 'hidden') return false;
    if (parseFloat(cs.opacity) === 0) return false;
    if (cs.display === 'contents') return true;
    const r = el.getBoundingClientRect();
    return r.width > 0 && r.height > 0;
  };
  const visit = (node, parent) => {
    if (node.nodeType === Node.TEXT_NODE) {
      out.push({ parent, text: node.nodeValue });
      return;
    }
    if (node.nodeType !== Node.ELEMENT_NODE) return;
    if (!node.__umaRef) {
      node.__umaRef = refs.next++;
      refs.map.set(node.__umaRef, node);
    }
    const attrs = {};
    for (const a of node.attributes) attrs[a.name.toLowerCase()] = a.value;
    if (typeof node.href === 'string' && node.href) attrs.href = node.href;
    if (typeof node.src === 'string' && node.src) attrs.src = node.src;
    const idx = out.length;
    out.push({
      parent,
      tag: node.tagName.toLowerCase(),
      classes: Array.from(node.classList),
      attrs,
      rendered: rendered(node),
      overlay: !!node._tippy,
      handle: node.__umaRef,
    });
    for (const child of node.childNodes) visit(child, idx);
  };
  visit(root, null);
  return JSON.stringify(out);
})()"#;

/// Build the snapshot script for `root`.
pub fn snapshot_script(root: SnapshotRoot<'_>) -> String {
    let expr = match root {
        SnapshotRoot::Body => "document.body".to_string(),
        SnapshotRoot::Query(css) => format!(
            "document.querySelector({})",
            serde_json::Value::String(css.to_string())
        ),
        SnapshotRoot::Element(h) => handle_expr(h),
        SnapshotRoot::Popper(h) => {
            format!("(() => {{ const el = {}; return el && el._tippy ? el._tippy.popper : null; }})()", handle_expr(h))
        }
    };
    SNAPSHOT_JS.replace("__ROOT__", &expr)
}

impl Document {
    /// Build a document from the script output.
    pub fn from_raw(raw: Vec<RawNode>) -> Result<Document, ScrapeError> {
        let items = raw
            .into_iter()
            .map(|n| {
                let kind = match n.tag {
                    Some(tag) => NodeKind::Element(Element {
                        tag: tag.to_ascii_lowercase(),
                        classes: n.classes,
                        attrs: n.attrs,
                        rendered: n.rendered,
                        overlay: n.overlay,
                        handle: n.handle.map(Handle),
                    }),
                    None => NodeKind::Text(n.text.unwrap_or_default()),
                };
                (kind, n.parent.map(NodeId))
            })
            .collect();

        Document::from_ordered(items)
            .ok_or_else(|| ScrapeError::Script("snapshot lists a child before its parent".into()))
    }

    /// Parse the JSON string returned by [`snapshot_script`]. A `null`
    /// result (root gone) yields `None`.
    pub fn from_snapshot_json(value: &serde_json::Value) -> Result<Option<Document>, ScrapeError> {
        let text = match value {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::String(s) => s,
            other => {
                return Err(ScrapeError::Script(format!(
                    "snapshot returned {}",
                    type_name(other)
                )))
            }
        };
        let raw: Vec<RawNode> = serde_json::from_str(text)
            .map_err(|e| ScrapeError::Script(format!("snapshot payload: {e}")))?;
        Document::from_raw(raw).map(Some)
    }
}

fn type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
