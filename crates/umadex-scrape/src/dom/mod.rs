//! Snapshot document model.
//!
//! The live page is never queried element by element. Instead one script
//! evaluation copies the DOM into a [`Document`]: a flat arena in which a
//! node's index *is* its position in document order and every subtree
//! occupies a contiguous index range. Forward "document order" walks are
//! therefore plain index ranges, and all extraction logic runs in Rust
//! against the snapshot. Elements carry a [`Handle`] so the few live
//! interactions (clicks, overlays) can address the original node.

pub mod html;
pub mod locator;
pub mod snapshot;

pub use locator::{AttrMatch, Locator, LocatorSet};

use std::collections::BTreeMap;

/// Index of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// Reference to the live element a snapshot node was copied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

/// An element node.
#[derive(Debug, Clone, Default)]
pub struct Element {
    /// Lowercase tag name.
    pub tag: String,
    pub classes: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    /// Own rendering state: non-zero box, not `display:none`,
    /// not `visibility:hidden`, non-zero opacity.
    pub rendered: bool,
    /// Whether the element owns an overlay (tooltip) instance.
    pub overlay: bool,
    pub handle: Option<Handle>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Exclusive end of this node's subtree.
    end: usize,
    /// Rendered and every ancestor rendered.
    visible: bool,
}

/// Tags that break lines when computing rendered text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "tbody", "thead", "tfoot", "tr", "ul",
];

/// Tags whose text never renders.
const SILENT_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// A snapshot of (part of) a rendered page.
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Build from nodes listed in document order with parent links.
    ///
    /// Parents must precede their children; subtree ranges and effective
    /// visibility are derived here.
    pub(crate) fn from_ordered(items: Vec<(NodeKind, Option<NodeId>)>) -> Option<Self> {
        let mut nodes: Vec<Node> = Vec::with_capacity(items.len());
        for (idx, (kind, parent)) in items.into_iter().enumerate() {
            if parent.is_some_and(|p| p.0 >= idx) {
                return None;
            }
            let own = match &kind {
                NodeKind::Element(e) => e.rendered,
                NodeKind::Text(_) => true,
            };
            let visible = own && parent.map_or(true, |p| nodes[p.0].visible);
            nodes.push(Node {
                kind,
                parent,
                end: idx + 1,
                visible,
            });
        }

        for idx in (0..nodes.len()).rev() {
            if let Some(p) = nodes[idx].parent {
                let end = nodes[idx].end;
                if nodes[p.0].end < end {
                    nodes[p.0].end = end;
                }
            }
        }

        Some(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(e) => Some(e),
            NodeKind::Text(_) => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attrs.get(name).map(String::as_str)
    }

    pub fn handle(&self, id: NodeId) -> Option<Handle> {
        self.element(id)?.handle
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    /// Node and all of its ancestors are rendered.
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| n.visible)
    }

    /// All element ids in document order.
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.elements_in_range(0, self.nodes.len())
    }

    /// Element descendants of `id` in document order (excluding `id`).
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let end = self.nodes.get(id.0).map_or(id.0, |n| n.end);
        self.elements_in_range(id.0 + 1, end)
    }

    /// Elements that come after the whole subtree of `id`, in document order.
    pub fn following(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let start = self.subtree_end(id);
        self.elements_in_range(start, self.nodes.len())
    }

    /// Exclusive end index of the subtree rooted at `id`.
    pub fn subtree_end(&self, id: NodeId) -> usize {
        self.nodes.get(id.0).map_or(self.nodes.len(), |n| n.end)
    }

    /// Whether `id` lies inside the subtree rooted at `ancestor`.
    pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        id.0 > ancestor.0 && id.0 < self.subtree_end(ancestor)
    }

    /// Direct children (elements and text) of `id`.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let end = self.subtree_end(id);
        let mut next = id.0 + 1;
        std::iter::from_fn(move || {
            if next >= end {
                return None;
            }
            let cur = next;
            next = self.nodes[cur].end;
            Some(NodeId(cur))
        })
    }

    /// Direct element children of `id`.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(move |c| self.element(*c).is_some())
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |p| self.parent(*p))
    }

    fn elements_in_range(&self, start: usize, end: usize) -> impl Iterator<Item = NodeId> + '_ {
        (start..end.min(self.nodes.len()))
            .filter(move |i| matches!(self.nodes[*i].kind, NodeKind::Element(_)))
            .map(NodeId)
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn matches(&self, id: NodeId, locator: &Locator) -> bool {
        self.element(id).is_some_and(|e| locator.matches(e))
    }

    /// First element in the whole document matching `locator`.
    pub fn find(&self, locator: &Locator) -> Option<NodeId> {
        self.elements().find(|id| self.matches(*id, locator))
    }

    pub fn find_all(&self, locator: &Locator) -> Vec<NodeId> {
        self.elements().filter(|id| self.matches(*id, locator)).collect()
    }

    /// First descendant of `scope` matching `locator`.
    pub fn find_in(&self, scope: NodeId, locator: &Locator) -> Option<NodeId> {
        self.descendants(scope).find(|id| self.matches(*id, locator))
    }

    pub fn find_all_in(&self, scope: NodeId, locator: &Locator) -> Vec<NodeId> {
        self.descendants(scope).filter(|id| self.matches(*id, locator)).collect()
    }

    /// Direct element children of `id` matching `locator`.
    pub fn children_matching(&self, id: NodeId, locator: &Locator) -> Vec<NodeId> {
        self.element_children(id).filter(|c| self.matches(*c, locator)).collect()
    }

    /// 1-based position among element siblings sharing the same tag, like
    /// CSS `:nth-of-type`.
    pub fn nth_of_type(&self, id: NodeId) -> usize {
        let (Some(tag), Some(parent)) = (self.tag(id), self.parent(id)) else {
            return 1;
        };
        self.element_children(parent)
            .take_while(|c| *c != id)
            .filter(|c| self.tag(*c) == Some(tag))
            .count()
            + 1
    }

    /// Next element sibling, like `following-sibling::*[1]`.
    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        self.element_children(parent).find(|c| c.0 > id.0)
    }

    /// Direct child element with the given tag at `:nth-of-type(n)`.
    pub fn child_of_type(&self, id: NodeId, tag: &str, n: usize) -> Option<NodeId> {
        self.element_children(id)
            .filter(|c| self.tag(*c) == Some(tag))
            .nth(n.checked_sub(1)?)
    }

    // ── Text ───────────────────────────────────────────────────────────

    /// Rendered-style text of a subtree. Block elements and `<br>` break
    /// lines; whitespace inside a line collapses and blank lines are
    /// dropped.
    pub fn text(&self, id: NodeId) -> String {
        let end = self.subtree_end(id);
        let mut raw = String::new();
        let mut open_blocks: Vec<usize> = Vec::new();
        let mut skip_until = 0usize;

        for i in id.0..end {
            while open_blocks.last().is_some_and(|e| *e <= i) {
                open_blocks.pop();
                raw.push('\n');
            }
            if i < skip_until {
                continue;
            }
            match &self.nodes[i].kind {
                NodeKind::Text(t) => raw.push_str(&t.replace(['\n', '\r'], " ")),
                NodeKind::Element(e) => {
                    let tag = e.tag.as_str();
                    if SILENT_TAGS.contains(&tag) {
                        skip_until = self.nodes[i].end;
                    } else if tag == "br" {
                        raw.push('\n');
                    } else if matches!(tag, "td" | "th") {
                        raw.push(' ');
                    } else if BLOCK_TAGS.contains(&tag) {
                        raw.push('\n');
                        open_blocks.push(self.nodes[i].end);
                    }
                }
            }
        }

        normalize_lines(&raw)
    }

    /// Every text node in `range`, joined with spaces.
    pub fn text_in_range(&self, range: std::ops::Range<usize>) -> String {
        let end = range.end.min(self.nodes.len());
        let raw = self.nodes[range.start.min(end)..end]
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Text(t) => Some(t.as_str()),
                NodeKind::Element(_) => None,
            })
            .collect::<Vec<_>>()
            .join(" ");
        normalize_lines(&raw)
    }

    /// Text of the direct text children only.
    pub fn own_text(&self, id: NodeId) -> String {
        let raw: String = self
            .children(id)
            .filter_map(|c| match &self.nodes[c.0].kind {
                NodeKind::Text(t) => Some(t.replace(['\n', '\r'], " ")),
                NodeKind::Element(_) => None,
            })
            .collect();
        normalize_lines(&raw)
    }
}

/// Collapse whitespace per line, trim, and drop empty lines.
pub fn normalize_lines(raw: &str) -> String {
    raw.replace('\u{a0}', " ")
        .split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
