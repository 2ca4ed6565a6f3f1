//! Build a [`Document`] from static markup.
//!
//! Static HTML has no layout, so an element counts as rendered unless it
//! carries the `hidden` attribute or an inline style with `display:none`,
//! `visibility:hidden` or `opacity:0`. Elements with a `data-overlay`
//! attribute are treated as tooltip anchors. Handles are assigned from the
//! node index.

use super::{Document, Element, Handle, NodeId, NodeKind};
use scraper::{Html, Node};
use std::collections::HashMap;

impl Document {
    /// Parse a full HTML document or fragment.
    pub fn from_html(html: &str) -> Document {
        let parsed = Html::parse_document(html);
        let mut index = HashMap::new();
        let mut items: Vec<(NodeKind, Option<NodeId>)> = Vec::new();

        for node in parsed.tree.root().descendants() {
            let kind = match node.value() {
                Node::Element(e) => {
                    let attrs = e
                        .attrs()
                        .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                        .collect::<std::collections::BTreeMap<_, _>>();
                    let rendered = !attrs.contains_key("hidden")
                        && !attrs.get("style").is_some_and(|s| style_hides(s));
                    NodeKind::Element(Element {
                        tag: e.name().to_ascii_lowercase(),
                        classes: e.classes().map(str::to_string).collect(),
                        overlay: attrs.contains_key("data-overlay"),
                        handle: Some(Handle(items.len() as u64)),
                        attrs,
                        rendered,
                    })
                }
                Node::Text(t) => NodeKind::Text(t.text.to_string()),
                _ => continue,
            };

            let parent = node
                .ancestors()
                .find_map(|a| index.get(&a.id()).copied())
                .map(NodeId);
            index.insert(node.id(), items.len());
            items.push((kind, parent));
        }

        // Parents always precede children in a descendants() walk.
        Document::from_ordered(items).unwrap_or_default()
    }
}

fn style_hides(style: &str) -> bool {
    let compact: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    compact.split(';').any(|decl| {
        matches!(
            decl,
            "display:none" | "visibility:hidden" | "opacity:0" | "opacity:0.0"
        )
    })
}
