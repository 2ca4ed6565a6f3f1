//! Caption-delimited block extraction.
//!
//! Info boxes on the site are flat runs of "caption, block, block, caption,
//! block" where the captions and blocks are distinguished only by class
//! prefix and may sit at different nesting depths. [`blocks_after`] walks
//! forward in document order from a caption and collects every visible
//! block until the next caption; the per-page parsers in the submodules
//! then read fields out of those blocks.

pub mod character;
pub mod events;
pub mod race;
pub mod support;

use crate::dom::{Document, Locator, NodeId};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// First visible caption whose text contains `phrase`, case-insensitively.
pub fn find_caption(doc: &Document, caption: &Locator, phrase: &str) -> Option<NodeId> {
    find_captions(doc, caption, phrase).into_iter().next()
}

/// Every visible caption whose text contains `phrase`, case-insensitively.
pub fn find_captions(doc: &Document, caption: &Locator, phrase: &str) -> Vec<NodeId> {
    let phrase = phrase.to_lowercase();
    doc.find_all(caption)
        .into_iter()
        .filter(|id| doc.is_visible(*id))
        .filter(|id| doc.text(*id).to_lowercase().contains(&phrase))
        .collect()
}

/// Node index range owned by `caption`: from the end of its own subtree up
/// to (excluding) the next caption, or the end of the document.
pub fn caption_scope(doc: &Document, caption_id: NodeId, caption: &Locator) -> Range<usize> {
    let start = doc.subtree_end(caption_id);
    let end = doc
        .following(caption_id)
        .find(|id| doc.matches(*id, caption))
        .map_or(doc.len(), |id| id.0);
    start..end
}

/// Visible blocks between `caption_id` and the next caption.
///
/// A collected block's own subtree is not searched for further blocks.
pub fn blocks_after(
    doc: &Document,
    caption_id: NodeId,
    caption: &Locator,
    block: &Locator,
) -> Vec<NodeId> {
    let scope = caption_scope(doc, caption_id, caption);
    let mut out = Vec::new();
    let mut i = scope.start;
    while i < scope.end {
        let id = NodeId(i);
        if doc.is_visible(id) && doc.matches(id, block) {
            out.push(id);
            i = doc.subtree_end(id);
        } else {
            i += 1;
        }
    }
    out
}

/// First signed integer in `text`.
pub(crate) fn first_int(text: &str) -> Option<i64> {
    static INT: OnceLock<Regex> = OnceLock::new();
    let re = INT.get_or_init(|| Regex::new(r"-?\d+").expect("valid regex"));
    re.find(text)?.as_str().parse().ok()
}
