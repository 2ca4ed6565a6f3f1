//! Event lists shared by character, support and career pages.

use crate::dom::locator::EventLocators;
use crate::dom::{Document, Handle, NodeId};
use std::collections::BTreeSet;

/// A visible event name with the anchor its popup hangs off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventItem {
    pub name: String,
    pub anchor: Handle,
}

/// Visible, named event items inside visible event lists, in page order.
pub fn event_items(doc: &Document, loc: &EventLocators) -> Vec<EventItem> {
    let mut seen: BTreeSet<NodeId> = BTreeSet::new();
    let mut out = Vec::new();

    for list in doc.find_all(&loc.list) {
        if !doc.is_visible(list) {
            continue;
        }
        for item in doc.find_all_in(list, &loc.item) {
            if !doc.is_visible(item) || !seen.insert(item) {
                continue;
            }
            let name = doc.text(item);
            let Some(anchor) = doc.handle(item) else {
                continue;
            };
            if !name.is_empty() {
                out.push(EventItem { name, anchor });
            }
        }
    }
    out
}
