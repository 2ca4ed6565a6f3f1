//! Structural locators.
//!
//! The site's class names carry per-build hash suffixes
//! (`characters_infobox_caption__x1Yz2`), so elements are matched by tag,
//! stable class prefix and attribute substrings rather than exact
//! selectors. The concrete locators live in `locators.json`, embedded at
//! compile time, so a layout change is a data edit.

use super::Element;
use serde::Deserialize;

/// Raw JSON content of the locator configuration.
const LOCATORS_JSON: &str = include_str!("locators.json");

/// Attribute substring predicate, like CSS `[name*="contains"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttrMatch {
    pub name: String,
    pub contains: String,
}

/// Predicate over a single element. Every present field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Locator {
    #[serde(default)]
    pub tag: Option<String>,
    /// Some class token must start with this prefix.
    #[serde(default)]
    pub class_prefix: Option<String>,
    #[serde(default)]
    pub attr: Option<AttrMatch>,
    /// Exact `id` attribute.
    #[serde(default)]
    pub id: Option<String>,
}

impl Locator {
    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            ..Self::default()
        }
    }

    pub fn class(prefix: &str) -> Self {
        Self {
            class_prefix: Some(prefix.to_string()),
            ..Self::default()
        }
    }

    pub fn id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_ascii_lowercase());
        self
    }

    pub fn with_attr(mut self, name: &str, contains: &str) -> Self {
        self.attr = Some(AttrMatch {
            name: name.to_string(),
            contains: contains.to_string(),
        });
        self
    }

    pub fn matches(&self, el: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !el.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(prefix) = &self.class_prefix {
            if !el.classes.iter().any(|c| c.starts_with(prefix.as_str())) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attrs.get("id") != Some(id) {
                return false;
            }
        }
        if let Some(attr) = &self.attr {
            match el.attrs.get(&attr.name) {
                Some(v) if v.contains(attr.contains.as_str()) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Locators for the character pages.
#[derive(Debug, Clone, Deserialize)]
pub struct CharacterLocators {
    pub caption: Locator,
    pub stats_block: Locator,
    pub row: Locator,
    pub row_split: Locator,
    pub bold_text: Locator,
    pub name: Locator,
    pub top: Locator,
    pub top_item: Locator,
    pub objective_box: Locator,
    pub objective: Locator,
    pub objective_text: Locator,
    pub listing_anchor: Locator,
}

/// Locators for the support card pages.
#[derive(Debug, Clone, Deserialize)]
pub struct SupportLocators {
    pub caption: Locator,
    pub skill_icon: Locator,
    pub skill_link: Locator,
    /// Any of these may hold the card name; the first visible one with
    /// text in document order wins.
    pub name: Vec<Locator>,
    pub image: Locator,
    pub listing_anchor: Locator,
}

/// Locators for event lists and their tooltips.
#[derive(Debug, Clone, Deserialize)]
pub struct EventLocators {
    pub list: Locator,
    pub item: Locator,
    pub popup_table: Locator,
    pub popup_cells: Locator,
    pub popup_cell: Locator,
}

/// Locators for the career scenario selector.
#[derive(Debug, Clone, Deserialize)]
pub struct CareerLocators {
    pub scenario_entries: Locator,
}

/// Locators for the race list and detail dialog.
#[derive(Debug, Clone, Deserialize)]
pub struct RaceLocators {
    pub list: Locator,
    pub row: Locator,
    pub name: Locator,
    pub name_item: Locator,
    pub date: Locator,
    pub desc_right: Locator,
    pub tab_text: Locator,
    pub details_ribbon: Locator,
    pub details_link: Locator,
    pub dialog: Locator,
    pub det_item: Locator,
    pub schedule_item: Locator,
}

/// CSS selectors used for live clicks inside the page.
#[derive(Debug, Clone, Deserialize)]
pub struct Controls {
    pub cookie_accept: String,
    pub settings_button: String,
    pub settings_labels: String,
    pub keep_raw_en: String,
    pub scenario_box: String,
    pub scenario_button: String,
    pub listing_ready: String,
    pub character_name: String,
    pub race_list: String,
    pub race_dialog: String,
    pub race_dialog_close: String,
}

/// Every locator the pipelines use.
#[derive(Debug, Clone, Deserialize)]
pub struct LocatorSet {
    pub character: CharacterLocators,
    pub support: SupportLocators,
    pub event: EventLocators,
    pub career: CareerLocators,
    pub race: RaceLocators,
    pub controls: Controls,
}

impl LocatorSet {
    /// Parse the embedded configuration.
    pub fn embedded() -> Result<Self, serde_json::Error> {
        serde_json::from_str(LOCATORS_JSON)
    }
}
