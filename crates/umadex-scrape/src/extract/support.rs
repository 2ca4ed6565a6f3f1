//! Support card page parsers.

use super::{caption_scope, find_captions};
use crate::dom::locator::SupportLocators;
use crate::dom::{Document, Handle, Locator, NodeId};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// How far a skill icon may sit below the tile holding the skill name.
const MAX_TILE_CLIMB: usize = 6;

/// A hint tile read from the page, before any popup lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintTile {
    pub name: String,
    /// Empty when the tile carries no skill link.
    pub skill_id: String,
    pub hint_level: Option<u8>,
    /// First element inside the tile that owns a tooltip.
    pub overlay: Option<Handle>,
}

/// Rarity tier from a card name like `Kitasan Black (SSR)`.
pub fn rarity(name: &str) -> String {
    static RARITY: OnceLock<Regex> = OnceLock::new();
    let re = RARITY.get_or_init(|| Regex::new(r"(?i)\((SSR|SR|R)\)").expect("valid regex"));
    re.captures(name)
        .map(|c| c[1].to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Slug (last path segment) and numeric id (first run of 4+ digits in the
/// slug) of a card URL.
pub fn slug_and_id(link: &str) -> (String, Option<String>) {
    let path = match url::Url::parse(link) {
        Ok(u) => u.path().to_string(),
        Err(_) => link.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let slug = path
        .split('/')
        .filter(|p| !p.is_empty())
        .last()
        .unwrap_or_default()
        .to_string();
    (slug.clone(), numeric_id(&slug))
}

fn numeric_id(slug: &str) -> Option<String> {
    static ID: OnceLock<Regex> = OnceLock::new();
    let re = ID.get_or_init(|| Regex::new(r"\d{4,}").expect("valid regex"));
    re.find(slug).map(|m| m.as_str().to_string())
}

/// Card id embedded in an image file name (`support_card_s_30024.png`).
pub fn id_from_img_src(src: &str) -> Option<String> {
    static IMG: OnceLock<Regex> = OnceLock::new();
    let re = IMG.get_or_init(|| {
        Regex::new(r"support_card_[a-z]_(\d+)\.(?:png|jpg|jpeg|webp)$").expect("valid regex")
    });
    re.captures(src).map(|c| c[1].to_string())
}

/// Skill id from a `/umamusume/skills/<id>` link, or empty.
pub fn skill_id_from_href(href: &str) -> String {
    let href = href.split('?').next().unwrap_or_default().trim_end_matches('/');
    if !href.contains("/umamusume/skills/") {
        return String::new();
    }
    href.rsplit('/').next().unwrap_or_default().to_string()
}

/// Hint level 0–5 from `Hint Lv. 3` or `Lv.3 hint`.
pub fn hint_level(text: &str) -> Option<u8> {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)hint\s*lv\.?\s*([0-5])").expect("valid regex"),
            Regex::new(r"(?i)lv\.?\s*([0-5])\s*hint").expect("valid regex"),
        ]
    });
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|c| c[1].parse().ok())
}

/// Card display name: the first visible element, in document order, that
/// matches any name locator and has text.
pub fn card_name(doc: &Document, loc: &SupportLocators) -> Option<String> {
    doc.elements()
        .filter(|id| loc.name.iter().any(|l| doc.matches(*id, l)))
        .filter(|id| doc.is_visible(*id))
        .map(|id| doc.text(id))
        .find(|t| !t.is_empty())
}

/// Full-size card image on the detail page.
pub fn page_image(doc: &Document, loc: &SupportLocators) -> Option<String> {
    doc.find(&loc.image)
        .and_then(|img| doc.attr(img, "src"))
        .map(str::to_string)
}

/// Hint tiles below every visible "Support hints" caption, stopping at the
/// next caption. Names are de-duplicated within one caption's scope.
pub fn hint_tiles(doc: &Document, loc: &SupportLocators) -> Vec<HintTile> {
    let bold = Locator::tag("b");
    let mut out = Vec::new();

    for caption in find_captions(doc, &loc.caption, "support hints") {
        let scope = caption_scope(doc, caption, &loc.caption);
        let scope_level = hint_level(&doc.text_in_range(scope.clone()));
        let mut seen: HashSet<String> = HashSet::new();

        let icons = scope
            .clone()
            .map(NodeId)
            .filter(|id| doc.matches(*id, &loc.skill_icon) && doc.is_visible(*id));

        for icon in icons {
            let Some(tile) = climb_to_tile(doc, icon, &bold) else {
                continue;
            };
            let name = doc
                .find_in(tile, &bold)
                .map(|b| doc.text(b))
                .unwrap_or_default();
            if name.is_empty() || seen.contains(&name) {
                continue;
            }

            let skill_id = doc
                .find_all_in(tile, &loc.skill_link)
                .into_iter()
                .filter_map(|a| doc.attr(a, "href"))
                .map(skill_id_from_href)
                .find(|id| !id.is_empty())
                .unwrap_or_default();

            let overlay = std::iter::once(tile)
                .chain(doc.descendants(tile))
                .find(|id| doc.element(*id).is_some_and(|e| e.overlay))
                .and_then(|id| doc.handle(id));

            let hint_level = hint_level(&doc.text(tile)).or(scope_level);

            seen.insert(name.clone());
            out.push(HintTile {
                name,
                skill_id,
                hint_level,
                overlay,
            });
        }
    }
    out
}

/// Skill id from a snapshot of a tile's tooltip.
pub fn skill_id_in_popup(popup: &Document, loc: &SupportLocators) -> String {
    popup
        .find_all(&loc.skill_link)
        .into_iter()
        .filter_map(|a| popup.attr(a, "href"))
        .map(skill_id_from_href)
        .find(|id| !id.is_empty())
        .unwrap_or_default()
}

fn climb_to_tile(doc: &Document, icon: NodeId, bold: &Locator) -> Option<NodeId> {
    let mut tile = icon;
    for _ in 0..MAX_TILE_CLIMB {
        if doc.find_in(tile, bold).is_some() {
            return Some(tile);
        }
        tile = doc.parent(tile)?;
    }
    doc.find_in(tile, bold).map(|_| tile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::LocatorSet;

    fn loc() -> SupportLocators {
        LocatorSet::embedded().unwrap().support
    }

    const ICON: &str = "https://gametora.com/images/umamusume/skill_icons/utx_ico_skill_10011.png";

    fn tile(name: &str, link: Option<&str>, extra: &str) -> String {
        let link = link
            .map(|l| format!(r#"<a href="{l}">more</a>"#))
            .unwrap_or_default();
        format!(
            r#"<div class="tile"><div><div><img src="{ICON}"></div></div><div><b>{name}</b>{link}{extra}</div></div>"#
        )
    }

    #[test]
    fn test_hint_tiles_stop_at_next_caption() {
        let html = format!(
            r#"<h1>Kitasan Black (SSR)</h1>
            <div class="supports_infobox_caption__a">Support hints</div>
            <div>{a}{b}{a_again}</div>
            <div>Hint Lv. 3</div>
            <div class="supports_infobox_caption__a">Skills from events</div>
            {c}"#,
            a = tile("Corner Recovery", Some("https://gametora.com/umamusume/skills/200331?l=en"), ""),
            b = tile("Straightaway Adept", None, r#"<span data-overlay>?</span>"#),
            a_again = tile("Corner Recovery", None, ""),
            c = tile("Event Skill", Some("/umamusume/skills/999"), ""),
        );
        let doc = Document::from_html(&html);
        let tiles = hint_tiles(&doc, &loc());

        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].name, "Corner Recovery");
        assert_eq!(tiles[0].skill_id, "200331");
        assert_eq!(tiles[0].hint_level, Some(3));
        assert!(tiles[0].overlay.is_none());

        assert_eq!(tiles[1].name, "Straightaway Adept");
        assert_eq!(tiles[1].skill_id, "");
        assert!(tiles[1].overlay.is_some());
    }

    #[test]
    fn test_tile_level_beats_scope_level() {
        let html = format!(
            r#"<div class="supports_infobox_caption__a">Support hints</div>
            {t}<div>Hint Lv. 1</div>"#,
            t = tile("Focus", None, "<i>Lv. 4 hint</i>"),
        );
        let doc = Document::from_html(&html);
        let tiles = hint_tiles(&doc, &loc());
        assert_eq!(tiles[0].hint_level, Some(4));
    }

    #[test]
    fn test_no_caption_no_tiles() {
        let doc = Document::from_html(&tile("Focus", None, ""));
        assert!(hint_tiles(&doc, &loc()).is_empty());
    }

    #[test]
    fn test_card_name_and_rarity() {
        let doc = Document::from_html(
            r#"<h1 hidden>Ghost</h1><h1>Kitasan Black (ssr)</h1>"#,
        );
        let name = card_name(&doc, &loc()).unwrap();
        assert_eq!(name, "Kitasan Black (ssr)");
        assert_eq!(rarity(&name), "SSR");
        assert_eq!(rarity("Nice Nature (R)"), "R");
        assert_eq!(rarity("Nice Nature"), "UNKNOWN");
    }

    #[test]
    fn test_url_helpers() {
        assert_eq!(
            slug_and_id("https://gametora.com/umamusume/supports/30028-kitasan-black/"),
            ("30028-kitasan-black".to_string(), Some("30028".to_string()))
        );
        assert_eq!(slug_and_id("/umamusume/supports/tazuna"), ("tazuna".to_string(), None));
        assert_eq!(
            id_from_img_src("https://x/images/umamusume/supports/support_card_s_30024.png"),
            Some("30024".to_string())
        );
        assert_eq!(id_from_img_src("support_card_s_30024.gif"), None);
        assert_eq!(skill_id_from_href("https://gametora.com/umamusume/skills/200012/?l=1"), "200012");
        assert_eq!(skill_id_from_href("https://gametora.com/umamusume/characters/1"), "");
    }

    #[test]
    fn test_hint_level_patterns() {
        assert_eq!(hint_level("Hint Lv.2"), Some(2));
        assert_eq!(hint_level("hint lv 5"), Some(5));
        assert_eq!(hint_level("Lv. 0 Hint"), Some(0));
        assert_eq!(hint_level("Hint Lv. 7"), None);
        assert_eq!(hint_level("no level"), None);
    }

    #[test]
    fn test_skill_id_in_popup() {
        let popup = Document::from_html(
            r#"<div><a href="/umamusume/characters/1">x</a><a href="/umamusume/skills/100451">Skill</a></div>"#,
        );
        assert_eq!(skill_id_in_popup(&popup, &loc()), "100451");
    }
}
