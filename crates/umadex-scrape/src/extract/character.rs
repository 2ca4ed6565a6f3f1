//! Character page parsers.

use super::{blocks_after, find_caption, first_int};
use crate::dom::locator::CharacterLocators;
use crate::dom::{Document, Locator, NodeId};
use crate::records::{Aptitudes, Objective, StatLine, ThreeSizes};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Everything read from a character page except its events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterSheet {
    pub name: String,
    pub nickname: Option<String>,
    pub base_stars: Option<u32>,
    pub base_stats: BTreeMap<String, StatLine>,
    pub stat_bonuses: StatLine,
    pub aptitudes: Aptitudes,
    pub height_cm: Option<u32>,
    pub three_sizes: Option<ThreeSizes>,
    pub objectives: Vec<Objective>,
}

/// Number of star glyphs, preferring the emoji form.
pub fn count_stars(text: &str) -> u32 {
    match text.matches('⭐').count() {
        0 => text.matches('★').count() as u32,
        n => n as u32,
    }
}

/// Read the whole sheet. Returns `None` when the page shows no name.
pub fn parse(doc: &Document, loc: &CharacterLocators) -> Option<CharacterSheet> {
    let name = name(doc, loc)?;
    let (nickname, stars) = top_meta(doc, loc);

    let mut base = BTreeMap::new();
    if let Some(cap) = find_caption(doc, &loc.caption, "base stats") {
        let blocks = blocks_after(doc, cap, &loc.caption, &loc.stats_block);
        for (idx, block) in blocks.into_iter().take(2).enumerate() {
            let (tier, stats) = base_stats(doc, block, loc);
            let tier = tier.unwrap_or(if idx == 0 { 3 } else { 5 });
            if !stats.is_empty() {
                base.insert(format!("{tier}★"), stats);
            }
        }
    }

    let stat_bonuses = find_caption(doc, &loc.caption, "stat bonuses")
        .and_then(|cap| {
            blocks_after(doc, cap, &loc.caption, &loc.stats_block)
                .first()
                .copied()
        })
        .map(|block| stat_bonuses(doc, block, loc))
        .unwrap_or_default();

    let aptitudes = find_caption(doc, &loc.caption, "aptitude")
        .map(|cap| aptitudes(doc, &blocks_after(doc, cap, &loc.caption, &loc.stats_block), loc))
        .unwrap_or_default();

    Some(CharacterSheet {
        name,
        nickname,
        base_stars: (stars > 0).then_some(stars),
        base_stats: base,
        stat_bonuses,
        aptitudes,
        height_cm: label_value(doc, loc, "Height").and_then(|v| height_cm(&v)),
        three_sizes: label_value(doc, loc, "Three sizes").and_then(|v| three_sizes(&v)),
        objectives: objectives(doc, loc),
    })
}

/// Character name from the info box link.
pub fn name(doc: &Document, loc: &CharacterLocators) -> Option<String> {
    let holder = doc.find(&loc.name)?;
    let link = doc
        .element_children(holder)
        .find(|c| doc.tag(*c) == Some("a"))?;
    let name = doc.text(link).replace('\n', "");
    (!name.is_empty()).then_some(name)
}

/// Nickname (first non-star item) and base star count from the top box.
pub fn top_meta(doc: &Document, loc: &CharacterLocators) -> (Option<String>, u32) {
    let Some(top) = doc.find(&loc.top) else {
        return (None, 0);
    };
    let mut nickname = None;
    let mut stars = 0;
    for item in doc.find_all_in(top, &loc.top_item) {
        let text = doc.text(item);
        if text.is_empty() {
            continue;
        }
        if text.contains('⭐') || text.contains('★') {
            stars = stars.max(count_stars(&text));
        } else if nickname.is_none() {
            nickname = Some(text);
        }
    }
    (nickname, stars)
}

/// One base-stats block: star tier from the glyph row, stats from the
/// split cells.
pub fn base_stats(doc: &Document, block: NodeId, loc: &CharacterLocators) -> (Option<u32>, StatLine) {
    let tier = doc
        .find_in(block, &loc.row)
        .and_then(|row| doc.find_in(row, &Locator::tag("span")))
        .map(|span| count_stars(&doc.text(span)))
        .filter(|n| *n > 0);

    let mut stats = StatLine::new();
    for split in doc.find_all_in(block, &loc.row_split) {
        let Some(stat) = stat_name(doc, split) else {
            continue;
        };
        let value = doc
            .find_all_in(split, &Locator::tag("div"))
            .into_iter()
            .filter_map(|d| unsigned_int(&doc.text(d)))
            .last();
        if let Some(v) = value {
            stats.insert(stat, v);
        }
    }
    (tier, stats)
}

/// The single stat-bonus block. A literal `-` reads as zero.
pub fn stat_bonuses(doc: &Document, block: NodeId, loc: &CharacterLocators) -> StatLine {
    let mut out = StatLine::new();
    for split in doc.find_all_in(block, &loc.row_split) {
        let Some(stat) = stat_name(doc, split) else {
            continue;
        };
        let raw = doc
            .find_all_in(split, &Locator::tag("div"))
            .into_iter()
            .map(|d| doc.text(d))
            .filter(|t| t.contains('%') || t == "-" || t.chars().any(|c| c.is_ascii_digit()))
            .last()
            .unwrap_or_default();
        let value = if raw == "-" { 0 } else { first_int(&raw).unwrap_or(0) };
        out.insert(stat, value);
    }
    out
}

/// Aptitude blocks: bold title, then `label → grade` from two-cell rows.
pub fn aptitudes(doc: &Document, blocks: &[NodeId], loc: &CharacterLocators) -> Aptitudes {
    let mut out = Aptitudes::new();
    for &block in blocks {
        let title = doc
            .find_in(block, &loc.bold_text)
            .map(|t| doc.text(t))
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }

        let mut section = BTreeMap::new();
        for row in doc.find_all_in(block, &loc.row) {
            for split in doc.find_all_in(row, &loc.row_split) {
                let cells = doc.find_all_in(split, &Locator::tag("div"));
                if cells.len() < 2 {
                    continue;
                }
                let key = doc.text(cells[0]);
                let val = doc.text(cells[cells.len() - 1]);
                if !key.is_empty() && !val.is_empty() {
                    section.insert(key, val);
                }
            }
        }
        if !section.is_empty() {
            out.insert(title, section);
        }
    }
    out
}

/// Visible objective cards, each read from the four text rows.
pub fn objectives(doc: &Document, loc: &CharacterLocators) -> Vec<Objective> {
    let mut out = Vec::new();
    for holder in doc.find_all(&loc.objective_box) {
        for card in doc.children_matching(holder, &loc.objective) {
            if !doc.is_visible(card) {
                continue;
            }
            let text = doc.find_in(card, &loc.objective_text);
            let field = |n: usize| {
                text.and_then(|t| doc.child_of_type(t, "div", n))
                    .map(|d| doc.text(d))
                    .unwrap_or_default()
            };
            out.push(Objective {
                name: field(1),
                turn: field(2),
                time: field(3),
                condition: field(4),
            });
        }
    }
    out
}

/// Value cell following a bold label whose text equals `label`.
pub fn label_value(doc: &Document, loc: &CharacterLocators, label: &str) -> Option<String> {
    let label_el = doc
        .find_all(&loc.bold_text)
        .into_iter()
        .find(|id| doc.text(*id) == label)?;
    let parent = doc.parent(label_el)?;
    let value = doc
        .element_children(parent)
        .filter(|c| c.0 > label_el.0)
        .find(|c| doc.tag(*c) == Some("div"))?;
    Some(doc.text(value))
}

pub fn height_cm(text: &str) -> Option<u32> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = DIGITS.get_or_init(|| Regex::new(r"\d+").expect("valid regex"));
    re.find(text)?.as_str().parse().ok()
}

pub fn three_sizes(text: &str) -> Option<ThreeSizes> {
    static SIZES: OnceLock<Regex> = OnceLock::new();
    let re = SIZES.get_or_init(|| Regex::new(r"(\d+)\s*-\s*(\d+)\s*-\s*(\d+)").expect("valid regex"));
    let caps = re.captures(text)?;
    Some(ThreeSizes {
        bust: caps[1].parse().ok()?,
        waist: caps[2].parse().ok()?,
        hip: caps[3].parse().ok()?,
    })
}

fn stat_name(doc: &Document, split: NodeId) -> Option<String> {
    doc.find_all_in(split, &Locator::tag("img"))
        .into_iter()
        .find_map(|img| doc.attr(img, "alt"))
        .filter(|alt| !alt.is_empty())
        .map(str::to_string)
}

fn unsigned_int(text: &str) -> Option<i64> {
    height_cm(text).map(i64::from)
}
