//! Record types written to the JSON corpora.
//!
//! Field names follow the corpus format already consumed by the front-end
//! and the lookup service, hence the PascalCase renames.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One popup row of an event: a single option label mapped to its raw
/// reward text (lines separated by `\n`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    #[serde(rename = "EventName")]
    pub event_name: String,
    #[serde(rename = "EventOptions")]
    pub event_options: BTreeMap<String, String>,
}

impl EventRow {
    pub fn new(event_name: impl Into<String>, label: impl Into<String>, rewards: impl Into<String>) -> Self {
        let mut event_options = BTreeMap::new();
        event_options.insert(label.into(), rewards.into());
        Self {
            event_name: event_name.into(),
            event_options,
        }
    }
}

/// Split reward text into trimmed, non-empty lines.
pub fn reward_lines(blob: &str) -> Vec<String> {
    blob.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// A training objective from a character page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    #[serde(rename = "ObjectiveName")]
    pub name: String,
    #[serde(rename = "Turn")]
    pub turn: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "ObjectiveCondition")]
    pub condition: String,
}

/// Bust / waist / hip measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeSizes {
    #[serde(rename = "B")]
    pub bust: u32,
    #[serde(rename = "W")]
    pub waist: u32,
    #[serde(rename = "H")]
    pub hip: u32,
}

/// Stat name → value, e.g. `{"Speed": 83}`.
pub type StatLine = BTreeMap<String, i64>;

/// Aptitude title → grade label → grade, e.g. `{"Surface": {"Turf": "A"}}`.
pub type Aptitudes = BTreeMap<String, BTreeMap<String, String>>;

/// Upsert patch for `uma_data.json`, keyed by [`CharacterRecord::key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    #[serde(rename = "UmaKey")]
    pub key: String,
    #[serde(rename = "UmaName")]
    pub name: String,
    #[serde(rename = "UmaNickname")]
    pub nickname: Option<String>,
    #[serde(rename = "UmaSlug")]
    pub slug: String,
    #[serde(rename = "UmaId")]
    pub id: Option<String>,
    #[serde(rename = "UmaBaseStars")]
    pub base_stars: Option<u32>,
    /// Keyed by star tier label, e.g. `"3★"`.
    #[serde(rename = "UmaBaseStats")]
    pub base_stats: BTreeMap<String, StatLine>,
    #[serde(rename = "UmaStatBonuses")]
    pub stat_bonuses: StatLine,
    #[serde(rename = "UmaAptitudes")]
    pub aptitudes: Aptitudes,
    #[serde(rename = "UmaHeightCm")]
    pub height_cm: Option<u32>,
    #[serde(rename = "UmaThreeSizes")]
    pub three_sizes: Option<ThreeSizes>,
    #[serde(rename = "UmaObjectives")]
    pub objectives: Vec<Objective>,
    #[serde(rename = "UmaEvents")]
    pub events: Vec<EventRow>,
}

/// Composite identity for a character variant.
pub fn character_key(name: &str, nickname: Option<&str>, slug: Option<&str>) -> String {
    match (nickname.filter(|n| !n.is_empty()), slug.filter(|s| !s.is_empty())) {
        (Some(nick), _) => format!("{name} :: {nick}"),
        (None, Some(slug)) => format!("{name} :: {slug}"),
        (None, None) => name.to_string(),
    }
}

/// A skill hinted by a support card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintSkill {
    /// Empty when neither the tile nor its tooltip exposes a skill link.
    #[serde(rename = "SkillId")]
    pub skill_id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "HintLevel")]
    pub hint_level: Option<u8>,
}

/// Upsert patch for `support_hints.json`, keyed by slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportCardRecord {
    #[serde(rename = "SupportSlug")]
    pub slug: String,
    #[serde(rename = "SupportId")]
    pub id: Option<String>,
    #[serde(rename = "SupportName")]
    pub name: String,
    #[serde(rename = "SupportRarity")]
    pub rarity: String,
    #[serde(rename = "SupportImage")]
    pub image: String,
    #[serde(rename = "SupportHints")]
    pub hints: Vec<HintSkill>,
}

/// One row of `races.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceRecord {
    #[serde(rename = "RaceName")]
    pub name: String,
    #[serde(rename = "Schedule")]
    pub schedule: String,
    #[serde(rename = "Grade")]
    pub grade: String,
    #[serde(rename = "Terrain")]
    pub terrain: String,
    #[serde(rename = "DistanceType")]
    pub distance_type: String,
    #[serde(rename = "DistanceMeter")]
    pub distance_meter: String,
    #[serde(rename = "Season")]
    pub season: String,
    #[serde(rename = "FansRequired")]
    pub fans_required: String,
    #[serde(rename = "FansGained")]
    pub fans_gained: String,
}

impl RaceRecord {
    /// Debut and maiden races have no fixed date or track; they are stored
    /// with a placeholder row.
    pub fn pre_debut(name: &str) -> Self {
        let varies = || "Varies".to_string();
        Self {
            name: name.to_string(),
            schedule: "Junior Year Pre-Debut".to_string(),
            grade: "Pre Debut".to_string(),
            terrain: varies(),
            distance_type: varies(),
            distance_meter: varies(),
            season: varies(),
            fans_required: varies(),
            fans_gained: varies(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_key_variants() {
        assert_eq!(character_key("Special Week", None, None), "Special Week");
        assert_eq!(
            character_key("Special Week", Some("Summer"), Some("100102-special-week")),
            "Special Week :: Summer"
        );
        assert_eq!(
            character_key("Special Week", Some(""), Some("100101-special-week")),
            "Special Week :: 100101-special-week"
        );
    }

    #[test]
    fn test_reward_lines_drop_blanks() {
        let lines = reward_lines("  Speed +10 \n\n Skill points +15\r\n   \n");
        assert_eq!(lines, vec!["Speed +10", "Skill points +15"]);
    }

    #[test]
    fn test_event_row_shape() {
        let row = EventRow::new("Fan Appreciation", "Top Option", "Energy +10");
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["EventName"], "Fan Appreciation");
        assert_eq!(json["EventOptions"]["Top Option"], "Energy +10");
    }

    #[test]
    fn test_pre_debut_row() {
        let r = RaceRecord::pre_debut("Junior Make Debut");
        assert_eq!(r.schedule, "Junior Year Pre-Debut");
        assert_eq!(r.grade, "Pre Debut");
        assert_eq!(r.fans_gained, "Varies");
    }
}
