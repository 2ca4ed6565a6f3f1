//! Corpus behaviour across re-runs: what a second pass over the same pages
//! leaves on disk.

use std::collections::{BTreeMap, HashSet};
use std::fs;

use serde_json::Value;
use umadex_scrape::pipeline::event_dedup;
use umadex_scrape::pipeline::races::race_dedup;
use umadex_scrape::records::{character_key, CharacterRecord, EventRow, RaceRecord};
use umadex_scrape::store;

fn events() -> Vec<EventRow> {
    vec![
        EventRow::new("Fan Appreciation", "Top Option", "Speed +10\nSkill points +15"),
        EventRow::new("Fan Appreciation", "Bottom Option", "Stamina +10"),
        EventRow::new("New Year's Resolutions", "", "Energy +20"),
        // Same label repeated in one popup stays distinct by reward text.
        EventRow::new("New Year's Resolutions", "", "Mood +1"),
    ]
}

#[test]
fn rerun_of_append_only_corpus_adds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("support_card.json");
    let key = event_dedup();

    let first: usize = events()
        .iter()
        .map(|row| store::append(&path, row, Some(&key)).unwrap() as usize)
        .sum();
    assert_eq!(first, 4);
    let committed = fs::read(&path).unwrap();

    let second: usize = events()
        .iter()
        .rev()
        .map(|row| store::append(&path, row, Some(&key)).unwrap() as usize)
        .sum();
    assert_eq!(second, 0);
    assert_eq!(fs::read(&path).unwrap(), committed);

    let stored = store::load(&path);
    let projections: HashSet<String> = stored
        .iter()
        .map(|r| serde_json::to_string(&key.project(r)).unwrap())
        .collect();
    assert_eq!(projections.len(), stored.len());
    assert_eq!(stored[0]["EventName"], "Fan Appreciation");
    assert_eq!(stored[0]["EventOptions"]["Top Option"], "Speed +10\nSkill points +15");
}

#[test]
fn race_corpus_keeps_one_row_per_schedule_slot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("races.json");
    let key = race_dedup();

    let mut derby = RaceRecord::pre_debut("Tokyo Yushun");
    derby.schedule = "Classic Year Late May".into();
    derby.distance_meter = "2400m".into();
    derby.grade = "G1".into();

    assert!(store::append(&path, &derby, Some(&key)).unwrap());
    // A later read with a different fan count is the same race.
    let mut again = derby.clone();
    again.fans_gained = "20,000".into();
    assert!(!store::append(&path, &again, Some(&key)).unwrap());

    let mut senior = derby.clone();
    senior.schedule = "Senior Year Late May".into();
    assert!(store::append(&path, &senior, Some(&key)).unwrap());
    assert_eq!(store::load(&path).len(), 2);
}

#[test]
fn character_rerun_replaces_fields_and_keeps_manual_ones() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("uma_data.json");

    let key = character_key("Special Week", Some("[Special Dreamer]"), Some("100101-special-week"));
    let mut record = CharacterRecord {
        key: key.clone(),
        name: "Special Week".into(),
        nickname: Some("[Special Dreamer]".into()),
        slug: "100101-special-week".into(),
        id: Some("100101".into()),
        base_stars: Some(3),
        base_stats: BTreeMap::new(),
        stat_bonuses: BTreeMap::from([("Speed".to_string(), 20)]),
        aptitudes: BTreeMap::new(),
        height_cm: Some(158),
        three_sizes: None,
        objectives: Vec::new(),
        events: events(),
    };
    store::upsert(&path, "UmaKey", &key, &record).unwrap();

    // A field added by hand survives the next scrape.
    let mut data = store::load(&path);
    data[0]["Notes"] = Value::String("favourite".into());
    fs::write(&path, serde_json::to_vec_pretty(&data).unwrap()).unwrap();

    record.base_stars = Some(5);
    store::upsert(&path, "UmaKey", &key, &record).unwrap();
    store::upsert(&path, "UmaKey", &key, &record).unwrap();

    let stored = store::load(&path);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["UmaBaseStars"], 5);
    assert_eq!(stored[0]["Notes"], "favourite");
    assert_eq!(stored[0]["UmaEvents"].as_array().unwrap().len(), 4);
}

#[test]
fn abandoned_write_leaves_previous_corpus_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("career.json");
    let key = event_dedup();
    for row in events() {
        store::append(&path, &row, Some(&key)).unwrap();
    }
    let before = store::load(&path);

    let staged = store::stage(&path, &[Value::String("partial".into())]).unwrap();
    drop(staged);

    assert_eq!(store::load(&path), before);
    let leftovers = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}
