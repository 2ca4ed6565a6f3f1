//! Character pages into `uma_data.json`.

use super::{
    listing_anchors, listing_urls, read_events, run_items, snapshot_with_retry, Ctx, Item, Pipeline,
    Tally,
};
use crate::config::Timing;
use crate::dom::LocatorSet;
use crate::error::{Result, ScrapeError};
use crate::extract::character;
use crate::extract::support::slug_and_id;
use crate::live::{controls, Baseline, BrowserSession};
use crate::progress::{Category, Reporter};
use crate::records::{character_key, CharacterRecord};
use crate::retry::Job;
use crate::store;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

const NAME_WAIT: Duration = Duration::from_secs(8);

pub(super) async fn run(p: &mut Pipeline) -> Result<Tally> {
    let (cx, reporter) = p.parts();
    let baseline = Baseline {
        url: cx.config.url("/umamusume/characters"),
        ready_css: cx.locators.controls.listing_ready.clone(),
        server: cx.config.server,
        preset: Vec::new(),
    };
    let mut session = BrowserSession::start(cx.config, &cx.locators.controls, baseline).await?;
    let result = scan(cx, &mut session, reporter).await;
    session.close().await;
    result
}

async fn scan(cx: Ctx<'_>, session: &mut BrowserSession, reporter: &mut Reporter) -> Result<Tally> {
    let listing = snapshot_with_retry(cx.retry, session, None).await?;
    let anchors = listing_anchors(&listing, &cx.locators.character.listing_anchor);
    let jobs = listing_urls(&listing, &anchors)
        .into_iter()
        .map(|url| CharacterJob {
            url,
            locators: cx.locators,
            timing: &cx.config.timing,
            out: &cx.config.outputs.uma,
        })
        .collect();
    run_items(cx.retry, session, Category::Characters, jobs, reporter).await
}

struct CharacterJob<'a> {
    url: String,
    locators: &'a LocatorSet,
    timing: &'a Timing,
    out: &'a Path,
}

#[async_trait]
impl<'a> Job<BrowserSession> for CharacterJob<'a> {
    type Output = CharacterRecord;

    async fn navigate(&mut self, session: &mut BrowserSession) -> Result<()> {
        session.goto(&self.url, "body").await
    }

    async fn extract(&mut self, session: &mut BrowserSession) -> Result<CharacterRecord> {
        let page = session.page()?;
        if !controls::wait_for(page, &self.locators.controls.character_name, NAME_WAIT).await? {
            tracing::debug!(url = %self.url, "character name slow to appear");
        }
        let doc = controls::snapshot_body(page).await?;
        let sheet = character::parse(&doc, &self.locators.character)
            .ok_or_else(|| ScrapeError::Driver(format!("missing character name at {}", self.url)))?;
        let events = read_events(page, &doc, &self.locators.event, self.timing.popup_settle).await?;

        let (slug, id) = slug_and_id(&self.url);
        let record = CharacterRecord {
            key: character_key(&sheet.name, sheet.nickname.as_deref(), Some(slug.as_str())),
            name: sheet.name,
            nickname: sheet.nickname,
            slug,
            id,
            base_stars: sheet.base_stars,
            base_stats: sheet.base_stats,
            stat_bonuses: sheet.stat_bonuses,
            aptitudes: sheet.aptitudes,
            height_cm: sheet.height_cm,
            three_sizes: sheet.three_sizes,
            objectives: sheet.objectives,
            events,
        };
        store::upsert(self.out, "UmaKey", &record.key, &record)?;
        Ok(record)
    }
}

impl Item<BrowserSession> for CharacterJob<'_> {
    fn label(&self) -> String {
        self.url.clone()
    }

    fn describe(&self, r: &CharacterRecord) -> (String, String) {
        (label(r), detail(r))
    }
}

fn label(r: &CharacterRecord) -> String {
    let variant = r
        .nickname
        .as_deref()
        .filter(|n| !n.is_empty())
        .or(Some(r.slug.as_str()).filter(|s| !s.is_empty()))
        .unwrap_or("default");
    format!("{} ({variant})", r.name)
}

fn detail(r: &CharacterRecord) -> String {
    let stars = r.base_stars.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
    let tiers = if r.base_stats.is_empty() {
        "-".to_string()
    } else {
        r.base_stats.keys().cloned().collect::<Vec<_>>().join("/")
    };
    format!(
        "★{stars} | base:{tiers} | bonuses:{} | apt:{} | {} objectives, {} events",
        r.stat_bonuses.len(),
        r.aptitudes.len(),
        r.objectives.len(),
        r.events.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::EventRow;
    use std::collections::BTreeMap;

    fn record() -> CharacterRecord {
        let mut base_stats = BTreeMap::new();
        base_stats.insert("3★".to_string(), BTreeMap::from([("Speed".to_string(), 83)]));
        base_stats.insert("5★".to_string(), BTreeMap::from([("Speed".to_string(), 101)]));
        CharacterRecord {
            key: "Special Week :: Special Dreamer".into(),
            name: "Special Week".into(),
            nickname: Some("Special Dreamer".into()),
            slug: "100101-special-week".into(),
            id: Some("100101".into()),
            base_stars: Some(3),
            base_stats,
            stat_bonuses: BTreeMap::from([("Speed".to_string(), 20)]),
            aptitudes: BTreeMap::new(),
            height_cm: Some(158),
            three_sizes: None,
            objectives: Vec::new(),
            events: vec![EventRow::new("Dance Lesson", "Top", "Speed +5")],
        }
    }

    #[test]
    fn test_progress_line_parts() {
        let r = record();
        assert_eq!(label(&r), "Special Week (Special Dreamer)");
        assert_eq!(
            detail(&r),
            "★3 | base:3★/5★ | bonuses:1 | apt:0 | 0 objectives, 1 events"
        );
    }

    #[test]
    fn test_label_falls_back_to_slug() {
        let mut r = record();
        r.nickname = None;
        assert_eq!(label(&r), "Special Week (100101-special-week)");
        r.slug.clear();
        assert_eq!(label(&r), "Special Week (default)");
    }
}
