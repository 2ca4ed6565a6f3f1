//! Scenario events from the training event helper into `career.json`.

use super::{event_dedup, read_events, run_items, Ctx, Item, Pipeline, Tally};
use crate::config::Timing;
use crate::dom::locator::CareerLocators;
use crate::dom::{Document, LocatorSet, NodeId};
use crate::error::Result;
use crate::live::{controls, Baseline, BrowserSession};
use crate::progress::{Category, Reporter};
use crate::retry::{Job, Outcome};
use crate::store;
use async_trait::async_trait;
use std::path::Path;

/// Deck stored before the helper loads, so every scenario has a full
/// support lineup to show events for.
const PRESET_DECK: &str = r#"["Deck 1",106101,1,30024,30024,30009,30024,30009,30008]"#;

pub(super) async fn run(p: &mut Pipeline) -> Result<Tally> {
    let (cx, reporter) = p.parts();
    let baseline = Baseline {
        url: cx.config.url("/umamusume/training-event-helper"),
        ready_css: "body".to_string(),
        server: cx.config.server,
        preset: vec![("u-eh-d1".to_string(), PRESET_DECK.to_string())],
    };
    let mut session = BrowserSession::start(cx.config, &cx.locators.controls, baseline).await?;
    let result = scan(cx, &mut session, reporter).await;
    session.close().await;
    result
}

async fn scan(cx: Ctx<'_>, session: &mut BrowserSession, reporter: &mut Reporter) -> Result<Tally> {
    let mut count = ScenarioCount {
        locators: cx.locators,
        timing: &cx.config.timing,
    };
    let total = match cx.retry.run(session, &mut count).await? {
        Outcome::Done(n) => n,
        Outcome::Skipped { last_error, .. } => return Err(last_error),
    };
    tracing::info!(total, "scenarios offered");

    let jobs = (0..total)
        .map(|index| ScenarioJob {
            index,
            locators: cx.locators,
            timing: &cx.config.timing,
            out: &cx.config.outputs.career,
            selected: false,
        })
        .collect();
    run_items(cx.retry, session, Category::Career, jobs, reporter).await
}

/// Open the scenario selector and snapshot the page.
async fn open_selector(session: &BrowserSession, timing: &Timing) -> Result<Document> {
    let page = session.page()?;
    controls::click_css(page, &session.controls().scenario_box).await?;
    tokio::time::sleep(timing.click_settle).await;
    controls::snapshot_body(page).await
}

/// Scenario entries in the open selector.
pub fn scenario_entries(doc: &Document, loc: &CareerLocators) -> Vec<NodeId> {
    doc.find(&loc.scenario_entries)
        .map(|list| {
            doc.element_children(list)
                .filter(|c| doc.tag(*c) == Some("div"))
                .collect()
        })
        .unwrap_or_default()
}

struct ScenarioCount<'a> {
    locators: &'a LocatorSet,
    timing: &'a Timing,
}

#[async_trait]
impl<'a> Job<BrowserSession> for ScenarioCount<'a> {
    type Output = usize;

    async fn navigate(&mut self, _session: &mut BrowserSession) -> Result<()> {
        Ok(())
    }

    async fn extract(&mut self, session: &mut BrowserSession) -> Result<usize> {
        let doc = open_selector(session, self.timing).await?;
        Ok(scenario_entries(&doc, &self.locators.career).len())
    }
}

/// Events of one scenario. `None` when the scenario could not be picked.
struct ScenarioJob<'a> {
    /// 0-based position in the selector.
    index: usize,
    locators: &'a LocatorSet,
    timing: &'a Timing,
    out: &'a Path,
    selected: bool,
}

#[async_trait]
impl<'a> Job<BrowserSession> for ScenarioJob<'a> {
    type Output = Option<usize>;

    async fn navigate(&mut self, session: &mut BrowserSession) -> Result<()> {
        self.selected = false;
        let doc = open_selector(session, self.timing).await?;
        let entry = scenario_entries(&doc, &self.locators.career)
            .get(self.index)
            .copied()
            .filter(|e| doc.is_visible(*e))
            .and_then(|e| doc.handle(e));
        let Some(entry) = entry else {
            return Ok(());
        };

        let page = session.page()?;
        controls::click_handle(page, entry).await?;
        tokio::time::sleep(self.timing.click_settle).await;

        let button = session
            .controls()
            .scenario_button
            .replace("{n}", &(self.index + 1).to_string());
        if controls::click_css(page, &button).await? {
            tokio::time::sleep(self.timing.click_settle).await;
            self.selected = true;
        }
        Ok(())
    }

    async fn extract(&mut self, session: &mut BrowserSession) -> Result<Option<usize>> {
        if !self.selected {
            return Ok(None);
        }
        let page = session.page()?;
        let doc = controls::snapshot_body(page).await?;
        let rows = read_events(page, &doc, &self.locators.event, self.timing.popup_settle).await?;

        let dedup = event_dedup();
        let mut added = 0;
        for row in &rows {
            if store::append(self.out, row, Some(&dedup))? {
                added += 1;
            }
        }
        Ok(Some(added))
    }
}

impl Item<BrowserSession> for ScenarioJob<'_> {
    fn label(&self) -> String {
        format!("scenario {}", self.index + 1)
    }

    fn describe(&self, added: &Option<usize>) -> (String, String) {
        let detail = match added {
            Some(n) => format!("+{n} rows"),
            None => "not offered".to_string(),
        };
        (self.label(), detail)
    }

    fn skip_reason(&self, added: &Option<usize>) -> Option<String> {
        added.is_none().then(|| "scenario could not be selected".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_entries() {
        let doc = Document::from_html(
            r#"<div class="tooltips_tooltip_striped__k">
                 <div>URA Finals</div>
                 <div>Unity Cup</div>
                 <span>divider</span>
                 <div hidden>Trackblazer</div>
               </div>"#,
        );
        let loc = LocatorSet::embedded().unwrap();
        let entries = scenario_entries(&doc, &loc.career);
        assert_eq!(entries.len(), 3);
        assert!(!doc.is_visible(entries[2]));
    }

    #[test]
    fn test_no_selector_means_no_entries() {
        let doc = Document::from_html("<div>loading</div>");
        let loc = LocatorSet::embedded().unwrap();
        assert!(scenario_entries(&doc, &loc.career).is_empty());
    }

    #[test]
    fn test_unselectable_scenario_reports_skip() {
        let loc = LocatorSet::embedded().unwrap();
        let timing = Timing::default();
        let job = ScenarioJob {
            index: 2,
            locators: &loc,
            timing: &timing,
            out: Path::new("career.json"),
            selected: false,
        };
        assert_eq!(
            job.skip_reason(&None).as_deref(),
            Some("scenario could not be selected")
        );
        assert_eq!(job.skip_reason(&Some(0)), None);
        assert_eq!(job.describe(&Some(3)).1, "+3 rows");
    }

    #[test]
    fn test_preset_deck_is_json() {
        let deck: serde_json::Value = serde_json::from_str(PRESET_DECK).unwrap();
        assert_eq!(deck[0], "Deck 1");
        assert_eq!(deck.as_array().unwrap().len(), 9);
    }
}
