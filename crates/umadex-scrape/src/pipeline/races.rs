//! Race list rows and their detail dialogs into `races.json`.

use super::{run_items, snapshot_with_retry, Ctx, Item, Pipeline, Tally};
use crate::config::Timing;
use crate::dom::LocatorSet;
use crate::dom::snapshot::SnapshotRoot;
use crate::error::{Result, ScrapeError};
use crate::extract::race::{self, RaceRow, RowRead};
use crate::live::{controls, Baseline, BrowserSession};
use crate::progress::{Category, Reporter};
use crate::records::RaceRecord;
use crate::renderer::RenderContext;
use crate::retry::Job;
use crate::store::{self, DedupKey};
use async_trait::async_trait;
use std::path::Path;

/// Dedup key of `races.json`.
pub fn race_dedup() -> DedupKey {
    DedupKey::new(["RaceName", "Schedule", "DistanceMeter"])
}

/// What happened to one list row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceOutcome {
    /// Name cell present but hidden.
    Ignored,
    /// A record was read; `added` is false when it was already stored.
    Stored { name: String, added: bool, special: bool },
    /// The row or its dialog lacked a required field.
    Incomplete { name: String, reason: &'static str },
}

pub(super) async fn run(p: &mut Pipeline) -> Result<Tally> {
    let (cx, reporter) = p.parts();
    let baseline = Baseline {
        url: cx.config.url("/umamusume/races"),
        ready_css: "body".to_string(),
        server: cx.config.server,
        preset: Vec::new(),
    };
    let mut session = BrowserSession::start(cx.config, &cx.locators.controls, baseline).await?;
    let result = scan(cx, &mut session, reporter).await;
    session.close().await;
    result
}

async fn scan(cx: Ctx<'_>, session: &mut BrowserSession, reporter: &mut Reporter) -> Result<Tally> {
    let list_css = cx.locators.controls.race_list.as_str();
    let list = snapshot_with_retry(cx.retry, session, Some(list_css)).await?;
    let total = race::rows(&list, &cx.locators.race).len();

    let jobs = (0..total)
        .map(|index| RaceJob {
            index,
            locators: cx.locators,
            timing: &cx.config.timing,
            out: &cx.config.outputs.races,
        })
        .collect();
    run_items(cx.retry, session, Category::Races, jobs, reporter).await
}

/// One row of the race list, located by position so it survives a
/// session restart.
struct RaceJob<'a> {
    index: usize,
    locators: &'a LocatorSet,
    timing: &'a Timing,
    out: &'a Path,
}

impl RaceJob<'_> {
    /// Open the row's dialog, read it and close it again.
    async fn read_details(&self, page: &dyn RenderContext, row: &RaceRow) -> Result<Option<race::RaceDetails>> {
        let ctl = &self.locators.controls;
        if let Some(link) = row.details {
            controls::click_handle(page, link).await?;
            tokio::time::sleep(self.timing.click_settle).await;
        }
        let Some(dialog_doc) = controls::snapshot(page, SnapshotRoot::Query(&ctl.race_dialog)).await? else {
            return Ok(None);
        };
        let details = race::dialog(&dialog_doc, &self.locators.race)
            .and_then(|d| race::read_dialog(&dialog_doc, d, &self.locators.race));

        controls::click_css(page, &ctl.race_dialog_close).await?;
        tokio::time::sleep(self.timing.click_settle).await;
        Ok(details)
    }
}

#[async_trait]
impl<'a> Job<BrowserSession> for RaceJob<'a> {
    type Output = RaceOutcome;

    async fn navigate(&mut self, _session: &mut BrowserSession) -> Result<()> {
        Ok(())
    }

    async fn extract(&mut self, session: &mut BrowserSession) -> Result<RaceOutcome> {
        let page = session.page()?;
        let loc = &self.locators.race;
        let list = controls::snapshot(page, SnapshotRoot::Query(&self.locators.controls.race_list))
            .await?
            .ok_or_else(|| ScrapeError::StaleElement("race list is gone".into()))?;
        let row = *race::rows(&list, loc)
            .get(self.index)
            .ok_or_else(|| ScrapeError::StaleElement(format!("race row {} is gone", self.index + 1)))?;

        let record = match race::read_row(&list, row, loc) {
            RowRead::Hidden => return Ok(RaceOutcome::Ignored),
            RowRead::Skip { name, reason } => return Ok(RaceOutcome::Incomplete { name, reason }),
            RowRead::PreDebut(name) => {
                let added = store::append(self.out, &RaceRecord::pre_debut(&name), Some(&race_dedup()))?;
                return Ok(RaceOutcome::Stored {
                    name,
                    added,
                    special: true,
                });
            }
            RowRead::Dated(row) => {
                let Some(details) = self.read_details(page, &row).await? else {
                    return Ok(RaceOutcome::Incomplete {
                        name: row.name,
                        reason: "no dialog or fans info",
                    });
                };
                RaceRecord {
                    name: row.name,
                    schedule: row.schedule,
                    grade: details.grade,
                    terrain: row.terrain,
                    distance_type: row.distance_type,
                    distance_meter: row.distance_meter,
                    season: details.season,
                    fans_required: details.fans_required,
                    fans_gained: details.fans_gained,
                }
            }
        };

        let added = store::append(self.out, &record, Some(&race_dedup()))?;
        Ok(RaceOutcome::Stored {
            name: record.name,
            added,
            special: false,
        })
    }
}

impl Item<BrowserSession> for RaceJob<'_> {
    fn label(&self) -> String {
        format!("row {}", self.index + 1)
    }

    fn describe(&self, out: &RaceOutcome) -> (String, String) {
        match out {
            RaceOutcome::Ignored => (self.label(), "hidden".to_string()),
            RaceOutcome::Stored { name, added, special } => {
                let mut detail = if *added { "stored" } else { "already stored" }.to_string();
                if *special {
                    detail.push_str(", special");
                }
                (name.clone(), detail)
            }
            RaceOutcome::Incomplete { name, reason } => (name.clone(), format!("skip: {reason}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_race_dedup_ignores_other_fields() {
        let key = race_dedup();
        let a = serde_json::to_value(RaceRecord::pre_debut("Junior Make Debut")).unwrap();
        let mut b = a.clone();
        b["Season"] = serde_json::json!("Spring");
        assert_eq!(key.project(&a), key.project(&b));
    }

    #[test]
    fn test_pre_debut_rows_dedupe_in_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("races.json");
        let rec = RaceRecord::pre_debut("Junior Maiden Race");
        assert!(store::append(&path, &rec, Some(&race_dedup())).unwrap());
        assert!(!store::append(&path, &rec, Some(&race_dedup())).unwrap());
        assert_eq!(store::load(&path).len(), 1);
    }
}
