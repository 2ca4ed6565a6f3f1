//! Category pipelines.
//!
//! Every category follows the same shape: start a browser session at the
//! category's landing view, read the list of items, then run each item
//! through the retry controller and persist what it extracts. An item that
//! runs out of retries is reported and the batch moves on.

pub mod career;
pub mod characters;
pub mod races;
pub mod supports;

use crate::config::ScrapeConfig;
use crate::dom::locator::EventLocators;
use crate::dom::snapshot::SnapshotRoot;
use crate::dom::{Document, Locator, LocatorSet, NodeId};
use crate::error::{Result, ScrapeError};
use crate::extract::events::event_items;
use crate::live::{controls, BrowserSession};
use crate::popup::PopupResolver;
use crate::progress::{Category, ProgressEventKind, Reporter};
use crate::records::EventRow;
use crate::renderer::RenderContext;
use crate::retry::{Job, Outcome, RetryController, Session};
use crate::store::DedupKey;
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Counts for one category run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub done: usize,
    pub skipped: usize,
}

/// A retried job that can describe itself in progress lines.
pub trait Item<S: Send + ?Sized>: Job<S> {
    /// Shown when the item is skipped.
    fn label(&self) -> String;
    /// Label and detail shown when the item finished.
    fn describe(&self, out: &Self::Output) -> (String, String);
    /// Why a finished item still collected nothing worth counting as done.
    fn skip_reason(&self, _out: &Self::Output) -> Option<String> {
        None
    }
}

/// Everything the category pipelines share.
pub struct Pipeline {
    config: ScrapeConfig,
    locators: LocatorSet,
    retry: RetryController,
    reporter: Reporter,
}

impl Pipeline {
    pub fn new(config: ScrapeConfig, reporter: Reporter) -> Result<Self> {
        let locators = LocatorSet::embedded()
            .map_err(|e| ScrapeError::Config(format!("embedded locators: {e}")))?;
        let retry = RetryController::new(config.retry.clone());
        Ok(Self {
            config,
            locators,
            retry,
            reporter,
        })
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    fn parts(&mut self) -> (Ctx<'_>, &mut Reporter) {
        let cx = Ctx {
            config: &self.config,
            locators: &self.locators,
            retry: &self.retry,
        };
        (cx, &mut self.reporter)
    }

    /// Scrape one category with a session of its own.
    pub async fn run(&mut self, category: Category) -> Result<Tally> {
        tracing::info!(%category, "starting category");
        match category {
            Category::Characters => characters::run(self).await,
            Category::Supports => supports::run(self).await,
            Category::Career => career::run(self).await,
            Category::Races => races::run(self).await,
        }
    }
}

/// Read-only state a category run borrows from the [`Pipeline`].
#[derive(Clone, Copy)]
pub(crate) struct Ctx<'a> {
    pub config: &'a ScrapeConfig,
    pub locators: &'a LocatorSet,
    pub retry: &'a RetryController,
}

/// Run `jobs` one after another, reporting each outcome.
pub async fn run_items<S, J>(
    retry: &RetryController,
    session: &mut S,
    category: Category,
    jobs: Vec<J>,
    reporter: &mut Reporter,
) -> Result<Tally>
where
    S: Session,
    J: Item<S>,
{
    let start = Instant::now();
    let total = jobs.len();
    let mut tally = Tally::default();
    reporter.emit(ProgressEventKind::CategoryStarted { category, total });

    for (i, mut job) in jobs.into_iter().enumerate() {
        let index = i + 1;
        match retry.run(session, &mut job).await? {
            Outcome::Done(out) => {
                if let Some(reason) = job.skip_reason(&out) {
                    tally.skipped += 1;
                    let label = job.label();
                    tracing::info!(%category, item = %label, "skipped: {reason}");
                    reporter.emit(ProgressEventKind::ItemSkipped {
                        category,
                        index,
                        total,
                        label,
                        reason,
                    });
                    continue;
                }
                tally.done += 1;
                let (label, detail) = job.describe(&out);
                reporter.emit(ProgressEventKind::ItemDone {
                    category,
                    index,
                    total,
                    label,
                    detail,
                });
            }
            Outcome::Skipped {
                attempts,
                last_error,
            } => {
                tally.skipped += 1;
                let label = job.label();
                tracing::warn!(%category, item = %label, attempts, "giving up: {last_error}");
                reporter.emit(ProgressEventKind::ItemSkipped {
                    category,
                    index,
                    total,
                    label,
                    reason: format!("{last_error} (after {attempts} attempts)"),
                });
            }
        }
    }

    reporter.emit(ProgressEventKind::CategoryCompleted {
        category,
        done: tally.done,
        skipped: tally.skipped,
        elapsed_ms: start.elapsed().as_millis() as u64,
    });
    Ok(tally)
}

/// Snapshot of the current page under `root`, taken with retries. The
/// session's baseline is the view being read, so a restart needs no extra
/// navigation.
pub(crate) async fn snapshot_with_retry(
    retry: &RetryController,
    session: &mut BrowserSession,
    root: Option<&str>,
) -> Result<Document> {
    let mut job = SnapshotJob { root };
    match retry.run(session, &mut job).await? {
        Outcome::Done(doc) => Ok(doc),
        Outcome::Skipped { last_error, .. } => Err(last_error),
    }
}

struct SnapshotJob<'a> {
    root: Option<&'a str>,
}

#[async_trait]
impl<'a> Job<BrowserSession> for SnapshotJob<'a> {
    type Output = Document;

    async fn navigate(&mut self, _session: &mut BrowserSession) -> Result<()> {
        Ok(())
    }

    async fn extract(&mut self, session: &mut BrowserSession) -> Result<Document> {
        let root = match self.root {
            Some(css) => SnapshotRoot::Query(css),
            None => SnapshotRoot::Body,
        };
        controls::snapshot(session.page()?, root)
            .await?
            .ok_or_else(|| ScrapeError::StaleElement("listing root is gone".into()))
    }
}

/// Whether `id` matches `main main div:last-child <id>`.
fn in_listing_area(doc: &Document, id: NodeId) -> bool {
    doc.ancestors(id).any(|anc| {
        doc.tag(anc) == Some("div")
            && doc.next_element_sibling(anc).is_none()
            && doc
                .ancestors(anc)
                .filter(|a| doc.tag(*a) == Some("main"))
                .count()
                >= 2
    })
}

/// Visible listing anchors matching `anchor` in the listing area.
pub fn listing_anchors(doc: &Document, anchor: &Locator) -> Vec<NodeId> {
    doc.find_all(anchor)
        .into_iter()
        .filter(|a| doc.is_visible(*a) && in_listing_area(doc, *a))
        .collect()
}

/// Item URLs behind `anchors`, in page order without repeats. An anchor
/// whose card body is hidden is left out.
pub fn listing_urls(doc: &Document, anchors: &[NodeId]) -> Vec<String> {
    let card = Locator::tag("div");
    let mut urls: Vec<String> = Vec::new();
    for &a in anchors {
        if doc
            .find_all_in(a, &card)
            .into_iter()
            .find(|d| *d != a)
            .is_some_and(|inner| !doc.is_visible(inner))
        {
            continue;
        }
        let Some(href) = doc.attr(a, "href").filter(|h| !h.is_empty()) else {
            continue;
        };
        if !urls.iter().any(|u| u == href) {
            urls.push(href.to_string());
        }
    }
    urls
}

/// Dedup key of the append-only event corpora.
pub fn event_dedup() -> DedupKey {
    DedupKey::new(["EventName", "EventOptions"])
}

/// Read every visible event on the page through its popup.
pub(crate) async fn read_events(
    page: &dyn RenderContext,
    doc: &Document,
    loc: &EventLocators,
    settle: Duration,
) -> Result<Vec<EventRow>> {
    let popups = PopupResolver::new(page, settle);
    let mut rows = Vec::new();
    for item in event_items(doc, loc) {
        for (label, rewards) in popups.read(item.anchor, loc).await? {
            rows.push(EventRow::new(item.name.clone(), label, rewards));
        }
    }
    Ok(rows)
}
