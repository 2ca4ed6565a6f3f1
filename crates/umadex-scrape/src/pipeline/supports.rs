//! Support card pages into `support_card.json` (events) and
//! `support_hints.json` (card metadata and hint skills).

use super::{
    event_dedup, listing_anchors, listing_urls, read_events, run_items, snapshot_with_retry, Ctx,
    Item, Pipeline, Tally,
};
use crate::assets::AssetFetcher;
use crate::config::{OutputPaths, Timing};
use crate::dom::locator::SupportLocators;
use crate::dom::{Document, LocatorSet, NodeId};
use crate::error::Result;
use crate::extract::support::{self as parse, HintTile};
use crate::live::{controls, Baseline, BrowserSession};
use crate::popup::PopupResolver;
use crate::progress::{Category, Reporter};
use crate::records::{HintSkill, SupportCardRecord};
use crate::renderer::RenderContext;
use crate::retry::Job;
use crate::store;
use async_trait::async_trait;
use std::collections::HashMap;

/// Thumbnail and id seen on the listing page for one card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preview {
    /// Local thumbnail path, or the remote URL when the download failed.
    pub image: String,
    pub id: Option<String>,
}

pub(super) async fn run(p: &mut Pipeline) -> Result<Tally> {
    let (cx, reporter) = p.parts();
    let baseline = Baseline {
        url: cx.config.url("/umamusume/supports"),
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
    let fetcher = AssetFetcher::new(
        &cx.config.outputs.thumb_dir,
        cx.config.timing.thumb_timeout,
        cx.config.timing.thumb_delay,
    )?;
    let listing = snapshot_with_retry(cx.retry, session, None).await?;
    let anchors = listing_anchors(&listing, &cx.locators.support.listing_anchor);

    let mut previews = HashMap::new();
    for (slug, src, id) in preview_sources(&listing, &anchors, &cx.locators.support) {
        let local = fetcher.fetch(&src, Some(slug.as_str()), id.as_deref()).await;
        previews.insert(
            slug,
            Preview {
                image: local.unwrap_or(src),
                id,
            },
        );
    }
    tracing::info!(count = previews.len(), "collected support previews");

    let jobs = listing_urls(&listing, &anchors)
        .into_iter()
        .map(|url| SupportJob {
            url,
            locators: cx.locators,
            timing: &cx.config.timing,
            outputs: &cx.config.outputs,
            previews: &previews,
            fetcher: &fetcher,
        })
        .collect();
    run_items(cx.retry, session, Category::Supports, jobs, reporter).await
}

/// `(slug, image src, id)` for every listing anchor with a slug. The id
/// comes from the slug, else from the image file name.
pub fn preview_sources(
    doc: &Document,
    anchors: &[NodeId],
    loc: &SupportLocators,
) -> Vec<(String, String, Option<String>)> {
    anchors
        .iter()
        .filter_map(|&a| {
            let (slug, id) = parse::slug_and_id(doc.attr(a, "href")?);
            if slug.is_empty() {
                return None;
            }
            let src = doc
                .find_in(a, &loc.image)
                .and_then(|img| doc.attr(img, "src"))
                .unwrap_or_default()
                .to_string();
            let id = id.or_else(|| parse::id_from_img_src(&src));
            Some((slug, src, id))
        })
        .collect()
}

/// What one card run stored.
#[derive(Debug, Clone)]
pub struct SupportSummary {
    pub card: SupportCardRecord,
    pub events_added: usize,
}

struct SupportJob<'a> {
    url: String,
    locators: &'a LocatorSet,
    timing: &'a Timing,
    outputs: &'a OutputPaths,
    previews: &'a HashMap<String, Preview>,
    fetcher: &'a AssetFetcher,
}

impl SupportJob<'_> {
    /// Resolve missing skill ids through each tile's tooltip.
    async fn resolve_skill_ids(
        &self,
        page: &dyn RenderContext,
        tiles: Vec<HintTile>,
    ) -> Result<Vec<HintSkill>> {
        let popups = PopupResolver::new(page, self.timing.popup_settle);
        let mut hints = Vec::with_capacity(tiles.len());
        for tile in tiles {
            let mut skill_id = tile.skill_id;
            if skill_id.is_empty() {
                if let Some(anchor) = tile.overlay {
                    if let Some(popup) = popups.read_snapshot(anchor).await? {
                        skill_id = parse::skill_id_in_popup(&popup, &self.locators.support);
                    }
                }
            }
            hints.push(HintSkill {
                skill_id,
                name: tile.name,
                hint_level: tile.hint_level,
            });
        }
        Ok(hints)
    }
}

#[async_trait]
impl<'a> Job<BrowserSession> for SupportJob<'a> {
    type Output = SupportSummary;

    async fn navigate(&mut self, session: &mut BrowserSession) -> Result<()> {
        session.goto(&self.url, "body").await
    }

    async fn extract(&mut self, session: &mut BrowserSession) -> Result<SupportSummary> {
        let page = session.page()?;
        let loc = &self.locators.support;
        let doc = controls::snapshot_body(page).await?;

        let (slug, mut id) = parse::slug_and_id(&self.url);
        let name = parse::card_name(&doc, loc).unwrap_or_else(|| slug.clone());
        let rarity = parse::rarity(&name);
        let hints = self.resolve_skill_ids(page, parse::hint_tiles(&doc, loc)).await?;

        let mut image = String::new();
        if let Some(preview) = self.previews.get(&slug) {
            image = preview.image.clone();
            if id.is_none() {
                id = preview.id.clone();
            }
        }
        if image.is_empty() {
            if let Some(src) = parse::page_image(&doc, loc) {
                image = self
                    .fetcher
                    .fetch(&src, Some(slug.as_str()), id.as_deref())
                    .await
                    .unwrap_or_default();
            }
        }

        let mut events_added = 0;
        let dedup = event_dedup();
        for row in read_events(page, &doc, &self.locators.event, self.timing.popup_settle).await? {
            if store::append(&self.outputs.supports, &row, Some(&dedup))? {
                events_added += 1;
            }
        }

        let key = if slug.is_empty() { name.clone() } else { slug.clone() };
        let card = SupportCardRecord {
            slug: key.clone(),
            id,
            name,
            rarity,
            image,
            hints,
        };
        store::upsert(&self.outputs.support_hints, "SupportSlug", &key, &card)?;

        Ok(SupportSummary { card, events_added })
    }
}

impl Item<BrowserSession> for SupportJob<'_> {
    fn label(&self) -> String {
        self.url.clone()
    }

    fn describe(&self, s: &SupportSummary) -> (String, String) {
        let dash = |v: Option<&str>| v.filter(|x| !x.is_empty()).unwrap_or("-").to_string();
        (
            s.card.name.clone(),
            format!(
                "slug:{} id:{} +{} events, {} hints",
                dash(Some(s.card.slug.as_str())),
                dash(s.card.id.as_deref()),
                s.events_added,
                s.card.hints.len()
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_sources() {
        let doc = Document::from_html(
            r#"<main><main><div>
                 <a href="https://gametora.com/umamusume/supports/30028-kitasan-black">
                   <div><img src="https://gametora.com/images/umamusume/supports/support_card_s_30028.png"></div>
                 </a>
                 <a href="https://gametora.com/umamusume/supports/fine-motion">
                   <div><img src="https://gametora.com/images/umamusume/supports/support_card_s_20023.png"></div>
                 </a>
                 <a href="https://gametora.com/umamusume/supports/no-image"><div>?</div></a>
               </div></main></main>"#,
        );
        let loc = LocatorSet::embedded().unwrap();
        let anchors = listing_anchors(&doc, &loc.support.listing_anchor);
        let sources = preview_sources(&doc, &anchors, &loc.support);

        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].0, "30028-kitasan-black");
        assert_eq!(sources[0].2.as_deref(), Some("30028"));
        assert_eq!(sources[1].2.as_deref(), Some("20023"));
        assert_eq!(sources[2].1, "");
        assert_eq!(sources[2].2, None);
    }
}
