//! Live Chromium checks. Run with `--ignored` on a machine with Chromium.

use std::time::Duration;

use umadex_scrape::dom::LocatorSet;
use umadex_scrape::extract::events::event_items;
use umadex_scrape::live::controls;
use umadex_scrape::popup::PopupResolver;
use umadex_scrape::renderer::chromium::ChromiumRenderer;
use umadex_scrape::renderer::{BrowserOptions, Renderer};

const PAGE: &str = r#"<!doctype html>
<html><body>
  <div class="eventhelper_elist__a">
    <div class="compatibility_viewer_item__b" id="ev">Fan Appreciation</div>
    <div class="compatibility_viewer_item__b" style="display:none">Hidden Event</div>
  </div>
  <script>
    const el = document.getElementById('ev');
    const popper = document.createElement('div');
    popper.innerHTML =
      '<table class="tooltips_ttable__x"><tbody>' +
      '<tr><td>Top Option</td><td>Speed +10<br>Skill points +15</td></tr>' +
      '<tr><td>Bottom Option</td><td>Stamina +10</td></tr>' +
      '</tbody></table>';
    el._tippy = {
      popper,
      setProps() {},
      show() { document.body.appendChild(popper); },
      hide() { popper.remove(); },
    };
  </script>
</body></html>"#;

#[tokio::test]
#[ignore] // Requires Chromium to be installed
async fn snapshot_and_popup_on_a_live_page() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("events.html");
    std::fs::write(&file, PAGE).unwrap();
    let url = url::Url::from_file_path(&file).unwrap();

    let renderer = ChromiumRenderer::launch(&BrowserOptions::default())
        .await
        .expect("failed to launch Chromium");
    let mut page = renderer.new_context().await.unwrap();
    page.navigate(url.as_str(), 10_000).await.unwrap();

    let locators = LocatorSet::embedded().unwrap();
    let doc = controls::snapshot_body(page.as_ref()).await.unwrap();
    let items = event_items(&doc, &locators.event);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Fan Appreciation");

    let popups = PopupResolver::new(page.as_ref(), Duration::from_millis(50));
    let rows = popups.read(items[0].anchor, &locators.event).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, "Top Option");
    assert_eq!(rows[0].1, "Speed +10\nSkill points +15");

    // The popup was hidden again.
    assert!(!controls::exists(page.as_ref(), "table").await.unwrap());

    page.close().await.unwrap();
    Box::new(renderer).shutdown().await.unwrap();
}
