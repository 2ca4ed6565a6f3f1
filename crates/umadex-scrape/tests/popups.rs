//! Popup reads against a page stand-in that answers snapshot scripts with
//! canned trees.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use umadex_scrape::dom::{Handle, LocatorSet};
use umadex_scrape::error::Result;
use umadex_scrape::popup::PopupResolver;
use umadex_scrape::renderer::{NavigationResult, RenderContext};

/// Tooltip for handle 7 is a two-row table; handle 9 has no tooltip.
struct TooltipPage {
    shown: Mutex<Vec<String>>,
    hidden: Mutex<u32>,
}

impl TooltipPage {
    fn new() -> Self {
        Self {
            shown: Mutex::new(Vec::new()),
            hidden: Mutex::new(0),
        }
    }
}

fn popper() -> Value {
    let nodes = json!([
        {"parent": null, "tag": "div", "rendered": true, "handle": 100},
        {"parent": 0, "tag": "table", "classes": ["tooltips_ttable__x1"], "rendered": true},
        {"parent": 1, "tag": "tbody", "rendered": true},
        {"parent": 2, "tag": "tr", "rendered": true},
        {"parent": 3, "tag": "td", "rendered": true},
        {"parent": 4, "text": "Top Option"},
        {"parent": 3, "tag": "td", "rendered": true},
        {"parent": 6, "text": "Speed +10"},
        {"parent": 6, "tag": "br", "rendered": true},
        {"parent": 6, "text": "Skill points +15"},
        {"parent": 2, "tag": "tr", "rendered": true},
        {"parent": 10, "tag": "td", "rendered": true},
        {"parent": 11, "text": "Bottom Option"},
        {"parent": 10, "tag": "td", "rendered": true},
        {"parent": 13, "text": "Stamina +10"}
    ]);
    Value::String(nodes.to_string())
}

#[async_trait]
impl RenderContext for TooltipPage {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 0,
            stopped_early: false,
        })
    }

    async fn reload(&mut self, _timeout_ms: u64) -> Result<()> {
        Ok(())
    }

    async fn execute_js(&self, script: &str) -> Result<Value> {
        let has_tooltip = script.contains("map.get(7)");
        if script.contains("_tippy.show()") {
            if has_tooltip {
                self.shown.lock().unwrap().push("7".into());
            }
            return Ok(Value::Bool(has_tooltip));
        }
        if script.contains("_tippy.hide()") {
            *self.hidden.lock().unwrap() += 1;
            return Ok(Value::Null);
        }
        if script.contains("_tippy.popper") && has_tooltip {
            return Ok(popper());
        }
        Ok(Value::Null)
    }

    async fn get_url(&self) -> Result<String> {
        Ok("https://gametora.com/umamusume/supports/30028-kitasan-black".into())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn event_popups_become_rows_and_are_always_hidden() {
    let locators = LocatorSet::embedded().unwrap();
    let page = TooltipPage::new();
    let popups = PopupResolver::new(&page, Duration::from_millis(1));

    let with_tooltip = Handle(7);
    let without = Handle(9);

    let rows = popups.read(with_tooltip, &locators.event).await.unwrap();
    assert_eq!(
        rows,
        vec![
            ("Top Option".to_string(), "Speed +10\nSkill points +15".to_string()),
            ("Bottom Option".to_string(), "Stamina +10".to_string()),
        ]
    );

    let none = popups.read(without, &locators.event).await.unwrap();
    assert!(none.is_empty());

    assert_eq!(page.shown.lock().unwrap().len(), 1);
    assert_eq!(*page.hidden.lock().unwrap(), 2);
}
