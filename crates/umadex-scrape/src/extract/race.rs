//! Race list rows and the race detail dialog.

use crate::dom::locator::RaceLocators;
use crate::dom::{normalize_lines, Document, Handle, NodeId};
use chrono::{Datelike, NaiveDate};

/// Race names that have no fixed slot in the calendar.
pub const PRE_DEBUT_RACES: &[&str] = &["Junior Make Debut", "Junior Maiden Race"];

/// Schedule label such as `Junior Year Early Jan`.
///
/// Unknown year labels and month labels that do not parse as
/// `<Month> <day>` pass through unchanged.
pub fn schedule(year_label: &str, month_label: &str) -> String {
    let year = match year_label {
        "First Year" => "Junior Year",
        "Second Year" => "Classic Year",
        "Third Year" => "Senior Year",
        other => other,
    };
    let month = NaiveDate::parse_from_str(&format!("2000 {}", month_label.trim()), "%Y %B %d")
        .map(|d| {
            let half = if d.day() == 1 { "Early" } else { "Late" };
            format!("{half} {}", d.format("%b"))
        })
        .unwrap_or_else(|_| month_label.to_string());
    format!("{year} {month}")
}

/// What a race list row turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRead {
    /// Name cell present but not rendered; ignored silently.
    Hidden,
    /// A pre-debut race, stored with the placeholder record.
    PreDebut(String),
    /// A dated race; the dialog still has to be read.
    Dated(RaceRow),
    /// The row lacks a required cell.
    Skip { name: String, reason: &'static str },
}

/// Fields read from the list row itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceRow {
    pub name: String,
    pub schedule: String,
    pub terrain: String,
    pub distance_type: String,
    pub distance_meter: String,
    /// "Details" link that opens the dialog.
    pub details: Option<Handle>,
}

/// Fields read from the detail dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceDetails {
    pub grade: String,
    pub season: String,
    pub fans_required: String,
    pub fans_gained: String,
}

/// Visible rows directly under the race list.
pub fn rows(doc: &Document, loc: &RaceLocators) -> Vec<NodeId> {
    doc.find_all(&loc.list)
        .into_iter()
        .flat_map(|list| doc.children_matching(list, &loc.row))
        .filter(|r| doc.is_visible(*r))
        .collect()
}

/// Read one list row.
pub fn read_row(doc: &Document, row: NodeId, loc: &RaceLocators) -> RowRead {
    let name_el = doc
        .find_in(row, &loc.name)
        .and_then(|n| doc.children_matching(n, &loc.name_item).into_iter().next());
    if name_el.is_some_and(|n| !doc.is_visible(n)) {
        return RowRead::Hidden;
    }
    let name = name_el.map(|n| doc.text(n)).unwrap_or_default();
    let skip = |reason| RowRead::Skip {
        name: name.clone(),
        reason,
    };
    if name.is_empty() {
        return skip("unnamed");
    }
    if PRE_DEBUT_RACES.contains(&name.as_str()) {
        return RowRead::PreDebut(name);
    }

    let Some(date) = doc.find_in(row, &loc.date).filter(|d| doc.is_visible(*d)) else {
        return skip("no date");
    };
    let cell = |n| {
        doc.child_of_type(date, "div", n)
            .map(|c| doc.text(c))
            .unwrap_or_default()
    };
    let (year, month) = (cell(1), cell(2));
    if year.is_empty() || month.is_empty() {
        return skip("incomplete date");
    }

    let right = doc.find_in(row, &loc.desc_right);
    let pick = |n| right.and_then(|r| doc.child_of_type(r, "div", n));
    let (Some(right1), Some(right2)) = (pick(1), pick(2)) else {
        return skip("no descriptors");
    };
    if !doc.is_visible(right1) || !doc.is_visible(right2) {
        return skip("no descriptors");
    }

    let tab = |holder| {
        doc.find_in(holder, &loc.tab_text)
            .map(|t| doc.text(t))
            .unwrap_or_default()
    };
    let (tab1, tab2) = (tab(right1), tab(right2));

    let details = doc
        .find_in(row, &loc.details_ribbon)
        .and_then(|r| doc.children_matching(r, &loc.details_link).into_iter().next())
        .filter(|d| doc.is_visible(*d))
        .and_then(|d| doc.handle(d));

    RowRead::Dated(RaceRow {
        schedule: schedule(&year, &month),
        terrain: strip_label(&doc.text(right1), &tab1),
        distance_type: strip_label(&doc.text(right2), &tab2),
        distance_meter: tab2,
        details,
        name,
    })
}

/// The open race dialog, if any.
pub fn dialog(doc: &Document, loc: &RaceLocators) -> Option<NodeId> {
    doc.find(&loc.dialog)
}

/// Read the detail dialog. `None` when the fan counts are missing.
///
/// The grade usually sits in the eighth detail cell; on some races that
/// cell holds a bare number and the grade moves to the tenth.
pub fn read_dialog(doc: &Document, dialog: NodeId, loc: &RaceLocators) -> Option<RaceDetails> {
    let detail = |n: usize| {
        doc.find_all_in(dialog, &loc.det_item)
            .into_iter()
            .find(|d| doc.nth_of_type(*d) == n)
            .map(|d| doc.text(d))
            .unwrap_or_default()
    };

    let mut grade = detail(8);
    if grade.trim().parse::<i64>().is_ok() {
        grade = detail(10);
    }
    let season = detail(16);

    let items = doc.find_all_in(dialog, &loc.schedule_item);
    if items.len() < 2 {
        return None;
    }
    let fans_required = strip_label(&doc.text(items[0]), "Fans required");
    let fans_gained = strip_label(
        &strip_label(&doc.text(items[1]), "Fans gained"),
        "See all",
    );

    Some(RaceDetails {
        grade,
        season,
        fans_required,
        fans_gained,
    })
}

/// Remove `label` from `text` and flatten what is left onto one line.
fn strip_label(text: &str, label: &str) -> String {
    let rest = if label.is_empty() {
        text.to_string()
    } else {
        text.replace(label, "")
    };
    normalize_lines(&rest).replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::LocatorSet;

    fn loc() -> RaceLocators {
        LocatorSet::embedded().unwrap().race
    }

    #[test]
    fn test_schedule_labels() {
        assert_eq!(schedule("First Year", "January 1"), "Junior Year Early Jan");
        assert_eq!(schedule("Second Year", "August 15"), "Classic Year Late Aug");
        assert_eq!(schedule("Third Year", "December 2"), "Senior Year Late Dec");
        assert_eq!(schedule("Fourth Year", "Sometime"), "Fourth Year Sometime");
    }

    fn row(name: &str, date: &str, extra: &str) -> String {
        format!(
            r#"<div class="races_row__r">
                 <div class="races_name__n"><div class="races_item__i">{name}</div></div>
                 {date}
                 <div class="races_desc_right__d">
                   <div>Turf<div class="races_tabtext__t">Right</div></div>
                   <div>Mile<div class="races_tabtext__t">1600m</div></div>
                 </div>
                 <div class="races_ribbon__x"><div class="utils_linkcolor__l">Details</div></div>
                 {extra}
               </div>"#
        )
    }

    const DATE: &str =
        r#"<div class="races_date__d"><div>Second Year</div><div>May 1</div></div>"#;

    fn list(rows: &[String]) -> Document {
        Document::from_html(&format!(
            r#"<div class="races_race_list__l">{}</div>"#,
            rows.join("")
        ))
    }

    #[test]
    fn test_dated_row() {
        let doc = list(&[row("NHK Mile Cup", DATE, "")]);
        let rows = rows(&doc, &loc());
        assert_eq!(rows.len(), 1);
        let RowRead::Dated(r) = read_row(&doc, rows[0], &loc()) else {
            panic!("expected a dated row");
        };
        assert_eq!(r.name, "NHK Mile Cup");
        assert_eq!(r.schedule, "Classic Year Early May");
        assert_eq!(r.terrain, "Turf");
        assert_eq!(r.distance_type, "Mile");
        assert_eq!(r.distance_meter, "1600m");
        assert!(r.details.is_some());
    }

    #[test]
    fn test_special_and_broken_rows() {
        let doc = list(&[
            row("Junior Make Debut", "", ""),
            row("Hopeful Stakes", "", ""),
            row("", DATE, ""),
            row("Hidden Cup", DATE, "").replace(
                r#"<div class="races_item__i">"#,
                r#"<div class="races_item__i" hidden>"#,
            ),
        ]);
        let rows = rows(&doc, &loc());
        let reads: Vec<_> = rows.iter().map(|r| read_row(&doc, *r, &loc())).collect();
        assert_eq!(reads[0], RowRead::PreDebut("Junior Make Debut".into()));
        assert_eq!(
            reads[1],
            RowRead::Skip {
                name: "Hopeful Stakes".into(),
                reason: "no date"
            }
        );
        assert!(matches!(reads[2], RowRead::Skip { reason: "unnamed", .. }));
        assert_eq!(reads[3], RowRead::Hidden);
    }

    fn dialog_html(cells: &[&str], schedule_items: &[&str]) -> Document {
        let cells: String = cells
            .iter()
            .map(|c| format!(r#"<div class="races_det_item__q">{c}</div>"#))
            .collect();
        let items: String = schedule_items
            .iter()
            .map(|c| format!(r#"<div class="races_schedule_item__s">{c}</div>"#))
            .collect();
        Document::from_html(&format!(
            r#"<div role="dialog"><img src="close.png"><section>{cells}</section>{items}</div>"#
        ))
    }

    #[test]
    fn test_dialog_grade_and_fans() {
        let mut cells = vec!["-"; 16];
        cells[7] = "G1";
        cells[15] = "Spring";
        let doc = dialog_html(
            &cells,
            &["Fans required<br>1,500", "Fans gained 10,000 See all"],
        );
        let d = dialog(&doc, &loc()).unwrap();
        let details = read_dialog(&doc, d, &loc()).unwrap();
        assert_eq!(details.grade, "G1");
        assert_eq!(details.season, "Spring");
        assert_eq!(details.fans_required, "1,500");
        assert_eq!(details.fans_gained, "10,000");
    }

    #[test]
    fn test_dialog_grade_falls_back_past_numeric_cell() {
        let mut cells = vec!["-"; 16];
        cells[7] = "2";
        cells[9] = "G2";
        let doc = dialog_html(&cells, &["Fans required 0", "Fans gained 500"]);
        let d = dialog(&doc, &loc()).unwrap();
        assert_eq!(read_dialog(&doc, d, &loc()).unwrap().grade, "G2");
    }

    #[test]
    fn test_dialog_without_fans() {
        let doc = dialog_html(&["G1"], &["Fans required 0"]);
        let d = dialog(&doc, &loc()).unwrap();
        assert!(read_dialog(&doc, d, &loc()).is_none());
    }
}
