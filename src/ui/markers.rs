//! Marker construction for the map view
use geo::Point;

use crate::state::data::TreeRecord;

/// A tree marker ready to be drawn
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: i64,
    /// 1 = tallest tree
    pub rank: usize,
    pub position: Point<f64>,
    /// Popup text with line breaks, markup removed
    pub popup: String,
}

/// Build one marker per visible record, keeping the height order
pub fn build_markers(records: &[TreeRecord]) -> Vec<Marker> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| Marker {
            id: record.id,
            rank: index + 1,
            position: record.location,
            popup: popup_plain_text(&record.caption),
        })
        .collect()
}

/// Turn caption markup into plain text: `<br>` becomes a line break and
/// every other tag is dropped.
pub fn popup_plain_text(caption: &str) -> String {
    let mut out = String::with_capacity(caption.len());
    let mut chars = caption.chars();

    while let Some(c) = chars.next() {
        if c != '<' {
            out.push(c);
            continue;
        }

        let tag: String = chars.by_ref().take_while(|&c| c != '>').collect();
        let name = tag
            .trim_matches(|c: char| c == '/' || c.is_whitespace())
            .split_whitespace()
            .next()
            .unwrap_or("");
        if name.eq_ignore_ascii_case("br") {
            out.push('\n');
        }
    }

    out
}
