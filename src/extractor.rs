//! Temperature extraction from the device status page
//!
//! The device serves either a card layout (heading + value blocks) or a
//! two-column table depending on its firmware, so two independent passes run
//! over the parsed document:
//!
//! - [`heading_labelled`] walks every text node holding a temperature and
//!   looks for a label in the enclosing containers, then in the text right
//!   before the value.
//! - [`table_rows`] reads `label | value` rows.
//!
//! A value in the value cell of such a row is labelled by the row in both
//! passes. A number whose `°C` sits in the next element (`<span>-95.2</span>
//! °C`) is still read as one value.
//!
//! [`extract`] unions both passes and drops duplicate `(label, value)` pairs.
//! Nothing here fails: anything that cannot be understood is skipped.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::trace;

use crate::{Reading, positional_label};

static TEMPERATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([-+]?\d{1,3}(?:[.,]\d+)?)\s*[°º]\s*C").expect("temperature pattern is valid")
});

static HEADINGS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6, b, strong, th, label, legend, caption")
        .expect("heading selector is valid")
});

static ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("row selector is valid"));

/// A number closing a text node, e.g. `<span>-95.2</span> °C`
static TRAILING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([-+]?\d{1,3}(?:[.,]\d+)?)\s*$").expect("trailing number pattern is valid")
});

static LEADING_DEGREE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[°º]\s*C").expect("degree pattern is valid"));

/// Containers the label search never climbs past.
const BOUNDARY_ELEMENTS: &[&str] = &["html", "body", "table", "tbody", "thead", "tfoot"];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

const MAX_ANCESTOR_DEPTH: usize = 4;

const LABEL_SEPARATORS: &[char] = &[':', '-', ',', ';', '|', '=', '/'];

/// One value found on the page, with the label it was published under.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedReading {
    pub label: Option<String>,
    pub temperature: f64,
}

impl ExtractedReading {
    pub fn new(label: Option<&str>, temperature: f64) -> Self {
        Self {
            label: label.map(str::to_string),
            temperature,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    start: usize,
    end: usize,
    value: f64,
}

/// `label | value` row, see [`table_rows`].
struct TableRow<'a> {
    label: Option<String>,
    value_cell: ElementRef<'a>,
    value: f64,
}

enum SiblingScan {
    Found(String),
    Blocked,
    Exhausted,
}

/// Extracts every distinct temperature from `markup`, in document order.
pub fn extract(markup: &str) -> Vec<ExtractedReading> {
    let document = Html::parse_document(markup);

    let mut seen = HashSet::new();
    let readings: Vec<ExtractedReading> = heading_labelled(&document)
        .into_iter()
        .chain(table_rows(&document))
        .filter(|reading| {
            // 0.0 and -0.0 are the same reading
            let value = if reading.temperature == 0.0 {
                0.0f64
            } else {
                reading.temperature
            };
            seen.insert((reading.label.clone().unwrap_or_default(), value.to_bits()))
        })
        .collect();

    trace!("extracted {} readings", readings.len());
    readings
}

/// Turns extracted pairs into readings, naming unlabeled values by position.
///
/// Positional names assume the device lists its sensors in a stable order.
/// If it reorders unlabeled sensors between polls, history is mislabeled.
pub fn resolve_labels(extracted: &[ExtractedReading], at: NaiveDateTime) -> Vec<Reading> {
    extracted
        .iter()
        .enumerate()
        .map(|(index, reading)| {
            let sensor = reading
                .label
                .clone()
                .unwrap_or_else(|| positional_label(index));
            Reading::new(at, sensor, reading.temperature)
        })
        .collect()
}

/// Card layout pass: every temperature inside a text node, labelled by the
/// nearest heading of its container or by the text preceding it.
///
/// Values sitting in the value cell of a `label | value` row take the row
/// label, so both passes agree on table layouts.
pub fn heading_labelled(document: &Html) -> Vec<ExtractedReading> {
    let mut found = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let Some(parent) = node.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        if SKIPPED_ELEMENTS.contains(&parent.value().name()) {
            continue;
        }

        let text: &str = text;
        let mut hits = temperature_hits(text);
        if hits.is_empty() {
            // the number may be split from its unit, look one level up too
            let mut following = node
                .next_siblings()
                .map(|sibling| node_text(sibling.value(), ElementRef::wrap(sibling)))
                .collect::<Vec<_>>()
                .join(" ");
            if following.trim().is_empty() {
                following = text_after(parent);
            }
            hits.extend(split_value_hit(text, &following));
        }
        if hits.is_empty() {
            continue;
        }

        let row = enclosing_row(parent);
        let mut previous_end = 0;

        for (position, hit) in hits.into_iter().enumerate() {
            let label = match &row {
                Some(row) => row.label.clone(),
                None => {
                    let mut label = heading_label(parent)
                        .or_else(|| clean_label(&text[previous_end..hit.start]));

                    if label.is_none() && position == 0 {
                        let own_siblings = node
                            .prev_siblings()
                            .map(|sibling| node_text(sibling.value(), ElementRef::wrap(sibling)));
                        label = match scan_siblings(own_siblings) {
                            SiblingScan::Found(label) => Some(label),
                            SiblingScan::Blocked => None,
                            SiblingScan::Exhausted => sibling_label_above(parent),
                        };
                    }
                    label
                }
            };

            previous_end = hit.end;
            found.push(ExtractedReading {
                label,
                temperature: hit.value,
            });
        }
    }

    found
}

/// Table layout pass: rows of exactly two non-empty cells whose second cell
/// holds a temperature.
pub fn table_rows(document: &Html) -> Vec<ExtractedReading> {
    document
        .select(&ROWS)
        .filter_map(table_row)
        .map(|row| ExtractedReading {
            label: row.label,
            temperature: row.value,
        })
        .collect()
}

fn table_row(row: ElementRef<'_>) -> Option<TableRow<'_>> {
    let cells: Vec<(ElementRef<'_>, String)> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .map(|cell| (cell, collapse_whitespace(&element_text(cell))))
        .filter(|(_, text)| !text.is_empty())
        .collect();

    let [(_, label), (value_cell, value)] = cells.as_slice() else {
        return None;
    };
    let hit = temperature_hits(value).into_iter().next()?;

    Some(TableRow {
        label: clean_label(label).filter(|label| !has_degree_marker(label)),
        value_cell: *value_cell,
        value: hit.value,
    })
}

/// The `label | value` row whose value cell contains `start`, if any.
fn enclosing_row(start: ElementRef<'_>) -> Option<TableRow<'_>> {
    let mut current = start;

    for _ in 0..MAX_ANCESTOR_DEPTH {
        let name = current.value().name();
        if BOUNDARY_ELEMENTS.contains(&name) || name == "tr" {
            return None;
        }
        if matches!(name, "td" | "th") {
            let row = current.parent().and_then(ElementRef::wrap)?;
            return table_row(row).filter(|row| row.value_cell.id() == current.id());
        }
        current = current.parent().and_then(ElementRef::wrap)?;
    }

    None
}

/// Text following `element` within its own parent.
fn text_after(element: ElementRef<'_>) -> String {
    if BOUNDARY_ELEMENTS.contains(&element.value().name()) {
        return String::new();
    }
    element
        .next_siblings()
        .map(|sibling| node_text(sibling.value(), ElementRef::wrap(sibling)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A bare number at the end of `text` whose degree marker opens the
/// following text.
fn split_value_hit(text: &str, following: &str) -> Option<Hit> {
    if !LEADING_DEGREE.is_match(following) {
        return None;
    }

    let number = TRAILING_NUMBER.captures(text)?.get(1)?;
    if text[..number.start()]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return None;
    }

    let value = number.as_str().replace(',', ".").parse::<f64>().ok()?;
    Some(Hit {
        start: number.start(),
        end: number.end(),
        value,
    })
}

fn temperature_hits(text: &str) -> Vec<Hit> {
    TEMPERATURE
        .captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let number = captures.get(1)?;

            // part of a longer number, e.g. the tail of `1234 °C`
            if text[..whole.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_digit())
            {
                return None;
            }

            let value = number.as_str().replace(',', ".").parse::<f64>().ok()?;
            Some(Hit {
                start: whole.start(),
                end: whole.end(),
                value,
            })
        })
        .collect()
}

fn heading_label(start: ElementRef<'_>) -> Option<String> {
    let mut current = Some(start);

    for _ in 0..MAX_ANCESTOR_DEPTH {
        let Some(container) = current else {
            break;
        };
        if BOUNDARY_ELEMENTS.contains(&container.value().name()) {
            break;
        }
        // a heading here could belong to another reading
        if TEMPERATURE.find_iter(&element_text(container)).count() > 1 {
            break;
        }

        let label = container.select(&HEADINGS).find_map(|heading| {
            clean_label(&element_text(heading)).filter(|label| !has_degree_marker(label))
        });
        if label.is_some() {
            return label;
        }

        current = container.parent().and_then(ElementRef::wrap);
    }

    None
}

fn sibling_label_above(start: ElementRef<'_>) -> Option<String> {
    let mut container = start;

    for _ in 0..MAX_ANCESTOR_DEPTH {
        if BOUNDARY_ELEMENTS.contains(&container.value().name()) {
            break;
        }

        let siblings = container
            .prev_siblings()
            .map(|sibling| node_text(sibling.value(), ElementRef::wrap(sibling)));
        match scan_siblings(siblings) {
            SiblingScan::Found(label) => return Some(label),
            SiblingScan::Blocked => return None,
            SiblingScan::Exhausted => {}
        }

        container = container.parent().and_then(ElementRef::wrap)?;
    }

    None
}

/// Nearest preceding sibling text usable as a label. A sibling carrying a
/// degree marker belongs to the previous reading and ends the search.
fn scan_siblings(texts: impl Iterator<Item = String>) -> SiblingScan {
    for text in texts {
        if has_degree_marker(&text) {
            return SiblingScan::Blocked;
        }
        if let Some(label) = clean_label(&text) {
            return SiblingScan::Found(label);
        }
    }
    SiblingScan::Exhausted
}

fn node_text(node: &Node, element: Option<ElementRef<'_>>) -> String {
    match node {
        Node::Text(text) => String::from(&**text),
        Node::Element(element_node) if SKIPPED_ELEMENTS.contains(&element_node.name()) => {
            String::new()
        }
        Node::Element(_) => element.map(element_text).unwrap_or_default(),
        _ => String::new(),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn has_degree_marker(text: &str) -> bool {
    text.contains('°') || text.contains('º')
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_label(raw: &str) -> Option<String> {
    let collapsed = collapse_whitespace(raw);
    let label = collapsed
        .trim_matches(|c: char| c.is_whitespace() || LABEL_SEPARATORS.contains(&c))
        .to_string();

    label.chars().any(char::is_alphanumeric).then_some(label)
}
