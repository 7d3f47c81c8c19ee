//! Parameter table extraction.
//!
//! Rows of the product parameter table are read as (label, value) pairs and
//! kept only when the label names a schema field. Labels in
//! [`FALLBACK_FIELDS`] that the scan missed are then looked up anywhere in the
//! page by header text. The first value seen for a field is kept.

use scraper::ElementRef;
use std::collections::BTreeMap;
use tracing::debug;

use crate::extract::document::{select_in, text_of, Document};
use crate::extract::schema::{Field, FALLBACK_FIELDS};
use crate::extract::{Extraction, FieldValue};

const PARAM_ROWS: &str = "div.product-params table.product-params__table tr.product-params__row";

pub fn specifications(doc: &Document) -> Extraction {
    let mut params: BTreeMap<Field, String> = BTreeMap::new();

    for row in doc.select(PARAM_ROWS) {
        let Some((label, value)) = row_pair(&row) else {
            continue;
        };

        match Field::from_spec_label(&label) {
            Some(field) => {
                params.entry(field).or_insert(value);
            }
            None => debug!("Ignoring unknown parameter '{}'", label),
        }
    }

    for field in FALLBACK_FIELDS {
        if params.contains_key(&field) {
            continue;
        }
        let Some(label) = field.spec_label() else {
            continue;
        };
        if let Some(value) = lookup_by_header(doc, label) {
            debug!("Found '{}' outside the parameter table", label);
            params.insert(field, value);
        }
    }

    params
        .into_iter()
        .map(|(field, value)| (field, FieldValue::Found(value)))
        .collect()
}

fn row_pair(row: &ElementRef<'_>) -> Option<(String, String)> {
    let label = select_in(row, "th span span")
        .or_else(|| select_in(row, "th"))
        .map(|cell| text_of(&cell))?;
    let value = select_in(row, "td span")
        .or_else(|| select_in(row, "td"))
        .map(|cell| text_of(&cell))?;

    if label.is_empty() || value.is_empty() {
        None
    } else {
        Some((label, value))
    }
}

/// Value cell next to the first header cell whose text contains `label`
fn lookup_by_header(doc: &Document, label: &str) -> Option<String> {
    doc.select("th")
        .into_iter()
        .filter(|header| text_of(header).contains(label))
        .find_map(|header| adjacent_cell(&header))
}

fn adjacent_cell(header: &ElementRef<'_>) -> Option<String> {
    let sibling = header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "td");

    let cell = sibling.or_else(|| {
        header
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|row| select_in(&row, "td"))
    })?;

    let text = text_of(&cell);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
