use tracing::debug;

use crate::extract::document::{is_disabled, select_in, text_of, Document};
use crate::extract::schema::{Field, IN_STOCK};
use crate::extract::{Extraction, FieldValue};

const NAME: &[&str] = &["h1.product-page__title", ".product-page__header h1"];
const PRICE: &[&str] = &["ins.price-block__final-price", "span.price-block__final-price"];
const DESCRIPTION: &[&str] = &[
    "section.product-details__description.option p.option__text",
    "section.product-details__description p.option__text",
];
const RATING: &[&str] = &["span.product-review__rating"];
const REVIEWS: &[&str] = &["span.product-review__count-review"];

const COLOR_ITEMS: &str = "li.color-list__item";
const SIZE_ITEMS: &str = "li.j-size";
const PROMO_ITEMS: &str = "div.product-promo__item";

const REMAINING_QTY: &str = "div.qty-block__remaining";
const BUY_BUTTON: &str = "button.btn-buy";

const LIST_SEPARATOR: &str = ", ";
const PROMO_SEPARATOR: &str = " | ";

fn scalar(doc: &Document, field: Field, chain: &[&str]) -> Extraction {
    vec![(field, FieldValue::from_text(doc.first_text(chain)))]
}

pub fn name(doc: &Document) -> Extraction {
    scalar(doc, Field::Name, NAME)
}

pub fn price(doc: &Document) -> Extraction {
    scalar(doc, Field::Price, PRICE)
}

pub fn description(doc: &Document) -> Extraction {
    scalar(doc, Field::Description, DESCRIPTION)
}

pub fn rating(doc: &Document) -> Extraction {
    scalar(doc, Field::Rating, RATING)
}

pub fn reviews(doc: &Document) -> Extraction {
    scalar(doc, Field::Reviews, REVIEWS)
}

/// Join the values of every enabled list item; no surviving item means missing
fn joined_list<F>(doc: &Document, items: &str, separator: &str, value_of: F) -> FieldValue
where
    F: Fn(&scraper::ElementRef<'_>) -> Option<String>,
{
    let nodes = doc.select(items);
    let total = nodes.len();

    let values: Vec<String> = nodes
        .iter()
        .filter(|node| !is_disabled(node))
        .filter_map(|node| value_of(node))
        .filter(|value| !value.is_empty())
        .collect();

    if total > values.len() {
        debug!("Dropped {} of {} '{}' items", total - values.len(), total, items);
    }

    if values.is_empty() {
        FieldValue::Missing
    } else {
        FieldValue::Found(values.join(separator))
    }
}

pub fn colors(doc: &Document) -> Extraction {
    let value = joined_list(doc, COLOR_ITEMS, LIST_SEPARATOR, |item| {
        let swatch = select_in(item, "span.color");
        swatch
            .and_then(|span| span.value().attr("title").map(|title| title.trim().to_string()))
            .filter(|title| !title.is_empty())
            .or_else(|| swatch.map(|span| text_of(&span)))
            .or_else(|| Some(text_of(item)))
    });
    vec![(Field::Colors, value)]
}

pub fn sizes(doc: &Document) -> Extraction {
    let value = joined_list(doc, SIZE_ITEMS, LIST_SEPARATOR, |item| {
        select_in(item, "span.size")
            .map(|span| text_of(&span))
            .or_else(|| Some(text_of(item)))
    });
    vec![(Field::Sizes, value)]
}

pub fn promotions(doc: &Document) -> Extraction {
    let value = joined_list(doc, PROMO_ITEMS, PROMO_SEPARATOR, |item| Some(text_of(item)));
    vec![(Field::Promotions, value)]
}

/// Remaining quantity if shown, otherwise whether the buy button is usable
pub fn availability(doc: &Document) -> Extraction {
    if let Some(remaining) = doc.first_text(&[REMAINING_QTY]) {
        return vec![(Field::Availability, FieldValue::Found(remaining))];
    }

    let purchasable = doc
        .select(BUY_BUTTON)
        .first()
        .map_or(false, |button| !is_disabled(button));

    let value = if purchasable {
        FieldValue::Found(IN_STOCK.to_string())
    } else {
        FieldValue::Missing
    };
    vec![(Field::Availability, value)]
}
