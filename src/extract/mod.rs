//! Field extractors.
//!
//! Every extractor is a pure function of a [`Document`]. An extractor never
//! fails: a field it cannot read comes back as [`FieldValue::Missing`] and the
//! record keeps that field's schema default.

pub mod document;
pub mod fields;
pub mod schema;
pub mod specs;

pub use document::Document;
pub use schema::{Field, ALL_FIELDS};

/// Outcome of reading one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Found(String),
    Missing,
}

impl FieldValue {
    /// Empty text counts as missing
    pub fn from_text(text: Option<String>) -> Self {
        match text {
            Some(text) if !text.trim().is_empty() => FieldValue::Found(text),
            _ => FieldValue::Missing,
        }
    }

    /// The found value, or the field's documented default
    #[cfg(test)]
    pub fn or_default(self, field: Field) -> String {
        match self {
            FieldValue::Found(value) => value,
            FieldValue::Missing => field.default_value().to_string(),
        }
    }
}

/// Values produced by one extractor
pub type Extraction = Vec<(Field, FieldValue)>;

/// A named, independent field extractor
pub struct Extractor {
    pub name: &'static str,
    pub extract: fn(&Document) -> Extraction,
}

/// The extractor set applied to every ready document, order-insensitive
pub const EXTRACTORS: &[Extractor] = &[
    Extractor { name: "name", extract: fields::name },
    Extractor { name: "price", extract: fields::price },
    Extractor { name: "description", extract: fields::description },
    Extractor { name: "rating", extract: fields::rating },
    Extractor { name: "reviews", extract: fields::reviews },
    Extractor { name: "colors", extract: fields::colors },
    Extractor { name: "sizes", extract: fields::sizes },
    Extractor { name: "promotions", extract: fields::promotions },
    Extractor { name: "availability", extract: fields::availability },
    Extractor { name: "specifications", extract: specs::specifications },
];
