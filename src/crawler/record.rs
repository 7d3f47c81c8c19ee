use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::extract::{Document, Extractor, Field, FieldValue, ALL_FIELDS, EXTRACTORS};

/// One product's values, always holding every schema field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    values: BTreeMap<Field, String>,
}

impl Record {
    /// All schema defaults with the identity fields filled in
    pub fn seeded(identifier: &str, url: &str) -> Self {
        let mut values: BTreeMap<Field, String> = ALL_FIELDS
            .iter()
            .map(|field| (*field, field.default_value().to_string()))
            .collect();
        values.insert(Field::Article, identifier.to_string());
        values.insert(Field::Url, url.to_string());

        Self { values }
    }

    pub fn get(&self, field: Field) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or_default()
    }

    pub fn identifier(&self) -> &str {
        self.get(Field::Article)
    }

    /// Overwrite `field` with a found value. Missing values and identity fields
    /// leave the record untouched. Returns whether the record changed.
    pub fn merge(&mut self, field: Field, value: FieldValue) -> bool {
        if matches!(field, Field::Article | Field::Url) {
            debug!("Refusing to overwrite identity field {:?}", field);
            return false;
        }

        match value {
            FieldValue::Found(text) if !text.is_empty() => {
                self.values.insert(field, text);
                true
            }
            _ => false,
        }
    }

    /// Values in column order
    pub fn row(&self) -> Vec<&str> {
        self.values.values().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in &self.values {
            map.serialize_entry(field.column(), value)?;
        }
        map.end()
    }
}

/// Build the record for one identifier.
///
/// Without a document (the page never became ready) the seeded defaults are
/// returned. Otherwise every extractor runs against the document; one that
/// panics leaves its fields at their defaults and the rest still run.
pub fn build_record(identifier: &str, url: &str, source: Option<&str>) -> Record {
    build_record_with(identifier, url, source, EXTRACTORS)
}

/// Build a record with an explicit extractor set
pub fn build_record_with(
    identifier: &str,
    url: &str,
    source: Option<&str>,
    extractors: &[Extractor],
) -> Record {
    let mut record = Record::seeded(identifier, url);

    let Some(source) = source else {
        return record;
    };

    let document = Document::parse(source);
    let mut filled = 0;

    for extractor in extractors {
        match catch_unwind(AssertUnwindSafe(|| (extractor.extract)(&document))) {
            Ok(extraction) => {
                for (field, value) in extraction {
                    if record.merge(field, value) {
                        filled += 1;
                    }
                }
            }
            Err(_) => warn!("{}: extractor '{}' panicked, keeping defaults", identifier, extractor.name),
        }
    }

    debug!("{}: filled {} of {} fields", identifier, filled, record.len());
    record
}
