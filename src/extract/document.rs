use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::warn;

/// Parsed snapshot of a rendered product page
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// All elements matching `css`, in document order. An invalid selector matches nothing.
    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        match compile(css) {
            Some(selector) => self.html.select(&selector).collect(),
            None => Vec::new(),
        }
    }

    /// Text of the first non-empty match, trying each selector in turn
    pub fn first_text(&self, chain: &[&str]) -> Option<String> {
        chain.iter().find_map(|css| {
            self.select(css)
                .into_iter()
                .map(|element| text_of(&element))
                .find(|text| !text.is_empty())
        })
    }
}

pub fn compile(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!("Failed to compile selector '{}': {:?}", css, e);
            None
        }
    }
}

/// First descendant of `element` matching `css`
pub fn select_in<'a>(element: &ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = compile(css)?;
    element.select(&selector).next()
}

/// Element text with whitespace runs collapsed and the ends trimmed
pub fn text_of(element: &ElementRef<'_>) -> String {
    normalize(&element.text().collect::<String>())
}

pub fn normalize(text: &str) -> String {
    static WHITESPACE: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = WHITESPACE.get_or_init(|| match Regex::new(r"\s+") {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Invalid whitespace pattern: {}", e);
            None
        }
    });

    match pattern {
        Some(pattern) => pattern.replace_all(text.trim(), " ").into_owned(),
        None => text.trim().to_string(),
    }
}

/// Whether the element carries an unavailable/disabled marker
pub fn is_disabled(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    value.classes().any(|class| class == "disabled" || class.ends_with("--disabled"))
        || value.attr("disabled").is_some()
        || value.attr("aria-disabled") == Some("true")
}
