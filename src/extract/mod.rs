//! Field extraction from advertisement markup
//!
//! An [`Extractor`] turns a raw document into [`ExtractedFields`]. Engines
//! build theirs from [`FieldExtractor`]s: ordered lists of CSS lookups where
//! the first lookup yielding non-empty text wins. A field nothing matches is
//! simply absent.

use scraper::{ElementRef, Html, Selector};

/// Structured fields of one advertisement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Posting date as printed on the page
    pub date: Option<String>,
}

/// Per-engine field extraction strategy
pub trait Extractor: Send + Sync {
    /// Extracts fields from a raw document; never fails
    fn extract(&self, html: &str) -> ExtractedFields;
}

#[derive(Debug)]
enum Lookup {
    /// Whitespace-normalized text of the first match
    Text(Selector),
    /// `<p>` children of the first match joined by newlines, or its text when
    /// it has none
    Paragraphs(Selector),
    /// An attribute of the first match
    Attribute(Selector, &'static str),
}

/// Ordered fallbacks for one field
#[derive(Debug, Default)]
pub struct FieldExtractor {
    lookups: Vec<Lookup>,
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, css: &str) -> Self {
        if let Some(selector) = parse_selector(css) {
            self.lookups.push(Lookup::Text(selector));
        }
        self
    }

    pub fn paragraphs(mut self, css: &str) -> Self {
        if let Some(selector) = parse_selector(css) {
            self.lookups.push(Lookup::Paragraphs(selector));
        }
        self
    }

    pub fn attribute(mut self, css: &str, attribute: &'static str) -> Self {
        if let Some(selector) = parse_selector(css) {
            self.lookups.push(Lookup::Attribute(selector, attribute));
        }
        self
    }

    /// Returns the value of the first lookup that yields non-empty text
    pub fn extract(&self, document: &Html) -> Option<String> {
        self.lookups.iter().find_map(|lookup| match lookup {
            Lookup::Text(selector) => document
                .select(selector)
                .next()
                .and_then(|element| non_empty(normalize(&element_text(element)))),
            Lookup::Paragraphs(selector) => document
                .select(selector)
                .next()
                .and_then(|element| non_empty(paragraph_text(element))),
            Lookup::Attribute(selector, attribute) => document
                .select(selector)
                .next()
                .and_then(|element| element.value().attr(attribute))
                .and_then(|value| non_empty(normalize(value))),
        })
    }
}

/// An extractor assembled from one [`FieldExtractor`] per field
#[derive(Debug, Default)]
pub struct PageExtractor {
    pub title: FieldExtractor,
    pub company: FieldExtractor,
    pub location: FieldExtractor,
    pub description: FieldExtractor,
    pub date: FieldExtractor,
}

impl Extractor for PageExtractor {
    fn extract(&self, html: &str) -> ExtractedFields {
        let document = Html::parse_document(html);
        ExtractedFields {
            title: self.title.extract(&document),
            company: self.company.extract(&document),
            location: self.location.extract(&document),
            description: self.description.extract(&document),
            date: self.date.extract(&document),
        }
    }
}

fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::warn!("Ignoring invalid selector '{}': {:?}", css, e);
            None
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

fn paragraph_text(element: ElementRef<'_>) -> String {
    let Ok(p) = Selector::parse("p") else {
        return normalize(&element_text(element));
    };

    let paragraphs: Vec<String> = element
        .select(&p)
        .map(|paragraph| normalize(&element_text(paragraph)))
        .filter(|text| !text.is_empty())
        .collect();

    if paragraphs.is_empty() {
        normalize(&element_text(element))
    } else {
        paragraphs.join("\n")
    }
}

/// Collapses runs of whitespace into single spaces
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
