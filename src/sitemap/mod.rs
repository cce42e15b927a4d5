//! Sitemap traversal
//!
//! A [`LinkEnumerator`] describes where a source keeps its sitemaps and
//! which of them hold advertisements. The [`SitemapWalker`] turns that
//! description into a lazy stream of candidate URLs.

mod document;
mod walker;

pub use document::SitemapDocument;
pub use walker::{SitemapWalker, WalkStats};

use crate::HarvestError;
use thiserror::Error;

/// Reasons a single sitemap is skipped
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("request failed: {0}")]
    Request(Box<HarvestError>),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("empty response")]
    Empty,

    #[error("malformed sitemap XML: {0}")]
    Parse(#[from] quick_xml::errors::serialize::DeError),
}

/// Where the walk starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapSource {
    /// A sitemap index at `path` below the source URL; its children are
    /// filtered with [`LinkEnumerator::accepts_sitemap`]
    Index { path: String },

    /// The sitemaps declared in robots.txt, filtered with
    /// [`LinkEnumerator::accepts_sitemap`]
    RobotsDeclared,
}

/// Per-engine sitemap traversal strategy
pub trait LinkEnumerator: Send + Sync {
    fn source(&self) -> SitemapSource;

    /// Whether a top-level sitemap holds advertisements
    fn accepts_sitemap(&self, url: &str) -> bool;

    /// Whether a leaf URL is an advertisement candidate
    fn accepts_link(&self, _url: &str) -> bool {
        true
    }
}
