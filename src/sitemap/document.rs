//! Sitemap XML documents
//!
//! Both `<urlset>` and `<sitemapindex>` documents deserialize into the same
//! shape; whichever child list is populated tells them apart.

use crate::sitemap::SitemapError;
use quick_xml::de::from_str;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawSitemap {
    #[serde(rename = "url", default)]
    urls: Vec<RawEntry>,

    #[serde(rename = "sitemap", default)]
    sitemaps: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    loc: Option<String>,
}

/// A parsed sitemap or sitemap index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    /// Child sitemap locations (index documents)
    pub sitemaps: Vec<String>,
    /// Page locations (urlset documents)
    pub urls: Vec<String>,
}

impl SitemapDocument {
    /// Parses sitemap XML
    ///
    /// Entries without a `<loc>` are ignored.
    pub fn parse(xml: &str) -> Result<Self, SitemapError> {
        if xml.trim().is_empty() {
            return Err(SitemapError::Empty);
        }

        let raw: RawSitemap = from_str(xml)?;
        Ok(Self {
            sitemaps: locations(raw.sitemaps),
            urls: locations(raw.urls),
        })
    }

    pub fn is_index(&self) -> bool {
        !self.sitemaps.is_empty()
    }
}

fn locations(entries: Vec<RawEntry>) -> Vec<String> {
    entries
        .into_iter()
        .filter_map(|entry| entry.loc)
        .map(|loc| loc.trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect()
}
