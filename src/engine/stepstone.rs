//! stepstone.at
//!
//! Advertisements are listed in `listings-<n>.xml` children of
//! `/sitemap.xml`. Pages mark their fields with `data-at` attributes.

use crate::extract::{FieldExtractor, PageExtractor};
use crate::sitemap::{LinkEnumerator, SitemapSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct StepstoneSitemaps;

impl LinkEnumerator for StepstoneSitemaps {
    fn source(&self) -> SitemapSource {
        SitemapSource::Index {
            path: "/sitemap.xml".to_string(),
        }
    }

    fn accepts_sitemap(&self, url: &str) -> bool {
        is_listings_sitemap(url)
    }
}

/// Matches `.../listings-<digits>.xml`
fn is_listings_sitemap(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let file = path.rsplit('/').next().unwrap_or("");
    file.strip_prefix("listings-")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .map_or(false, |number| {
            !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit())
        })
}

pub fn stepstone_extractor() -> PageExtractor {
    PageExtractor {
        title: FieldExtractor::new()
            .text("[data-at='header-job-title']")
            .text("[data-at='job-ad-title']"),
        company: FieldExtractor::new()
            .text("[data-at='metadata-company-name']")
            .text("[data-at='header-company-name']"),
        location: FieldExtractor::new()
            .text("[data-at='metadata-location']")
            .text("[data-at='header-job-location']"),
        description: FieldExtractor::new()
            .paragraphs("article.job-description")
            .paragraphs("[data-at='job-ad-content']")
            .attribute("meta[name='description']", "content"),
        date: FieldExtractor::new()
            .text("time")
            .text("[data-at='metadata-online-date']"),
    }
}
