//! karriere.at
//!
//! Job sitemaps are declared in robots.txt and named `sitemap-jobs*`.

use crate::extract::{FieldExtractor, PageExtractor};
use crate::sitemap::{LinkEnumerator, SitemapSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct KarriereSitemaps;

impl LinkEnumerator for KarriereSitemaps {
    fn source(&self) -> SitemapSource {
        SitemapSource::RobotsDeclared
    }

    fn accepts_sitemap(&self, url: &str) -> bool {
        url.contains("sitemap-jobs")
    }
}

pub fn karriere_extractor() -> PageExtractor {
    PageExtractor {
        title: FieldExtractor::new()
            .text("h1.m-jobHeader__jobTitle")
            .text("h1.m-jobHeader__title"),
        company: FieldExtractor::new()
            .text(".m-keyfactBox__companyName")
            .text(".m-jobHeader__companyName"),
        location: FieldExtractor::new()
            .text(".m-keyfactBox__jobLocations")
            .text(".m-jobHeader__jobLocations"),
        description: FieldExtractor::new()
            .paragraphs(".m-jobContent__jobDetail")
            .paragraphs(".m-jobContent__jobText"),
        date: FieldExtractor::new()
            .text(".m-jobHeader__jobDate")
            .text("time"),
    }
}
