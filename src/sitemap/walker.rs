//! Lazy sitemap walk
//!
//! Sitemaps are fetched one at a time, only when the links of the previous
//! one are used up. Child sitemaps of an index are expanded depth-first in
//! document order, so candidates come out in sitemap document order.

use crate::crawler::{FetchOutcome, Fetcher};
use crate::robots::PolitenessGate;
use crate::sitemap::{LinkEnumerator, SitemapDocument, SitemapError, SitemapSource};
use crate::HarvestError;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use url::Url;

/// Counters reported when a walk completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub sitemaps_processed: usize,
    pub sitemaps_skipped: usize,
    pub links_found: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    /// The configured index; its children must pass `accepts_sitemap`
    Root,
    /// An accepted sitemap or one of its descendants
    Accepted,
}

/// One pass over the sitemaps of a source
pub struct SitemapWalker {
    enumerator: Arc<dyn LinkEnumerator>,
    base: Url,
    pending: VecDeque<(Url, Level)>,
    /// Every sitemap ever queued, so a cycle between sitemaps ends the walk
    seen: HashSet<Url>,
    links: VecDeque<String>,
    seeded: bool,
    finished: bool,
    stats: WalkStats,
}

impl SitemapWalker {
    pub fn new(enumerator: Arc<dyn LinkEnumerator>, base: Url) -> Self {
        Self {
            enumerator,
            base,
            pending: VecDeque::new(),
            seen: HashSet::new(),
            links: VecDeque::new(),
            seeded: false,
            finished: false,
            stats: WalkStats::default(),
        }
    }

    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    /// Returns the next candidate URL, or `None` once every sitemap has been
    /// read
    ///
    /// Bad sitemaps are logged and skipped. Only a missing politeness policy
    /// is returned as an error.
    pub async fn next_link(
        &mut self,
        fetcher: &mut Fetcher,
        gate: &mut PolitenessGate,
    ) -> Result<Option<String>, HarvestError> {
        if !self.seeded {
            self.seed(gate).await?;
            self.seeded = true;
        }

        loop {
            if let Some(link) = self.links.pop_front() {
                return Ok(Some(link));
            }

            let Some((sitemap_url, level)) = self.pending.pop_front() else {
                if !self.finished {
                    self.finished = true;
                    tracing::info!(
                        "Sitemap walk finished: {} sitemaps processed, {} skipped, {} links found",
                        self.stats.sitemaps_processed,
                        self.stats.sitemaps_skipped,
                        self.stats.links_found
                    );
                }
                return Ok(None);
            };

            match load(fetcher, &sitemap_url).await {
                Ok(document) => {
                    self.stats.sitemaps_processed += 1;
                    self.expand(&sitemap_url, level, document);
                }
                Err(e) => {
                    self.stats.sitemaps_skipped += 1;
                    tracing::warn!("Skipping sitemap {}: {}", sitemap_url, e);
                }
            }
        }
    }

    async fn seed(&mut self, gate: &mut PolitenessGate) -> Result<(), HarvestError> {
        match self.enumerator.source() {
            SitemapSource::Index { path } => {
                let root = self.base.join(&path)?;
                self.seen.insert(root.clone());
                self.pending.push_back((root, Level::Root));
            }
            SitemapSource::RobotsDeclared => {
                let declared = gate.sitemap_locations().await.map_err(|source| {
                    HarvestError::Politeness {
                        url: gate.robots_url().to_string(),
                        source,
                    }
                })?;

                for location in declared {
                    if !self.enumerator.accepts_sitemap(&location) {
                        continue;
                    }
                    match self.base.join(&location) {
                        Ok(url) => {
                            if self.seen.insert(url.clone()) {
                                self.pending.push_back((url, Level::Accepted));
                            }
                        }
                        Err(e) => tracing::warn!("Ignoring sitemap '{}': {}", location, e),
                    }
                }
            }
        }

        tracing::debug!("Sitemap walk seeded with {} sitemaps", self.pending.len());
        Ok(())
    }

    fn expand(&mut self, sitemap_url: &Url, level: Level, document: SitemapDocument) {
        let mut children = Vec::new();
        for location in document.sitemaps {
            if level == Level::Root && !self.enumerator.accepts_sitemap(&location) {
                continue;
            }
            match sitemap_url.join(&location) {
                Ok(url) => {
                    if self.seen.insert(url.clone()) {
                        children.push((url, Level::Accepted));
                    } else {
                        self.stats.sitemaps_skipped += 1;
                        tracing::warn!("Skipping sitemap {}: already visited", url);
                    }
                }
                Err(e) => tracing::warn!("Ignoring sitemap '{}': {}", location, e),
            }
        }
        // Depth-first: children go before the remaining siblings
        for child in children.into_iter().rev() {
            self.pending.push_front(child);
        }

        let before = self.links.len();
        for location in document.urls {
            if self.enumerator.accepts_link(&location) {
                self.links.push_back(location);
            }
        }
        let found = self.links.len() - before;
        self.stats.links_found += found;
        tracing::debug!("Sitemap {} yielded {} links", sitemap_url, found);
    }
}

async fn load(fetcher: &mut Fetcher, url: &Url) -> Result<SitemapDocument, SitemapError> {
    match fetcher.get(url.as_str()).await {
        Ok(FetchOutcome::Success(page)) => SitemapDocument::parse(&page.body),
        Ok(FetchOutcome::Gone { status }) | Ok(FetchOutcome::Failed { status, .. }) => {
            Err(SitemapError::Status(status))
        }
        Err(e) => Err(SitemapError::Request(Box::new(e))),
    }
}
