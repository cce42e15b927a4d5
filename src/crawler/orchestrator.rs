//! Per-source harvest pipeline
//!
//! Every candidate URL the sitemap walk yields goes through
//! lookup → politeness check → fetch → extract → match and ends up either
//! skipped, failed or queued for the next batch commit. Candidates are
//! handled one at a time, in sitemap order. A failure on one candidate is
//! logged and counted; only configuration-class errors end the run.

use crate::config::{HarvestSettings, SourceConfig};
use crate::crawler::{build_http_client, default_headers, FetchOutcome, Fetcher};
use crate::engine::Engine;
use crate::keywords::{KeywordMatcher, MatchScope, MatchTarget};
use crate::robots::PolitenessGate;
use crate::sitemap::SitemapWalker;
use crate::storage::{NewAdvertisement, PendingAdvertisement, SqliteStorage, Storage};
use crate::HarvestError;
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

/// Counters of one harvest pass over a source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestSummary {
    pub source: String,
    /// Candidates taken from the sitemap walk
    pub processed: usize,
    /// Advertisements committed to the store
    pub stored: usize,
    pub skipped_existing: usize,
    pub disallowed: usize,
    /// Candidates answered with 410
    pub gone: usize,
    pub errors: usize,
    pub elapsed: Duration,
}

impl HarvestSummary {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Self::default()
        }
    }

    /// Stored advertisements per minute of wall-clock time
    pub fn items_per_minute(&self) -> f64 {
        per_minute(self.stored, self.elapsed)
    }
}

fn per_minute(count: usize, elapsed: Duration) -> f64 {
    let minutes = elapsed.as_secs_f64() / 60.0;
    if minutes > 0.0 {
        count as f64 / minutes
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    AlreadyHarvested,
    Disallowed,
    Gone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Lookup,
    Fetch,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Lookup => write!(f, "lookup"),
            Stage::Fetch => write!(f, "fetch"),
            Stage::Persist => write!(f, "persist"),
        }
    }
}

enum CandidateOutcome {
    Skipped(SkipReason),
    Failed { stage: Stage, error: HarvestError },
    /// Extracted and matched; waiting for the batch commit
    Ready(PendingAdvertisement),
}

/// Runs the harvest pipeline for one source
///
/// The orchestrator owns all per-source state: its politeness gate, its
/// fetcher (rate limiter + cookie jar) and its own database connection.
pub struct HarvestOrchestrator {
    source: SourceConfig,
    base: Url,
    engine: Engine,
    match_scope: MatchScope,
    commit_every: usize,
    storage: SqliteStorage,
    gate: PolitenessGate,
    fetcher: Fetcher,
}

impl HarvestOrchestrator {
    /// Creates an orchestrator; nothing is fetched yet
    pub fn new(
        source: SourceConfig,
        settings: &HarvestSettings,
        engine: Engine,
        storage: SqliteStorage,
    ) -> Result<Self, HarvestError> {
        let base = Url::parse(&source.url)?;
        let user_agent = source.user_agent(settings).to_string();

        let client = build_http_client(default_headers(&user_agent, &source.headers)?)?;
        let gate = PolitenessGate::new(
            client.clone(),
            &base,
            &user_agent,
            source.requests_per_minute,
        )?;
        let fetcher = Fetcher::new(client, gate.configured_delay(), source.retry_timeout());

        Ok(Self {
            base,
            engine,
            match_scope: settings.match_scope,
            commit_every: settings.commit_every.max(1) as usize,
            storage,
            gate,
            fetcher,
            source,
        })
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Runs one full pass over the source's sitemaps
    ///
    /// # Errors
    ///
    /// Only errors for which [`HarvestError::is_fatal`] holds are returned;
    /// everything else is counted in the summary.
    pub async fn run(&mut self) -> Result<HarvestSummary, HarvestError> {
        let started = Instant::now();
        tracing::info!(
            "Starting harvest of {} with engine '{}'",
            self.base,
            self.engine.name
        );

        self.gate
            .refresh()
            .await
            .map_err(|source| self.politeness_error(source))?;
        let delay = self
            .gate
            .crawl_delay()
            .await
            .map_err(|source| self.politeness_error(source))?;
        self.fetcher.set_crawl_delay(delay);
        tracing::info!("Crawl delay is {:.1}s", delay.as_secs_f64());

        let matcher = KeywordMatcher::compile(&self.storage.load_keywords()?);
        if matcher.is_empty() {
            tracing::warn!("No keywords loaded; advertisements will be stored untagged");
        }

        match self.fetcher.prime_session(self.base.as_str()).await {
            Ok(200) => tracing::debug!("Session primed"),
            Ok(status) => tracing::warn!("Session priming returned HTTP {}", status),
            Err(e) => tracing::warn!("Session priming failed: {}", e),
        }

        let mut summary = HarvestSummary::new(&self.source.name);
        let mut batch: Vec<PendingAdvertisement> = Vec::new();
        let mut queued: HashSet<String> = HashSet::new();
        let mut walker = SitemapWalker::new(self.engine.enumerator.clone(), self.base.clone());

        let result = loop {
            let url = match walker.next_link(&mut self.fetcher, &mut self.gate).await {
                Ok(Some(url)) => url,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            summary.processed += 1;

            match self.process_candidate(&url, &matcher, &queued).await {
                CandidateOutcome::Skipped(reason) => {
                    tracing::debug!("Skipping {}: {:?}", url, reason);
                    match reason {
                        SkipReason::AlreadyHarvested => summary.skipped_existing += 1,
                        SkipReason::Disallowed => summary.disallowed += 1,
                        SkipReason::Gone => summary.gone += 1,
                    }
                }
                CandidateOutcome::Failed { stage, error } => {
                    summary.errors += 1;
                    tracing::error!("Failed to harvest {} at {} stage: {}", url, stage, error);
                    if error.is_fatal() {
                        break Err(error);
                    }
                }
                CandidateOutcome::Ready(pending) => {
                    queued.insert(url);
                    batch.push(pending);
                    if batch.len() >= self.commit_every {
                        self.flush(&mut batch, &mut summary);
                        queued.clear();
                        tracing::info!(
                            "Progress: {} stored, {} processed, {:.1} items/min",
                            summary.stored,
                            summary.processed,
                            per_minute(summary.stored, started.elapsed())
                        );
                    }
                }
            }
        };

        self.flush(&mut batch, &mut summary);
        summary.elapsed = started.elapsed();
        result?;

        tracing::info!(
            "Harvest finished: {} processed, {} stored, {} already harvested, {} disallowed, {} gone, {} errors in {:.1}s ({:.1} items/min)",
            summary.processed,
            summary.stored,
            summary.skipped_existing,
            summary.disallowed,
            summary.gone,
            summary.errors,
            summary.elapsed.as_secs_f64(),
            summary.items_per_minute()
        );

        Ok(summary)
    }

    async fn process_candidate(
        &mut self,
        url: &str,
        matcher: &KeywordMatcher,
        queued: &HashSet<String>,
    ) -> CandidateOutcome {
        if queued.contains(url) {
            return CandidateOutcome::Skipped(SkipReason::AlreadyHarvested);
        }
        match self.storage.exists(url) {
            Ok(true) => return CandidateOutcome::Skipped(SkipReason::AlreadyHarvested),
            Ok(false) => {}
            Err(e) => {
                return CandidateOutcome::Failed {
                    stage: Stage::Lookup,
                    error: e.into(),
                }
            }
        }

        match self.gate.can_fetch(url).await {
            Ok(true) => {}
            Ok(false) => return CandidateOutcome::Skipped(SkipReason::Disallowed),
            Err(source) => {
                return CandidateOutcome::Failed {
                    stage: Stage::Lookup,
                    error: self.politeness_error(source),
                }
            }
        }

        let page = match self.fetcher.get(url).await {
            Ok(FetchOutcome::Success(page)) => page,
            Ok(FetchOutcome::Gone { .. }) => return CandidateOutcome::Skipped(SkipReason::Gone),
            Ok(FetchOutcome::Failed { status, retried }) => {
                return CandidateOutcome::Failed {
                    stage: Stage::Fetch,
                    error: HarvestError::UnexpectedStatus {
                        url: url.to_string(),
                        status,
                        retried,
                    },
                }
            }
            Err(error) => {
                return CandidateOutcome::Failed {
                    stage: Stage::Fetch,
                    error,
                }
            }
        };

        if page.body.trim().is_empty() {
            return CandidateOutcome::Failed {
                stage: Stage::Fetch,
                error: HarvestError::EmptyBody(url.to_string()),
            };
        }

        let fields = self.engine.extractor.extract(&page.body);
        tracing::debug!(
            "Extracted {}: title={:?} company={:?} location={:?} date={:?}",
            url,
            fields.title,
            fields.company,
            fields.location,
            fields.date
        );

        let keyword_ids = matcher.match_advertisement(
            &MatchTarget {
                title: fields.title.as_deref(),
                description: fields.description.as_deref(),
                raw_body: &page.body,
            },
            self.match_scope,
        );

        CandidateOutcome::Ready(PendingAdvertisement {
            record: NewAdvertisement {
                url: url.to_string(),
                http_status: page.status,
                html_body: page.body,
                ad_type: self.engine.name.clone(),
                title: fields.title,
                company: fields.company,
                location: fields.location,
                description: fields.description,
            },
            keyword_ids,
        })
    }

    /// Commits the pending batch and counts the outcome of each advertisement
    fn flush(&mut self, batch: &mut Vec<PendingAdvertisement>, summary: &mut HarvestSummary) {
        if batch.is_empty() {
            return;
        }

        match self.storage.store_batch(batch) {
            Ok(results) => {
                for (pending, result) in batch.iter().zip(results) {
                    match result {
                        Ok(id) => {
                            summary.stored += 1;
                            tracing::debug!(
                                "Stored {} as #{} with {} tags",
                                pending.record.url,
                                id,
                                pending.keyword_ids.len()
                            );
                        }
                        Err(e) => {
                            summary.errors += 1;
                            tracing::error!(
                                "Failed to harvest {} at {} stage: {}",
                                pending.record.url,
                                Stage::Persist,
                                e
                            );
                        }
                    }
                }
            }
            Err(e) => {
                summary.errors += batch.len();
                tracing::error!("Commit of {} advertisements failed: {}", batch.len(), e);
                if let Err(e) = self.storage.rollback_batch() {
                    tracing::warn!("Rollback failed: {}", e);
                }
            }
        }

        batch.clear();
    }

    fn politeness_error(&self, source: crate::robots::RobotsError) -> HarvestError {
        HarvestError::Politeness {
            url: self.gate.robots_url().to_string(),
            source,
        }
    }
}
