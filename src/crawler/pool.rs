//! Concurrent source workers
//!
//! Each configured source is harvested by its own tokio task. Workers share
//! nothing but the database file: every worker opens its own connection and
//! builds its own HTTP client, cookie jar, rate limiter and robots policy.

use crate::config::{Config, HarvestSettings, SourceConfig};
use crate::crawler::{HarvestOrchestrator, HarvestSummary};
use crate::engine::{Engine, EngineRegistry};
use crate::storage::SqliteStorage;
use crate::HarvestError;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Final state of one source worker
#[derive(Debug)]
pub struct SourceReport {
    pub source: String,
    pub result: Result<HarvestSummary, HarvestError>,
}

impl SourceReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// The set of workers for one harvest invocation
pub struct SourcePool {
    settings: HarvestSettings,
    database_path: PathBuf,
    workers: Vec<(SourceConfig, Engine)>,
}

impl SourcePool {
    /// Resolves every source's engine up front
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::UnknownEngine`] for the first source naming an
    /// engine the registry does not know; no worker is started in that case.
    pub fn new(config: &Config, registry: &EngineRegistry) -> Result<Self, HarvestError> {
        let workers = config
            .sources
            .iter()
            .map(|source| {
                registry
                    .get(&source.engine)
                    .cloned()
                    .map(|engine| (source.clone(), engine))
                    .ok_or_else(|| HarvestError::UnknownEngine {
                        source_name: source.name.clone(),
                        engine: source.engine.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            settings: config.harvest.clone(),
            database_path: PathBuf::from(&config.harvest.database_path),
            workers,
        })
    }

    /// Overrides the database file every worker opens
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Runs all workers to completion
    ///
    /// Reports come back in configuration order. A failing or panicking
    /// worker never affects the others.
    pub async fn run(self) -> Vec<SourceReport> {
        tracing::info!("Starting {} source workers", self.workers.len());

        let handles: Vec<(String, JoinHandle<Result<HarvestSummary, HarvestError>>)> = self
            .workers
            .into_iter()
            .map(|(source, engine)| {
                let name = source.name.clone();
                let settings = self.settings.clone();
                let path = self.database_path.clone();
                let span = tracing::info_span!("source", name = %name);
                let handle =
                    tokio::spawn(run_worker(source, settings, engine, path).instrument(span));
                (name, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (source, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Worker for {} did not finish: {}", source, e);
                    Err(HarvestError::WorkerAborted(source.clone()))
                }
            };
            if let Err(e) = &result {
                tracing::error!("Source {} failed: {}", source, e);
            }
            reports.push(SourceReport { source, result });
        }

        reports
    }
}

async fn run_worker(
    source: SourceConfig,
    settings: HarvestSettings,
    engine: Engine,
    database_path: PathBuf,
) -> Result<HarvestSummary, HarvestError> {
    let storage = SqliteStorage::open(&database_path, settings.busy_timeout())?;
    let mut orchestrator = HarvestOrchestrator::new(source, &settings, engine, storage)?;
    orchestrator.run().await
}
