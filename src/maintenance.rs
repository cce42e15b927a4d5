//! Offline passes over stored advertisements
//!
//! None of these touch the network: keyword refresh writes configured rules
//! to the store, re-analysis re-tags stored advertisements and back-fill
//! re-runs extraction over the stored raw body.

use crate::engine::EngineRegistry;
use crate::keywords::{KeywordMatcher, KeywordRule, MatchScope, MatchTarget};
use crate::storage::{FieldUpdate, IdRange, Storage, StorageError, StorageResult};

/// How configured keyword rules are applied to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Remove every keyword and tag first
    Full,
    /// Insert missing keywords, keep everything else
    Incremental,
}

/// Writes the configured keyword rules to the store
///
/// Rules whose pattern does not compile are skipped with a warning. Returns
/// the number of rules stored.
pub fn refresh_keywords(
    storage: &mut dyn Storage,
    rules: &[KeywordRule],
    mode: RefreshMode,
) -> StorageResult<usize> {
    if mode == RefreshMode::Full {
        storage.clear_keywords()?;
        tracing::info!("Cleared stored keywords and tags");
    }

    let mut stored = 0;
    for rule in rules {
        match storage.upsert_keyword(rule) {
            Ok(id) => {
                tracing::debug!("Keyword '{}' has id {}", rule.label(), id);
                stored += 1;
            }
            Err(e @ StorageError::InvalidPattern { .. }) => {
                tracing::warn!("Skipping keyword '{}': {}", rule.label(), e);
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!("Refreshed {} of {} keywords ({:?})", stored, rules.len(), mode);
    Ok(stored)
}

#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions {
    pub range: IdRange,
    pub scope: MatchScope,
    /// Advertisements per commit
    pub batch_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub analyzed: usize,
    /// Advertisements that matched at least one keyword
    pub tagged: usize,
    pub tags: usize,
}

/// Re-tags stored advertisements against the stored keywords
pub fn reanalyze(
    storage: &mut dyn Storage,
    options: AnalysisOptions,
) -> StorageResult<AnalysisSummary> {
    let matcher = KeywordMatcher::compile(&storage.load_keywords()?);
    let ids = storage.advertisement_ids(options.range, false)?;
    tracing::info!(
        "Analyzing {} advertisements against {} keywords (scope: {})",
        ids.len(),
        matcher.len(),
        options.scope
    );

    let mut summary = AnalysisSummary::default();
    let batch_size = options.batch_size.max(1);

    for chunk in ids.chunks(batch_size) {
        storage.begin_batch()?;
        let result = analyze_chunk(storage, &matcher, options.scope, chunk, &mut summary);
        if let Err(e) = result {
            storage.rollback_batch()?;
            return Err(e);
        }
        storage.commit_batch()?;
        tracing::info!("Analyzed {}/{} advertisements", summary.analyzed, ids.len());
    }

    Ok(summary)
}

fn analyze_chunk(
    storage: &mut dyn Storage,
    matcher: &KeywordMatcher,
    scope: MatchScope,
    ids: &[i64],
    summary: &mut AnalysisSummary,
) -> StorageResult<()> {
    for &id in ids {
        let Some(ad) = storage.get_advertisement(id)? else {
            continue;
        };

        let keyword_ids = matcher.match_advertisement(
            &MatchTarget {
                title: ad.title.as_deref(),
                description: ad.description.as_deref(),
                raw_body: &ad.html_body,
            },
            scope,
        );
        storage.replace_tags(id, &keyword_ids)?;

        summary.analyzed += 1;
        if !keyword_ids.is_empty() {
            summary.tagged += 1;
            summary.tags += keyword_ids.len();
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct BackfillOptions {
    pub range: IdRange,
    /// Overwrite fields that are already set
    pub force: bool,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub examined: usize,
    pub updated: usize,
    /// Advertisements whose engine is not registered
    pub unknown_engine: usize,
}

/// Re-extracts fields from stored raw bodies
///
/// Without `force` only advertisements with a missing field are examined and
/// only missing fields are written.
pub fn backfill(
    storage: &mut dyn Storage,
    registry: &EngineRegistry,
    options: BackfillOptions,
) -> StorageResult<BackfillSummary> {
    let ids = storage.advertisement_ids(options.range, !options.force)?;
    tracing::info!("Back-filling fields of {} advertisements", ids.len());

    let mut summary = BackfillSummary::default();
    for chunk in ids.chunks(options.batch_size.max(1)) {
        storage.begin_batch()?;
        if let Err(e) = backfill_chunk(storage, registry, options.force, chunk, &mut summary) {
            storage.rollback_batch()?;
            return Err(e);
        }
        storage.commit_batch()?;
    }

    tracing::info!(
        "Back-fill finished: {} examined, {} updated, {} with unknown engine",
        summary.examined,
        summary.updated,
        summary.unknown_engine
    );
    Ok(summary)
}

fn backfill_chunk(
    storage: &mut dyn Storage,
    registry: &EngineRegistry,
    force: bool,
    ids: &[i64],
    summary: &mut BackfillSummary,
) -> StorageResult<()> {
    for &id in ids {
        let Some(ad) = storage.get_advertisement(id)? else {
            continue;
        };
        summary.examined += 1;

        let Some(engine) = registry.get(&ad.ad_type) else {
            tracing::warn!("Advertisement #{} has unknown engine '{}'", id, ad.ad_type);
            summary.unknown_engine += 1;
            continue;
        };

        let fields = engine.extractor.extract(&ad.html_body);
        let pick = |current: &Option<String>, extracted: Option<String>| {
            if force || current.is_none() {
                extracted
            } else {
                None
            }
        };
        let update = FieldUpdate {
            title: pick(&ad.title, fields.title),
            company: pick(&ad.company, fields.company),
            location: pick(&ad.location, fields.location),
            description: pick(&ad.description, fields.description),
        };

        if !update.is_empty() {
            storage.update_fields(id, &update)?;
            summary.updated += 1;
        }
    }
    Ok(())
}
