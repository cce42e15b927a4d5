use crate::config::types::{Config, HarvestSettings, SourceConfig};
use crate::keywords::KeywordRule;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_settings(&config.harvest)?;
    validate_sources(&config.sources)?;
    validate_keywords(&config.keywords)?;
    Ok(())
}

/// Validates the harvest-wide settings
fn validate_harvest_settings(settings: &HarvestSettings) -> Result<(), ConfigError> {
    if settings.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if settings.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if settings.commit_every < 1 {
        return Err(ConfigError::Validation(format!(
            "commit-every must be >= 1, got {}",
            settings.commit_every
        )));
    }

    Ok(())
}

/// Validates source entries
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[sources]] entry is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for source in sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }

        let url = Url::parse(&source.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid URL '{}' for source '{}': {}", source.url, source.name, e))
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::Validation(format!(
                "Source URL '{}' must use http or https",
                source.url
            )));
        }

        if source.engine.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' must name an engine",
                source.name
            )));
        }

        if source.requests_per_minute < 1 {
            return Err(ConfigError::Validation(format!(
                "requests-per-minute for '{}' must be >= 1, got {}",
                source.name, source.requests_per_minute
            )));
        }

        if let Some(minutes) = source.retry_timeout {
            if !minutes.is_finite() || minutes < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "retry-timeout for '{}' must be a non-negative number of minutes, got {}",
                    source.name, minutes
                )));
            }
        }

        if let Some(agent) = &source.user_agent {
            if agent.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "user-agent for '{}' cannot be empty",
                    source.name
                )));
            }
        }
    }

    Ok(())
}

/// Validates keyword rules
///
/// Patterns are not compiled here; a rule that fails to compile is dropped
/// with a warning when keywords are refreshed.
fn validate_keywords(keywords: &[KeywordRule]) -> Result<(), ConfigError> {
    for keyword in keywords {
        if keyword.search.is_empty() {
            return Err(ConfigError::Validation(format!(
                "keyword '{}' has an empty search pattern",
                keyword.title.as_deref().unwrap_or("<untitled>")
            )));
        }
    }
    Ok(())
}
