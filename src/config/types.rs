use crate::keywords::{KeywordRule, MatchScope};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Retry timeout applied when a source does not configure one (minutes)
pub const DEFAULT_RETRY_TIMEOUT_MINUTES: f64 = 5.0;

/// User agent token used when the configuration does not name one
pub const DEFAULT_USER_AGENT: &str = "Crawler";

/// Main configuration structure for a harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvest: HarvestSettings,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub keywords: Vec<KeywordRule>,
}

/// Settings shared by every source worker
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestSettings {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Agent token matched against robots.txt groups and sent as User-Agent
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Which extracted fields are searched when tagging
    #[serde(rename = "match-scope")]
    pub match_scope: MatchScope,

    /// Number of stored advertisements between commits and progress lines
    #[serde(rename = "commit-every", default = "default_commit_every")]
    pub commit_every: u32,

    /// How long a connection waits on a locked database (seconds)
    #[serde(rename = "busy-timeout", default = "default_busy_timeout")]
    pub busy_timeout: u64,
}

impl HarvestSettings {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout)
    }
}

/// One job portal to harvest
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Label used in logs and run summaries
    pub name: String,

    /// Base URL of the portal; robots.txt and the session root live here
    pub url: String,

    /// Registered engine providing sitemap traversal and field extraction
    pub engine: String,

    /// Configured request budget
    #[serde(rename = "requests-per-minute")]
    pub requests_per_minute: u32,

    /// Pause before the single retry of a transient failure (minutes)
    #[serde(rename = "retry-timeout", default)]
    pub retry_timeout: Option<f64>,

    /// Overrides the harvest-wide user agent for this source
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,

    /// Extra request headers sent with every request to this source
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl SourceConfig {
    /// Returns the retry timeout as a duration, falling back to the default
    /// for missing or unusable values
    pub fn retry_timeout(&self) -> Duration {
        let minutes = self.retry_timeout.unwrap_or(DEFAULT_RETRY_TIMEOUT_MINUTES);
        Duration::try_from_secs_f64(minutes * 60.0)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_RETRY_TIMEOUT_MINUTES * 60.0))
    }

    /// Returns the user agent for this source
    pub fn user_agent<'a>(&'a self, settings: &'a HarvestSettings) -> &'a str {
        self.user_agent.as_deref().unwrap_or(&settings.user_agent)
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_commit_every() -> u32 {
    10
}

fn default_busy_timeout() -> u64 {
    30
}
