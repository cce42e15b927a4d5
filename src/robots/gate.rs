//! Per-source politeness policy
//!
//! The gate owns the cached robots.txt of one source. It is created fresh for
//! every worker and never shared.

use crate::robots::{ParsedRobots, RobotsError};
use chrono::{DateTime, Utc};
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
struct CachedPolicy {
    robots: ParsedRobots,
    fetched_at: DateTime<Utc>,
}

/// Answers "may I fetch this URL", "how long must I wait between requests"
/// and "which sitemaps exist" for one source
#[derive(Debug)]
pub struct PolitenessGate {
    client: Client,
    robots_url: Url,
    user_agent: String,
    requests_per_minute: u32,
    policy: Option<CachedPolicy>,
}

impl PolitenessGate {
    /// Creates a gate for the source rooted at `base`
    ///
    /// Nothing is fetched until the policy is first needed.
    pub fn new(
        client: Client,
        base: &Url,
        user_agent: &str,
        requests_per_minute: u32,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            robots_url: base.join("/robots.txt")?,
            user_agent: user_agent.to_string(),
            requests_per_minute: requests_per_minute.max(1),
            policy: None,
        })
    }

    pub fn robots_url(&self) -> &Url {
        &self.robots_url
    }

    /// When the cached policy was fetched, if it has been
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.policy.as_ref().map(|p| p.fetched_at)
    }

    /// Spacing implied by the configured request budget alone
    pub fn configured_delay(&self) -> Duration {
        Duration::from_secs_f64(60.0 / f64::from(self.requests_per_minute))
    }

    /// Returns true if the policy allows fetching `url`
    pub async fn can_fetch(&mut self, url: &str) -> Result<bool, RobotsError> {
        let user_agent = self.user_agent.clone();
        Ok(self.policy().await?.is_allowed(url, &user_agent))
    }

    /// Returns the larger of the configured spacing and the declared crawl delay
    pub async fn crawl_delay(&mut self) -> Result<Duration, RobotsError> {
        let configured = self.configured_delay();
        let user_agent = self.user_agent.clone();
        let declared = self
            .policy()
            .await?
            .crawl_delay(&user_agent)
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::ZERO);
        Ok(configured.max(declared))
    }

    /// Returns the sitemap URLs declared by the source
    pub async fn sitemap_locations(&mut self) -> Result<Vec<String>, RobotsError> {
        Ok(self.policy().await?.sitemaps().to_vec())
    }

    /// Drops the cached policy and fetches it again
    pub async fn refresh(&mut self) -> Result<(), RobotsError> {
        let robots = self.fetch().await?;
        self.policy = Some(CachedPolicy {
            robots,
            fetched_at: Utc::now(),
        });
        Ok(())
    }

    async fn policy(&mut self) -> Result<&ParsedRobots, RobotsError> {
        let policy = match self.policy.take() {
            Some(policy) => policy,
            None => CachedPolicy {
                robots: self.fetch().await?,
                fetched_at: Utc::now(),
            },
        };
        Ok(&self.policy.insert(policy).robots)
    }

    async fn fetch(&self) -> Result<ParsedRobots, RobotsError> {
        tracing::debug!("Fetching {}", self.robots_url);

        let response = self
            .client
            .get(self.robots_url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::info!("{} not found, no restrictions declared", self.robots_url);
            return ParsedRobots::parse("");
        }
        if !status.is_success() {
            return Err(RobotsError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        ParsedRobots::parse(&body)
    }
}
