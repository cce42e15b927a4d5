//! Robots.txt parser implementation
//!
//! Allow/Disallow matching is delegated to the robotstxt crate. Crawl-delay
//! and Sitemap lines are read here because that crate does not expose them.

use crate::robots::RobotsError;
use robotstxt::DefaultMatcher;

/// Largest `Crawl-delay` accepted, in seconds (one day)
pub const MAX_CRAWL_DELAY_SECS: f64 = 86_400.0;

/// One `User-agent` group and the crawl delay declared inside it
#[derive(Debug, Clone, Default)]
struct AgentGroup {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
}

/// Parsed robots.txt data
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty means everything is allowed)
    content: String,
    groups: Vec<AgentGroup>,
    sitemaps: Vec<String>,
}

impl ParsedRobots {
    /// Parses raw robots.txt content
    ///
    /// # Errors
    ///
    /// Returns [`RobotsError::MalformedDelay`] when a `Crawl-delay` value is
    /// not a number of seconds between zero and [`MAX_CRAWL_DELAY_SECS`].
    pub fn parse(content: &str) -> Result<Self, RobotsError> {
        let mut groups: Vec<AgentGroup> = Vec::new();
        let mut sitemaps = Vec::new();
        let mut current: Option<AgentGroup> = None;
        // Consecutive User-agent lines share one group
        let mut reading_agents = false;

        for (index, raw_line) in content.lines().enumerate() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    if !reading_agents {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                        current = Some(AgentGroup::default());
                    }
                    if let Some(group) = current.as_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                    reading_agents = true;
                }
                "crawl-delay" => {
                    reading_agents = false;
                    let delay = parse_delay(value).ok_or_else(|| RobotsError::MalformedDelay {
                        line: index + 1,
                        value: value.to_string(),
                    })?;
                    if let Some(group) = current.as_mut() {
                        group.crawl_delay = Some(delay);
                    }
                }
                "sitemap" => {
                    if !value.is_empty() {
                        sitemaps.push(value.to_string());
                    }
                }
                _ => reading_agents = false,
            }
        }

        if let Some(group) = current {
            groups.push(group);
        }

        Ok(Self {
            content: content.to_string(),
            groups,
            sitemaps,
        })
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path to check
    /// * `user_agent` - The agent token
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay in seconds declared for a user agent
    ///
    /// A group naming the agent takes precedence over the `*` group, even when
    /// the named group declares no delay.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let token = product_token(user_agent);

        let specific = self
            .groups
            .iter()
            .find(|group| group.agents.iter().any(|agent| agent != "*" && *agent == token));
        if let Some(group) = specific {
            return group.crawl_delay;
        }

        self.groups
            .iter()
            .find(|group| group.agents.iter().any(|agent| agent == "*"))
            .and_then(|group| group.crawl_delay)
    }

    /// Returns the sitemap URLs declared anywhere in the file, in order
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

fn parse_delay(value: &str) -> Option<f64> {
    let delay: f64 = value.parse().ok()?;
    (0.0..=MAX_CRAWL_DELAY_SECS).contains(&delay).then_some(delay)
}

/// Lowercased product name of a User-Agent string ("Crawler/1.0" -> "crawler")
fn product_token(user_agent: &str) -> String {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}
