//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests of a source worker, including:
//! - Building the per-worker HTTP client with its own cookie jar
//! - Seeding default request headers
//! - Session priming (cookies + Referer)
//! - The single retry of transient failures
//! - Response classification

use crate::crawler::RateLimiter;
use crate::{ConfigError, HarvestError};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE,
    REFERER, USER_AGENT,
};
use reqwest::{Client, Response, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// A successfully fetched document
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,
    pub status: u16,
    pub body: String,
    /// Charset the body was decoded with
    pub encoding: String,
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// 200 response, possibly after one retry
    Success(FetchedPage),

    /// The resource was withdrawn (410); not an error
    Gone { status: u16 },

    /// Any other status; `retried` tells whether the single retry was used
    Failed { status: u16, retried: bool },
}

/// Builds the default request headers of a worker
///
/// # Arguments
///
/// * `user_agent` - Value of the User-Agent header
/// * `overrides` - Per-source headers replacing or extending the defaults
pub fn default_headers(
    user_agent: &str,
    overrides: &BTreeMap<String, String>,
) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, header_value(user_agent)?);
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    for (name, value) in overrides {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConfigError::InvalidHeader(format!("'{}': {}", name, e)))?;
        headers.insert(name, header_value(value)?);
    }

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value)
        .map_err(|e| ConfigError::InvalidHeader(format!("'{}': {}", value, e)))
}

/// Builds an HTTP client for one worker
///
/// Every client carries its own cookie jar, so cookies set by one source are
/// never replayed to another.
pub fn build_http_client(headers: HeaderMap) -> Result<Client, reqwest::Error> {
    Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Throttled HTTP GETs for one source
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    limiter: RateLimiter,
    retry_timeout: Duration,
    referer: Option<HeaderValue>,
    retry_sleeps: u32,
}

impl Fetcher {
    pub fn new(client: Client, crawl_delay: Duration, retry_timeout: Duration) -> Self {
        Self {
            client,
            limiter: RateLimiter::new(crawl_delay),
            retry_timeout,
            referer: None,
            retry_sleeps: 0,
        }
    }

    pub fn set_crawl_delay(&mut self, delay: Duration) {
        self.limiter.set_delay(delay);
    }

    pub fn crawl_delay(&self) -> Duration {
        self.limiter.delay()
    }

    /// Number of retry-timeout sleeps taken so far
    pub fn retry_sleeps(&self) -> u32 {
        self.retry_sleeps
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_ref().and_then(|v| v.to_str().ok())
    }

    /// Requests the source root once so that challenge cookies land in the
    /// jar, and remembers the final URL as Referer for later requests
    ///
    /// Returns the status of the priming response.
    pub async fn prime_session(&mut self, root: &str) -> Result<u16, HarvestError> {
        let response = self.send(root).await?;
        let status = response.status().as_u16();
        let final_url = response.url().as_str().to_string();

        self.referer = HeaderValue::from_str(&final_url).ok();
        tracing::debug!("Session primed via {} (status {})", final_url, status);
        Ok(status)
    }

    /// Fetches `url`
    ///
    /// A 500, 502, 503 or 504 response is retried exactly once after the
    /// retry timeout, and the retried response decides the outcome. Network
    /// errors are returned as `Err`.
    pub async fn get(&mut self, url: &str) -> Result<FetchOutcome, HarvestError> {
        let response = self.send(url).await?;

        if is_transient(response.status()) {
            tracing::warn!(
                "{} returned {}, retrying once in {:?}",
                url,
                response.status(),
                self.retry_timeout
            );
            self.retry_sleeps += 1;
            tokio::time::sleep(self.retry_timeout).await;

            let retried = self.send(url).await?;
            return classify(url, retried, true).await;
        }

        classify(url, response, false).await
    }

    async fn send(&mut self, url: &str) -> Result<Response, HarvestError> {
        self.limiter.throttle().await;

        let mut request = self.client.get(url);
        if let Some(referer) = &self.referer {
            request = request.header(REFERER, referer.clone());
        }

        request.send().await.map_err(|source| HarvestError::Http {
            url: url.to_string(),
            source,
        })
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

async fn classify(url: &str, response: Response, retried: bool) -> Result<FetchOutcome, HarvestError> {
    let status = response.status();

    if status == StatusCode::GONE {
        return Ok(FetchOutcome::Gone {
            status: status.as_u16(),
        });
    }

    if status != StatusCode::OK {
        return Ok(FetchOutcome::Failed {
            status: status.as_u16(),
            retried,
        });
    }

    let final_url = response.url().as_str().to_string();
    let encoding = charset(response.headers()).unwrap_or_else(|| "utf-8".to_string());
    let body = response.text().await.map_err(|source| HarvestError::Http {
        url: url.to_string(),
        source,
    })?;

    Ok(FetchOutcome::Success(FetchedPage {
        final_url,
        status: status.as_u16(),
        body,
        encoding,
    }))
}

/// Reads the charset parameter of the Content-Type header
fn charset(headers: &HeaderMap) -> Option<String> {
    let content_type: mime::Mime = headers.get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()?;
    content_type
        .get_param(mime::CHARSET)
        .map(|charset| charset.as_str().to_ascii_lowercase())
}
