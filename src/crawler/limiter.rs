//! Per-source request spacing
//!
//! The limiter is the only place a worker sleeps between requests. Each
//! source owns exactly one limiter, so sources never throttle each other.

use std::time::Duration;
use tokio::time::Instant;

/// Spaces consecutive requests of one source at least `delay` apart
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Changes the spacing applied to the next request
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// How long the next call to [`throttle`](Self::throttle) would wait
    pub fn time_until_ready(&self) -> Duration {
        match self.last_request {
            Some(last) => match last.checked_add(self.delay) {
                Some(ready_at) => ready_at.saturating_duration_since(Instant::now()),
                None => self.delay,
            },
            None => Duration::ZERO,
        }
    }

    /// Waits until `delay` has passed since the last permitted request, then
    /// records and returns the new request time
    pub async fn throttle(&mut self) -> Instant {
        if let Some(last) = self.last_request {
            match last.checked_add(self.delay) {
                Some(ready_at) if ready_at > Instant::now() => {
                    tracing::trace!("Throttling for {:?}", ready_at - Instant::now());
                    tokio::time::sleep_until(ready_at).await;
                }
                Some(_) => {}
                // Past the clock's range: tokio clamps the sleep instead of overflowing
                None => tokio::time::sleep(self.delay).await,
            }
        }

        let now = Instant::now();
        self.last_request = Some(now);
        now
    }
}
