//! Fixed delay between consecutive remote lookups

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::fmt;
use std::time::Duration;

/// Spaces successive `wait` calls at least `delay` apart
///
/// The first call passes immediately. A zero delay disables throttling.
pub struct Throttle {
    delay: Duration,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        let limiter = Quota::with_period(delay).map(RateLimiter::direct);
        Self { delay, limiter }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle").field("delay", &self.delay).finish()
    }
}
