//! Process-wide submission pacing.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::debug;

/// Minimum-gap limiter applied to every provider submission.
///
/// Independent of per-key cooldowns: even with a fresh credential, bursts
/// of submissions are spaced out to avoid tripping vendor burst detection.
pub struct Pacer {
    limiter: Option<DefaultDirectRateLimiter>,
}

impl Pacer {
    /// Create a pacer enforcing `min_gap` between submissions. A zero gap
    /// disables pacing.
    pub fn new(min_gap: Duration) -> Self {
        let limiter = Quota::with_period(min_gap)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));
        Self { limiter }
    }

    /// Suspend until the next submission slot is free.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            debug!("Waiting for submission slot");
            limiter.until_ready().await;
        }
    }
}
