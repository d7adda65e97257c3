//! Request limiter shared by every embedding call of a build.

use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::debug;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// A requests-per-minute limiter.
///
/// Clone an `Arc<RequestLimiter>` into every task that talks to the
/// provider; all of them draw from the same quota.
pub struct RequestLimiter {
    limiter: DirectRateLimiter,
    requests_per_minute: NonZeroU32,
}

impl RequestLimiter {
    /// Create a limiter allowing `requests_per_minute` requests.
    ///
    /// Zero is treated as one.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let requests_per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_minute(requests_per_minute)),
            requests_per_minute,
        }
    }

    /// Configured quota.
    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute.get()
    }

    /// Wait until the quota admits one more request.
    pub async fn acquire(&self) {
        if self.limiter.check().is_err() {
            debug!(
                "Embedding request throttled ({} requests/minute)",
                self.requests_per_minute
            );
            self.limiter.until_ready().await;
        }
    }

    /// Take a permit without waiting, if one is available.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}
