//! Token-bucket rate limiting for external services
//!
//! Each collaborator that talks to a remote service (the repository host, the
//! embedding backend) is handed its own limiter at construction time.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::trace;

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared token bucket; clones draw from the same budget
#[derive(Clone)]
pub struct RateLimiter {
    name: &'static str,
    limiter: Option<Arc<DirectLimiter>>,
}

impl RateLimiter {
    /// Bucket refilled at `requests_per_minute`, holding at most `burst` tokens
    pub fn per_minute(name: &'static str, requests_per_minute: u32, burst: u32) -> Self {
        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(nonzero!(1u32));
        let burst = NonZeroU32::new(burst).unwrap_or(nonzero!(1u32));
        let quota = Quota::per_minute(rpm).allow_burst(burst);
        Self {
            name,
            limiter: Some(Arc::new(DirectLimiter::direct(quota))),
        }
    }

    /// A limiter that never waits
    pub fn unlimited() -> Self {
        Self {
            name: "unlimited",
            limiter: None,
        }
    }

    /// Wait until a token is available.
    ///
    /// Dropping the returned future abandons the wait without consuming a token.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                trace!(limiter = self.name, "Rate limiting: waiting for token");
                limiter.until_ready().await;
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("limited", &self.limiter.is_some())
            .finish()
    }
}
