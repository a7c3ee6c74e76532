//! Request budget for credentialed providers, a token bucket from `governor`.

use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Shared token bucket refilled at `per_second` tokens per second, with a
/// burst of the same size.
///
/// One budget is shared by every worker, so each of `n` busy workers gets
/// roughly `per_second / n` requests per second.
pub struct RequestBudget {
    limiter: DefaultDirectRateLimiter,
    per_second: NonZeroU32,
}

impl RequestBudget {
    pub fn per_second(per_second: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            per_second,
        }
    }

    pub fn rate(&self) -> u32 {
        self.per_second.get()
    }

    /// Wait until a request may be sent. Dropping the future abandons the wait.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RequestBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBudget")
            .field("per_second", &self.per_second)
            .finish()
    }
}
