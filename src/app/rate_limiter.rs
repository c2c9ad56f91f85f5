use anyhow::Result;

use crate::config::rate_limits::{current_window, LimitedAction, RateLimits, WINDOW_SECONDS};
use crate::infra::cache::RedisCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limited: bool,
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    cache: RedisCache,
    limits: RateLimits,
}

impl RateLimiter {
    pub fn new(cache: RedisCache, limits: RateLimits) -> Self {
        Self { cache, limits }
    }

    /// Counts one attempt by `subject` (a user id or client IP). The counter is
    /// bumped before the comparison so concurrent attempts cannot share a slot.
    pub async fn hit(&self, subject: &str, action: LimitedAction) -> Result<RateLimitInfo> {
        let limit = self.limits.limit_for(action);
        let key = window_key(subject, action, current_window(WINDOW_SECONDS));

        let count = self.cache.incr_with_ttl(&key, WINDOW_SECONDS).await?;
        if count > limit {
            tracing::warn!(
                subject = subject,
                action = action.as_key(),
                count = count,
                limit = limit,
                "rate limit exceeded"
            );
            return Ok(RateLimitInfo {
                limited: true,
                limit,
                remaining: 0,
            });
        }

        Ok(RateLimitInfo {
            limited: false,
            limit,
            remaining: limit - count,
        })
    }
}

fn window_key(subject: &str, action: LimitedAction, window: u64) -> String {
    format!("ratelimit:{}:{}:{}", subject, action.as_key(), window)
}
