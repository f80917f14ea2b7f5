//! Rate Limiting
//!
//! Pluggable per-client limiter placed in front of the register and login
//! endpoints. The default implementation counts requests in fixed windows.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { limit: u32, remaining: u32 },
    Limited { retry_after: Duration },
}

/// Request limiter keyed by client address
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str) -> RateDecision;
}

/// In-memory fixed window limiter
pub struct FixedWindowRateLimiter {
    limit: u32,
    window: Duration,
    requests: RwLock<HashMap<String, (u32, Instant)>>,
}

// Expired windows are swept once the table grows past this
const SWEEP_THRESHOLD: usize = 10_000;

impl FixedWindowRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            requests: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    async fn check(&self, key: &str) -> RateDecision {
        let mut requests = self.requests.write().await;
        let now = Instant::now();

        if requests.len() >= SWEEP_THRESHOLD {
            let window = self.window;
            requests.retain(|_, (_, start)| now.duration_since(*start) <= window);
        }

        let (count, window_start) = requests.entry(key.to_string()).or_insert((0, now));

        // Reset if window expired
        if now.duration_since(*window_start) > self.window {
            *count = 0;
            *window_start = now;
        }

        if *count >= self.limit {
            let retry_after = self
                .window
                .checked_sub(now.duration_since(*window_start))
                .unwrap_or(Duration::ZERO);
            return RateDecision::Limited { retry_after };
        }

        *count += 1;
        RateDecision::Allowed {
            limit: self.limit,
            remaining: self.limit - *count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limits_after_quota() {
        let limiter = FixedWindowRateLimiter::new(2, Duration::from_secs(60));

        assert_eq!(
            limiter.check("10.0.0.1").await,
            RateDecision::Allowed { limit: 2, remaining: 1 }
        );
        assert_eq!(
            limiter.check("10.0.0.1").await,
            RateDecision::Allowed { limit: 2, remaining: 0 }
        );
        assert!(matches!(
            limiter.check("10.0.0.1").await,
            RateDecision::Limited { .. }
        ));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60));
        assert!(matches!(limiter.check("a").await, RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check("b").await, RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check("a").await, RateDecision::Limited { .. }));
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_millis(20));
        assert!(matches!(limiter.check("a").await, RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check("a").await, RateDecision::Limited { .. }));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(matches!(limiter.check("a").await, RateDecision::Allowed { .. }));
    }
}
