//! Per-host rate limiting
//!
//! One token bucket per host, refilled continuously at `rpm/60` tokens per
//! second with a burst of `max(rpm/10, 1)`. Buckets are created lazily on
//! first use and evicted by a background scan once they have been idle past
//! the max age.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, SshMcpError};

/// Interval between stale-bucket scans.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

/// Buckets idle longer than this are evicted.
pub const CLEANUP_MAX_AGE: Duration = Duration::from_secs(1800);

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_accessed: Instant,
}

/// Per-host token-bucket rate limiter.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    rpm: u32,
}

impl RateLimiter {
    /// Create a limiter allowing `rpm` requests per minute per host.
    pub fn new(rpm: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            rpm,
        }
    }

    fn rate_per_sec(&self) -> f64 {
        f64::from(self.rpm) / 60.0
    }

    fn burst(&self) -> f64 {
        f64::from((self.rpm / 10).max(1))
    }

    /// Check whether a request to the given host is allowed, consuming one
    /// token on success.
    pub fn allow(&self, host: &str) -> Result<()> {
        let now = Instant::now();
        let burst = self.burst();
        let rate = self.rate_per_sec();

        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(host.to_string()).or_insert_with(|| Bucket {
            tokens: burst,
            last_refill: now,
            last_accessed: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate).min(burst);
        bucket.last_refill = now;
        bucket.last_accessed = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            Err(SshMcpError::RateLimited {
                host: host.to_string(),
                rpm: self.rpm,
            })
        }
    }

    /// Remove buckets that have not been accessed for `max_age`. Returns the
    /// number of evicted entries.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, b| now.duration_since(b.last_accessed) <= max_age);
        before - buckets.len()
    }

    /// Spawn a background task that periodically evicts stale buckets.
    pub fn start_cleanup(self: &Arc<Self>, interval: Duration, max_age: Duration) {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.cleanup(max_age);
                if removed > 0 {
                    debug!("rate limiter cleanup: removed {} stale entries", removed);
                }
            }
        });
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }
}
