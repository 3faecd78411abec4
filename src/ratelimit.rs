//! Per-service token buckets shared by all download workers.

use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{Config, ServiceName, MIN_RATE_LIMIT};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket: `burst` capacity, refilled continuously at `rate` tokens per second.
///
/// Rates below [`MIN_RATE_LIMIT`] (or NaN) are raised to it, so a wait is always finite.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    rate: f64,
    burst: f64,
    log_waits: bool,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, rate: f64, burst: u32) -> Self {
        Self {
            name: name.into(),
            rate: rate.max(MIN_RATE_LIMIT),
            burst: f64::from(burst.max(1)),
            log_waits: false,
            state: Mutex::new(BucketState {
                tokens: f64::from(burst.max(1)),
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn with_wait_logging(mut self, enabled: bool) -> Self {
        self.log_waits = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take one token, sleeping for the deficit when the bucket is empty.
    ///
    /// The lock is held across the sleep so concurrent callers queue behind it
    /// and are released one refill interval apart.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = f64::min(self.burst, state.tokens + elapsed * self.rate);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return;
        }

        let wait = Duration::from_secs_f64((1.0 - state.tokens) / self.rate);
        if self.log_waits {
            debug!("Rate limit: waiting {:.3}s for {}", wait.as_secs_f64(), self.name);
        }
        tokio::time::sleep(wait).await;

        state.tokens = 0.0;
        state.last_refill = Instant::now();
    }
}

/// One limiter per configured service
#[derive(Debug, Clone, Default)]
pub struct RateLimiters {
    limiters: HashMap<ServiceName, Arc<RateLimiter>>,
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> Self {
        let limiters = config
            .services
            .iter()
            .map(|(name, svc)| {
                let limiter = RateLimiter::new(name.as_str(), svc.rate_limit, svc.burst_size())
                    .with_wait_logging(config.log_api_calls);
                (*name, Arc::new(limiter))
            })
            .collect();
        Self { limiters }
    }

    pub fn get(&self, name: ServiceName) -> Option<Arc<RateLimiter>> {
        self.limiters.get(&name).cloned()
    }

    /// Limiter for a service, or an unconstrained one when the service is not configured
    pub fn get_or_default(&self, name: ServiceName) -> Arc<RateLimiter> {
        self.get(name)
            .unwrap_or_else(|| Arc::new(RateLimiter::new(name.as_str(), 1000.0, 1000)))
    }
}
