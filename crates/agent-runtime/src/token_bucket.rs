//! Per-upstream token bucket
//!
//! Backed by a direct `governor` limiter: the quota's burst is the bucket
//! capacity and one token comes back every `1 / refill_per_sec`. A denied
//! acquire never blocks; it reports how long the caller would have to wait
//! for `cost` tokens.

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

/// Refill rates slower than a full bucket per century count as no refill
const MAX_REFILL_SPAN: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Bucket sizing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Maximum tokens held; also the initial fill
    pub capacity: u32,
    /// Tokens added per second
    pub refill_per_sec: f64,
}

impl BucketConfig {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec: refill_per_sec.max(0.0),
        }
    }

    /// Interval between single-token refills, `None` if the bucket never refills
    fn refill_interval(&self) -> Option<Duration> {
        if self.refill_per_sec <= 0.0 {
            return None;
        }
        let interval = Duration::try_from_secs_f64(self.refill_per_sec.recip())
            .ok()?
            .max(Duration::from_nanos(1));
        let span = interval.checked_mul(self.capacity)?;
        (span <= MAX_REFILL_SPAN).then_some(interval)
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self::new(10, 2.0)
    }
}

/// Result of a single acquire
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcquireOutcome {
    Granted,
    /// `retry_after` is `None` when the request can never be satisfied
    /// (zero capacity, cost above capacity, or no refill)
    Denied { retry_after: Option<Duration> },
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Granted => None,
            Self::Denied { retry_after } => *retry_after,
        }
    }
}

type Limiter<C> = RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Token bucket shared by every task hitting one upstream
pub struct TokenBucket<C: Clock = DefaultClock> {
    config: BucketConfig,
    /// `None` for a zero-capacity bucket
    limiter: Option<Limiter<C>>,
    refills: bool,
}

impl TokenBucket {
    /// Create a full bucket on the monotonic clock
    pub fn new(config: BucketConfig) -> Self {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C: Clock> TokenBucket<C> {
    pub fn with_clock(config: BucketConfig, clock: C) -> Self {
        let interval = config.refill_interval();
        let limiter = NonZeroU32::new(config.capacity).and_then(|burst| {
            // A bucket that never refills gets its capacity back once per MAX_REFILL_SPAN
            let period = interval.unwrap_or(MAX_REFILL_SPAN / burst.get());
            Quota::with_period(period)
                .map(|quota| RateLimiter::direct_with_clock(quota.allow_burst(burst), clock))
        });
        Self {
            config,
            limiter,
            refills: interval.is_some(),
        }
    }

    pub fn config(&self) -> BucketConfig {
        self.config
    }

    /// Try to take `cost` tokens
    pub fn acquire(&self, cost: u32) -> AcquireOutcome {
        let Some(cost) = NonZeroU32::new(cost) else {
            return AcquireOutcome::Granted;
        };
        let Some(limiter) = &self.limiter else {
            return AcquireOutcome::Denied { retry_after: None };
        };

        match limiter.check_n(cost) {
            Ok(Ok(())) => AcquireOutcome::Granted,
            Ok(Err(not_until)) => AcquireOutcome::Denied {
                retry_after: self
                    .refills
                    .then(|| not_until.wait_time_from(limiter.clock().now())),
            },
            Err(_insufficient) => AcquireOutcome::Denied { retry_after: None },
        }
    }
}

impl<C: Clock> fmt::Debug for TokenBucket<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucket")
            .field("config", &self.config)
            .field("refills", &self.refills)
            .finish_non_exhaustive()
    }
}
