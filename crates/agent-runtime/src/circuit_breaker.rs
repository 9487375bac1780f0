//! Per-upstream circuit breaker
//!
//! ```text
//! Closed --(threshold failures within window)--> Open
//! Open   --(reset_timeout elapsed, next call)--> HalfOpen
//! HalfOpen --(probe succeeds)--> Closed
//! HalfOpen --(probe fails)----> Open
//! ```
//!
//! While half-open exactly one probe call is admitted; every other caller is
//! rejected until the probe resolves. Calls are tracked with a
//! [`CallPermit`] so a cancelled probe releases its slot on drop.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Failures inside `window` that open the circuit
    pub failure_threshold: u32,
    /// Sliding window for counting failures
    pub window: Duration,
    /// How long the circuit stays open before a probe is allowed
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(60),
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// The breaker rejected the call without invoking the upstream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("circuit open for upstream '{upstream}'")]
pub struct CircuitOpenError {
    pub upstream: String,
    /// Remaining open time, when known
    pub retry_after: Option<Duration>,
}

/// Error from [`CircuitBreaker::call`]
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    #[error(transparent)]
    Open(#[from] CircuitOpenError),
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    upstream: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(upstream: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            upstream: upstream.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: VecDeque::new(),
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    /// Current state, without triggering the Open -> HalfOpen transition
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Ask to make one upstream call
    pub fn try_acquire(self: &Arc<Self>) -> Result<CallPermit, CircuitOpenError> {
        let mut inner = self.lock();
        let now = Instant::now();

        if inner.state == BreakerState::Open {
            let opened_at = inner.opened_at.unwrap_or(now);
            let elapsed = now.saturating_duration_since(opened_at);
            if elapsed < self.config.reset_timeout {
                return Err(self.open_error(Some(self.config.reset_timeout - elapsed)));
            }
            inner.state = BreakerState::HalfOpen;
            inner.probe_in_flight = false;
            info!(upstream = %self.upstream, "circuit half-open, admitting probe");
        }

        match inner.state {
            BreakerState::Closed => Ok(CallPermit::new(Arc::clone(self), false)),
            BreakerState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                Ok(CallPermit::new(Arc::clone(self), true))
            }
            _ => Err(self.open_error(None)),
        }
    }

    /// Run `f` under the breaker, counting `Err` as a failure
    pub async fn call<F, Fut, T, E>(self: &Arc<Self>, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire()?;
        match f().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(err) => {
                permit.failure();
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// Force the breaker back to a clean closed state
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = BreakerState::Closed;
        inner.failures.clear();
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    fn on_success(&self, probe: bool) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::HalfOpen if probe => {
                inner.state = BreakerState::Closed;
                inner.failures.clear();
                inner.opened_at = None;
                inner.probe_in_flight = false;
                info!(upstream = %self.upstream, "circuit closed after successful probe");
            }
            BreakerState::Closed => inner.failures.clear(),
            // Late result from a call admitted before the circuit opened
            _ => {}
        }
    }

    fn on_failure(&self, probe: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        match inner.state {
            BreakerState::Closed => {
                inner.failures.push_back(now);
                while let Some(&oldest) = inner.failures.front() {
                    if now.saturating_duration_since(oldest) > self.config.window {
                        inner.failures.pop_front();
                    } else {
                        break;
                    }
                }
                if inner.failures.len() >= self.config.failure_threshold as usize {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(now);
                    warn!(
                        upstream = %self.upstream,
                        failures = inner.failures.len(),
                        "circuit opened"
                    );
                }
            }
            BreakerState::HalfOpen if probe => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(now);
                inner.probe_in_flight = false;
                warn!(upstream = %self.upstream, "probe failed, circuit re-opened");
            }
            _ => {}
        }
    }

    fn release_probe(&self) {
        let mut inner = self.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    fn open_error(&self, retry_after: Option<Duration>) -> CircuitOpenError {
        CircuitOpenError {
            upstream: self.upstream.clone(),
            retry_after,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission to make one upstream call
///
/// Resolve with [`success`](Self::success) or [`failure`](Self::failure).
/// Dropping an unresolved permit records nothing, but frees the half-open
/// probe slot if this permit held it.
#[derive(Debug)]
#[must_use = "resolve the permit with success() or failure()"]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    probe: bool,
    resolved: bool,
}

impl CallPermit {
    fn new(breaker: Arc<CircuitBreaker>, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            resolved: false,
        }
    }

    /// Whether this permit is the half-open probe
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.on_success(self.probe);
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.on_failure(self.probe);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.resolved && self.probe {
            self.breaker.release_probe();
        }
    }
}
