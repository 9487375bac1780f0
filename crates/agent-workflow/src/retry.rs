//! Graph-level retry with exponential backoff
//!
//! Agent tasks never retry by themselves, so every attempt is accounted for
//! exactly once by the rate limiter and the breaker. The graph decides here
//! whether a captured failure deserves another attempt.

use agent_core::{AgentError, AgentKind, AgentResult, ErrorKind};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per node, including the first
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// A single attempt per node
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Three attempts with short backoffs
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }

    /// Backoff before retry number `retry` (1-based)
    pub fn backoff_duration(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi((retry - 1) as i32);
        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }

    /// An open breaker is never retried, nor is a rate limit that gives no
    /// retry hint: the bucket can never grant that request.
    pub fn is_retryable(error: &AgentError) -> bool {
        match error.kind {
            ErrorKind::RateLimited => error.retry_after_ms.is_some(),
            ErrorKind::Timeout | ErrorKind::UpstreamError | ErrorKind::MalformedOutput => true,
            _ => false,
        }
    }

    /// Run `attempt` until it succeeds, fails permanently, or attempts run out
    ///
    /// The returned result is the last attempt's, with `attempts` set.
    pub async fn run<F, Fut>(&self, kind: AgentKind, mut attempt: F) -> AgentResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AgentResult>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut made = 0;
        loop {
            made += 1;
            let result = attempt().await;
            let Some(error) = result.error() else {
                if made > 1 {
                    debug!(agent = %kind, attempts = made, "succeeded after retry");
                }
                return result.with_attempts(made);
            };

            if made >= max_attempts || !Self::is_retryable(error) {
                return result.with_attempts(made);
            }

            let mut wait = self.backoff_duration(made);
            if error.kind == ErrorKind::RateLimited {
                if let Some(ms) = error.retry_after_ms {
                    wait = wait.max(Duration::from_millis(ms));
                }
            }
            warn!(
                agent = %kind,
                attempt = made,
                max_attempts,
                error_kind = %error.kind,
                backoff_ms = wait.as_millis() as u64,
                "attempt failed, retrying"
            );
            sleep(wait).await;
        }
    }
}
