//! Process-wide registry of token buckets and circuit breakers
//!
//! Entries are keyed by upstream id and created lazily from the upstream's
//! policy. The maps are locked only for lookup or insertion; each
//! [`TokenBucket`] and [`CircuitBreaker`] guards its own state, so unrelated
//! upstreams never contend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;

use crate::circuit_breaker::{BreakerConfig, BreakerError, BreakerState, CircuitBreaker};
use crate::token_bucket::{AcquireOutcome, BucketConfig, TokenBucket};

/// Rate and failure policy for one upstream
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UpstreamPolicy {
    pub bucket: BucketConfig,
    pub breaker: BreakerConfig,
}

#[derive(Debug, Default)]
pub struct UpstreamRegistry {
    default_policy: UpstreamPolicy,
    policies: RwLock<HashMap<String, UpstreamPolicy>>,
    buckets: RwLock<HashMap<String, Arc<TokenBucket>>>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

static GLOBAL: OnceLock<Arc<UpstreamRegistry>> = OnceLock::new();

impl UpstreamRegistry {
    pub fn new(default_policy: UpstreamPolicy) -> Self {
        Self {
            default_policy,
            ..Self::default()
        }
    }

    /// The registry shared by every orchestrator in the process
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::default())))
    }

    /// Override the policy for one upstream
    ///
    /// Existing state for that upstream is discarded so the new limits take
    /// effect on the next call. The policy is stored before the entries are
    /// dropped, so a concurrent lookup cannot rebuild them from the old one.
    pub fn set_policy(&self, upstream: impl Into<String>, policy: UpstreamPolicy) {
        let upstream = upstream.into();
        self.policies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(upstream.clone(), policy);
        self.buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&upstream);
        self.breakers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&upstream);
    }

    pub fn policy(&self, upstream: &str) -> UpstreamPolicy {
        self.policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(upstream)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Token bucket for `upstream`, created on first use
    pub fn bucket(&self, upstream: &str) -> Arc<TokenBucket> {
        get_or_create(&self.buckets, upstream, || {
            TokenBucket::new(self.policy(upstream).bucket)
        })
    }

    /// Circuit breaker for `upstream`, created on first use
    pub fn breaker(&self, upstream: &str) -> Arc<CircuitBreaker> {
        get_or_create(&self.breakers, upstream, || {
            CircuitBreaker::new(upstream, self.policy(upstream).breaker)
        })
    }

    pub fn acquire(&self, upstream: &str, cost: u32) -> AcquireOutcome {
        self.bucket(upstream).acquire(cost)
    }

    pub async fn call<F, Fut, T, E>(&self, upstream: &str, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.breaker(upstream).call(f).await
    }

    /// State of the upstream's breaker; `Closed` if it has never been used
    pub fn breaker_state(&self, upstream: &str) -> BreakerState {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(upstream)
            .map_or(BreakerState::Closed, |b| b.state())
    }

    /// Drop every bucket and breaker
    pub fn reset_all(&self) {
        self.buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.breakers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!("upstream registry reset");
    }
}

fn get_or_create<T>(
    map: &RwLock<HashMap<String, Arc<T>>>,
    key: &str,
    create: impl FnOnce() -> T,
) -> Arc<T> {
    if let Some(existing) = map
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
    {
        return Arc::clone(existing);
    }

    let mut map = map.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(create())),
    )
}
