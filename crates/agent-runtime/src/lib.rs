//! Agent runtime for the analysis orchestrator
//!
//! This crate owns everything shared between concurrent agent tasks that
//! target the same upstream: the token bucket that gates call rate, the
//! circuit breaker that sheds load from a failing upstream, the process-wide
//! registries that hold both per upstream id, and the executor that performs
//! one guarded upstream attempt.

pub mod circuit_breaker;
pub mod error;
pub mod executor;
pub mod registry;
pub mod runtime;
pub mod token_bucket;

// Re-export key types
pub use circuit_breaker::{
    BreakerConfig, BreakerError, BreakerState, CallPermit, CircuitBreaker, CircuitOpenError,
};
pub use error::CallError;
pub use executor::{AgentExecutor, CallSpec};
pub use registry::{UpstreamPolicy, UpstreamRegistry};
pub use runtime::{AgentRuntime, AgentRuntimeBuilder};
pub use token_bucket::{AcquireOutcome, BucketConfig, TokenBucket};
