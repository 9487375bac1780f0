//! Errors from a guarded upstream call

use agent_core::{AgentError, ErrorKind};
use agent_llm::LLMError;
use std::time::Duration;
use thiserror::Error;

use crate::circuit_breaker::CircuitOpenError;

/// Why a guarded call did not produce a response
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    /// The upstream's token bucket denied the call; nothing was sent
    #[error("rate limited on upstream '{upstream}'")]
    RateLimited {
        upstream: String,
        retry_after: Option<Duration>,
    },

    /// The upstream's circuit is open; nothing was sent
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// No response within the per-call timeout
    #[error("upstream call exceeded {0:?}")]
    Timeout(Duration),

    /// The provider returned an error
    #[error(transparent)]
    Upstream(#[from] LLMError),
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::CircuitOpen(_) => ErrorKind::UpstreamUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Upstream(_) => ErrorKind::UpstreamError,
        }
    }

    /// Suggested wait before retrying, when the guard knows one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            Self::CircuitOpen(err) => err.retry_after,
            _ => None,
        }
    }
}

impl From<CallError> for AgentError {
    fn from(err: CallError) -> Self {
        let agent_error = AgentError::new(err.kind(), err.to_string());
        match err.retry_after() {
            Some(wait) => agent_error.with_retry_after_ms(wait.as_millis() as u64),
            None => agent_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let cases = [
            (
                CallError::RateLimited {
                    upstream: "u".to_string(),
                    retry_after: None,
                },
                ErrorKind::RateLimited,
            ),
            (
                CallError::CircuitOpen(CircuitOpenError {
                    upstream: "u".to_string(),
                    retry_after: None,
                }),
                ErrorKind::UpstreamUnavailable,
            ),
            (
                CallError::Timeout(Duration::from_secs(60)),
                ErrorKind::Timeout,
            ),
            (
                CallError::Upstream(LLMError::ProviderError("500".to_string())),
                ErrorKind::UpstreamError,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(AgentError::from(err).kind, kind);
        }
    }

    #[test]
    fn test_retry_hint_carried_over() {
        let err = CallError::RateLimited {
            upstream: "openai".to_string(),
            retry_after: Some(Duration::from_millis(250)),
        };
        let agent_error = AgentError::from(err);
        assert_eq!(agent_error.retry_after_ms, Some(250));
    }
}
