//! Error types for agent-core
//!
//! Two families live here. [`Error`] is an ordinary Rust error for callers
//! that submit malformed requests. [`AgentError`] is a *value*: it is what an
//! agent task captures into its [`AgentResult`](crate::AgentResult) instead of
//! returning `Err`, so the orchestrator observes failures without catching them.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for agent-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for request validation and configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The caller submitted a request that cannot be executed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration value is out of range or inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Failure taxonomy for a single agent attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Token bucket denied the call
    RateLimited,
    /// Circuit breaker is open for the upstream
    UpstreamUnavailable,
    /// Per-task timeout or the global deadline elapsed
    Timeout,
    /// The model answered but no structured output could be extracted
    MalformedOutput,
    /// The provider call itself returned an error
    UpstreamError,
    /// Not a failure: the agent needs caller input before it can finish
    ClarificationNeeded,
}

impl ErrorKind {
    /// Stable snake_case name, used in logs and stream events
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::Timeout => "timeout",
            Self::MalformedOutput => "malformed_output",
            Self::UpstreamError => "upstream_error",
            Self::ClarificationNeeded => "clarification_needed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured agent failure
///
/// `detail` carries diagnostics that must not leak into structured payloads,
/// e.g. the raw model text when extraction failed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct AgentError {
    /// Failure category
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Optional diagnostic payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Minimum wait before another attempt makes sense, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl AgentError {
    /// Create a new error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            retry_after_ms: None,
        }
    }

    /// Attach diagnostic detail
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach a retry hint
    pub fn with_retry_after_ms(mut self, retry_after_ms: u64) -> Self {
        self.retry_after_ms = Some(retry_after_ms);
        self
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn malformed_output(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedOutput, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamError, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidRequest("symbol is empty".to_string());
        assert_eq!(err.to_string(), "Invalid request: symbol is empty");

        let err = AgentError::timeout("no answer within 60s");
        assert_eq!(err.to_string(), "timeout: no answer within 60s");
    }

    #[test]
    fn test_agent_error_detail_skipped_when_absent() {
        let err = AgentError::upstream("502 from provider");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "upstream_error");
        assert!(json.get("detail").is_none());

        let err = AgentError::malformed_output("no JSON").with_detail("I think the stock is fine");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["detail"], "I think the stock is fine");
    }
}
