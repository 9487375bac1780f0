//! Usage recording sink
//!
//! Every upstream attempt, successful or not, produces one [`UsageRecord`].
//! Recording is fire-and-forget: callers spawn the write and only log
//! failures, so a broken sink never fails an analysis.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Result, TokenUsage};

/// One upstream attempt, as seen by usage accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// What the call was for ("fundamental", "synthesis", ...)
    pub purpose: String,
    pub model: String,
    pub upstream: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub latency_ms: u64,
    pub success: bool,
}

impl UsageRecord {
    pub fn new(
        purpose: impl Into<String>,
        model: impl Into<String>,
        upstream: impl Into<String>,
    ) -> Self {
        Self {
            purpose: purpose.into(),
            model: model.into(),
            upstream: upstream.into(),
            prompt_tokens: 0,
            completion_tokens: 0,
            latency_ms: 0,
            success: false,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.prompt_tokens = usage.input_tokens;
        self.completion_tokens = usage.output_tokens;
        self
    }

    pub fn finished(mut self, success: bool, latency_ms: u64) -> Self {
        self.success = success;
        self.latency_ms = latency_ms;
        self
    }
}

/// Sink for usage records (database, metrics pipeline, billing...)
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record(&self, record: UsageRecord) -> Result<()>;
}

/// Recorder that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageRecorder;

#[async_trait]
impl UsageRecorder for NoopUsageRecorder {
    async fn record(&self, record: UsageRecord) -> Result<()> {
        tracing::trace!(purpose = %record.purpose, "usage record discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = UsageRecord::new("technical", "gpt-4o", "openai:gpt-4o")
            .with_usage(TokenUsage {
                input_tokens: 900,
                output_tokens: 300,
            })
            .finished(true, 1_250);

        assert_eq!(record.prompt_tokens, 900);
        assert_eq!(record.completion_tokens, 300);
        assert!(record.success);
        assert_eq!(record.latency_ms, 1_250);
    }

    #[tokio::test]
    async fn test_noop_recorder_accepts_everything() {
        let recorder = NoopUsageRecorder;
        tokio_test::assert_ok!(recorder.record(UsageRecord::new("news", "m", "u")).await);
    }
}
