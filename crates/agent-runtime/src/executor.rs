//! Guarded upstream calls
//!
//! The AgentExecutor makes exactly one upstream attempt per call:
//! 1. Take a token from the upstream's bucket (deny fast if empty)
//! 2. Ask the upstream's circuit breaker for a permit (deny fast if open)
//! 3. Call the provider under the per-call timeout
//! 4. Report the outcome to the breaker and record usage
//!
//! Retries are the caller's business; the executor never loops.

use agent_llm::{
    CompletionRequest, CompletionResponse, LLMProvider, TokenUsage, UsageRecord, UsageRecorder,
    collect_stream,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::CallError;
use crate::registry::UpstreamRegistry;
use crate::token_bucket::AcquireOutcome;

/// Where and how long one call may run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    /// Upstream id; keys the bucket and breaker
    pub upstream: String,
    /// Per-call timeout
    pub timeout: Duration,
}

impl CallSpec {
    pub fn new(upstream: impl Into<String>, timeout: Duration) -> Self {
        Self {
            upstream: upstream.into(),
            timeout,
        }
    }
}

/// Executes single guarded upstream attempts
#[derive(Clone)]
pub struct AgentExecutor {
    provider: Arc<dyn LLMProvider>,
    registry: Arc<UpstreamRegistry>,
    usage: Arc<dyn UsageRecorder>,
}

impl AgentExecutor {
    /// Create a new executor
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        registry: Arc<UpstreamRegistry>,
        usage: Arc<dyn UsageRecorder>,
    ) -> Self {
        Self {
            provider,
            registry,
            usage,
        }
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    pub fn registry(&self) -> &Arc<UpstreamRegistry> {
        &self.registry
    }

    /// One non-streaming attempt
    pub async fn complete(
        &self,
        spec: &CallSpec,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CallError> {
        let record = usage_record(spec, &request);
        self.guarded(spec, record, self.provider.complete(request))
            .await
    }

    /// One streaming attempt; `on_delta` sees each content chunk as it arrives
    ///
    /// The full response is still returned so the caller can parse it.
    pub async fn complete_stream(
        &self,
        spec: &CallSpec,
        request: CompletionRequest,
        on_delta: &mut (dyn FnMut(&str) + Send),
    ) -> Result<CompletionResponse, CallError> {
        let record = usage_record(spec, &request);
        let provider = Arc::clone(&self.provider);
        let call = async move {
            let stream = provider.complete_stream(request).await?;
            collect_stream(stream, on_delta).await
        };
        self.guarded(spec, record, call).await
    }

    async fn guarded<Fut>(
        &self,
        spec: &CallSpec,
        record: UsageRecord,
        call: Fut,
    ) -> Result<CompletionResponse, CallError>
    where
        Fut: Future<Output = agent_llm::Result<CompletionResponse>>,
    {
        if let AcquireOutcome::Denied { retry_after } =
            self.registry.bucket(&spec.upstream).acquire(1)
        {
            debug!(upstream = %spec.upstream, ?retry_after, "token bucket denied call");
            return Err(CallError::RateLimited {
                upstream: spec.upstream.clone(),
                retry_after,
            });
        }

        let permit = self.registry.breaker(&spec.upstream).try_acquire()?;

        let start = Instant::now();
        let outcome = tokio::time::timeout(spec.timeout, call).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(response)) => {
                permit.success();
                self.record_usage(record.with_usage(response.usage).finished(true, latency_ms));
                Ok(response)
            }
            Ok(Err(err)) => {
                permit.failure();
                warn!(upstream = %spec.upstream, error = %err, "upstream call failed");
                self.record_usage(
                    record
                        .with_usage(TokenUsage::default())
                        .finished(false, latency_ms),
                );
                Err(CallError::Upstream(err))
            }
            Err(_) => {
                permit.failure();
                warn!(upstream = %spec.upstream, timeout = ?spec.timeout, "upstream call timed out");
                self.record_usage(record.finished(false, latency_ms));
                Err(CallError::Timeout(spec.timeout))
            }
        }
    }

    fn record_usage(&self, record: UsageRecord) {
        let usage = Arc::clone(&self.usage);
        tokio::spawn(async move {
            let purpose = record.purpose.clone();
            if let Err(e) = usage.record(record).await {
                warn!(purpose = %purpose, error = %e, "failed to record usage");
            }
        });
    }
}

fn usage_record(spec: &CallSpec, request: &CompletionRequest) -> UsageRecord {
    UsageRecord::new(
        request.purpose.clone().unwrap_or_else(|| "unspecified".to_string()),
        request.model.clone(),
        spec.upstream.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{BreakerConfig, BreakerState};
    use crate::registry::UpstreamPolicy;
    use crate::token_bucket::BucketConfig;
    use agent_llm::{LLMError, Message, NoopUsageRecorder};
    use async_trait::async_trait;
    use mockall::mock;
    use std::sync::Mutex;

    mock! {
        Provider {}

        #[async_trait]
        impl LLMProvider for Provider {
            async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse>;
            fn name(&self) -> &str;
        }
    }

    #[derive(Default)]
    struct CapturingRecorder {
        records: Mutex<Vec<UsageRecord>>,
    }

    #[async_trait]
    impl UsageRecorder for CapturingRecorder {
        async fn record(&self, record: UsageRecord) -> agent_llm::Result<()> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }
    }

    struct FailingRecorder;

    #[async_trait]
    impl UsageRecorder for FailingRecorder {
        async fn record(&self, _record: UsageRecord) -> agent_llm::Result<()> {
            Err(LLMError::RequestFailed("usage store offline".to_string()))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl LLMProvider for SlowProvider {
        async fn complete(&self, _request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(CompletionResponse::text("late", TokenUsage::default()))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::builder("test-model")
            .add_message(Message::user("analyze AAPL"))
            .purpose("technical")
            .build()
    }

    fn registry(capacity: u32, threshold: u32) -> Arc<UpstreamRegistry> {
        Arc::new(UpstreamRegistry::new(UpstreamPolicy {
            bucket: BucketConfig::new(capacity, 0.0),
            breaker: BreakerConfig {
                failure_threshold: threshold,
                ..BreakerConfig::default()
            },
        }))
    }

    fn spec() -> CallSpec {
        CallSpec::new("mock", Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_success_records_usage() {
        let mut provider = MockProvider::new();
        provider.expect_complete().times(1).returning(|_| {
            Ok(CompletionResponse::text(
                "{}",
                TokenUsage {
                    input_tokens: 10,
                    output_tokens: 4,
                },
            ))
        });
        let recorder = Arc::new(CapturingRecorder::default());
        let executor = AgentExecutor::new(Arc::new(provider), registry(5, 5), recorder.clone());

        let response = executor.complete(&spec(), request()).await.unwrap();
        assert_eq!(response.message.text(), "{}");

        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        let records = recorder.records.lock().unwrap().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].purpose, "technical");
        assert_eq!(records[0].upstream, "mock");
        assert_eq!(records[0].prompt_tokens, 10);
        assert!(records[0].success);
    }

    #[tokio::test]
    async fn test_denied_call_never_reaches_provider() {
        let mut provider = MockProvider::new();
        provider.expect_complete().times(1).returning(|_| {
            Ok(CompletionResponse::text("ok", TokenUsage::default()))
        });
        let executor = AgentExecutor::new(
            Arc::new(provider),
            registry(1, 5),
            Arc::new(NoopUsageRecorder),
        );

        tokio_test::assert_ok!(executor.complete(&spec(), request()).await);
        let err = executor.complete(&spec(), request()).await.unwrap_err();
        assert!(matches!(err, CallError::RateLimited { retry_after: None, .. }));
    }

    #[tokio::test]
    async fn test_failures_open_the_circuit() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .times(2)
            .returning(|_| Err(LLMError::ProviderError("503".to_string())));
        let registry = registry(10, 2);
        let executor = AgentExecutor::new(
            Arc::new(provider),
            Arc::clone(&registry),
            Arc::new(NoopUsageRecorder),
        );

        for _ in 0..2 {
            let err = executor.complete(&spec(), request()).await.unwrap_err();
            assert!(matches!(err, CallError::Upstream(_)));
        }
        assert_eq!(registry.breaker_state("mock"), BreakerState::Open);

        let err = executor.complete(&spec(), request()).await.unwrap_err();
        assert!(matches!(err, CallError::CircuitOpen(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let registry = registry(10, 1);
        let executor = AgentExecutor::new(
            Arc::new(SlowProvider),
            Arc::clone(&registry),
            Arc::new(NoopUsageRecorder),
        );

        let err = executor.complete(&spec(), request()).await.unwrap_err();
        assert_eq!(err, CallError::Timeout(Duration::from_secs(60)));
        assert_eq!(registry.breaker_state("mock"), BreakerState::Open);
    }

    #[tokio::test]
    async fn test_recorder_failure_does_not_fail_call() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .returning(|_| Ok(CompletionResponse::text("ok", TokenUsage::default())));
        let executor = AgentExecutor::new(
            Arc::new(provider),
            registry(5, 5),
            Arc::new(FailingRecorder),
        );

        tokio_test::assert_ok!(executor.complete(&spec(), request()).await);
    }

    #[tokio::test]
    async fn test_stream_forwards_deltas() {
        let mut provider = MockProvider::new();
        provider.expect_complete().returning(|_| {
            Ok(CompletionResponse::text("streamed body", TokenUsage::default()))
        });
        let executor = AgentExecutor::new(
            Arc::new(provider),
            registry(5, 5),
            Arc::new(NoopUsageRecorder),
        );

        let mut seen = String::new();
        let response = executor
            .complete_stream(&spec(), request(), &mut |d: &str| seen.push_str(d))
            .await
            .unwrap();
        assert_eq!(seen, "streamed body");
        assert_eq!(response.message.text(), "streamed body");
    }
}
