//! One attempt of one analyst, with every failure captured into the result

use agent_core::{
    Action, AgentAnalysis, AgentError, AgentKind, AgentResult, AnalysisPayload, AnalysisRequest,
    Confidence,
};
use agent_llm::{CompletionRequest, Message};
use agent_runtime::{AgentExecutor, CallSpec};
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Analyst, FundamentalAnalyst, NewsAnalyst, SentimentAnalyst, TechnicalAnalyst};
use crate::api::MarketDataProvider;
use crate::config::{AnalysisConfig, EffectiveOptions};
use crate::extract::extract;
use crate::prompts::{UserPrompt, analyst_prompt};

/// Everything an agent task needs, passed explicitly into every run
#[derive(Clone)]
pub struct TaskContext {
    pub request: Arc<AnalysisRequest>,
    pub config: Arc<AnalysisConfig>,
    /// Config defaults with the request's overrides applied
    pub options: EffectiveOptions,
    pub data: Arc<dyn MarketDataProvider>,
    pub executor: AgentExecutor,
}

impl TaskContext {
    pub fn new(
        request: AnalysisRequest,
        config: Arc<AnalysisConfig>,
        data: Arc<dyn MarketDataProvider>,
        executor: AgentExecutor,
    ) -> Self {
        let options = config.effective(&request);
        Self {
            request: Arc::new(request),
            config,
            options,
            data,
            executor,
        }
    }

    /// Same context, different request; overrides are recomputed
    pub fn with_request(&self, request: AnalysisRequest) -> Self {
        Self::new(
            request,
            Arc::clone(&self.config),
            Arc::clone(&self.data),
            self.executor.clone(),
        )
    }

    pub fn symbol(&self) -> &str {
        &self.request.symbol
    }

    pub(crate) fn call_spec(&self) -> CallSpec {
        CallSpec::new(self.options.upstream_id.clone(), self.options.per_task_timeout)
    }

    pub(crate) fn completion(
        &self,
        purpose: &str,
        system: &str,
        user: String,
        max_tokens: usize,
    ) -> CompletionRequest {
        CompletionRequest::builder(self.options.model.clone())
            .system(system)
            .add_message(Message::user(user))
            .max_tokens(max_tokens)
            .temperature(self.config.temperature)
            .purpose(purpose)
            .build()
    }
}

/// The JSON envelope every analyst answers with
#[derive(Debug, Deserialize)]
struct Reply<D> {
    #[serde(default)]
    action: Option<Action>,
    confidence: Confidence,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    missing_data: Vec<String>,
    #[serde(default)]
    clarification_question: Option<String>,
    #[serde(flatten)]
    details: D,
}

/// A single analysis node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentTask {
    kind: AgentKind,
}

impl AgentTask {
    pub fn new(kind: AgentKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Run one attempt. Never fails: every error is captured in the result.
    pub async fn run(&self, ctx: &TaskContext) -> AgentResult {
        match self.kind {
            AgentKind::Fundamental => execute(&FundamentalAnalyst, ctx).await,
            AgentKind::Technical => execute(&TechnicalAnalyst, ctx).await,
            AgentKind::Sentiment => execute(&SentimentAnalyst, ctx).await,
            AgentKind::News => execute(&NewsAnalyst, ctx).await,
        }
    }
}

async fn execute<A: Analyst>(analyst: &A, ctx: &TaskContext) -> AgentResult {
    let kind = A::KIND;
    let request = &ctx.request;
    debug!(agent = %kind, symbol = %request.symbol, "preparing inputs");

    let inputs = analyst.prepare_data(ctx).await;
    let prompt = analyst
        .describe(&inputs, UserPrompt::new(kind, request))
        .clarifications(kind, request);
    let missing_inputs = prompt.missing_inputs().to_vec();
    let completion = ctx.completion(
        kind.as_str(),
        analyst_prompt(kind, request.language),
        prompt.build(kind),
        ctx.config.max_tokens,
    );

    let started = Instant::now();
    let outcome = match ctx.executor.complete(&ctx.call_spec(), completion).await {
        Ok(response) => parse_reply::<A>(response.message.text(), missing_inputs),
        Err(e) => Err(AgentError::from(e)),
    };
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(analysis) => {
            info!(
                agent = %kind,
                symbol = %request.symbol,
                confidence = ?analysis.confidence,
                action = ?analysis.action,
                latency_ms,
                "analysis completed"
            );
            AgentResult::success(
                kind,
                analysis.payload,
                analysis.confidence,
                analysis.action,
                latency_ms,
            )
        }
        Err(error) => {
            warn!(
                agent = %kind,
                symbol = %request.symbol,
                error_kind = %error.kind,
                error = %error.message,
                latency_ms,
                "analysis failed"
            );
            AgentResult::failure(kind, error, latency_ms)
        }
    }
}

/// Extract the reply envelope; the raw text goes into the error detail on failure
fn parse_reply<A: Analyst>(
    raw: &str,
    missing_inputs: Vec<String>,
) -> Result<AgentAnalysis, AgentError> {
    let reply: Reply<A::Details> = extract(raw).map_err(|e| {
        AgentError::malformed_output(format!("{} reply: {e}", A::KIND)).with_detail(raw)
    })?;

    let mut missing_data = missing_inputs;
    for item in reply.missing_data {
        if !missing_data.contains(&item) {
            missing_data.push(item);
        }
    }

    let payload = AnalysisPayload {
        summary: reply.summary,
        key_points: reply.key_points,
        missing_data,
        clarification_question: reply.clarification_question.filter(|q| !q.trim().is_empty()),
        details: A::into_details(reply.details),
    };
    Ok(AgentAnalysis {
        payload,
        confidence: reply.confidence,
        action: reply.action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CompanyInfo, StaticDataProvider, SymbolData};
    use agent_core::{AnalysisDetails, ErrorKind, Valuation};
    use agent_llm::{CompletionResponse, LLMError, LLMProvider, NoopUsageRecorder, TokenUsage};
    use agent_runtime::{BreakerConfig, BucketConfig, UpstreamPolicy, UpstreamRegistry};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies with a fixed text and remembers the last request
    struct CannedProvider {
        reply: agent_llm::Result<String>,
        delay: Duration,
        seen: Mutex<Option<CompletionRequest>>,
    }

    impl CannedProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for CannedProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> agent_llm::Result<CompletionResponse> {
            *self.seen.lock().unwrap() = Some(request);
            tokio::time::sleep(self.delay).await;
            self.reply
                .clone()
                .map(|text| CompletionResponse::text(text, TokenUsage::default()))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn context(provider: Arc<CannedProvider>, policy: UpstreamPolicy) -> TaskContext {
        let data = StaticDataProvider::new().with_symbol(
            "AAPL",
            SymbolData {
                info: Some(CompanyInfo {
                    symbol: "AAPL".to_string(),
                    name: Some("Apple Inc.".to_string()),
                    ..CompanyInfo::default()
                }),
                ..SymbolData::default()
            },
        );
        let executor = AgentExecutor::new(
            provider,
            Arc::new(UpstreamRegistry::new(policy)),
            Arc::new(NoopUsageRecorder),
        );
        TaskContext::new(
            AnalysisRequest::new("AAPL"),
            Arc::new(AnalysisConfig::default()),
            Arc::new(data),
            executor,
        )
    }

    const FUNDAMENTAL_REPLY: &str = r#"Here is my view:
```json
{"action": "buy", "confidence": "high", "summary": "Cheap for its growth",
 "key_points": ["P/E below peers"], "missing_data": ["segment revenue"],
 "valuation": "undervalued", "metrics": {"pe": 18.5}}
```"#;

    #[tokio::test]
    async fn test_successful_run_builds_payload() {
        let provider = Arc::new(CannedProvider::new(FUNDAMENTAL_REPLY));
        let ctx = context(Arc::clone(&provider), UpstreamPolicy::default());

        let result = AgentTask::new(AgentKind::Fundamental).run(&ctx).await;

        assert!(result.is_success());
        assert_eq!(result.action(), Some(Action::Buy));
        assert_eq!(result.confidence(), Some(Confidence::High));
        let payload = result.payload().unwrap();
        assert_eq!(payload.valuation(), Some(Valuation::Undervalued));
        assert!(matches!(payload.details, AnalysisDetails::Fundamental(_)));
        // Missing sub-inputs come first, then what the model reported
        assert_eq!(
            payload.missing_data,
            vec![
                "Financials".to_string(),
                "Latest quote".to_string(),
                "segment revenue".to_string()
            ]
        );

        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.purpose.as_deref(), Some("fundamental"));
        assert!(seen.messages[0].text().contains("Apple Inc."));
    }

    #[tokio::test]
    async fn test_unparseable_reply_keeps_raw_text_in_detail() {
        let provider = Arc::new(CannedProvider::new("I would rather not say."));
        let ctx = context(provider, UpstreamPolicy::default());

        let result = AgentTask::new(AgentKind::News).run(&ctx).await;

        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::MalformedOutput);
        assert_eq!(error.detail.as_deref(), Some("I would rather not say."));
        assert!(result.payload().is_none());
    }

    #[tokio::test]
    async fn test_provider_error_is_captured() {
        let provider = Arc::new(CannedProvider {
            reply: Err(LLMError::ProviderError("502 bad gateway".to_string())),
            delay: Duration::ZERO,
            seen: Mutex::new(None),
        });
        let ctx = context(provider, UpstreamPolicy::default());

        let result = AgentTask::new(AgentKind::Technical).run(&ctx).await;
        assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::UpstreamError));
    }

    #[tokio::test]
    async fn test_rate_limited_run_never_calls_upstream() {
        let provider = Arc::new(CannedProvider::new(FUNDAMENTAL_REPLY));
        let policy = UpstreamPolicy {
            bucket: BucketConfig::new(0, 1.0),
            breaker: BreakerConfig::default(),
        };
        let ctx = context(Arc::clone(&provider), policy);

        let result = AgentTask::new(AgentKind::Fundamental).run(&ctx).await;

        assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::RateLimited));
        assert!(provider.seen.lock().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_upstream_times_out_with_latency_recorded() {
        let provider = Arc::new(CannedProvider {
            reply: Ok(FUNDAMENTAL_REPLY.to_string()),
            delay: Duration::from_secs(120),
            seen: Mutex::new(None),
        });
        let ctx = context(provider, UpstreamPolicy::default());

        let result = AgentTask::new(AgentKind::Fundamental).run(&ctx).await;

        assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::Timeout));
        assert_eq!(result.latency_ms, 60_000);
    }
}
