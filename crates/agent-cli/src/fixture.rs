//! Recorded upstream replies for offline runs
//!
//! A responses file maps a request purpose (`fundamental`, `technical`,
//! `sentiment`, `news`, `synthesis`) to either a reply string or an object:
//!
//! ```json
//! {
//!   "fundamental": "{\"action\": \"buy\", \"confidence\": \"high\", \"summary\": \"...\"}",
//!   "sentiment": {"delay_ms": 70000, "reply": "..."},
//!   "news": {"error": "provider overloaded"}
//! }
//! ```

use agent_llm::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, TokenUsage, UsageRecord,
    UsageRecorder,
};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum Entry {
    Reply(String),
    Scripted {
        #[serde(default)]
        delay_ms: u64,
        #[serde(default)]
        reply: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Provider answering from a responses file
#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    entries: HashMap<String, Entry>,
}

impl FixtureProvider {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let entries = serde_json::from_str(json).context("invalid responses fixture")?;
        Ok(Self { entries })
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading responses from {}", path.display()))?;
        Self::from_json(&json)
    }
}

#[async_trait]
impl LLMProvider for FixtureProvider {
    async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
        let purpose = request.purpose.as_deref().unwrap_or("default");
        debug!(purpose, model = %request.model, "fixture completion");

        let Some(entry) = self.entries.get(purpose) else {
            return Err(LLMError::InvalidRequest(format!(
                "no recorded response for '{purpose}'"
            )));
        };
        let (delay_ms, reply, error) = match entry {
            Entry::Reply(text) => (0, Some(text), None),
            Entry::Scripted {
                delay_ms,
                reply,
                error,
            } => (*delay_ms, reply.as_ref(), error.as_ref()),
        };

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        if let Some(error) = error {
            return Err(LLMError::ProviderError(error.clone()));
        }
        let text = reply.cloned().unwrap_or_default();
        let usage = TokenUsage {
            input_tokens: request.messages.iter().map(|m| m.content.len() / 4).sum(),
            output_tokens: text.len() / 4,
        };
        Ok(CompletionResponse::text(text, usage))
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

/// Usage sink that writes one log event per upstream attempt
#[derive(Debug, Clone, Copy, Default)]
pub struct LogUsageRecorder;

#[async_trait]
impl UsageRecorder for LogUsageRecorder {
    async fn record(&self, record: UsageRecord) -> agent_llm::Result<()> {
        info!(
            purpose = %record.purpose,
            model = %record.model,
            upstream = %record.upstream,
            prompt_tokens = record.prompt_tokens,
            completion_tokens = record.completion_tokens,
            latency_ms = record.latency_ms,
            success = record.success,
            "usage"
        );
        Ok(())
    }
}
