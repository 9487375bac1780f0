//! The request a caller submits to the orchestrator
//!
//! Per-request configuration (deadline, model or upstream overrides) travels
//! explicitly inside [`AnalysisRequest`] rather than in ambient state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::agent::AgentKind;
use crate::error::{Error, Result};

/// Response language preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "zh")]
    Chinese,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Chinese => "zh",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" | "en-us" => Ok(Self::English),
            "zh" | "chinese" | "zh-cn" | "中文" => Ok(Self::Chinese),
            other => Err(Error::InvalidRequest(format!("unsupported language '{other}'"))),
        }
    }
}

/// Per-request overrides of the configured defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub global_deadline_ms: Option<u64>,
    pub per_task_timeout_ms: Option<u64>,
    /// Model override, e.g. a user-level model preference
    pub model: Option<String>,
    /// Upstream identifier override; selects which bucket/breaker applies
    pub upstream_id: Option<String>,
}

/// Caller input answering a clarification request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationAnswer {
    pub agent: AgentKind,
    pub answer: String,
}

/// A single analysis request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub symbol: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub language: Language,
    pub requested_agents: BTreeSet<AgentKind>,
    #[serde(default)]
    pub clarifications: Vec<ClarificationAnswer>,
    #[serde(default)]
    pub options: RunOptions,
}

impl AnalysisRequest {
    /// Request every agent for a symbol
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            market: None,
            language: Language::default(),
            requested_agents: AgentKind::ALL.into_iter().collect(),
            clarifications: Vec::new(),
            options: RunOptions::default(),
        }
    }

    // =========== Builder Methods ===========

    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_agents(mut self, agents: impl IntoIterator<Item = AgentKind>) -> Self {
        self.requested_agents = agents.into_iter().collect();
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_clarification(mut self, answer: ClarificationAnswer) -> Self {
        self.clarifications.push(answer);
        self
    }

    // =========== Accessors ===========

    /// Answers the caller gave to `agent`, oldest first
    pub fn answers_for(&self, agent: AgentKind) -> impl Iterator<Item = &str> {
        self.clarifications
            .iter()
            .filter(move |c| c.agent == agent)
            .map(|c| c.answer.as_str())
    }

    pub fn has_answer_for(&self, agent: AgentKind) -> bool {
        self.answers_for(agent).next().is_some()
    }

    /// Reject requests that cannot be executed
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(Error::InvalidRequest("symbol must not be empty".to_string()));
        }
        if self.requested_agents.is_empty() {
            return Err(Error::InvalidRequest(
                "at least one agent must be requested".to_string(),
            ));
        }
        if self.options.global_deadline_ms == Some(0) || self.options.per_task_timeout_ms == Some(0)
        {
            return Err(Error::InvalidRequest(
                "deadlines must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
