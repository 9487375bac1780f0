//! Structured analysis payloads
//!
//! Every agent reports a common envelope ([`AnalysisPayload`]) plus the
//! kind-specific details the conflict analyzer compares across agents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::agent::AgentKind;

/// Fundamental valuation verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Valuation {
    #[serde(alias = "undervalue", alias = "cheap")]
    Undervalued,
    #[serde(alias = "fair", alias = "fairly_valued", alias = "fair_value")]
    Fair,
    #[serde(alias = "overvalue", alias = "expensive")]
    Overvalued,
}

/// Price trend reported by technical analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    #[serde(alias = "uptrend", alias = "up")]
    Bullish,
    #[serde(alias = "sideways", alias = "range", alias = "flat")]
    Neutral,
    #[serde(alias = "downtrend", alias = "down")]
    Bearish,
}

/// Direction of market or news sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    #[serde(alias = "bullish")]
    Positive,
    #[serde(alias = "mixed")]
    Neutral,
    #[serde(alias = "bearish")]
    Negative,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundamentalDetails {
    pub valuation: Option<Valuation>,
    /// Named metrics as reported by the model (P/E, ROE, margins, ...)
    pub metrics: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalDetails {
    pub trend: Option<Trend>,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub indicators: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentDetails {
    pub overall: Option<SentimentLabel>,
    /// Score in `[-1, 1]`
    pub score: Option<f64>,
    /// Per-source breakdown, e.g. `{"news": 0.4, "social": -0.1}`
    pub breakdown: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsHighlight {
    pub title: String,
    pub impact: Option<SentimentLabel>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsDetails {
    pub sentiment: Option<SentimentLabel>,
    pub items: Vec<NewsHighlight>,
}

/// Kind-specific details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisDetails {
    Fundamental(FundamentalDetails),
    Technical(TechnicalDetails),
    Sentiment(SentimentDetails),
    News(NewsDetails),
}

impl AnalysisDetails {
    /// The agent kind these details belong to
    pub fn kind(&self) -> AgentKind {
        match self {
            Self::Fundamental(_) => AgentKind::Fundamental,
            Self::Technical(_) => AgentKind::Technical,
            Self::Sentiment(_) => AgentKind::Sentiment,
            Self::News(_) => AgentKind::News,
        }
    }
}

/// Common envelope for a successful analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Inputs the agent could not obtain
    #[serde(default)]
    pub missing_data: Vec<String>,
    /// Clarification sentinel: set when the agent cannot finish without caller input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
    pub details: AnalysisDetails,
}

impl AnalysisPayload {
    pub fn new(summary: impl Into<String>, details: AnalysisDetails) -> Self {
        Self {
            summary: summary.into(),
            key_points: Vec::new(),
            missing_data: Vec::new(),
            clarification_question: None,
            details,
        }
    }

    pub fn with_clarification(mut self, question: impl Into<String>) -> Self {
        self.clarification_question = Some(question.into());
        self
    }

    /// True when the agent signalled missing critical data
    pub fn needs_clarification(&self) -> bool {
        self.clarification_question
            .as_deref()
            .is_some_and(|q| !q.trim().is_empty())
    }

    pub fn valuation(&self) -> Option<Valuation> {
        match &self.details {
            AnalysisDetails::Fundamental(d) => d.valuation,
            _ => None,
        }
    }

    pub fn trend(&self) -> Option<Trend> {
        match &self.details {
            AnalysisDetails::Technical(d) => d.trend,
            _ => None,
        }
    }

    /// Sentiment direction from either the sentiment or the news agent
    pub fn sentiment(&self) -> Option<SentimentLabel> {
        match &self.details {
            AnalysisDetails::Sentiment(d) => d.overall,
            AnalysisDetails::News(d) => d.sentiment,
            _ => None,
        }
    }
}
