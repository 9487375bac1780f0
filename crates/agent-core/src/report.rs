//! Fan-in artifacts: conflicts, clarification requests and the final report

use serde::{Deserialize, Serialize};

use crate::agent::{Action, AgentKind, Confidence};

/// Axis along which two agents disagree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDimension {
    Action,
    Valuation,
    Trend,
    Sentiment,
}

/// A detected disagreement between two agents
///
/// `agent_a` always orders before `agent_b` so records are comparable
/// regardless of the order results arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub agent_a: AgentKind,
    pub agent_b: AgentKind,
    pub dimension: ConflictDimension,
    pub description: String,
}

impl ConflictRecord {
    pub fn new(
        first: AgentKind,
        second: AgentKind,
        dimension: ConflictDimension,
        description: impl Into<String>,
    ) -> Self {
        let (agent_a, agent_b) = if first <= second {
            (first, second)
        } else {
            (second, first)
        };
        Self {
            agent_a,
            agent_b,
            dimension,
            description: description.into(),
        }
    }
}

/// Raised when an analysis node reports missing critical data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    /// Agents that asked, in canonical order
    pub agents: Vec<AgentKind>,
    /// One question per asking agent, same order as `agents`
    pub questions: Vec<String>,
    #[serde(default)]
    pub missing_data: Vec<String>,
}

/// Consolidated report produced by the synthesis node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    /// Markdown report shown to the user
    pub report: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    pub confidence: Confidence,
    #[serde(default)]
    pub key_risks: Vec<String>,
    /// Agents whose successful results fed the synthesis
    pub agents_used: Vec<AgentKind>,
    pub latency_ms: u64,
}
