//! Workflow state owned by one orchestrator run

use agent_core::{
    Action, AgentError, AgentKind, AgentResult, AnalysisRequest, ClarificationRequest,
    ConflictRecord, SynthesisResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use crate::consensus::ConsensusReport;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    AwaitingClarification,
    /// Synthesis produced a report
    Completed,
    /// Synthesis failed, or nothing succeeded without the deadline firing
    Failed,
    /// The deadline fired before any analysis succeeded
    TimedOut,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::AwaitingClarification => "awaiting_clarification",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }

    /// No further transitions happen from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a run produced, returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub run_id: Uuid,
    pub request: AnalysisRequest,
    pub status: WorkflowStatus,
    /// At most one result per requested agent
    pub results: BTreeMap<AgentKind, AgentResult>,
    /// Detection order
    pub conflicts: Vec<ConflictRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_score: Option<f64>,
    #[serde(default)]
    pub low_confidence: BTreeSet<AgentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification: Option<ClarificationRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_report: Option<SynthesisResult>,
    /// Why the run failed or timed out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<AgentError>,
    /// The global deadline fired during fan-out
    #[serde(default)]
    pub deadline_hit: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    pub fn new(request: AnalysisRequest) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            request,
            status: WorkflowStatus::Running,
            results: BTreeMap::new(),
            conflicts: Vec::new(),
            consensus_action: None,
            weighted_score: None,
            low_confidence: BTreeSet::new(),
            clarification: None,
            final_report: None,
            failure: None,
            deadline_hit: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Agents that returned a structured analysis
    pub fn succeeded(&self) -> Vec<AgentKind> {
        self.results
            .values()
            .filter(|r| r.is_success())
            .map(|r| r.kind)
            .collect()
    }

    /// Failed agents with their captured errors, canonical order
    pub fn failures(&self) -> Vec<(AgentKind, &AgentError)> {
        self.results
            .values()
            .filter_map(|r| r.error().map(|e| (r.kind, e)))
            .collect()
    }

    pub(crate) fn apply_consensus(&mut self, report: ConsensusReport) {
        self.conflicts = report.conflicts;
        self.consensus_action = report.consensus_action;
        self.weighted_score = report.weighted_score;
        self.low_confidence = report.low_confidence;
    }

    pub(crate) fn suspend(&mut self, clarification: ClarificationRequest) {
        self.status = WorkflowStatus::AwaitingClarification;
        self.clarification = Some(clarification);
    }

    pub(crate) fn complete(&mut self, report: SynthesisResult) {
        self.status = WorkflowStatus::Completed;
        self.final_report = Some(report);
        self.failure = None;
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, status: WorkflowStatus, error: AgentError) {
        self.status = status;
        self.failure = Some(error);
        self.finished_at = Some(Utc::now());
    }
}

/// Write-once result map shared by the tasks of one fan-out
///
/// Each task writes its own key and a second write for a key is refused.
/// Once drained the sink is closed, so results that arrive after the
/// deadline are discarded.
#[derive(Debug, Clone)]
pub(crate) struct ResultSink {
    inner: Arc<Mutex<Option<BTreeMap<AgentKind, AgentResult>>>>,
}

impl Default for ResultSink {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(BTreeMap::new()))),
        }
    }
}

impl ResultSink {
    /// Returns false if the sink is closed or `result.kind` was already recorded
    pub fn record(&self, result: AgentResult) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(map) if !map.contains_key(&result.kind) => {
                map.insert(result.kind, result);
                true
            }
            _ => false,
        }
    }

    /// Close the sink and take what was recorded
    pub fn drain(&self) -> BTreeMap<AgentKind, AgentResult> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default()
    }
}
