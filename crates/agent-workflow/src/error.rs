//! Error types for workflow execution
//!
//! Node-level failures never show up here: they are captured into
//! [`AgentResult`](agent_core::AgentResult)s and the workflow state. These
//! errors are for callers that misuse the orchestrator.

use thiserror::Error;

use crate::state::WorkflowStatus;

/// Result type alias for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The request failed validation
    #[error(transparent)]
    InvalidRequest(#[from] agent_core::Error),

    /// `resume` was called on a run that is not waiting for input
    #[error("run is {0}, not awaiting clarification")]
    NotAwaitingClarification(WorkflowStatus),

    /// A required collaborator was not supplied to the builder
    #[error("Orchestrator is missing {0}")]
    MissingComponent(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorkflowError::NotAwaitingClarification(WorkflowStatus::Completed);
        assert_eq!(err.to_string(), "run is completed, not awaiting clarification");

        let err: WorkflowError =
            agent_core::Error::InvalidRequest("symbol must not be empty".to_string()).into();
        assert_eq!(err.to_string(), "Invalid request: symbol must not be empty");
    }
}
