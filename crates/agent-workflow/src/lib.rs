//! Workflow graph and orchestrator for multi-agent stock analysis
//!
//! This crate fans a request out over the analysis agents of `agent-stock`,
//! collects their results under a global deadline, detects disagreement
//! between them and runs the synthesis node that produces the final report.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_workflow::{Orchestrator, WorkflowStatus};
//!
//! let orchestrator = Orchestrator::builder()
//!     .config(config)
//!     .data_provider(data)
//!     .runtime(&runtime)
//!     .build()?;
//!
//! let state = orchestrator.run(orchestrator.request("AAPL")).await?;
//! if state.status == WorkflowStatus::Completed {
//!     println!("{}", state.final_report.unwrap().report);
//! }
//! ```

pub mod consensus;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod retry;
pub mod state;
pub mod stream;

// Re-export for convenience
pub use consensus::{ConsensusReport, analyze};
pub use error::{Result, WorkflowError};
pub use graph::{Edge, EdgeCondition, NodeId, WorkflowGraph};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use retry::RetryPolicy;
pub use state::{WorkflowState, WorkflowStatus};
pub use stream::{NodePhase, WorkflowEvent, WorkflowStream};
