//! Core data model for the multi-agent analysis orchestrator
//!
//! This crate defines the types shared by every layer of the workspace: the
//! closed set of agent kinds, the per-agent result envelope, the error
//! taxonomy captured into results, and the request a caller submits.

pub mod agent;
pub mod context;
pub mod error;
pub mod payload;
pub mod report;

pub use agent::{Action, AgentAnalysis, AgentKind, AgentOutcome, AgentResult, Confidence};
pub use context::{AnalysisRequest, ClarificationAnswer, Language, RunOptions};
pub use error::{AgentError, Error, ErrorKind, Result};
pub use payload::{
    AnalysisDetails, AnalysisPayload, FundamentalDetails, NewsDetails, NewsHighlight,
    SentimentDetails, SentimentLabel, TechnicalDetails, Trend, Valuation,
};
pub use report::{ClarificationRequest, ConflictDimension, ConflictRecord, SynthesisResult};
