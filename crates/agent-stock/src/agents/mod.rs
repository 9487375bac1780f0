//! Analyst agents
//!
//! The four perspectives form a closed set, so dispatch is a `match` over
//! [`AgentKind`] in [`AgentTask::run`] rather than a plugin registry. Each
//! perspective implements [`Analyst`]: gather inputs, describe them in the
//! user message, and wrap the kind-specific part of the model's reply.

mod fundamental;
mod news;
mod sentiment;
mod synthesis;
mod task;
mod technical;

pub use fundamental::FundamentalAnalyst;
pub use news::NewsAnalyst;
pub use sentiment::{Momentum, SentimentAnalyst};
pub use synthesis::{SynthesisInput, SynthesisTask};
pub use task::{AgentTask, TaskContext};
pub use technical::{TechnicalAnalyst, TechnicalSnapshot, compute_indicators};

use agent_core::{AgentKind, AnalysisDetails};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::warn;

use crate::error::Result;
use crate::prompts::UserPrompt;

/// One analytical perspective
#[async_trait]
pub trait Analyst: Send + Sync {
    const KIND: AgentKind;

    /// Everything the analyst fetched; absent sub-inputs are `None`
    type Inputs: Send + Sync;

    /// Kind-specific fields of the model's JSON reply
    type Details: DeserializeOwned + Default + Send;

    /// Gather inputs concurrently; never fails
    async fn prepare_data(&self, ctx: &TaskContext) -> Self::Inputs;

    /// Add one section per input to the user message
    fn describe(&self, inputs: &Self::Inputs, prompt: UserPrompt) -> UserPrompt;

    fn into_details(details: Self::Details) -> AnalysisDetails;
}

/// Await one sub-fetch, turning an error or an empty answer into `None`
pub(crate) async fn gather<T>(
    symbol: &str,
    input: &'static str,
    fetch: impl Future<Output = Result<Option<T>>>,
) -> Option<T> {
    match fetch.await {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            warn!(symbol, input, "input unavailable");
            None
        }
        Err(e) => {
            warn!(symbol, input, error = %e, "sub-fetch failed");
            None
        }
    }
}
