//! The orchestrator drives the workflow graph
//!
//! A run goes through two phases:
//! 1. Fan-out: every requested analysis node is spawned at once, each one
//!    wrapped in the retry policy, and the orchestrator waits for all of them
//!    or for the global deadline, whichever comes first. Nodes still running
//!    at the deadline are aborted and recorded as timeouts.
//! 2. Fan-in: a node that asked a question suspends the run. Otherwise the
//!    conflict analyzer runs over the results and the synthesis node turns
//!    them into the final report.
//!
//! Node failures never abort a run. Only a failed synthesis, or a fan-out
//! where nothing succeeded, ends in a non-`Completed` status.

use agent_core::{
    AgentError, AgentKind, AgentResult, AnalysisRequest, ClarificationAnswer,
    ClarificationRequest, ErrorKind,
};
use agent_runtime::{AgentExecutor, AgentRuntime};
use agent_stock::{
    AgentTask, AnalysisConfig, MarketDataProvider, SynthesisInput, SynthesisTask, TaskContext,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::consensus::analyze;
use crate::error::{Result, WorkflowError};
use crate::graph::{NodeId, WorkflowGraph};
use crate::retry::RetryPolicy;
use crate::state::{ResultSink, WorkflowState, WorkflowStatus};
use crate::stream::{Events, WorkflowEvent, WorkflowStream};

/// Runs analysis workflows against one data provider and one runtime
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<AnalysisConfig>,
    data: Arc<dyn MarketDataProvider>,
    executor: AgentExecutor,
    retry: RetryPolicy,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// A request for `symbol` using the configured language and agents
    pub fn request(&self, symbol: impl Into<String>) -> AnalysisRequest {
        AnalysisRequest::new(symbol)
            .with_language(self.config.default_language)
            .with_agents(self.config.default_agents.iter().copied())
    }

    /// The graph a request would run
    pub fn graph(&self, request: &AnalysisRequest) -> WorkflowGraph {
        WorkflowGraph::for_request(request)
    }

    /// Run the whole graph and wait for a terminal or suspended state
    pub async fn run(&self, request: AnalysisRequest) -> Result<WorkflowState> {
        request.validate()?;
        let agents = request.requested_agents.clone();
        Ok(self
            .execute(WorkflowState::new(request), agents, &Events::none())
            .await)
    }

    /// Run one analysis node outside the graph: no retries, no synthesis
    pub async fn run_single(&self, kind: AgentKind, request: AnalysisRequest) -> Result<AgentResult> {
        request.validate()?;
        let ctx = self.context(request);
        let result = AgentTask::new(kind).run(&ctx).await;
        info!(
            agent = %kind,
            symbol = %ctx.symbol(),
            success = result.is_success(),
            latency_ms = result.latency_ms,
            "single agent run finished"
        );
        Ok(result)
    }

    /// Continue a run suspended in `AwaitingClarification`
    ///
    /// Only the agents that asked are run again, with the answers added to
    /// the request. Results of the other agents are kept.
    pub async fn resume(
        &self,
        state: WorkflowState,
        answers: Vec<ClarificationAnswer>,
    ) -> Result<WorkflowState> {
        let (state, agents) = prepare_resume(state, answers)?;
        Ok(self.execute(state, agents, &Events::none()).await)
    }

    /// Like [`run`](Self::run), reporting progress as a lazy event stream
    pub fn stream(&self, request: AnalysisRequest) -> Result<WorkflowStream> {
        request.validate()?;
        let orchestrator = self.clone();
        Ok(WorkflowStream::new(move |events| async move {
            let agents = request.requested_agents.clone();
            let state = orchestrator
                .execute(WorkflowState::new(request), agents, &events)
                .await;
            events.emit(WorkflowEvent::Done {
                state: Box::new(state),
            });
        }))
    }

    /// Streaming counterpart of [`resume`](Self::resume)
    pub fn stream_resume(
        &self,
        state: WorkflowState,
        answers: Vec<ClarificationAnswer>,
    ) -> Result<WorkflowStream> {
        let (state, agents) = prepare_resume(state, answers)?;
        let orchestrator = self.clone();
        Ok(WorkflowStream::new(move |events| async move {
            let state = orchestrator.execute(state, agents, &events).await;
            events.emit(WorkflowEvent::Done {
                state: Box::new(state),
            });
        }))
    }

    fn context(&self, request: AnalysisRequest) -> TaskContext {
        TaskContext::new(
            request,
            Arc::clone(&self.config),
            Arc::clone(&self.data),
            self.executor.clone(),
        )
    }

    async fn execute(
        &self,
        mut state: WorkflowState,
        agents: BTreeSet<AgentKind>,
        events: &Events,
    ) -> WorkflowState {
        let ctx = self.context(state.request.clone());
        info!(
            run_id = %state.run_id,
            symbol = %ctx.symbol(),
            agents = agents.len(),
            deadline_ms = ctx.options.global_deadline.as_millis() as u64,
            "workflow started"
        );

        let (results, deadline_hit) = self.fan_out(&ctx, &agents, events).await;
        state.results.extend(results);
        state.deadline_hit = deadline_hit;

        self.fan_in(&ctx, state, events).await
    }

    async fn fan_out(
        &self,
        ctx: &TaskContext,
        agents: &BTreeSet<AgentKind>,
        events: &Events,
    ) -> (BTreeMap<AgentKind, AgentResult>, bool) {
        let sink = ResultSink::default();
        let mut tasks = JoinSet::new();

        for &kind in agents {
            events.emit(WorkflowEvent::started(NodeId::Analysis(kind)));
            let ctx = ctx.clone();
            let sink = sink.clone();
            let retry = self.retry.clone();
            let events = events.clone();
            tasks.spawn(async move {
                let task = AgentTask::new(kind);
                let result = retry.run(kind, || task.run(&ctx)).await;
                let finished = result.clone();
                if sink.record(result) {
                    events.node_finished(&finished);
                }
            });
        }

        let deadline = ctx.options.global_deadline;
        let deadline_hit = timeout(deadline, join_all(&mut tasks)).await.is_err();
        if deadline_hit {
            tasks.abort_all();
        }
        let mut results = sink.drain();

        let deadline_ms = deadline.as_millis() as u64;
        for &kind in agents {
            if results.contains_key(&kind) {
                continue;
            }
            let result = if deadline_hit {
                warn!(agent = %kind, deadline_ms, "agent still running at the global deadline");
                AgentResult::failure(
                    kind,
                    AgentError::timeout(format!("global deadline of {deadline_ms}ms elapsed")),
                    deadline_ms,
                )
            } else {
                warn!(agent = %kind, "agent task ended without a result");
                AgentResult::failure(kind, AgentError::upstream("agent task aborted"), 0)
            };
            events.node_finished(&result);
            results.insert(kind, result);
        }

        info!(
            succeeded = results.values().filter(|r| r.is_success()).count(),
            failed = results.values().filter(|r| !r.is_success()).count(),
            deadline_hit,
            "fan-out finished"
        );
        (results, deadline_hit)
    }

    async fn fan_in(
        &self,
        ctx: &TaskContext,
        mut state: WorkflowState,
        events: &Events,
    ) -> WorkflowState {
        if let Some(clarification) = clarification_for(&state) {
            info!(
                run_id = %state.run_id,
                agents = ?clarification.agents,
                "workflow suspended for clarification"
            );
            events.emit(WorkflowEvent::started(NodeId::Clarify));
            events.emit(WorkflowEvent::finished(NodeId::Clarify, None));
            state.suspend(clarification);
            return state;
        }

        state.apply_consensus(analyze(&state.results));
        if !state.conflicts.is_empty() {
            debug!(conflicts = state.conflicts.len(), "conflicts detected");
        }

        if state.succeeded().is_empty() {
            let (status, error) = no_success(&state);
            warn!(run_id = %state.run_id, status = %status, error = %error, "no analysis succeeded");
            events.emit(WorkflowEvent::Error {
                node: NodeId::Synthesize,
                kind: error.kind,
                message: error.message.clone(),
            });
            state.fail(status, error);
            return state;
        }

        events.emit(WorkflowEvent::started(NodeId::Synthesize));
        let input = SynthesisInput {
            results: &state.results,
            conflicts: &state.conflicts,
            consensus: state.consensus_action,
            weighted_score: state.weighted_score,
            low_confidence: &state.low_confidence,
        };
        let synthesis = if events.is_streaming() {
            let mut on_delta = |text: &str| {
                events.emit(WorkflowEvent::ContentDelta {
                    text: text.to_string(),
                });
            };
            SynthesisTask.run_streaming(ctx, input, &mut on_delta).await
        } else {
            SynthesisTask.run(ctx, input).await
        };

        match synthesis {
            Ok(report) => {
                events.emit(WorkflowEvent::finished(NodeId::Synthesize, None));
                state.complete(report);
            }
            Err(error) => {
                events.emit(WorkflowEvent::finished(NodeId::Synthesize, Some(error.kind)));
                events.emit(WorkflowEvent::Error {
                    node: NodeId::Synthesize,
                    kind: error.kind,
                    message: error.message.clone(),
                });
                state.fail(WorkflowStatus::Failed, error);
            }
        }

        info!(
            run_id = %state.run_id,
            status = %state.status,
            consensus = ?state.consensus_action,
            "workflow finished"
        );
        state
    }
}

async fn join_all(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                warn!(error = %e, "agent task panicked");
            }
        }
    }
}

fn prepare_resume(
    mut state: WorkflowState,
    answers: Vec<ClarificationAnswer>,
) -> Result<(WorkflowState, BTreeSet<AgentKind>)> {
    if state.status != WorkflowStatus::AwaitingClarification {
        return Err(WorkflowError::NotAwaitingClarification(state.status));
    }
    if answers.iter().all(|a| a.answer.trim().is_empty()) {
        return Err(agent_core::Error::InvalidRequest(
            "at least one non-empty answer is required".to_string(),
        )
        .into());
    }

    let agents: BTreeSet<AgentKind> = state
        .clarification
        .take()
        .map(|c| c.agents.into_iter().collect())
        .unwrap_or_default();
    state
        .request
        .clarifications
        .extend(answers.into_iter().filter(|a| !a.answer.trim().is_empty()));
    for kind in &agents {
        state.results.remove(kind);
    }
    state.status = WorkflowStatus::Running;
    info!(run_id = %state.run_id, agents = ?agents, "resuming workflow");
    Ok((state, agents))
}

/// The clarification request for the nodes the graph routes to `clarify`
fn clarification_for(state: &WorkflowState) -> Option<ClarificationRequest> {
    let graph = WorkflowGraph::for_request(&state.request);
    let mut agents = Vec::new();
    let mut questions = Vec::new();
    let mut missing_data: Vec<String> = Vec::new();

    for result in state.results.values() {
        if graph.route(result, &state.request) != NodeId::Clarify {
            continue;
        }
        let Some(payload) = result.payload() else {
            continue;
        };
        let Some(question) = payload.clarification_question.clone() else {
            continue;
        };
        agents.push(result.kind);
        questions.push(question);
        for item in &payload.missing_data {
            if !missing_data.contains(item) {
                missing_data.push(item.clone());
            }
        }
    }

    (!agents.is_empty()).then_some(ClarificationRequest {
        agents,
        questions,
        missing_data,
    })
}

/// Status and summary error for a fan-out where nothing succeeded
fn no_success(state: &WorkflowState) -> (WorkflowStatus, AgentError) {
    let failures = state.failures();
    let summary = failures
        .iter()
        .map(|(kind, error)| format!("{kind} ({})", error.kind))
        .collect::<Vec<_>>()
        .join(", ");
    let message = format!("no analysis succeeded: {summary}");

    if state.deadline_hit {
        (WorkflowStatus::TimedOut, AgentError::timeout(message))
    } else {
        let kind = failures
            .first()
            .map_or(ErrorKind::UpstreamError, |(_, e)| e.kind);
        (WorkflowStatus::Failed, AgentError::new(kind, message))
    }
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    config: Option<Arc<AnalysisConfig>>,
    data: Option<Arc<dyn MarketDataProvider>>,
    executor: Option<AgentExecutor>,
    retry: RetryPolicy,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            data: None,
            executor: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = Some(Arc::new(config));
        self
    }

    pub fn data_provider(mut self, data: Arc<dyn MarketDataProvider>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn executor(mut self, executor: AgentExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Take the executor from a runtime
    pub fn runtime(self, runtime: &AgentRuntime) -> Self {
        self.executor(runtime.executor())
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if the data provider or executor is not set, or the
    /// configuration does not validate
    pub fn build(self) -> Result<Orchestrator> {
        let data = self
            .data
            .ok_or(WorkflowError::MissingComponent("a market data provider"))?;
        let executor = self
            .executor
            .ok_or(WorkflowError::MissingComponent("an executor"))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Orchestrator {
            config,
            data,
            executor,
            retry: self.retry,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
