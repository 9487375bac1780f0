//! Streaming mode
//!
//! [`WorkflowStream`] runs the same state machine as
//! [`Orchestrator::run`](crate::Orchestrator::run) and reports progress as
//! events. Nothing starts until the stream is first polled. Dropping the
//! stream aborts the run; in-flight upstream calls are cancelled, which
//! returns their breaker permits.

use agent_core::{AgentResult, ErrorKind};
use futures::Stream;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

use crate::graph::NodeId;
use crate::state::WorkflowState;

/// Progress of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum NodePhase {
    Started,
    Finished {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_kind: Option<ErrorKind>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A graph node started or finished
    ToolEvent { node: NodeId, phase: NodePhase },
    /// Incremental synthesis text
    ContentDelta { text: String },
    /// A node failed; the run may still complete
    Error {
        node: NodeId,
        kind: ErrorKind,
        message: String,
    },
    /// Always the last event of a run
    Done { state: Box<WorkflowState> },
}

impl WorkflowEvent {
    pub fn started(node: NodeId) -> Self {
        Self::ToolEvent {
            node,
            phase: NodePhase::Started,
        }
    }

    pub fn finished(node: NodeId, error_kind: Option<ErrorKind>) -> Self {
        Self::ToolEvent {
            node,
            phase: NodePhase::Finished {
                success: error_kind.is_none(),
                error_kind,
            },
        }
    }
}

/// Event sender threaded through a run; inert outside streaming mode
#[derive(Debug, Clone, Default)]
pub(crate) struct Events {
    tx: Option<UnboundedSender<WorkflowEvent>>,
}

impl Events {
    pub fn none() -> Self {
        Self::default()
    }

    fn channel() -> (Self, UnboundedReceiver<WorkflowEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn is_streaming(&self) -> bool {
        self.tx.is_some()
    }

    pub fn emit(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.tx {
            // The receiver is gone only when the stream was dropped
            let _ = tx.send(event);
        }
    }

    /// Finished event for an analysis node, plus an error event on failure
    pub fn node_finished(&self, result: &AgentResult) {
        if !self.is_streaming() {
            return;
        }
        let node = NodeId::Analysis(result.kind);
        let error = result.error();
        self.emit(WorkflowEvent::finished(node, error.map(|e| e.kind)));
        if let Some(error) = error {
            self.emit(WorkflowEvent::Error {
                node,
                kind: error.kind,
                message: error.message.clone(),
            });
        }
    }
}

type Driver = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Lazy event stream over one run
pub struct WorkflowStream {
    driver: Option<Driver>,
    events: UnboundedReceiver<WorkflowEvent>,
    handle: Option<JoinHandle<()>>,
}

impl WorkflowStream {
    /// `start` receives the sender and returns the future driving the run
    pub(crate) fn new<F, Fut>(start: F) -> Self
    where
        F: FnOnce(Events) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (events, rx) = Events::channel();
        Self {
            driver: Some(Box::pin(start(events))),
            events: rx,
            handle: None,
        }
    }
}

impl Stream for WorkflowStream {
    type Item = WorkflowEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(driver) = self.driver.take() {
            self.handle = Some(tokio::spawn(driver));
        }
        self.events.poll_recv(cx)
    }
}

impl Drop for WorkflowStream {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
