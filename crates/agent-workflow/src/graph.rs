//! Workflow graph definition
//!
//! A run is a small directed graph: every requested analysis node fans in to
//! `synthesize`, and any analysis node may detour through `clarify` when its
//! payload carries a clarification question. Analysis nodes have no edges
//! between each other, so they all start at once.

use agent_core::{AgentKind, AgentResult, AnalysisRequest};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// A named node in the workflow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Analysis(AgentKind),
    Clarify,
    Synthesize,
}

impl NodeId {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Analysis(kind) => kind.as_str(),
            Self::Clarify => "clarify",
            Self::Synthesize => "synthesize",
        }
    }
}

/// Serialized as the node name, e.g. `"technical"`
impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// When an edge is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCondition {
    /// The node reached a terminal outcome
    Completed,
    /// The node's payload asked the caller a question
    NeedsClarification,
    /// The caller answered and the node runs again
    Answered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub condition: EdgeCondition,
}

/// The graph for one set of requested agents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowGraph {
    agents: BTreeSet<AgentKind>,
    edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn new(agents: &BTreeSet<AgentKind>) -> Self {
        let mut edges = Vec::with_capacity(agents.len() * 3);
        for &kind in agents {
            let node = NodeId::Analysis(kind);
            edges.push(Edge {
                from: node,
                to: NodeId::Synthesize,
                condition: EdgeCondition::Completed,
            });
            edges.push(Edge {
                from: node,
                to: NodeId::Clarify,
                condition: EdgeCondition::NeedsClarification,
            });
            edges.push(Edge {
                from: NodeId::Clarify,
                to: node,
                condition: EdgeCondition::Answered,
            });
        }
        Self {
            agents: agents.clone(),
            edges,
        }
    }

    pub fn for_request(request: &AnalysisRequest) -> Self {
        Self::new(&request.requested_agents)
    }

    /// Analysis nodes, all launched together
    pub fn analysis_nodes(&self) -> impl Iterator<Item = AgentKind> + '_ {
        self.agents.iter().copied()
    }

    /// Every node, analysis nodes first
    pub fn nodes(&self) -> Vec<NodeId> {
        self.agents
            .iter()
            .map(|&kind| NodeId::Analysis(kind))
            .chain([NodeId::Clarify, NodeId::Synthesize])
            .collect()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn successors(&self, node: NodeId) -> Vec<(NodeId, EdgeCondition)> {
        self.edges
            .iter()
            .filter(|e| e.from == node)
            .map(|e| (e.to, e.condition))
            .collect()
    }

    /// Where a finished analysis node goes next
    ///
    /// A question the caller already answered is not asked again, so a
    /// resumed node always proceeds to synthesis.
    pub fn route(&self, result: &AgentResult, request: &AnalysisRequest) -> NodeId {
        let asks = result
            .payload()
            .is_some_and(agent_core::AnalysisPayload::needs_clarification);
        if asks && !request.has_answer_for(result.kind) {
            NodeId::Clarify
        } else {
            NodeId::Synthesize
        }
    }

    /// Graphviz rendering, used by the CLI
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph workflow {\n    rankdir=LR;\n");
        for edge in &self.edges {
            let style = match edge.condition {
                EdgeCondition::Completed => "",
                EdgeCondition::NeedsClarification => " [style=dashed, label=\"needs input\"]",
                EdgeCondition::Answered => " [style=dotted, label=\"answered\"]",
            };
            out.push_str(&format!("    {} -> {}{};\n", edge.from, edge.to, style));
        }
        out.push('}');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{AnalysisDetails, AnalysisPayload, ClarificationAnswer, Confidence, NewsDetails};

    fn news_result(question: Option<&str>) -> AgentResult {
        let mut payload =
            AnalysisPayload::new("quiet", AnalysisDetails::News(NewsDetails::default()));
        if let Some(q) = question {
            payload = payload.with_clarification(q);
        }
        AgentResult::success(AgentKind::News, payload, Confidence::Medium, None, 5)
    }

    #[test]
    fn test_every_analysis_node_fans_in_to_synthesis() {
        let agents: BTreeSet<_> = [AgentKind::News, AgentKind::Fundamental].into();
        let graph = WorkflowGraph::new(&agents);

        assert_eq!(
            graph.nodes(),
            vec![
                NodeId::Analysis(AgentKind::Fundamental),
                NodeId::Analysis(AgentKind::News),
                NodeId::Clarify,
                NodeId::Synthesize
            ]
        );
        assert_eq!(graph.edges().len(), 6);
        assert_eq!(
            graph.successors(NodeId::Analysis(AgentKind::News)),
            vec![
                (NodeId::Synthesize, EdgeCondition::Completed),
                (NodeId::Clarify, EdgeCondition::NeedsClarification)
            ]
        );
        // No edges between analysis nodes
        assert!(
            graph
                .edges()
                .iter()
                .all(|e| !matches!((e.from, e.to), (NodeId::Analysis(_), NodeId::Analysis(_))))
        );
    }

    #[test]
    fn test_route_to_clarify_until_answered() {
        let request = AnalysisRequest::new("600519");
        let graph = WorkflowGraph::for_request(&request);

        assert_eq!(graph.route(&news_result(None), &request), NodeId::Synthesize);
        let asking = news_result(Some("Which exchange?"));
        assert_eq!(graph.route(&asking, &request), NodeId::Clarify);

        let answered = request.with_clarification(ClarificationAnswer {
            agent: AgentKind::News,
            answer: "Shanghai".to_string(),
        });
        assert_eq!(graph.route(&asking, &answered), NodeId::Synthesize);
    }

    #[test]
    fn test_dot_output() {
        let graph = WorkflowGraph::new(&[AgentKind::Technical].into());
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph workflow {"));
        assert!(dot.contains("    technical -> synthesize;\n"));
        assert!(dot.contains("technical -> clarify [style=dashed"));
    }
}
