//! Agent graph implementation using petgraph.
//!
//! The banking agent is a small directed graph:
//!
//! ```text
//! ENTRY -> SUMMARIZE -> ANSWER -(tools)-> TOOLS
//!                         ^                 |
//!                         +-----------------+
//!                       ANSWER -(end)-> END
//! ```
//!
//! Unlike a workflow DAG it has one cycle, and ANSWER is the only node
//! whose outgoing edges are conditional.

use crate::error::GraphError;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The nodes of the agent graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Entry,
    Summarize,
    Answer,
    Tools,
    End,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [Self::Entry, Self::Summarize, Self::Answer, Self::Tools, Self::End];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Summarize => "SUMMARIZE",
            Self::Answer => "ANSWER",
            Self::Tools => "TOOLS",
            Self::End => "END",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an ANSWER turn sends control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// The model requested at least one tool call.
    Tools,
    /// The model produced a final answer.
    End,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tools => write!(f, "tools"),
            Self::End => write!(f, "end"),
        }
    }
}

/// Edge weight: when the edge is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Always,
    When(Route),
}

impl Transition {
    fn matches(self, route: Option<Route>) -> bool {
        match self {
            Self::Always => true,
            Self::When(expected) => route == Some(expected),
        }
    }
}

/// The agent's state-machine graph.
#[derive(Debug, Clone)]
pub struct AgentGraph {
    graph: DiGraph<NodeKind, Transition>,
    /// Map from node kind to petgraph's NodeIndex for O(1) lookup.
    node_index_map: HashMap<NodeKind, NodeIndex>,
}

impl Default for AgentGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    /// Builds the banking agent graph.
    #[must_use]
    pub fn banking() -> Self {
        let mut graph = Self::new();
        for kind in NodeKind::ALL {
            graph.add_node(kind);
        }
        let edges = [
            (NodeKind::Entry, NodeKind::Summarize, Transition::Always),
            (NodeKind::Summarize, NodeKind::Answer, Transition::Always),
            (NodeKind::Answer, NodeKind::Tools, Transition::When(Route::Tools)),
            (NodeKind::Answer, NodeKind::End, Transition::When(Route::End)),
            (NodeKind::Tools, NodeKind::Answer, Transition::Always),
        ];
        for (from, to, transition) in edges {
            let (from, to) = (graph.node_index_map[&from], graph.node_index_map[&to]);
            graph.graph.add_edge(from, to, transition);
        }
        graph
    }

    /// Adds a node. Adding the same kind twice is a no-op.
    pub fn add_node(&mut self, kind: NodeKind) {
        if !self.node_index_map.contains_key(&kind) {
            let index = self.graph.add_node(kind);
            self.node_index_map.insert(kind, index);
        }
    }

    /// Adds an edge between two nodes.
    ///
    /// # Errors
    ///
    /// Returns `UnknownNode` if either node is missing.
    pub fn add_edge(&mut self, from: NodeKind, to: NodeKind, transition: Transition) -> Result<(), GraphError> {
        let source = self.index(from).ok_or(GraphError::UnknownNode { node: from })?;
        let target = self.index(to).ok_or(GraphError::UnknownNode { node: to })?;
        self.graph.add_edge(source, target, transition);
        Ok(())
    }

    fn index(&self, kind: NodeKind) -> Option<NodeIndex> {
        self.node_index_map.get(&kind).copied()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the outgoing edges of `kind` with their targets.
    #[must_use]
    pub fn successors(&self, kind: NodeKind) -> Vec<(NodeKind, Transition)> {
        let Some(index) = self.index(kind) else {
            return Vec::new();
        };

        let mut successors: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| (self.graph[edge.target()], *edge.weight()))
            .collect();
        // petgraph yields the most recently added edge first
        successors.reverse();
        successors
    }

    /// Validates the graph's shape.
    ///
    /// Checks:
    /// - Every node kind is present
    /// - ENTRY and SUMMARIZE each have one unconditional edge, to SUMMARIZE
    ///   and ANSWER respectively
    /// - TOOLS has exactly one outgoing edge, unconditional, to ANSWER
    /// - ANSWER only has conditional edges, one per route
    /// - END has no outgoing edges
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violation.
    pub fn validate(&self) -> Result<(), GraphError> {
        for node in NodeKind::ALL {
            if self.index(node).is_none() {
                return Err(GraphError::MissingNode { node });
            }
        }

        self.expect_single_edge(NodeKind::Entry, NodeKind::Summarize)?;
        self.expect_single_edge(NodeKind::Summarize, NodeKind::Answer)?;
        self.expect_single_edge(NodeKind::Tools, NodeKind::Answer)?;

        let answer = self.successors(NodeKind::Answer);
        if answer.iter().any(|(_, t)| *t == Transition::Always) {
            return Err(GraphError::InvalidEdges {
                node: NodeKind::Answer,
                reason: "routing must be conditional".to_string(),
            });
        }
        for (route, target) in [(Route::Tools, NodeKind::Tools), (Route::End, NodeKind::End)] {
            let targets: Vec<NodeKind> = answer
                .iter()
                .filter(|(_, t)| *t == Transition::When(route))
                .map(|(to, _)| *to)
                .collect();
            match targets.as_slice() {
                [] => return Err(GraphError::UncoveredRoute { route }),
                [to] if *to == target => {}
                _ => {
                    return Err(GraphError::InvalidEdges {
                        node: NodeKind::Answer,
                        reason: format!("route {route} must lead only to {target}"),
                    });
                }
            }
        }

        if !self.successors(NodeKind::End).is_empty() {
            return Err(GraphError::InvalidEdges {
                node: NodeKind::End,
                reason: "END must be terminal".to_string(),
            });
        }

        Ok(())
    }

    fn expect_single_edge(&self, from: NodeKind, to: NodeKind) -> Result<(), GraphError> {
        match self.successors(from).as_slice() {
            [(target, Transition::Always)] if *target == to => Ok(()),
            _ => Err(GraphError::InvalidEdges {
                node: from,
                reason: format!("expected exactly one unconditional edge to {to}"),
            }),
        }
    }

    /// Resolves the successor of `from` given the route its node produced.
    ///
    /// # Errors
    ///
    /// Returns `NoTransition` if no outgoing edge matches.
    pub fn next(&self, from: NodeKind, route: Option<Route>) -> Result<NodeKind, GraphError> {
        self.successors(from)
            .into_iter()
            .find(|(_, transition)| transition.matches(route))
            .map(|(to, _)| to)
            .ok_or(GraphError::NoTransition { from, route })
    }
}
