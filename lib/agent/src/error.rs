//! Error types for the agent crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `GraphError`: Structural problems with the agent graph
//! - `StateStoreError`: Checkpoint reads and writes
//! - `AgentError`: Invocation-level failures (wraps lower errors via context)
//!
//! Tool failures never appear here. The gateway turns them into tool
//! results the model reads on its next turn.

use crate::graph::{NodeKind, Route};
use std::fmt;
use teller_core::ThreadId;

/// Errors from graph construction and traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A node kind the graph needs is missing.
    MissingNode { node: NodeKind },
    /// An edge was added for a node that is not in the graph.
    UnknownNode { node: NodeKind },
    /// A node has outgoing edges it must not have.
    InvalidEdges { node: NodeKind, reason: String },
    /// ANSWER has no edge for one of the routes.
    UncoveredRoute { route: Route },
    /// No outgoing edge matches the route taken.
    NoTransition { from: NodeKind, route: Option<Route> },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingNode { node } => write!(f, "graph has no {node} node"),
            Self::UnknownNode { node } => write!(f, "node {node} is not in the graph"),
            Self::InvalidEdges { node, reason } => {
                write!(f, "invalid edges from {node}: {reason}")
            }
            Self::UncoveredRoute { route } => {
                write!(f, "ANSWER has no edge for route {route}")
            }
            Self::NoTransition { from, route } => match route {
                Some(route) => write!(f, "no transition from {from} for route {route}"),
                None => write!(f, "no unconditional transition from {from}"),
            },
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from checkpoint storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateStoreError {
    /// Reading a checkpoint failed.
    ReadFailed { thread_id: ThreadId, reason: String },
    /// Writing a checkpoint failed.
    WriteFailed { thread_id: ThreadId, reason: String },
    /// A stored checkpoint could not be decoded.
    Corrupt { thread_id: ThreadId, reason: String },
}

impl fmt::Display for StateStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { thread_id, reason } => {
                write!(f, "failed to read checkpoint for {thread_id}: {reason}")
            }
            Self::WriteFailed { thread_id, reason } => {
                write!(f, "failed to write checkpoint for {thread_id}: {reason}")
            }
            Self::Corrupt { thread_id, reason } => {
                write!(f, "checkpoint for {thread_id} is corrupt: {reason}")
            }
        }
    }
}

impl std::error::Error for StateStoreError {}

/// Invocation-level errors returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The invocation input is unusable.
    InvalidInput { reason: String },
    /// The conversation history could not be summarized.
    Summarization,
    /// The answer prompt could not be rendered.
    Prompt,
    /// The language model failed after retries.
    Model,
    /// Reading or writing a checkpoint failed.
    Checkpoint,
    /// The graph could not route.
    Graph,
    /// The model kept requesting tools past the round-trip limit.
    RoundTripLimitExceeded { limit: u32 },
    /// There is no checkpoint to resume.
    NothingToResume { thread_id: ThreadId },
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { reason } => write!(f, "invalid invocation input: {reason}"),
            Self::Summarization => write!(f, "conversation summarization failed"),
            Self::Prompt => write!(f, "failed to render the answer prompt"),
            Self::Model => write!(f, "model call failed"),
            Self::Checkpoint => write!(f, "checkpoint storage failed"),
            Self::Graph => write!(f, "graph routing failed"),
            Self::RoundTripLimitExceeded { limit } => {
                write!(f, "model requested tools more than {limit} times")
            }
            Self::NothingToResume { thread_id } => {
                write!(f, "no checkpoint to resume for {thread_id}")
            }
        }
    }
}

impl std::error::Error for AgentError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_display() {
        let err = GraphError::NoTransition {
            from: NodeKind::Answer,
            route: Some(Route::Tools),
        };
        assert_eq!(err.to_string(), "no transition from ANSWER for route tools");

        let err = GraphError::NoTransition {
            from: NodeKind::Tools,
            route: None,
        };
        assert_eq!(err.to_string(), "no unconditional transition from TOOLS");
    }

    #[test]
    fn agent_error_display() {
        let err = AgentError::RoundTripLimitExceeded { limit: 12 };
        assert_eq!(err.to_string(), "model requested tools more than 12 times");
    }
}
