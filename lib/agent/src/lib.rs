//! Banking-support agent for teller.
//!
//! This crate provides the orchestration graph and its persistence:
//!
//! - **Graph**: ENTRY → SUMMARIZE → ANSWER ⇄ TOOLS → END as a petgraph
//!   directed graph with conditional routing out of ANSWER
//! - **Decisions**: the tagged outcome of each model turn
//! - **State**: conversation state, the turn log and invocation I/O
//! - **Checkpoints**: the `StateStore` trait with in-memory and file backends
//! - **Orchestrator**: invocation, resumption and per-thread serialization

pub mod checkpoint;
pub mod config;
pub mod decision;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod state;

pub use checkpoint::{Checkpoint, FileStateStore, InMemoryStateStore, StateStore};
pub use config::AgentConfig;
pub use decision::TurnDecision;
pub use error::{AgentError, GraphError, StateStoreError};
pub use graph::{AgentGraph, NodeKind, Route, Transition};
pub use orchestrator::Orchestrator;
pub use state::{ConversationState, InvocationInput, InvocationOutput, TurnRecord};
