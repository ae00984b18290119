//! Core domain types and utilities for teller.
//!
//! This crate provides the identifiers and error handling shared by the
//! summarizer, the tool gateway and the agent orchestrator.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{CustomerId, ParseIdError, ThreadId, TurnId};
