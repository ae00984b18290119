//! Domain error types for the runner.

use std::fmt;

/// Errors that stop the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// Configuration is missing or invalid.
    Config { reason: String },
    /// The request on stdin is unusable.
    Input { reason: String },
    /// The language model backend could not be created.
    Backend,
    /// The database could not be reached.
    DataSource,
    /// The invocation failed.
    Invocation,
    /// The response could not be written.
    Output { reason: String },
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { reason } => write!(f, "invalid configuration: {reason}"),
            Self::Input { reason } => write!(f, "invalid request: {reason}"),
            Self::Backend => write!(f, "failed to create the model backend"),
            Self::DataSource => write!(f, "failed to connect to the database"),
            Self::Invocation => write!(f, "invocation failed"),
            Self::Output { reason } => write!(f, "failed to write the response: {reason}"),
        }
    }
}

impl std::error::Error for RunnerError {}
