//! Error types for the AI crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `LlmError`: Low-level LLM backend operations
//! - `PromptError`: Prompt template operations

use std::fmt;

/// Errors from LLM backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Provider is unavailable.
    ProviderUnavailable { provider: String, reason: String },
    /// Request failed.
    RequestFailed { reason: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
    /// The provider refused the request as malformed.
    Rejected { reason: String },
}

impl LlmError {
    /// Returns true if repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. }
                | Self::RequestFailed { .. }
                | Self::Timeout
                | Self::RateLimited { .. }
        )
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "LLM provider '{provider}' unavailable: {reason}")
            }
            Self::RequestFailed { reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
            Self::Rejected { reason } => {
                write!(f, "LLM request rejected: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Errors from prompt operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    /// Missing required variables.
    MissingVariables {
        template: String,
        variables: Vec<String>,
    },
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVariables {
                template,
                variables,
            } => {
                write!(
                    f,
                    "missing required variables [{}] in template '{template}'",
                    variables.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for PromptError {}
