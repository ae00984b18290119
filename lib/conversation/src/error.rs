//! Error types for the conversation crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `SummarizeError`: Normalization, compression and candidate validation
//! - `TranscriptError`: Violations of the transcript send rules

use std::fmt;

/// Errors from summarizing a conversation history.
///
/// Every variant is fatal to the candidate output; the summarizer never
/// accepts part of a rejected candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummarizeError {
    /// A raw record is not a JSON object.
    NotAnObject { index: usize },
    /// A raw record has neither `created_at` nor `timestamp`.
    MissingTimestamp { index: usize },
    /// A raw record's timestamp does not parse as ISO-8601.
    InvalidTimestamp { index: usize, value: String },
    /// A raw record's content is present but not a string.
    InvalidContent { index: usize },
    /// The candidate has a different number of messages than the input.
    CountMismatch { expected: usize, actual: usize },
    /// The candidate does not match the message schema.
    SchemaInvalid { reason: String },
    /// A per-position field differs from the input.
    FieldMismatch { index: usize, field: &'static str },
    /// Candidate timestamps are not in ascending order.
    OrderViolation { index: usize },
    /// Short content was changed beyond trimming.
    ContentAltered { index: usize },
    /// A long message's summary is empty.
    EmptySummary { index: usize },
    /// A long message's summary lost facts present in the input.
    FactsDropped { index: usize, missing: Vec<String> },
    /// A long message's summary contains facts absent from the input.
    UntraceableContent { index: usize, facts: Vec<String> },
    /// The compressor failed to produce a summary.
    CompressionFailed { index: usize, reason: String },
}

impl fmt::Display for SummarizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject { index } => write!(f, "record {index} is not an object"),
            Self::MissingTimestamp { index } => {
                write!(f, "record {index} has no created_at or timestamp")
            }
            Self::InvalidTimestamp { index, value } => {
                write!(f, "record {index} has unparseable timestamp '{value}'")
            }
            Self::InvalidContent { index } => {
                write!(f, "record {index} has non-string content")
            }
            Self::CountMismatch { expected, actual } => {
                write!(f, "expected {expected} summarized messages, got {actual}")
            }
            Self::SchemaInvalid { reason } => {
                write!(f, "summarized messages do not match schema: {reason}")
            }
            Self::FieldMismatch { index, field } => {
                write!(f, "message {index} changed field '{field}'")
            }
            Self::OrderViolation { index } => {
                write!(f, "message {index} is older than its predecessor")
            }
            Self::ContentAltered { index } => {
                write!(f, "message {index} is short and must not be rewritten")
            }
            Self::EmptySummary { index } => write!(f, "message {index} summary is empty"),
            Self::FactsDropped { index, missing } => {
                write!(
                    f,
                    "message {index} summary dropped facts [{}]",
                    missing.join(", ")
                )
            }
            Self::UntraceableContent { index, facts } => {
                write!(
                    f,
                    "message {index} summary introduced facts [{}]",
                    facts.join(", ")
                )
            }
            Self::CompressionFailed { index, reason } => {
                write!(f, "failed to compress message {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for SummarizeError {}

/// Errors from validating transcript records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    /// The sender identifier required for this sender type is missing.
    MissingSender { sender_type: &'static str },
    /// A sender identifier for the other sender type was supplied.
    UnexpectedSender { field: &'static str },
    /// Customer messages cannot be internal notes.
    InternalCustomerMessage,
    /// Message content is empty.
    EmptyContent,
}

impl fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSender { sender_type } => {
                write!(f, "{sender_type} message is missing its sender id")
            }
            Self::UnexpectedSender { field } => write!(f, "unexpected sender field '{field}'"),
            Self::InternalCustomerMessage => {
                write!(f, "customer messages cannot be internal")
            }
            Self::EmptyContent => write!(f, "message content is empty"),
        }
    }
}

impl std::error::Error for TranscriptError {}
