//! Count-preserving, fact-preserving summarization of conversation history.

use crate::compress::{ContentCompressor, ExtractiveCompressor};
use crate::error::SummarizeError;
use crate::facts::FactSet;
use crate::message::{Message, SummarizedMessages};
use crate::normalize::{NormalizedMessage, normalize_history, parse_timestamp};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Content at or under this many characters (after trimming) is kept verbatim.
pub const CONTENT_LIMIT: usize = 500;

/// Summarizes raw conversation history into [`SummarizedMessages`].
///
/// The output has exactly one message per input record, oldest first. Short
/// content is only trimmed; long content goes through the compressor and the
/// whole candidate is validated before it is returned.
#[derive(Clone)]
pub struct Summarizer {
    compressor: Arc<dyn ContentCompressor>,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new(Arc::new(ExtractiveCompressor))
    }
}

impl Summarizer {
    #[must_use]
    pub fn new(compressor: Arc<dyn ContentCompressor>) -> Self {
        Self { compressor }
    }

    /// Summarizes `raw` history records.
    ///
    /// # Errors
    ///
    /// Fails closed if any record cannot be normalized, if compression fails,
    /// or if the assembled candidate does not pass [`validate_candidate`].
    #[instrument(skip_all, fields(messages = raw.len()))]
    pub async fn summarize(
        &self,
        raw: &[JsonValue],
    ) -> teller_core::Result<SummarizedMessages, SummarizeError> {
        let expected = normalize_history(raw)?;

        let mut messages = Vec::with_capacity(expected.len());
        let mut compressed = 0usize;
        for normalized in &expected {
            let trimmed = normalized.message.content.trim();
            let content = if trimmed.chars().count() <= CONTENT_LIMIT {
                trimmed.to_string()
            } else {
                compressed += 1;
                self.compressor.compress(normalized).await?
            };
            messages.push(Message::new(
                normalized.message.timestamp.clone(),
                normalized.message.sender_type,
                content,
            ));
        }

        let candidate = SummarizedMessages::new(messages);
        validate_candidate(&expected, &candidate)?;

        debug!(compressed, "summarized conversation history");
        Ok(candidate)
    }
}

/// Validates an externally produced candidate against the raw history.
///
/// # Errors
///
/// Fails closed on schema violations and on anything
/// [`validate_candidate`] rejects.
pub fn accept_candidate(
    raw: &[JsonValue],
    candidate: JsonValue,
) -> Result<SummarizedMessages, SummarizeError> {
    let expected = normalize_history(raw)?;
    let candidate = SummarizedMessages::from_value(candidate)?;
    validate_candidate(&expected, &candidate)?;
    Ok(candidate)
}

/// Checks a whole candidate against the normalized, oldest-first input.
///
/// # Errors
///
/// Returns the first violation found. A candidate that fails any check is
/// rejected as a whole.
pub fn validate_candidate(
    expected: &[NormalizedMessage],
    candidate: &SummarizedMessages,
) -> Result<(), SummarizeError> {
    if expected.len() != candidate.len() {
        return Err(SummarizeError::CountMismatch {
            expected: expected.len(),
            actual: candidate.len(),
        });
    }

    let mut previous = None;
    for (index, (input, output)) in expected.iter().zip(candidate.messages()).enumerate() {
        if output.timestamp != input.message.timestamp {
            return Err(SummarizeError::FieldMismatch {
                index,
                field: "timestamp",
            });
        }
        if output.sender_type != input.message.sender_type {
            return Err(SummarizeError::FieldMismatch {
                index,
                field: "sender_type",
            });
        }

        let instant = parse_timestamp(&output.timestamp).ok_or_else(|| {
            SummarizeError::InvalidTimestamp {
                index,
                value: output.timestamp.clone(),
            }
        })?;
        if previous.is_some_and(|p| instant < p) {
            return Err(SummarizeError::OrderViolation { index });
        }
        previous = Some(instant);

        let original = input.message.content.trim();
        if original.chars().count() <= CONTENT_LIMIT {
            if output.content != original {
                return Err(SummarizeError::ContentAltered { index });
            }
            continue;
        }

        if output.content.trim().is_empty() {
            return Err(SummarizeError::EmptySummary { index });
        }

        let input_facts = FactSet::extract(original);
        let output_facts = FactSet::extract(&output.content);

        let missing = input_facts.missing_from(&output_facts, &output.content);
        if !missing.is_empty() {
            return Err(SummarizeError::FactsDropped { index, missing });
        }
        let invented = input_facts.untraceable(&output_facts);
        if !invented.is_empty() {
            return Err(SummarizeError::UntraceableContent {
                index,
                facts: invented,
            });
        }
    }

    Ok(())
}
