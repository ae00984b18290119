//! Compressors for messages longer than the content limit.

use crate::error::SummarizeError;
use crate::facts::{FactSet, collapse_whitespace, punctuated_fact_spans};
use crate::message::SenderType;
use crate::normalize::NormalizedMessage;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use teller_ai::prompt::message_compression_template;
use teller_ai::{LlmBackend, LlmRequest, PromptTemplate, RetryPolicy};
use tracing::{debug, instrument};

/// Produces a shorter version of one message's content.
///
/// The summarizer validates every result, so a compressor may be lossy as
/// long as it keeps the facts of the message.
#[async_trait]
pub trait ContentCompressor: Send + Sync {
    /// Compresses the content of `message`.
    async fn compress(&self, message: &NormalizedMessage) -> Result<String, SummarizeError>;
}

/// Deterministic compressor that keeps fact-bearing sentences.
///
/// Greeting and filler sentences (those without any extracted fact) are
/// dropped; kept sentences stay in their original order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveCompressor;

#[async_trait]
impl ContentCompressor for ExtractiveCompressor {
    async fn compress(&self, message: &NormalizedMessage) -> Result<String, SummarizeError> {
        Ok(extract_sentences(message.message.content.trim()))
    }
}

fn extract_sentences(content: &str) -> String {
    let sentences = split_sentences(content);
    let kept: Vec<String> = sentences
        .iter()
        .filter(|sentence| !FactSet::extract(sentence).is_empty())
        .map(|sentence| collapse_whitespace(sentence))
        .collect();

    if kept.is_empty() {
        return sentences
            .iter()
            .max_by_key(|sentence| sentence.chars().count())
            .map(|sentence| collapse_whitespace(sentence))
            .unwrap_or_default();
    }
    kept.join(" ")
}

/// Splits text after `.`, `!` or `?` when followed by whitespace.
///
/// Never splits inside an amount or a date such as `Mar. 7, 2024`.
fn split_sentences(text: &str) -> Vec<&str> {
    let facts = punctuated_fact_spans(text);
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && let Some(&(next, n)) = chars.peek()
            && n.is_whitespace()
            && !facts.iter().any(|span| span.start < next && next < span.end)
        {
            let sentence = text[start..next].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = next;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompressedContent {
    content: String,
}

/// Compressor backed by a language model.
///
/// Sends the message-compression prompt and expects a `{"content": string}`
/// structured reply.
pub struct LlmCompressor {
    backend: Arc<dyn LlmBackend>,
    template: PromptTemplate,
    retry: RetryPolicy,
}

impl LlmCompressor {
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            template: message_compression_template(),
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the retry policy for model calls.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request(&self, sender_type: SenderType, content: &str) -> Result<LlmRequest, SummarizeError> {
        let mut variables = HashMap::new();
        variables.insert(
            "sender_type".to_string(),
            JsonValue::String(JsonValue::String(sender_type.to_string()).to_string()),
        );
        variables.insert(
            "content".to_string(),
            JsonValue::String(JsonValue::String(content.to_string()).to_string()),
        );

        let prompt = self
            .template
            .render_checked(&variables)
            .map_err(|e| SummarizeError::SchemaInvalid {
                reason: e.to_string(),
            })?;
        let mut request = LlmRequest::new(prompt)
            .with_output_schema(compressed_content_schema())
            .with_temperature(0.0);
        if let Some(system) = self.template.render_system_prompt(&variables) {
            request = request.with_system(system);
        }
        Ok(request)
    }
}

fn compressed_content_schema() -> JsonValue {
    serde_json::json!({
        "type": "object",
        "properties": {"content": {"type": "string"}},
        "required": ["content"],
        "additionalProperties": false
    })
}

#[async_trait]
impl ContentCompressor for LlmCompressor {
    #[instrument(skip(self, message), fields(index = message.index, model = self.backend.model()))]
    async fn compress(&self, message: &NormalizedMessage) -> Result<String, SummarizeError> {
        let request = self.request(message.message.sender_type, message.message.content.trim())?;

        let response = self
            .retry
            .execute(|| self.backend.generate(&request))
            .await
            .map_err(|e| SummarizeError::CompressionFailed {
                index: message.index,
                reason: e.to_string(),
            })?;

        let structured = match response.structured_output {
            Some(value) => value,
            None => serde_json::from_str(&response.content).map_err(|e| {
                SummarizeError::SchemaInvalid {
                    reason: format!("compression reply is not JSON: {e}"),
                }
            })?,
        };
        let parsed: CompressedContent =
            serde_json::from_value(structured).map_err(|e| SummarizeError::SchemaInvalid {
                reason: e.to_string(),
            })?;

        debug!(
            original_chars = message.message.content.chars().count(),
            compressed_chars = parsed.content.chars().count(),
            "compressed message"
        );
        Ok(parsed.content.trim().to_string())
    }
}
