//! Message types for summarized conversation history.

use crate::error::SummarizeError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Sender category of a summarized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    /// The bank's customer.
    Customer,
    /// The AI assistant.
    Ai,
    /// Anyone else, including human support agents.
    Human,
}

impl SenderType {
    /// Maps a raw sender category onto the output categories.
    ///
    /// `customer` and `ai` map to themselves; anything else, including a
    /// missing value, is `Human`.
    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("customer") => Self::Customer,
            Some("ai") => Self::Ai,
            _ => Self::Human,
        }
    }

    /// Returns the wire name of the category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Ai => "ai",
            Self::Human => "human",
        }
    }
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of the summarized history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    /// ISO-8601 timestamp, as it appeared in the raw record.
    pub timestamp: String,
    /// Sender category.
    pub sender_type: SenderType,
    /// Message content, trimmed or compressed.
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(
        timestamp: impl Into<String>,
        sender_type: SenderType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            sender_type,
            content: content.into(),
        }
    }
}

/// Summarized conversation history, oldest message first.
///
/// Serializes as a bare JSON array of messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummarizedMessages {
    messages: Vec<Message>,
}

impl SummarizedMessages {
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Parses a candidate from JSON, enforcing the message schema.
    ///
    /// Accepts either a bare array or an object wrapping the array under
    /// `summarized_conversation_history`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaInvalid` if the value is not an array of messages with
    /// exactly the `timestamp`, `sender_type` and `content` fields.
    pub fn from_value(value: JsonValue) -> Result<Self, SummarizeError> {
        let array = match value {
            JsonValue::Object(mut map) => map
                .remove("summarized_conversation_history")
                .ok_or_else(|| SummarizeError::SchemaInvalid {
                    reason: "missing summarized_conversation_history".to_string(),
                })?,
            other => other,
        };

        serde_json::from_value(array).map_err(|e| SummarizeError::SchemaInvalid {
            reason: e.to_string(),
        })
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Renders the history as the JSON text embedded in prompts.
    #[must_use]
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string(&self.messages).unwrap_or_else(|_| "[]".to_string())
    }
}

impl IntoIterator for SummarizedMessages {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sender_type_mapping() {
        assert_eq!(SenderType::from_raw(Some("customer")), SenderType::Customer);
        assert_eq!(SenderType::from_raw(Some("ai")), SenderType::Ai);
        assert_eq!(SenderType::from_raw(Some("agent")), SenderType::Human);
        assert_eq!(SenderType::from_raw(Some("Customer")), SenderType::Human);
        assert_eq!(SenderType::from_raw(None), SenderType::Human);
    }

    #[test]
    fn serializes_as_bare_array() {
        let summary = SummarizedMessages::new(vec![Message::new(
            "2024-01-01T10:00:00Z",
            SenderType::Customer,
            "Hi",
        )]);

        assert_eq!(
            serde_json::to_value(&summary).expect("serialize"),
            json!([{"timestamp": "2024-01-01T10:00:00Z", "sender_type": "customer", "content": "Hi"}])
        );
    }

    #[test]
    fn from_value_accepts_wrapped_history() {
        let summary = SummarizedMessages::from_value(json!({
            "summarized_conversation_history": [
                {"timestamp": "2024-01-01T10:00:00Z", "sender_type": "ai", "content": "Hello"}
            ]
        }))
        .expect("valid");

        assert_eq!(summary.len(), 1);
        assert_eq!(summary.messages()[0].sender_type, SenderType::Ai);
    }

    #[test]
    fn from_value_rejects_extra_fields() {
        let err = SummarizedMessages::from_value(json!([
            {"timestamp": "2024-01-01T10:00:00Z", "sender_type": "ai", "content": "Hi", "mood": "happy"}
        ]))
        .unwrap_err();

        assert!(matches!(err, SummarizeError::SchemaInvalid { .. }));
    }

    #[test]
    fn from_value_rejects_unknown_sender() {
        let err = SummarizedMessages::from_value(json!([
            {"timestamp": "2024-01-01T10:00:00Z", "sender_type": "bot", "content": "Hi"}
        ]))
        .unwrap_err();

        assert!(matches!(err, SummarizeError::SchemaInvalid { .. }));
    }
}
