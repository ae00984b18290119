//! Persisted transcript records.
//!
//! These are the shapes a support transcript is stored in. The agent only
//! consumes them: message records become raw history input.

use crate::error::TranscriptError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use teller_core::CustomerId;

/// Who wrote a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSender {
    Customer,
    Agent,
}

/// A support conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub customer_id: CustomerId,
    #[serde(default)]
    pub subject: Option<String>,
    pub channel: String,
    pub priority: String,
    pub status: String,
}

/// Request to open a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConversation {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_priority")]
    pub priority: String,
}

fn default_channel() -> String {
    "app".to_string()
}

fn default_priority() -> String {
    "medium".to_string()
}

impl NewConversation {
    #[must_use]
    pub fn new(customer_id: impl Into<CustomerId>) -> Self {
        Self {
            customer_id: customer_id.into(),
            subject: None,
            channel: default_channel(),
            priority: default_priority(),
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Builds the stored record; new conversations start `open`.
    #[must_use]
    pub fn into_record(self, id: impl Into<String>) -> ConversationRecord {
        ConversationRecord {
            id: id.into(),
            customer_id: self.customer_id,
            subject: self.subject,
            channel: self.channel,
            priority: self.priority,
            status: "open".to_string(),
        }
    }
}

/// A message in a support conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub conversation_id: String,
    pub sender_type: TranscriptSender,
    #[serde(default)]
    pub sender_customer_id: Option<String>,
    #[serde(default)]
    pub sender_agent_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub is_internal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl MessageRecord {
    /// Checks the send rules for this record.
    ///
    /// # Errors
    ///
    /// A customer message needs `sender_customer_id` only and cannot be
    /// internal; an agent message needs `sender_agent_id` only; content must
    /// not be empty.
    pub fn validate(&self) -> Result<(), TranscriptError> {
        match self.sender_type {
            TranscriptSender::Customer => {
                if is_blank(self.sender_customer_id.as_deref()) {
                    return Err(TranscriptError::MissingSender {
                        sender_type: "customer",
                    });
                }
                if self.sender_agent_id.is_some() {
                    return Err(TranscriptError::UnexpectedSender {
                        field: "sender_agent_id",
                    });
                }
                if self.is_internal {
                    return Err(TranscriptError::InternalCustomerMessage);
                }
            }
            TranscriptSender::Agent => {
                if is_blank(self.sender_agent_id.as_deref()) {
                    return Err(TranscriptError::MissingSender {
                        sender_type: "agent",
                    });
                }
                if self.sender_customer_id.is_some() {
                    return Err(TranscriptError::UnexpectedSender {
                        field: "sender_customer_id",
                    });
                }
            }
        }

        if self.content.is_empty() {
            return Err(TranscriptError::EmptyContent);
        }
        Ok(())
    }

    /// Converts the record into a raw history record.
    #[must_use]
    pub fn to_raw(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SenderType;
    use crate::normalize::normalize;

    fn customer_message() -> MessageRecord {
        MessageRecord {
            conversation_id: "conv-1".to_string(),
            sender_type: TranscriptSender::Customer,
            sender_customer_id: Some("cust-1".to_string()),
            sender_agent_id: None,
            content: "My card was declined".to_string(),
            is_internal: false,
            created_at: Some("2024-01-01T10:00:00Z".to_string()),
        }
    }

    #[test]
    fn new_conversation_defaults() {
        let record = NewConversation::new("cust-1")
            .with_subject("Card declined")
            .into_record("conv-1");

        assert_eq!(record.channel, "app");
        assert_eq!(record.priority, "medium");
        assert_eq!(record.status, "open");
        assert_eq!(record.customer_id.as_str(), "cust-1");
    }

    #[test]
    fn new_conversation_deserializes_with_defaults() {
        let request: NewConversation =
            serde_json::from_value(serde_json::json!({"customer_id": "cust-1"})).expect("valid");
        assert_eq!(request.channel, "app");
        assert_eq!(request.priority, "medium");
    }

    #[test]
    fn customer_message_rules() {
        assert_eq!(customer_message().validate(), Ok(()));

        let mut msg = customer_message();
        msg.sender_customer_id = None;
        assert_eq!(
            msg.validate(),
            Err(TranscriptError::MissingSender {
                sender_type: "customer"
            })
        );

        let mut msg = customer_message();
        msg.sender_agent_id = Some("agent-1".to_string());
        assert_eq!(
            msg.validate(),
            Err(TranscriptError::UnexpectedSender {
                field: "sender_agent_id"
            })
        );

        let mut msg = customer_message();
        msg.is_internal = true;
        assert_eq!(msg.validate(), Err(TranscriptError::InternalCustomerMessage));
    }

    #[test]
    fn agent_message_rules() {
        let mut msg = customer_message();
        msg.sender_type = TranscriptSender::Agent;
        assert_eq!(
            msg.validate(),
            Err(TranscriptError::MissingSender {
                sender_type: "agent"
            })
        );

        msg.sender_agent_id = Some("agent-1".to_string());
        assert_eq!(
            msg.validate(),
            Err(TranscriptError::UnexpectedSender {
                field: "sender_customer_id"
            })
        );

        msg.sender_customer_id = None;
        msg.is_internal = true;
        assert_eq!(msg.validate(), Ok(()));

        msg.content.clear();
        assert_eq!(msg.validate(), Err(TranscriptError::EmptyContent));
    }

    #[test]
    fn agent_messages_normalize_to_human() {
        let mut msg = customer_message();
        msg.sender_type = TranscriptSender::Agent;

        let normalized = normalize(0, &msg.to_raw()).expect("valid record");
        assert_eq!(normalized.message.sender_type, SenderType::Human);
        assert_eq!(normalized.message.content, "My card was declined");
    }
}
