//! The runner's stdin and stdout documents.

use crate::error::RunnerError;
use serde::{Deserialize, Serialize};
use teller_agent::{InvocationInput, InvocationOutput};
use teller_conversation::MessageRecord;
use teller_core::ThreadId;

/// One invocation read from stdin.
#[derive(Debug, Deserialize)]
pub struct RunnerRequest {
    /// Existing thread to continue; a new thread when absent.
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Stored transcript messages, used in place of a raw history.
    #[serde(default)]
    pub transcript: Vec<MessageRecord>,
    #[serde(flatten)]
    pub input: InvocationInput,
}

impl RunnerRequest {
    /// Parses a request document.
    ///
    /// # Errors
    ///
    /// Returns `Input` if the document is not a valid request.
    pub fn parse(document: &str) -> Result<Self, RunnerError> {
        serde_json::from_str(document).map_err(|e| RunnerError::Input {
            reason: e.to_string(),
        })
    }

    /// Returns the requested thread, or a new one.
    ///
    /// # Errors
    ///
    /// Returns `Input` if the thread id does not parse.
    pub fn thread_id(&self) -> Result<ThreadId, RunnerError> {
        match &self.thread_id {
            Some(id) => id.parse().map_err(|e| RunnerError::Input {
                reason: format!("{e}"),
            }),
            None => Ok(ThreadId::new()),
        }
    }

    /// Returns the invocation input, with the history taken from
    /// `transcript` when one was sent. Internal staff notes are left out.
    ///
    /// # Errors
    ///
    /// Returns `Input` if both histories are present or a transcript
    /// message breaks the send rules.
    pub fn into_input(self) -> Result<InvocationInput, RunnerError> {
        if self.transcript.is_empty() {
            return Ok(self.input);
        }
        if !self.input.raw_conversation_history.is_empty() {
            return Err(RunnerError::Input {
                reason: "send either raw_conversation_history or transcript, not both".to_string(),
            });
        }

        let mut history = Vec::with_capacity(self.transcript.len());
        for (index, record) in self.transcript.iter().enumerate() {
            record.validate().map_err(|e| RunnerError::Input {
                reason: format!("transcript[{index}]: {e}"),
            })?;
            if !record.is_internal {
                history.push(record.to_raw());
            }
        }
        Ok(self.input.with_history(history))
    }
}

/// The document written to stdout.
#[derive(Debug, Serialize)]
pub struct RunnerResponse {
    pub thread_id: String,
    #[serde(flatten)]
    pub output: InvocationOutput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_new_thread_request() {
        let request = RunnerRequest::parse(
            r#"{
                "customer_id": "c-1",
                "user_query": "What's my balance?",
                "raw_conversation_history": [
                    {"created_at": "2024-01-01T10:00:00Z", "sender_type": "customer", "content": "Hi"}
                ]
            }"#,
        )
        .expect("parse");

        assert_eq!(request.input.customer_id.as_str(), "c-1");
        assert_eq!(request.input.raw_conversation_history.len(), 1);
        assert!(request.thread_id.is_none());
        assert!(request.thread_id().is_ok());
    }

    #[test]
    fn thread_ids_round_trip_through_the_response() {
        let thread_id = ThreadId::new();
        let document = format!(
            r#"{{"thread_id": "{thread_id}", "customer_id": "c-1", "user_query": "And yesterday?"}}"#
        );
        let request = RunnerRequest::parse(&document).expect("parse");
        assert_eq!(request.thread_id().expect("thread id"), thread_id);
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(matches!(
            RunnerRequest::parse(r#"{"user_query": "Hi"}"#),
            Err(RunnerError::Input { .. })
        ));

        let request = RunnerRequest::parse(r#"{"thread_id": "nope", "customer_id": "c-1", "user_query": "Hi"}"#)
            .expect("parse");
        assert!(matches!(request.thread_id(), Err(RunnerError::Input { .. })));
    }

    #[test]
    fn transcript_becomes_the_history() {
        let request = RunnerRequest::parse(
            r#"{
                "customer_id": "c-1",
                "user_query": "Is my card blocked?",
                "transcript": [
                    {"conversation_id": "conv-1", "sender_type": "customer", "sender_customer_id": "c-1",
                     "content": "My card was declined", "created_at": "2024-01-01T10:00:00Z"},
                    {"conversation_id": "conv-1", "sender_type": "agent", "sender_agent_id": "ag-7",
                     "content": "Checked fraud flags", "is_internal": true, "created_at": "2024-01-01T10:01:00Z"},
                    {"conversation_id": "conv-1", "sender_type": "agent", "sender_agent_id": "ag-7",
                     "content": "Looking into it", "created_at": "2024-01-01T10:02:00Z"}
                ]
            }"#,
        )
        .expect("parse");

        let input = request.into_input().expect("input");
        assert_eq!(input.raw_conversation_history.len(), 2);
        assert_eq!(input.raw_conversation_history[0]["content"], "My card was declined");
        assert_eq!(input.raw_conversation_history[1]["sender_type"], "agent");
    }

    #[test]
    fn transcript_messages_follow_the_send_rules() {
        let request = RunnerRequest::parse(
            r#"{
                "customer_id": "c-1",
                "user_query": "Hi",
                "transcript": [
                    {"conversation_id": "conv-1", "sender_type": "customer", "content": "No sender"}
                ]
            }"#,
        )
        .expect("parse");
        assert!(matches!(request.into_input(), Err(RunnerError::Input { reason }) if reason.starts_with("transcript[0]")));

        let request = RunnerRequest::parse(
            r#"{
                "customer_id": "c-1",
                "user_query": "Hi",
                "raw_conversation_history": [{"created_at": "2024-01-01T10:00:00Z", "content": "Hi"}],
                "transcript": [
                    {"conversation_id": "conv-1", "sender_type": "customer", "sender_customer_id": "c-1", "content": "Hi"}
                ]
            }"#,
        )
        .expect("parse");
        assert!(matches!(request.into_input(), Err(RunnerError::Input { .. })));
    }

    #[test]
    fn response_flattens_the_output() {
        let response = RunnerResponse {
            thread_id: "thr_01".to_string(),
            output: InvocationOutput {
                summarized_conversation_history: Default::default(),
                final_answer_message: "Your balance is USD 120.50.".to_string(),
                turn_log: Vec::new(),
            },
        };
        let value = serde_json::to_value(&response).expect("serialize");

        assert_eq!(value["thread_id"], "thr_01");
        assert_eq!(value["final_answer_message"], "Your balance is USD 120.50.");
        assert_eq!(value["summarized_conversation_history"], serde_json::json!([]));
    }
}
