//! Conversation state carried through the graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use teller_ai::ToolCall;
use teller_conversation::SummarizedMessages;
use teller_core::{CustomerId, TurnId};
use teller_gateway::{ResolvedIdentifiers, ToolOutcome};

/// Input of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationInput {
    pub customer_id: CustomerId,
    pub user_query: String,
    /// Raw message records, in any order.
    #[serde(default)]
    pub raw_conversation_history: Vec<JsonValue>,
}

impl InvocationInput {
    #[must_use]
    pub fn new(customer_id: impl Into<CustomerId>, user_query: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            user_query: user_query.into(),
            raw_conversation_history: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<JsonValue>) -> Self {
        self.raw_conversation_history = history;
        self
    }
}

/// Output of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationOutput {
    pub summarized_conversation_history: SummarizedMessages,
    pub final_answer_message: String,
    pub turn_log: Vec<TurnRecord>,
}

/// One entry of the append-only turn log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnRecord {
    /// A model response.
    Model {
        turn_id: TurnId,
        content: String,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
        recorded_at: DateTime<Utc>,
    },
    /// The result of one tool call.
    Tool {
        turn_id: TurnId,
        tool_call_id: String,
        tool_name: String,
        result: ToolOutcome,
        recorded_at: DateTime<Utc>,
    },
}

impl TurnRecord {
    #[must_use]
    pub fn model(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Model {
            turn_id: TurnId::new(),
            content: content.into(),
            tool_calls,
            recorded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn tool(call: &ToolCall, result: ToolOutcome) -> Self {
        Self::Tool {
            turn_id: TurnId::new(),
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result,
            recorded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model { .. })
    }
}

/// State of one conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub customer_id: CustomerId,
    pub user_query: String,
    pub raw_conversation_history: Vec<JsonValue>,
    #[serde(default)]
    pub summarized_conversation_history: SummarizedMessages,
    #[serde(default)]
    pub turn_log: Vec<TurnRecord>,
    /// Key values resolved by customer-scoped lookups in this invocation.
    #[serde(default)]
    pub resolved_identifiers: ResolvedIdentifiers,
    /// Index into `turn_log` where the current invocation starts.
    #[serde(default)]
    pub invocation_start: usize,
}

impl ConversationState {
    /// Starts the state of a new thread.
    #[must_use]
    pub fn new(input: InvocationInput) -> Self {
        Self {
            customer_id: input.customer_id,
            user_query: input.user_query,
            raw_conversation_history: input.raw_conversation_history,
            summarized_conversation_history: SummarizedMessages::default(),
            turn_log: Vec::new(),
            resolved_identifiers: ResolvedIdentifiers::new(),
            invocation_start: 0,
        }
    }

    /// Starts a new invocation on an existing thread.
    ///
    /// The turn log is kept; query, customer and raw history are replaced,
    /// and identifiers resolved by earlier invocations are forgotten.
    #[must_use]
    pub fn continue_with(self, input: InvocationInput) -> Self {
        let invocation_start = self.turn_log.len();
        Self {
            turn_log: self.turn_log,
            invocation_start,
            ..Self::new(input)
        }
    }

    /// Turns recorded by the current invocation.
    #[must_use]
    pub fn current_turns(&self) -> &[TurnRecord] {
        self.turn_log.get(self.invocation_start..).unwrap_or_default()
    }

    /// Tool calls of the latest model turn, if it requested any.
    #[must_use]
    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        match self.current_turns().iter().rev().find(|turn| turn.is_model()) {
            Some(TurnRecord::Model { tool_calls, .. }) => tool_calls.clone(),
            _ => Vec::new(),
        }
    }

    /// Number of model turns in this invocation that requested tools.
    #[must_use]
    pub fn tool_rounds(&self) -> u32 {
        let rounds = self
            .current_turns()
            .iter()
            .filter(|turn| matches!(turn, TurnRecord::Model { tool_calls, .. } if !tool_calls.is_empty()))
            .count();
        u32::try_from(rounds).unwrap_or(u32::MAX)
    }

    /// Content of the latest model turn of this invocation.
    #[must_use]
    pub fn final_answer(&self) -> Option<&str> {
        self.current_turns().iter().rev().find_map(|turn| match turn {
            TurnRecord::Model { content, tool_calls, .. } if tool_calls.is_empty() => Some(content.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn to_output(&self) -> InvocationOutput {
        InvocationOutput {
            summarized_conversation_history: self.summarized_conversation_history.clone(),
            final_answer_message: self.final_answer().unwrap_or_default().to_string(),
            turn_log: self.turn_log.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "list_tables", json!({"schemas": ["public"]}))
    }

    fn state_with_turns() -> ConversationState {
        let mut state = ConversationState::new(InvocationInput::new("c-1", "What did I spend?"));
        state.turn_log.push(TurnRecord::model("", vec![call("call-1")]));
        state.turn_log.push(TurnRecord::tool(&call("call-1"), ToolOutcome::Rows { rows: vec![] }));
        state.turn_log.push(TurnRecord::model("You spent USD 42.", vec![]));
        state
    }

    #[test]
    fn final_answer_is_latest_model_turn_without_tools() {
        let state = state_with_turns();
        assert_eq!(state.final_answer(), Some("You spent USD 42."));
        assert_eq!(state.tool_rounds(), 1);
        assert!(state.pending_tool_calls().is_empty());
    }

    #[test]
    fn pending_tool_calls_come_from_latest_model_turn() {
        let mut state = ConversationState::new(InvocationInput::new("c-1", "Balance?"));
        state.turn_log.push(TurnRecord::model("", vec![call("call-1"), call("call-2")]));

        let pending: Vec<String> = state.pending_tool_calls().into_iter().map(|c| c.id).collect();
        assert_eq!(pending, vec!["call-1".to_string(), "call-2".to_string()]);
        assert_eq!(state.final_answer(), None);
    }

    #[test]
    fn continuing_keeps_the_log_but_scopes_the_invocation() {
        let mut state = state_with_turns();
        state.resolved_identifiers.record("accounts", ["a-1".to_string()]);

        let state = state.continue_with(InvocationInput::new("c-1", "And yesterday?"));
        assert_eq!(state.turn_log.len(), 3);
        assert_eq!(state.invocation_start, 3);
        assert!(state.current_turns().is_empty());
        assert!(state.resolved_identifiers.is_empty());
        assert_eq!(state.user_query, "And yesterday?");
        assert_eq!(state.final_answer(), None);
        assert_eq!(state.tool_rounds(), 0);
    }

    #[test]
    fn turn_records_serialize_tagged() {
        let turn = TurnRecord::tool(&call("call-9"), ToolOutcome::error("boom"));
        let value = serde_json::to_value(&turn).expect("serialize");

        assert_eq!(value["kind"], "tool");
        assert_eq!(value["tool_call_id"], "call-9");
        assert_eq!(value["result"], json!({"error": "boom"}));

        let back: TurnRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, turn);
    }

    #[test]
    fn invocation_input_history_defaults_to_empty() {
        let input: InvocationInput =
            serde_json::from_value(json!({"customer_id": "c-1", "user_query": "Hi"})).expect("deserialize");
        assert!(input.raw_conversation_history.is_empty());
    }
}
