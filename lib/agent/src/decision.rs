//! The routing decision of one ANSWER turn.

use crate::graph::Route;
use teller_ai::{LlmResponse, ToolCall};

/// What a model turn asks the graph to do next.
///
/// Derived once per model response. Routing depends on nothing else.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnDecision {
    /// Run these tool calls, then answer again.
    NeedsTools(Vec<ToolCall>),
    /// The final answer.
    Done(String),
}

impl TurnDecision {
    #[must_use]
    pub fn from_response(response: &LlmResponse) -> Self {
        if response.has_tool_calls() {
            Self::NeedsTools(response.tool_calls.clone())
        } else {
            Self::Done(response.content.clone())
        }
    }

    #[must_use]
    pub fn route(&self) -> Route {
        match self {
            Self::NeedsTools(_) => Route::Tools,
            Self::Done(_) => Route::End,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_calls_route_to_tools() {
        let response = LlmResponse::with_tool_calls(vec![ToolCall::new(
            "call-1",
            "list_tables",
            json!({"schemas": ["public"]}),
        )]);
        let decision = TurnDecision::from_response(&response);

        assert_eq!(decision.route(), Route::Tools);
        assert!(matches!(decision, TurnDecision::NeedsTools(calls) if calls.len() == 1));
    }

    #[test]
    fn text_routes_to_end() {
        let decision = TurnDecision::from_response(&LlmResponse::text("Your balance is USD 120.50."));
        assert_eq!(decision, TurnDecision::Done("Your balance is USD 120.50.".to_string()));
        assert_eq!(decision.route(), Route::End);
    }

    #[test]
    fn content_alongside_tool_calls_still_routes_to_tools() {
        let mut response = LlmResponse::text("Let me check.");
        response.tool_calls.push(ToolCall::new("call-1", "execute_sql", json!({"sql": "SELECT 1"})));

        assert_eq!(TurnDecision::from_response(&response).route(), Route::Tools);
    }
}
