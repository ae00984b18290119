//! LLM backend abstraction.
//!
//! Provides a unified interface for chat models that can answer directly or
//! request tool calls.

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Available LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Groq cloud API.
    Groq,
    /// OpenAI API.
    OpenAi,
    /// Local Ollama instance.
    Ollama,
    /// Generic OpenAI-compatible API.
    OpenAiCompatible,
}

impl LlmProvider {
    /// Returns the default API base URL for the provider, if it has one.
    #[must_use]
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Groq => Some("https://api.groq.com/openai/v1"),
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Ollama => Some("http://localhost:11434/v1"),
            Self::OpenAiCompatible => None,
        }
    }

    /// Returns true if the provider rejects requests without an API key.
    #[must_use]
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Groq | Self::OpenAi)
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Groq => "groq",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::OpenAiCompatible => "openai_compatible",
        };
        f.write_str(name)
    }
}

/// Configuration for an LLM backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmBackendConfig {
    /// The provider type.
    pub provider: LlmProvider,
    /// Base URL for the API. Falls back to the provider default.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model identifier.
    pub model: String,
    /// API key (if required).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Sampling temperature applied to every request that does not set one.
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl LlmBackendConfig {
    /// Creates a new Groq backend configuration.
    #[must_use]
    pub fn groq(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Groq,
            base_url: None,
            model: model.into(),
            api_key: Some(api_key.into()),
            temperature: None,
        }
    }

    /// Creates a new Ollama backend configuration.
    #[must_use]
    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Ollama,
            base_url: Some(base_url.into()),
            model: model.into(),
            api_key: None,
            temperature: None,
        }
    }

    /// Returns the effective base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if neither the config nor the provider supplies one.
    pub fn resolved_base_url(&self) -> Result<String, LlmError> {
        self.base_url
            .clone()
            .or_else(|| self.provider.default_base_url().map(str::to_string))
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| LlmError::InvalidConfig {
                reason: format!("provider '{}' requires a base_url", self.provider),
            })
    }
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name of the tool.
    pub name: String,
    /// Description of what the tool does.
    pub description: String,
    /// JSON schema for the tool's input parameters.
    pub input_schema: JsonValue,
}

impl ToolDefinition {
    /// Creates a new tool definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: JsonValue) -> Self {
        self.input_schema = schema;
        self
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier the tool result must echo back.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// Arguments for the tool.
    pub arguments: JsonValue,
}

impl ToolCall {
    /// Creates a new tool call.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: JsonValue) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A request to an LLM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    /// System prompt, if any.
    pub system: Option<String>,
    /// Conversation messages, oldest first.
    pub messages: Vec<LlmMessage>,
    /// Tools the model may call.
    pub tools: Vec<ToolDefinition>,
    /// Optional JSON schema for structured output.
    pub output_schema: Option<JsonValue>,
    /// Temperature for sampling (0.0 - 1.0).
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// Creates a new request with a single user message.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![LlmMessage::user(prompt)],
            ..Self::default()
        }
    }

    /// Creates a request from a full message list.
    #[must_use]
    pub fn from_messages(messages: Vec<LlmMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Adds a system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Offers tools to the model.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Adds an output schema for structured output.
    #[must_use]
    pub fn with_output_schema(mut self, schema: JsonValue) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the max tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A message in a model conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
    /// Tool calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// The tool call a tool message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl LlmMessage {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, content)
    }

    /// Creates an assistant message that requested tool calls.
    #[must_use]
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(MessageRole::Assistant, content)
        }
    }

    /// Creates a tool result message.
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(MessageRole::Tool, content)
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User/human message.
    User,
    /// Assistant/AI message.
    Assistant,
    /// System message.
    System,
    /// Tool result message.
    Tool,
}

/// A response from an LLM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated content.
    pub content: String,
    /// Tool calls the model requested, in the order it emitted them.
    pub tool_calls: Vec<ToolCall>,
    /// Structured output (if output_schema was provided).
    pub structured_output: Option<JsonValue>,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Model that generated the response.
    pub model: String,
}

impl LlmResponse {
    /// Creates a plain text response.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Creates a response that requests tool calls.
    #[must_use]
    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    /// Returns true if the model requested at least one tool call.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens.
    pub input_tokens: u32,
    /// Number of output tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait for LLM backends.
///
/// This trait defines the interface that all LLM providers must implement.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generates a response for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM call fails.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Returns the provider type.
    fn provider(&self) -> LlmProvider;

    /// Returns the model name.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_request_builder() {
        let request = LlmRequest::new("What's my balance?")
            .with_system("You are a banking support data assistant.")
            .with_tools(vec![ToolDefinition::new("execute_sql", "Run a query")])
            .with_temperature(0.0)
            .with_max_tokens(512);

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, MessageRole::User);
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(512));
    }

    #[test]
    fn tool_messages_carry_call_ids() {
        let call = ToolCall::new("call_1", "list_tables", serde_json::json!({"schemas": ["public"]}));
        let assistant = LlmMessage::assistant_with_tool_calls("", vec![call]);
        assert_eq!(assistant.tool_calls.len(), 1);

        let tool = LlmMessage::tool("call_1", "{\"rows\":[]}");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn response_reports_tool_calls() {
        assert!(!LlmResponse::text("done").has_tool_calls());
        let response = LlmResponse::with_tool_calls(vec![ToolCall::new(
            "call_1",
            "execute_sql",
            serde_json::json!({"sql": "select 1"}),
        )]);
        assert!(response.has_tool_calls());
    }

    #[test]
    fn token_usage_total() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn base_url_falls_back_to_provider_default() {
        let config = LlmBackendConfig::groq("key", "moonshotai/kimi-k2-instruct-0905");
        assert_eq!(
            config.resolved_base_url().expect("groq has a default"),
            "https://api.groq.com/openai/v1"
        );

        let custom = LlmBackendConfig {
            provider: LlmProvider::OpenAiCompatible,
            base_url: None,
            model: "local".to_string(),
            api_key: None,
            temperature: None,
        };
        assert!(custom.resolved_base_url().is_err());
    }

    #[test]
    fn backend_config_serde() {
        let config = LlmBackendConfig::ollama("http://localhost:11434/v1/", "llama3");
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: LlmBackendConfig = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(config.provider, parsed.provider);
        assert_eq!(
            parsed.resolved_base_url().expect("explicit url"),
            "http://localhost:11434/v1"
        );
    }
}
