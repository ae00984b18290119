//! OpenAI-compatible chat completions backend.
//!
//! Groq, OpenAI and Ollama all accept the `/chat/completions` wire format
//! with function tools, so one client covers every configured provider.

use crate::backend::{
    LlmBackend, LlmBackendConfig, LlmMessage, LlmProvider, LlmRequest, LlmResponse, MessageRole,
    TokenUsage, ToolCall,
};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

/// Chat completions client for OpenAI-compatible servers.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    config: LlmBackendConfig,
    endpoint: String,
}

impl OpenAiCompatibleBackend {
    /// Creates a backend from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be resolved or the provider
    /// requires an API key that is missing.
    pub fn new(config: LlmBackendConfig) -> Result<Self, LlmError> {
        let base_url = config.resolved_base_url()?;
        if config.provider.requires_api_key() && config.api_key.is_none() {
            return Err(LlmError::InvalidConfig {
                reason: format!("provider '{}' requires an api_key", config.provider),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: format!("{base_url}/chat/completions"),
            config,
        })
    }

    fn build_body(&self, request: &LlmRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(WireMessage::from(&LlmMessage {
                role: MessageRole::System,
                content: system.clone(),
                tool_calls: Vec::new(),
                tool_call_id: None,
            }));
        }
        messages.extend(request.messages.iter().map(WireMessage::from));

        let tools = request
            .tools
            .iter()
            .map(|tool| WireTool {
                kind: "function",
                function: WireFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                },
            })
            .collect();

        ChatRequest {
            model: self.config.model.clone(),
            messages,
            tools,
            temperature: request.temperature.or(self.config.temperature),
            max_tokens: request.max_tokens,
            response_format: request
                .output_schema
                .as_ref()
                .map(|_| serde_json::json!({ "type": "json_object" })),
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    #[instrument(skip(self, request), fields(provider = %self.config.provider, model = %self.config.model))]
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.build_body(request);

        let mut http = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else if e.is_connect() {
                LlmError::ProviderUnavailable {
                    provider: self.config.provider.to_string(),
                    reason: e.to_string(),
                }
            } else {
                LlmError::RequestFailed {
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(
                status,
                retry_after_secs,
                self.config.provider,
                text,
            ));
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;

        let result = into_llm_response(parsed, request.output_schema.is_some())?;
        debug!(
            tool_calls = result.tool_calls.len(),
            tokens = result.usage.total(),
            "chat completion received"
        );
        Ok(result)
    }

    fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

fn classify_status(
    status: StatusCode,
    retry_after_secs: Option<u64>,
    provider: LlmProvider,
    body: String,
) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited { retry_after_secs }
    } else if status.is_server_error() {
        LlmError::ProviderUnavailable {
            provider: provider.to_string(),
            reason: format!("{status}: {body}"),
        }
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        LlmError::InvalidConfig {
            reason: format!("{status}: {body}"),
        }
    } else {
        LlmError::Rejected {
            reason: format!("{status}: {body}"),
        }
    }
}

fn into_llm_response(parsed: ChatResponse, structured: bool) -> Result<LlmResponse, LlmError> {
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ResponseParseFailed {
            reason: "response contained no choices".to_string(),
        })?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            let arguments = if call.function.arguments.trim().is_empty() {
                JsonValue::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(&call.function.arguments).map_err(|e| {
                    LlmError::ResponseParseFailed {
                        reason: format!(
                            "tool call '{}' arguments are not JSON: {e}",
                            call.function.name
                        ),
                    }
                })?
            };
            Ok(ToolCall::new(call.id, call.function.name, arguments))
        })
        .collect::<Result<Vec<_>, LlmError>>()?;

    let content = choice.message.content.unwrap_or_default();
    let structured_output = if structured {
        serde_json::from_str(&content).ok()
    } else {
        None
    };

    Ok(LlmResponse {
        content,
        tool_calls,
        structured_output,
        usage: parsed
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default(),
        model: parsed.model,
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: MessageRole,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&LlmMessage> for WireMessage {
    fn from(message: &LlmMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: "function".to_string(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: JsonValue,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "default_call_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn default_call_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
