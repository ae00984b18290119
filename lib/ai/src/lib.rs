//! AI primitives for teller.
//!
//! This crate provides:
//!
//! - **Backend**: the `LlmBackend` trait, requests with tool definitions and
//!   responses carrying tool-call requests
//! - **OpenAI-compatible backend**: chat completions over HTTP (Groq, OpenAI,
//!   Ollama and other compatible servers)
//! - **Prompts**: templates for message compression and query answering
//! - **Retry**: bounded retry for upstream model failures

pub mod backend;
pub mod error;
pub mod openai;
pub mod prompt;
pub mod retry;

pub use backend::{
    LlmBackend, LlmBackendConfig, LlmMessage, LlmProvider, LlmRequest, LlmResponse, MessageRole,
    TokenUsage, ToolCall, ToolDefinition,
};
pub use error::{LlmError, PromptError};
pub use openai::OpenAiCompatibleBackend;
pub use prompt::{PromptTemplate, VariableDefinition};
pub use retry::RetryPolicy;
