//! Centralized runner configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`LLM__MODEL`, `AGENT__MAX_ROUND_TRIPS`).
//! List values such as `POLICY__CUSTOMER_SCOPED` are comma-separated.

use serde::Deserialize;
use teller_agent::AgentConfig;
use teller_ai::LlmBackendConfig;
use teller_gateway::PolicyConfig;

/// Runner configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct RunnerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Language model backend.
    pub llm: LlmBackendConfig,

    /// Orchestrator settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Query policy of the tool gateway.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// How long messages are compressed.
    #[serde(default)]
    pub summarizer: SummarizerKind,
}

/// Compressor used for messages over the content limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarizerKind {
    /// Keep fact-bearing sentences.
    #[default]
    Extractive,
    /// Ask the language model.
    Llm,
}

impl RunnerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_builder(
            config::Config::builder().add_source(
                config::Environment::default()
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("policy.customer_scoped")
                    .try_parsing(true),
            ),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        builder.build()?.try_deserialize()
    }
}
