//! Runs one banking-support invocation.
//!
//! Reads `{thread_id?, customer_id, user_query, raw_conversation_history}`
//! (or a `transcript` of stored messages in place of the raw history) from
//! stdin and writes the invocation output, with its thread id, to
//! stdout. Logs go to stderr.

mod config;
mod error;
mod request;

use crate::config::{RunnerConfig, SummarizerKind};
use crate::error::RunnerError;
use crate::request::{RunnerRequest, RunnerResponse};
use rootcause::prelude::{Report, ResultExt};
use std::process::ExitCode;
use std::sync::Arc;
use teller_agent::{FileStateStore, InMemoryStateStore, Orchestrator, StateStore};
use teller_ai::{LlmBackend, OpenAiCompatibleBackend};
use teller_conversation::{LlmCompressor, Summarizer};
use teller_gateway::{PgDataSource, QueryPolicy, ToolGateway};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!("{report}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Report<RunnerError>> {
    let config = RunnerConfig::from_env().map_err(|e| RunnerError::Config {
        reason: e.to_string(),
    })?;
    tracing::info!(provider = %config.llm.provider, model = %config.llm.model, "loaded configuration");

    let mut document = String::new();
    tokio::io::stdin()
        .read_to_string(&mut document)
        .await
        .map_err(|e| RunnerError::Input {
            reason: e.to_string(),
        })?;
    let request = RunnerRequest::parse(&document)?;
    let thread_id = request.thread_id()?;
    let input = request.into_input()?;

    let backend: Arc<dyn LlmBackend> =
        Arc::new(OpenAiCompatibleBackend::new(config.llm.clone()).context(RunnerError::Backend)?);

    let source = PgDataSource::connect(&config.database_url)
        .await
        .context(RunnerError::DataSource)?;
    let gateway = ToolGateway::new(Arc::new(source)).with_policy(QueryPolicy::new(config.policy.clone()));

    let store: Arc<dyn StateStore> = match &config.agent.state_dir {
        Some(dir) => Arc::new(FileStateStore::new(dir.clone())),
        None => Arc::new(InMemoryStateStore::new()),
    };

    let summarizer = match config.summarizer {
        SummarizerKind::Extractive => Summarizer::default(),
        SummarizerKind::Llm => Summarizer::new(Arc::new(
            LlmCompressor::new(backend.clone()).with_retry(config.agent.retry_policy()),
        )),
    };

    let orchestrator = Orchestrator::new(backend, gateway, store)
        .with_summarizer(summarizer)
        .with_config(config.agent.clone());

    let output = orchestrator
        .invoke(thread_id, input)
        .await
        .context(RunnerError::Invocation)?;

    let response = RunnerResponse {
        thread_id: thread_id.to_string(),
        output,
    };
    let mut body = serde_json::to_vec_pretty(&response).map_err(|e| RunnerError::Output {
        reason: e.to_string(),
    })?;
    body.push(b'\n');

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&body).await.map_err(|e| RunnerError::Output {
        reason: e.to_string(),
    })?;
    stdout.flush().await.map_err(|e| RunnerError::Output {
        reason: e.to_string(),
    })?;
    Ok(())
}
