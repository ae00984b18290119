//! Agent orchestrator.
//!
//! Runs one invocation through the agent graph:
//! 1. Load the thread's latest checkpoint, or start a new thread
//! 2. SUMMARIZE the raw conversation history once
//! 3. ANSWER: ask the model, derive a `TurnDecision` and route on it
//! 4. TOOLS: run the requested calls concurrently, record results in
//!    request order, return to ANSWER
//! 5. Stop at END and return the final answer
//!
//! A checkpoint is written after every node, so an interrupted invocation
//! can be resumed from the node it was about to run.

use crate::checkpoint::{Checkpoint, StateStore};
use crate::config::AgentConfig;
use crate::decision::TurnDecision;
use crate::error::{AgentError, GraphError};
use crate::graph::{AgentGraph, NodeKind, Route};
use crate::state::{ConversationState, InvocationInput, InvocationOutput, TurnRecord};
use futures::future::join_all;
use rootcause::prelude::{Report, ResultExt};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use teller_ai::prompt::answer_template;
use teller_ai::{LlmBackend, LlmMessage, LlmRequest, PromptError, PromptTemplate, RetryPolicy};
use teller_conversation::Summarizer;
use teller_core::ThreadId;
use teller_gateway::{ToolGateway, ToolScope};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// The banking agent orchestrator.
pub struct Orchestrator {
    graph: AgentGraph,
    summarizer: Summarizer,
    gateway: ToolGateway,
    backend: Arc<dyn LlmBackend>,
    store: Arc<dyn StateStore>,
    template: PromptTemplate,
    config: AgentConfig,
    retry: RetryPolicy,
    /// One lock per thread; invocations on a thread run one at a time.
    thread_locks: Mutex<HashMap<ThreadId, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    /// Creates an orchestrator over the banking graph with the extractive
    /// summarizer and default configuration.
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, gateway: ToolGateway, store: Arc<dyn StateStore>) -> Self {
        let config = AgentConfig::default();
        Self {
            graph: AgentGraph::banking(),
            summarizer: Summarizer::default(),
            gateway,
            backend,
            store,
            template: answer_template(),
            retry: config.retry_policy(),
            config,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Applies `config`, including its model retry policy.
    #[must_use]
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.retry = config.retry_policy();
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the graph.
    ///
    /// # Errors
    ///
    /// Returns the graph's validation error.
    pub fn with_graph(mut self, graph: AgentGraph) -> Result<Self, GraphError> {
        graph.validate()?;
        self.graph = graph;
        Ok(self)
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Runs one invocation on `thread_id`.
    ///
    /// A thread with earlier invocations keeps its turn log; query,
    /// customer and raw history come from `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is unusable, summarization fails, the
    /// model fails after retries, the round-trip limit is exceeded or a
    /// checkpoint cannot be read or written. Tool failures are not errors.
    #[instrument(skip(self, input), fields(thread_id = %thread_id, customer_id = %input.customer_id))]
    pub async fn invoke(
        &self,
        thread_id: ThreadId,
        input: InvocationInput,
    ) -> Result<InvocationOutput, Report<AgentError>> {
        if input.customer_id.is_blank() {
            return Err(AgentError::InvalidInput {
                reason: "customer_id must not be blank".to_string(),
            }
            .into());
        }
        if input.user_query.trim().is_empty() {
            return Err(AgentError::InvalidInput {
                reason: "user_query must not be blank".to_string(),
            }
            .into());
        }

        let lock = self.thread_lock(thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.start(thread_id, input).await
        };
        self.release_thread_lock(thread_id, lock).await;
        result
    }

    async fn start(
        &self,
        thread_id: ThreadId,
        input: InvocationInput,
    ) -> Result<InvocationOutput, Report<AgentError>> {
        let checkpoint = match self.store.get(thread_id).await.context(AgentError::Checkpoint)? {
            Some(previous) => Checkpoint::entry(
                thread_id,
                previous.state.continue_with(input),
                previous.invocation + 1,
            ),
            None => Checkpoint::entry(thread_id, ConversationState::new(input), 1),
        };
        debug!(invocation = checkpoint.invocation, "starting invocation");
        self.store
            .put(thread_id, checkpoint.clone())
            .await
            .context(AgentError::Checkpoint)?;

        self.run(checkpoint).await
    }

    /// Continues the latest invocation on `thread_id` from its last
    /// checkpoint. A finished invocation returns its output again.
    ///
    /// # Errors
    ///
    /// Returns `NothingToResume` for an unknown thread, otherwise the same
    /// errors as [`Orchestrator::invoke`].
    #[instrument(skip(self), fields(thread_id = %thread_id))]
    pub async fn resume(&self, thread_id: ThreadId) -> Result<InvocationOutput, Report<AgentError>> {
        let lock = self.thread_lock(thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.continue_from_checkpoint(thread_id).await
        };
        self.release_thread_lock(thread_id, lock).await;
        result
    }

    async fn continue_from_checkpoint(&self, thread_id: ThreadId) -> Result<InvocationOutput, Report<AgentError>> {
        let checkpoint = self
            .store
            .get(thread_id)
            .await
            .context(AgentError::Checkpoint)?
            .ok_or(AgentError::NothingToResume { thread_id })?;
        debug!(next = %checkpoint.next, step = checkpoint.step, "resuming");

        self.run(checkpoint).await
    }

    async fn thread_lock(&self, thread_id: ThreadId) -> Arc<Mutex<()>> {
        self.thread_locks
            .lock()
            .await
            .entry(thread_id)
            .or_default()
            .clone()
    }

    /// Drops the thread's lock entry once no other invocation holds or awaits it.
    async fn release_thread_lock(&self, thread_id: ThreadId, lock: Arc<Mutex<()>>) {
        let mut locks = self.thread_locks.lock().await;
        drop(lock);
        if locks
            .get(&thread_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&thread_id);
        }
    }

    async fn run(&self, mut checkpoint: Checkpoint) -> Result<InvocationOutput, Report<AgentError>> {
        let thread_id = checkpoint.thread_id;

        while checkpoint.next != NodeKind::End {
            let node = checkpoint.next;
            let route = self.step(node, &mut checkpoint.state).await?;
            let next = self.graph.next(node, route).context(AgentError::Graph)?;

            checkpoint.advance(next);
            debug!(from = %node, to = %next, step = checkpoint.step, "transition");
            self.store
                .put(thread_id, checkpoint.clone())
                .await
                .context(AgentError::Checkpoint)?;
        }

        let output = checkpoint.state.to_output();
        info!(
            invocation = checkpoint.invocation,
            steps = checkpoint.step,
            turns = output.turn_log.len(),
            "invocation complete"
        );
        Ok(output)
    }

    /// Runs one node and returns the route it produced.
    async fn step(
        &self,
        node: NodeKind,
        state: &mut ConversationState,
    ) -> Result<Option<Route>, Report<AgentError>> {
        match node {
            NodeKind::Entry | NodeKind::End => Ok(None),
            NodeKind::Summarize => {
                state.summarized_conversation_history = self
                    .summarizer
                    .summarize(&state.raw_conversation_history)
                    .await
                    .context(AgentError::Summarization)?;
                Ok(None)
            }
            NodeKind::Answer => {
                let decision = self.answer(state).await?;
                Ok(Some(decision.route()))
            }
            NodeKind::Tools => {
                self.run_tools(state).await;
                Ok(None)
            }
        }
    }

    async fn answer(&self, state: &mut ConversationState) -> Result<TurnDecision, Report<AgentError>> {
        let request = self.answer_request(state).context(AgentError::Prompt)?;
        let response = self
            .retry
            .execute(|| self.backend.generate(&request))
            .await
            .context(AgentError::Model)?;

        let decision = TurnDecision::from_response(&response);
        state
            .turn_log
            .push(TurnRecord::model(response.content, response.tool_calls));

        if let TurnDecision::NeedsTools(calls) = &decision {
            let rounds = state.tool_rounds();
            if rounds > self.config.max_round_trips {
                warn!(rounds, limit = self.config.max_round_trips, "round-trip limit exceeded");
                return Err(AgentError::RoundTripLimitExceeded {
                    limit: self.config.max_round_trips,
                }
                .into());
            }
            debug!(calls = calls.len(), round = rounds, "model requested tools");
        }
        Ok(decision)
    }

    /// Builds the request for an ANSWER turn: the rendered answer prompt,
    /// then this invocation's turns replayed as assistant and tool messages.
    fn answer_request(&self, state: &ConversationState) -> Result<LlmRequest, PromptError> {
        let variables: HashMap<String, JsonValue> = [
            ("customer_id", JsonValue::from(state.customer_id.as_str())),
            ("user_query", JsonValue::from(state.user_query.as_str())),
            (
                "summarized_conversation_history",
                JsonValue::from(state.summarized_conversation_history.to_prompt_json()),
            ),
            ("namespace", JsonValue::from(self.gateway.policy().namespace())),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

        let mut messages = vec![LlmMessage::user(self.template.render_checked(&variables)?)];
        for turn in state.current_turns() {
            messages.push(match turn {
                TurnRecord::Model {
                    content, tool_calls, ..
                } if tool_calls.is_empty() => LlmMessage::assistant(content.clone()),
                TurnRecord::Model {
                    content, tool_calls, ..
                } => LlmMessage::assistant_with_tool_calls(content.clone(), tool_calls.clone()),
                TurnRecord::Tool {
                    tool_call_id, result, ..
                } => LlmMessage::tool(tool_call_id.clone(), result.to_content()),
            });
        }

        let mut request = LlmRequest::from_messages(messages).with_tools(self.gateway.definitions());
        if let Some(system) = self.template.render_system_prompt(&variables) {
            request = request.with_system(system);
        }
        Ok(request)
    }

    /// Runs the latest model turn's tool calls as one joined batch.
    ///
    /// Identifiers resolved inside the batch only apply to later batches.
    async fn run_tools(&self, state: &mut ConversationState) {
        let calls = state.pending_tool_calls();
        let executions = {
            let scope = ToolScope {
                customer_id: &state.customer_id,
                resolved: &state.resolved_identifiers,
            };
            join_all(calls.iter().map(|call| self.gateway.execute(call, scope))).await
        };

        for (call, execution) in calls.iter().zip(executions) {
            if let Some((parent, identifiers)) = execution.resolved {
                debug!(parent = %parent, count = identifiers.len(), "resolved identifiers");
                state.resolved_identifiers.record(&parent, identifiers);
            }
            state.turn_log.push(TurnRecord::tool(call, execution.outcome));
        }
    }
}
