//! Tool dispatch.
//!
//! The gateway is the only path from a model's tool-call request to the data
//! source. It never fails: unknown tools, disallowed tools, bad arguments,
//! policy rejections and database errors all come back as an `{error}`
//! outcome the model reads on its next turn.

use crate::catalog::{AllowList, DataCatalog, EXECUTE_SQL, LIST_TABLES};
use crate::error::{GatewayError, ToolError};
use crate::policy::{QueryPolicy, ResolvedIdentifiers};
use crate::source::DataSource;
use crate::tool::ToolOutcome;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use teller_ai::{ToolCall, ToolDefinition};
use teller_core::CustomerId;
use tracing::{debug, instrument, warn};

/// Per-invocation context a tool call runs in.
#[derive(Debug, Clone, Copy)]
pub struct ToolScope<'a> {
    /// The customer the invocation serves.
    pub customer_id: &'a CustomerId,
    /// Identifiers resolved by earlier lookups in this invocation.
    pub resolved: &'a ResolvedIdentifiers,
}

/// Result of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecution {
    /// What the model sees.
    pub outcome: ToolOutcome,
    /// Parent relation and the key values this call resolved, if any.
    pub resolved: Option<(String, Vec<String>)>,
}

impl ToolExecution {
    fn new(outcome: ToolOutcome) -> Self {
        Self {
            outcome,
            resolved: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListTablesArgs {
    #[serde(default)]
    schemas: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExecuteSqlArgs {
    sql: String,
}

/// Dispatches allow-listed tool calls to a data source.
#[derive(Clone)]
pub struct ToolGateway {
    catalog: DataCatalog,
    allow_list: AllowList,
    policy: QueryPolicy,
    source: Arc<dyn DataSource>,
}

impl std::fmt::Debug for ToolGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolGateway")
            .field("allow_list", &self.allow_list)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ToolGateway {
    /// Creates a gateway over the platform catalog with the banking
    /// allow-list and default policy.
    #[must_use]
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            catalog: DataCatalog::postgres_platform(),
            allow_list: AllowList::banking(),
            policy: QueryPolicy::default(),
            source,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: QueryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: DataCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &QueryPolicy {
        &self.policy
    }

    /// Tool definitions offered to the model.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.allow_list.filter(&self.catalog).definitions()
    }

    /// Executes one tool call.
    #[instrument(skip(self, call, scope), fields(tool = %call.name, call_id = %call.id))]
    pub async fn execute(&self, call: &ToolCall, scope: ToolScope<'_>) -> ToolExecution {
        match self.dispatch(call, scope).await {
            Ok(execution) => execution,
            Err(e) => {
                warn!(error = %e, "tool call failed");
                ToolExecution::new(ToolOutcome::error(e.to_string()))
            }
        }
    }

    async fn dispatch(&self, call: &ToolCall, scope: ToolScope<'_>) -> Result<ToolExecution, GatewayError> {
        if self.catalog.get(&call.name).is_none() {
            return Err(ToolError::UnknownTool {
                name: call.name.clone(),
            }
            .into());
        }
        if !self.allow_list.allows(&call.name) {
            return Err(ToolError::NotAllowed {
                name: call.name.clone(),
            }
            .into());
        }

        match call.name.as_str() {
            LIST_TABLES => {
                let args: ListTablesArgs = parse_arguments(call)?;
                self.policy.check_namespaces(&args.schemas)?;
                let relations = self.source.list_tables(self.policy.namespace()).await?;
                debug!(relations = relations.len(), "listed relations");
                Ok(ToolExecution::new(ToolOutcome::Relations(relations)))
            }
            EXECUTE_SQL => {
                let args: ExecuteSqlArgs = parse_arguments(call)?;
                if args.sql.trim().is_empty() {
                    return Err(ToolError::InvalidArguments {
                        name: call.name.clone(),
                        reason: "sql must not be empty".to_string(),
                    }
                    .into());
                }

                let plan = self.policy.check(&args.sql, scope.customer_id, scope.resolved)?;
                debug!(relations = ?plan.relations, "query accepted");
                let rows = self.source.execute_sql(&args.sql).await?;
                let resolved = plan.resolved_from(&rows);
                Ok(ToolExecution {
                    outcome: ToolOutcome::Rows { rows },
                    resolved,
                })
            }
            other => Err(ToolError::NotAllowed {
                name: other.to_string(),
            }
            .into()),
        }
    }
}

fn parse_arguments<T: DeserializeOwned>(call: &ToolCall) -> Result<T, ToolError> {
    let arguments = match &call.arguments {
        JsonValue::Null => JsonValue::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        name: call.name.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataSourceError;
    use crate::source::RelationDescriptor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// In-memory data source that records executed SQL.
    #[derive(Default)]
    struct FakeSource {
        rows: Vec<JsonValue>,
        fail: bool,
        executed: Mutex<Vec<String>>,
        listed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DataSource for FakeSource {
        async fn list_tables(&self, namespace: &str) -> Result<Vec<RelationDescriptor>, DataSourceError> {
            self.listed.lock().unwrap().push(namespace.to_string());
            Ok(vec![RelationDescriptor {
                relation_name: "accounts".to_string(),
                columns: vec!["id".to_string(), "customer_id".to_string(), "balance".to_string()],
            }])
        }

        async fn execute_sql(&self, sql: &str) -> Result<Vec<JsonValue>, DataSourceError> {
            self.executed.lock().unwrap().push(sql.to_string());
            if self.fail {
                return Err(DataSourceError::QueryFailed {
                    reason: "relation does not exist".to_string(),
                });
            }
            Ok(self.rows.clone())
        }
    }

    fn gateway(source: Arc<FakeSource>) -> ToolGateway {
        ToolGateway::new(source)
    }

    fn customer() -> CustomerId {
        CustomerId::from("c-1")
    }

    async fn run(gateway: &ToolGateway, call: ToolCall, resolved: &ResolvedIdentifiers) -> ToolExecution {
        let customer = customer();
        gateway
            .execute(
                &call,
                ToolScope {
                    customer_id: &customer,
                    resolved,
                },
            )
            .await
    }

    #[test]
    fn offers_only_allow_listed_tools() {
        let names: Vec<String> = gateway(Arc::new(FakeSource::default()))
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec![EXECUTE_SQL.to_string(), LIST_TABLES.to_string()]);
    }

    #[tokio::test]
    async fn lists_tables_of_the_fixed_namespace() {
        let source = Arc::new(FakeSource::default());
        let gw = gateway(source.clone());

        let execution = run(
            &gw,
            ToolCall::new("call-1", LIST_TABLES, json!({"schemas": ["public"]})),
            &ResolvedIdentifiers::new(),
        )
        .await;
        assert!(matches!(execution.outcome, ToolOutcome::Relations(ref r) if r.len() == 1));

        let execution = run(&gw, ToolCall::new("call-2", LIST_TABLES, JsonValue::Null), &ResolvedIdentifiers::new()).await;
        assert!(!execution.outcome.is_error());
        assert_eq!(*source.listed.lock().unwrap(), vec!["public".to_string(), "public".to_string()]);
    }

    #[tokio::test]
    async fn rejects_other_namespaces_without_touching_the_source() {
        let source = Arc::new(FakeSource::default());
        let execution = run(
            &gateway(source.clone()),
            ToolCall::new("call-1", LIST_TABLES, json!({"schemas": ["auth"]})),
            &ResolvedIdentifiers::new(),
        )
        .await;

        assert!(execution.outcome.is_error());
        assert!(source.listed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_and_disallowed_tools_become_errors() {
        let gw = gateway(Arc::new(FakeSource::default()));

        let execution = run(&gw, ToolCall::new("call-1", "drop_everything", json!({})), &ResolvedIdentifiers::new()).await;
        assert_eq!(execution.outcome, ToolOutcome::error("unknown tool 'drop_everything'"));

        let execution = run(&gw, ToolCall::new("call-2", "apply_migration", json!({})), &ResolvedIdentifiers::new()).await;
        assert_eq!(execution.outcome, ToolOutcome::error("tool 'apply_migration' is not available"));
    }

    #[tokio::test]
    async fn malformed_arguments_become_errors() {
        let gw = gateway(Arc::new(FakeSource::default()));

        let execution = run(&gw, ToolCall::new("call-1", EXECUTE_SQL, json!({"query": "SELECT 1"})), &ResolvedIdentifiers::new()).await;
        assert!(matches!(
            execution.outcome,
            ToolOutcome::Error { ref error } if error.starts_with("invalid arguments for 'execute_sql'")
        ));

        let execution = run(&gw, ToolCall::new("call-2", EXECUTE_SQL, json!({"sql": "  "})), &ResolvedIdentifiers::new()).await;
        assert!(execution.outcome.is_error());
    }

    #[tokio::test]
    async fn mutating_sql_never_reaches_the_source() {
        let source = Arc::new(FakeSource::default());
        let gw = gateway(source.clone());

        for sql in [
            "INSERT INTO accounts VALUES (1)",
            "UPDATE accounts SET balance = 0",
            "DELETE FROM accounts",
            "DROP TABLE accounts",
            "ALTER TABLE accounts ADD COLUMN x int",
        ] {
            let execution = run(&gw, ToolCall::new("call", EXECUTE_SQL, json!({"sql": sql})), &ResolvedIdentifiers::new()).await;
            assert!(
                matches!(execution.outcome, ToolOutcome::Error { ref error } if error.starts_with("query rejected:")),
                "{sql}"
            );
        }
        assert!(source.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scoped_lookup_resolves_parent_keys() {
        let source = Arc::new(FakeSource {
            rows: vec![json!({"id": "a-1", "balance": 120.5}), json!({"id": "a-2", "balance": 3})],
            ..FakeSource::default()
        });
        let execution = run(
            &gateway(source),
            ToolCall::new(
                "call-1",
                EXECUTE_SQL,
                json!({"sql": "SELECT id, balance FROM accounts WHERE customer_id = 'c-1'"}),
            ),
            &ResolvedIdentifiers::new(),
        )
        .await;

        assert!(matches!(execution.outcome, ToolOutcome::Rows { ref rows } if rows.len() == 2));
        assert_eq!(
            execution.resolved,
            Some(("accounts".to_string(), vec!["a-1".to_string(), "a-2".to_string()]))
        );
    }

    #[tokio::test]
    async fn dependent_lookup_needs_resolved_keys() {
        let source = Arc::new(FakeSource {
            rows: vec![json!({"amount": -42})],
            ..FakeSource::default()
        });
        let gw = gateway(source.clone());
        let call = ToolCall::new(
            "call-1",
            EXECUTE_SQL,
            json!({"sql": "SELECT amount FROM transactions WHERE account_id = 'a-1'"}),
        );

        let execution = run(&gw, call.clone(), &ResolvedIdentifiers::new()).await;
        assert!(execution.outcome.is_error());
        assert!(source.executed.lock().unwrap().is_empty());

        let mut resolved = ResolvedIdentifiers::new();
        resolved.record("accounts", ["a-1".to_string()]);
        let execution = run(&gw, call, &resolved).await;
        assert_eq!(execution.outcome, ToolOutcome::Rows { rows: vec![json!({"amount": -42})] });
        assert_eq!(execution.resolved, None);
    }

    #[tokio::test]
    async fn data_source_failures_become_errors() {
        let source = Arc::new(FakeSource {
            fail: true,
            ..FakeSource::default()
        });
        let execution = run(
            &gateway(source),
            ToolCall::new("call-1", EXECUTE_SQL, json!({"sql": "SELECT name FROM branches"})),
            &ResolvedIdentifiers::new(),
        )
        .await;

        assert_eq!(execution.outcome, ToolOutcome::error("query failed: relation does not exist"));
    }
}
