//! The data source behind the gateway's two tools.

use crate::error::DataSourceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A relation and its column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    pub relation_name: String,
    pub columns: Vec<String>,
}

/// Read access to the bank's relational data.
///
/// Implementations receive SQL only after the query policy has accepted it.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Lists the relations of `namespace` with their columns.
    async fn list_tables(&self, namespace: &str) -> Result<Vec<RelationDescriptor>, DataSourceError>;

    /// Runs a read-only query and returns its rows as JSON objects.
    async fn execute_sql(&self, sql: &str) -> Result<Vec<JsonValue>, DataSourceError>;
}
