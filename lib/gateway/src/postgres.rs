//! PostgreSQL data source.

use crate::error::DataSourceError;
use crate::source::{DataSource, RelationDescriptor};
use crate::sql::statement_body;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};

/// Row type for relation listing.
#[derive(FromRow)]
struct RelationRow {
    relation_name: String,
    columns: Vec<String>,
}

/// Data source backed by a PostgreSQL pool.
///
/// Queries run inside a `READ ONLY` transaction that is always rolled back,
/// and come back as one JSON array built by the database.
#[derive(Debug, Clone)]
pub struct PgDataSource {
    pool: PgPool,
}

impl PgDataSource {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a small pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the pool cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, DataSourceError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| DataSourceError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        Ok(Self { pool })
    }
}

fn query_failed(e: sqlx::Error) -> DataSourceError {
    DataSourceError::QueryFailed {
        reason: e.to_string(),
    }
}

/// Wraps a query so the database returns its rows as one JSON array.
///
/// The closing parenthesis goes on its own line so a trailing line comment
/// inside the query cannot swallow it.
fn json_rows_query(sql: &str) -> Result<String, DataSourceError> {
    let inner = statement_body(sql).map_err(|e| DataSourceError::QueryFailed {
        reason: e.to_string(),
    })?;
    Ok(format!(
        "SELECT coalesce(json_agg(t), '[]'::json) FROM (\n{}\n) t",
        inner.trim()
    ))
}

#[async_trait]
impl DataSource for PgDataSource {
    #[instrument(skip(self))]
    async fn list_tables(&self, namespace: &str) -> Result<Vec<RelationDescriptor>, DataSourceError> {
        let rows: Vec<RelationRow> = sqlx::query_as(
            r#"
            SELECT table_name::text AS relation_name,
                   array_agg(column_name::text ORDER BY ordinal_position) AS columns
            FROM information_schema.columns
            WHERE table_schema = $1
            GROUP BY table_name
            ORDER BY table_name
            "#,
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        debug!(relations = rows.len(), "listed relations");
        Ok(rows
            .into_iter()
            .map(|row| RelationDescriptor {
                relation_name: row.relation_name,
                columns: row.columns,
            })
            .collect())
    }

    #[instrument(skip(self, sql))]
    async fn execute_sql(&self, sql: &str) -> Result<Vec<JsonValue>, DataSourceError> {
        let wrapped = json_rows_query(sql)?;
        let mut tx = self.pool.begin().await.map_err(query_failed)?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?;

        let (rows,): (JsonValue,) = sqlx::query_as(&wrapped)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed)?;
        tx.rollback().await.map_err(query_failed)?;

        match rows {
            JsonValue::Array(rows) => {
                debug!(rows = rows.len(), "query returned");
                Ok(rows)
            }
            other => Err(DataSourceError::QueryFailed {
                reason: format!("expected a JSON array of rows, got {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_query_for_json_rows() {
        assert_eq!(
            json_rows_query("  SELECT id FROM accounts WHERE customer_id = 'c-1' ;\n").expect("wrap"),
            "SELECT coalesce(json_agg(t), '[]'::json) FROM (\nSELECT id FROM accounts WHERE customer_id = 'c-1'\n) t"
        );
    }

    #[test]
    fn trailing_comments_do_not_swallow_the_wrapper() {
        let wrapped = json_rows_query("SELECT id FROM branches -- all of them").expect("wrap");
        assert!(wrapped.ends_with("SELECT id FROM branches\n) t"));

        let wrapped = json_rows_query("SELECT name FROM branches WHERE code = 'x--y' -- note\n").expect("wrap");
        assert!(wrapped.ends_with("WHERE code = 'x--y'\n) t"));

        let wrapped = json_rows_query("SELECT 1; /* done */").expect("wrap");
        assert!(wrapped.ends_with("(\nSELECT 1\n) t"));
    }
}
