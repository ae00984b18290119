//! Error types for the gateway crate.
//!
//! None of these abort an invocation. The gateway renders each one into the
//! `{error}` result the model sees on its next turn:
//! - `ToolError`: Unknown, disallowed or malformed tool calls
//! - `PolicyViolation`: SQL rejected before execution
//! - `DataSourceError`: Failures reported by the backing database
//!
//! `GatewayError` unifies the three for the gateway's dispatch path.

use std::fmt;

/// Errors from dispatching a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The tool is not in the catalog.
    UnknownTool { name: String },
    /// The tool exists but is not allow-listed.
    NotAllowed { name: String },
    /// The call's arguments do not match the tool's input schema.
    InvalidArguments { name: String, reason: String },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool { name } => write!(f, "unknown tool '{name}'"),
            Self::NotAllowed { name } => write!(f, "tool '{name}' is not available"),
            Self::InvalidArguments { name, reason } => {
                write!(f, "invalid arguments for '{name}': {reason}")
            }
        }
    }
}

impl std::error::Error for ToolError {}

/// Reasons a query is refused before it reaches the data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    /// The SQL contains a data-modifying or DDL keyword.
    MutatingKeyword { keyword: String },
    /// More than one statement was submitted.
    MultipleStatements,
    /// The statement does not start with SELECT or WITH.
    NotAQuery,
    /// The SQL could not be tokenized.
    Malformed { reason: String },
    /// A relation outside the allowed namespace was referenced.
    ForeignNamespace { schema: String },
    /// `list_tables` asked for a namespace other than the fixed one.
    WrongNamespace { requested: String, allowed: String },
    /// A customer-scoped relation was queried without the customer filter.
    MissingCustomerFilter { relation: String },
    /// The customer filter names a different customer or is not an equality.
    ForeignCustomer { relation: String },
    /// Scoped queries must not use OR, NOT, CASE or set operators.
    UnsupportedLogic { relation: String, keyword: String },
    /// More than one reference to customer-scoped or dependent relations.
    MultipleScopedRelations { relations: Vec<String> },
    /// A scoped query contains a subquery or common table expression.
    NestedQuery { relation: String },
    /// A dependent relation was filtered by the customer column.
    CustomerFilterOnDependent { relation: String },
    /// A dependent relation was queried without filtering its key.
    MissingDependentFilter { relation: String, key: String },
    /// Key values were not resolved by an earlier customer-scoped lookup.
    UnresolvedIdentifiers {
        relation: String,
        parent: String,
        identifiers: Vec<String>,
    },
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MutatingKeyword { keyword } => {
                write!(f, "only read-only queries are allowed; found '{keyword}'")
            }
            Self::MultipleStatements => write!(f, "only a single statement is allowed"),
            Self::NotAQuery => write!(f, "the statement must start with SELECT or WITH"),
            Self::Malformed { reason } => write!(f, "malformed SQL: {reason}"),
            Self::ForeignNamespace { schema } => {
                write!(f, "schema '{schema}' is not accessible")
            }
            Self::WrongNamespace { requested, allowed } => {
                write!(
                    f,
                    "schema '{requested}' is not accessible; use {{\"schemas\": [\"{allowed}\"]}}"
                )
            }
            Self::MissingCustomerFilter { relation } => {
                write!(f, "queries on '{relation}' must filter by the customer's id")
            }
            Self::ForeignCustomer { relation } => {
                write!(
                    f,
                    "queries on '{relation}' may only compare the customer column for equality with this customer's id"
                )
            }
            Self::UnsupportedLogic { relation, keyword } => {
                write!(f, "queries on '{relation}' must not use {keyword}")
            }
            Self::MultipleScopedRelations { relations } => {
                write!(
                    f,
                    "query one customer relation at a time; found [{}]",
                    relations.join(", ")
                )
            }
            Self::NestedQuery { relation } => {
                write!(f, "queries on '{relation}' must be a single SELECT without subqueries")
            }
            Self::CustomerFilterOnDependent { relation } => {
                write!(
                    f,
                    "'{relation}' has no customer column; filter it by ids from an earlier lookup"
                )
            }
            Self::MissingDependentFilter { relation, key } => {
                write!(f, "queries on '{relation}' must filter '{key}' by literal ids")
            }
            Self::UnresolvedIdentifiers {
                relation,
                parent,
                identifiers,
            } => {
                write!(
                    f,
                    "ids [{}] used on '{relation}' were not returned by an earlier '{parent}' lookup for this customer",
                    identifiers.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for PolicyViolation {}

/// Errors from the backing data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// Could not reach the database.
    ConnectionFailed { reason: String },
    /// The database rejected or failed the query.
    QueryFailed { reason: String },
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => {
                write!(f, "database connection failed: {reason}")
            }
            Self::QueryFailed { reason } => write!(f, "query failed: {reason}"),
        }
    }
}

impl std::error::Error for DataSourceError {}

/// Any failure of a single tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    Tool(ToolError),
    Policy(PolicyViolation),
    Source(DataSourceError),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool(e) => write!(f, "{e}"),
            Self::Policy(e) => write!(f, "query rejected: {e}"),
            Self::Source(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<ToolError> for GatewayError {
    fn from(e: ToolError) -> Self {
        Self::Tool(e)
    }
}

impl From<PolicyViolation> for GatewayError {
    fn from(e: PolicyViolation) -> Self {
        Self::Policy(e)
    }
}

impl From<DataSourceError> for GatewayError {
    fn from(e: DataSourceError) -> Self {
        Self::Source(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_display() {
        let err = ToolError::NotAllowed {
            name: "apply_migration".to_string(),
        };
        assert_eq!(err.to_string(), "tool 'apply_migration' is not available");
    }

    #[test]
    fn policy_violation_display_guides_the_model() {
        let err = PolicyViolation::WrongNamespace {
            requested: "auth".to_string(),
            allowed: "public".to_string(),
        };
        assert!(err.to_string().contains(r#"{"schemas": ["public"]}"#));

        let err = PolicyViolation::UnresolvedIdentifiers {
            relation: "transactions".to_string(),
            parent: "accounts".to_string(),
            identifiers: vec!["a-9".to_string()],
        };
        assert!(err.to_string().contains("[a-9]"));
        assert!(err.to_string().contains("'accounts'"));
    }

    #[test]
    fn gateway_error_prefixes_policy_rejections() {
        let err = GatewayError::from(PolicyViolation::MultipleStatements);
        assert_eq!(err.to_string(), "query rejected: only a single statement is allowed");

        let err = GatewayError::from(DataSourceError::QueryFailed {
            reason: "relation \"loans\" does not exist".to_string(),
        });
        assert!(err.to_string().starts_with("query failed:"));
    }
}
