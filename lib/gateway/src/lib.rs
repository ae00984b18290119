//! Tool gateway for teller.
//!
//! The model reaches the bank's data only through this crate:
//!
//! - **Catalog and allow-list**: the data platform's full tool catalog,
//!   filtered down to `list_tables` and `execute_sql`
//! - **Query policy**: read-only, single-statement SQL with customer scoping
//! - **Data sources**: the `DataSource` trait and a PostgreSQL implementation
//! - **Gateway**: dispatch that turns every failure into a structured result

pub mod catalog;
pub mod error;
pub mod gateway;
pub mod policy;
pub mod postgres;
pub mod source;
pub mod sql;
pub mod tool;

pub use catalog::{AllowList, DataCatalog};
pub use error::{DataSourceError, GatewayError, PolicyViolation, ToolError};
pub use gateway::{ToolExecution, ToolGateway, ToolScope};
pub use policy::{DependentRelation, PolicyConfig, QueryPlan, QueryPolicy, ResolvedIdentifiers};
pub use postgres::PgDataSource;
pub use source::{DataSource, RelationDescriptor};
pub use tool::{CatalogTool, ToolCategory, ToolOutcome, ToolRegistry};
