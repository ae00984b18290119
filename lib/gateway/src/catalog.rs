//! The data platform's tool catalog and the allow-list in front of it.
//!
//! The platform exposes many tools, most of which change state. The model
//! only ever sees what [`AllowList`] lets through.

use crate::tool::{CatalogTool, ToolCategory, ToolRegistry};
use serde_json::json;
use teller_ai::ToolDefinition;

/// Name of the schema listing tool.
pub const LIST_TABLES: &str = "list_tables";
/// Name of the SQL execution tool.
pub const EXECUTE_SQL: &str = "execute_sql";

/// Full tool catalog of the backing data platform.
#[derive(Debug, Clone)]
pub struct DataCatalog {
    registry: ToolRegistry,
}

impl DataCatalog {
    /// Builds the catalog of a hosted PostgreSQL platform.
    #[must_use]
    pub fn postgres_platform() -> Self {
        let mut registry = ToolRegistry::new();

        registry.register(CatalogTool::new(
            ToolDefinition::new(
                LIST_TABLES,
                "Lists the tables of the given schemas with their columns.",
            )
            .with_input_schema(json!({
                "type": "object",
                "properties": {
                    "schemas": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Schemas to include."
                    }
                },
                "required": ["schemas"]
            })),
            ToolCategory::Schema,
        ));
        registry.register(CatalogTool::new(
            ToolDefinition::new(EXECUTE_SQL, "Executes a read-only SQL query and returns the rows.")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "sql": {"type": "string", "description": "A single SELECT statement."}
                    },
                    "required": ["sql"]
                })),
            ToolCategory::Query,
        ));

        let others = [
            ("list_extensions", "Lists installed database extensions.", ToolCategory::Extension, false),
            ("list_migrations", "Lists applied migrations.", ToolCategory::Migration, false),
            ("apply_migration", "Applies a DDL migration.", ToolCategory::Migration, true),
            ("get_logs", "Fetches service logs.", ToolCategory::Observability, false),
            ("get_advisors", "Lists security and performance advisories.", ToolCategory::Observability, false),
            ("generate_typescript_types", "Generates client types from the schema.", ToolCategory::Codegen, false),
            ("create_branch", "Creates a development branch.", ToolCategory::Branching, true),
            ("merge_branch", "Merges a development branch.", ToolCategory::Branching, true),
            ("reset_branch", "Resets a development branch.", ToolCategory::Branching, true),
            ("search_docs", "Searches the platform documentation.", ToolCategory::Docs, false),
        ];
        for (name, description, category, mutating) in others {
            let tool = CatalogTool::new(
                ToolDefinition::new(name, description)
                    .with_input_schema(json!({"type": "object"})),
                category,
            );
            registry.register(if mutating { tool.mutating() } else { tool });
        }

        Self { registry }
    }

    /// Builds a catalog from an explicit registry.
    #[must_use]
    pub fn from_registry(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogTool> {
        self.registry.get(name)
    }
}

/// Static filter between the catalog and the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    names: &'static [&'static str],
}

impl Default for AllowList {
    fn default() -> Self {
        Self::banking()
    }
}

impl AllowList {
    /// The two tools the banking agent may use.
    #[must_use]
    pub fn banking() -> Self {
        Self {
            names: &[LIST_TABLES, EXECUTE_SQL],
        }
    }

    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        self.names.contains(&name)
    }

    /// Returns the allow-listed subset of `catalog`.
    #[must_use]
    pub fn filter(&self, catalog: &DataCatalog) -> ToolRegistry {
        let mut allowed = ToolRegistry::new();
        for tool in catalog.registry().all() {
            if self.allows(tool.name()) {
                allowed.register(tool.clone());
            }
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_larger_than_allow_list() {
        let catalog = DataCatalog::postgres_platform();
        assert!(catalog.registry().len() > 2);
        assert!(catalog.get("apply_migration").is_some_and(|t| t.mutating));
    }

    #[test]
    fn allow_list_keeps_exactly_two_tools() {
        let allowed = AllowList::banking().filter(&DataCatalog::postgres_platform());
        let names: Vec<_> = allowed.all().map(|t| t.name().to_string()).collect();

        assert_eq!(names, vec![EXECUTE_SQL.to_string(), LIST_TABLES.to_string()]);
        assert!(allowed.all().all(|t| !t.mutating));
    }

    #[test]
    fn allow_list_ignores_missing_catalog_entries() {
        let allowed = AllowList::banking().filter(&DataCatalog::from_registry(ToolRegistry::new()));
        assert!(allowed.is_empty());
    }
}
