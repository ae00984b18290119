//! Tool catalog entries and tool results.

use crate::source::RelationDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use teller_ai::ToolDefinition;

/// Categories of data-platform tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Schema inspection.
    Schema,
    /// SQL execution.
    Query,
    /// Schema migrations.
    Migration,
    /// Database extensions.
    Extension,
    /// Logs and advisors.
    Observability,
    /// Client code generation.
    Codegen,
    /// Development branches.
    Branching,
    /// Documentation search.
    Docs,
}

/// A tool offered by the data platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTool {
    /// Definition handed to the model.
    pub definition: ToolDefinition,
    /// Tool category.
    pub category: ToolCategory,
    /// Whether the tool changes platform state.
    pub mutating: bool,
}

impl CatalogTool {
    #[must_use]
    pub fn new(definition: ToolDefinition, category: ToolCategory) -> Self {
        Self {
            definition,
            category,
            mutating: false,
        }
    }

    /// Marks this tool as changing platform state.
    #[must_use]
    pub fn mutating(mut self) -> Self {
        self.mutating = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// Registry of catalog tools, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, CatalogTool>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: CatalogTool) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogTool> {
        self.tools.get(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &CatalogTool> {
        self.tools.values()
    }

    pub fn by_category(&self, category: ToolCategory) -> impl Iterator<Item = &CatalogTool> {
        self.tools.values().filter(move |t| t.category == category)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the definitions in the form offered to the model.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }
}

/// Result of one tool call as the model sees it.
///
/// Serializes untagged: a relation list, `{"rows": [...]}` or
/// `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutcome {
    /// Result of `list_tables`.
    Relations(Vec<RelationDescriptor>),
    /// Result of `execute_sql`.
    Rows { rows: Vec<JsonValue> },
    /// Any failure.
    Error { error: String },
}

impl ToolOutcome {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Renders the outcome as the content of a tool message.
    #[must_use]
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"error": "{e}"}}"#))
    }
}
