//! Prompt templates.
//!
//! Templates substitute `{{variable}}` placeholders. The two templates the
//! banking agent uses are built by [`message_compression_template`] and
//! [`answer_template`].

use crate::error::PromptError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

/// A versioned prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Template name.
    pub name: String,
    /// Semantic version.
    pub version: String,
    /// Template content with placeholders.
    pub content: String,
    /// Optional system prompt template.
    pub system_prompt: Option<String>,
    /// Variable definitions (name -> description).
    pub variables: BTreeMap<String, VariableDefinition>,
}

/// Definition of a template variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDefinition {
    /// Description of what this variable is for.
    pub description: String,
    /// Whether this variable is required.
    pub required: bool,
    /// Default value if not provided.
    pub default: Option<JsonValue>,
}

impl VariableDefinition {
    /// Creates a required variable definition.
    #[must_use]
    pub fn required(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// Creates an optional variable definition.
    #[must_use]
    pub fn optional(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            required: false,
            default: None,
        }
    }

    /// Sets a default value.
    #[must_use]
    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }
}

impl PromptTemplate {
    /// Creates a new prompt template.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "0.1.0".to_string(),
            content: content.into(),
            system_prompt: None,
            variables: BTreeMap::new(),
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    /// Adds a variable definition.
    #[must_use]
    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        definition: VariableDefinition,
    ) -> Self {
        self.variables.insert(name.into(), definition);
        self
    }

    /// Renders the template with the given variables.
    ///
    /// Missing variables with defaults are filled in; any other placeholder
    /// is left untouched.
    #[must_use]
    pub fn render(&self, variables: &HashMap<String, JsonValue>) -> String {
        let mut result = substitute(&self.content, variables);

        for (name, def) in &self.variables {
            let placeholder = format!("{{{{{}}}}}", name);
            if let Some(default) = &def.default
                && result.contains(&placeholder)
            {
                result = result.replace(&placeholder, &as_text(default));
            }
        }

        result
    }

    /// Validates the variables, then renders the template.
    ///
    /// # Errors
    ///
    /// Returns an error naming every required variable that was not supplied.
    pub fn render_checked(
        &self,
        variables: &HashMap<String, JsonValue>,
    ) -> Result<String, PromptError> {
        self.validate_variables(variables)
            .map_err(|missing| PromptError::MissingVariables {
                template: self.name.clone(),
                variables: missing,
            })?;
        Ok(self.render(variables))
    }

    /// Renders the system prompt with the given variables.
    #[must_use]
    pub fn render_system_prompt(&self, variables: &HashMap<String, JsonValue>) -> Option<String> {
        self.system_prompt
            .as_ref()
            .map(|template| substitute(template, variables))
    }

    /// Validates that all required variables are provided.
    pub fn validate_variables(
        &self,
        variables: &HashMap<String, JsonValue>,
    ) -> Result<(), Vec<String>> {
        let missing: Vec<String> = self
            .variables
            .iter()
            .filter(|(_, def)| def.required && def.default.is_none())
            .filter(|(name, _)| !variables.contains_key(*name))
            .map(|(name, _)| name.clone())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

fn substitute(template: &str, variables: &HashMap<String, JsonValue>) -> String {
    let mut result = template.to_string();
    for (name, value) in variables {
        let placeholder = format!("{{{{{}}}}}", name);
        result = result.replace(&placeholder, &as_text(value));
    }
    result
}

fn as_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

const COMPRESSION_SYSTEM: &str = r#"You compress single messages from a banking support conversation.

You receive JSON of the form {"sender_type": ..., "content": ...}. Reply with JSON only,
matching {"content": string}. No markdown, no commentary, no extra keys.

Rules:
1) Keep every amount and currency, every date and time, every transaction or
   reference ID, every bank, merchant and beneficiary name, and every explicit
   request (for example asking to talk to an agent, to escalate, to block a card).
   Copy these facts exactly as written.
2) Greetings, filler and repetition may be removed, facts may not.
3) Never add information that is not in the message."#;

/// Template used to compress one message longer than the content limit.
#[must_use]
pub fn message_compression_template() -> PromptTemplate {
    PromptTemplate::new(
        "compress_message",
        r#"{"sender_type": {{sender_type}}, "content": {{content}}}"#,
    )
    .with_version("1.0.0")
    .with_system_prompt(COMPRESSION_SYSTEM)
    .with_variable("sender_type", VariableDefinition::required("JSON string of the sender category"))
    .with_variable("content", VariableDefinition::required("JSON string of the original content"))
}

const ANSWER_SYSTEM: &str = r#"You are a banking support data assistant.

You are given a user query, a summarized conversation history (JSON) and a customer_id.
You can call two tools: list_tables and execute_sql. Answer the question accurately,
querying the database whenever data is needed.

Rules:
1) Call list_tables first when unsure about table names or columns.
2) Retrieve all data with execute_sql. Never guess.
3) Filter customer-specific data by the provided customer_id.
4) Select only the columns you need; avoid SELECT *.
5) Never modify data: no INSERT, UPDATE, DELETE or DDL.
6) Keep results minimal and relevant to the question.
7) If the database cannot answer the question, say so plainly and ask one short follow-up question.
8) For transactions, first query accounts by customer_id to obtain the account id values,
   then query transactions filtered by those account_id values. Never filter transactions by customer_id.
   Query accounts and transactions separately: no joins between them, no subqueries, no UNION.
9) When calling list_tables, always pass {"schemas": ["{{namespace}}"]}.
10) If a tool returns an error, read it, correct the request and try again.

Reply with a short answer for the customer. Do not include SQL or raw tool output."#;

/// Template used for every answering turn.
#[must_use]
pub fn answer_template() -> PromptTemplate {
    PromptTemplate::new(
        "answer_user_query",
        "customer_id: {{customer_id}}\n\nUser query:\n{{user_query}}\n\nSummarized conversation history (JSON):\n{{summarized_conversation_history}}",
    )
    .with_version("1.0.0")
    .with_system_prompt(ANSWER_SYSTEM)
    .with_variable("customer_id", VariableDefinition::required("Customer the query is about"))
    .with_variable("user_query", VariableDefinition::required("The customer's question"))
    .with_variable(
        "summarized_conversation_history",
        VariableDefinition::optional("Summarized messages as JSON").with_default(serde_json::json!("[]")),
    )
    .with_variable(
        "namespace",
        VariableDefinition::optional("Schema namespace for list_tables").with_default(serde_json::json!("public")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_rendering() {
        let template = PromptTemplate::new("greeting", "Hello, {{name}}! You owe {{amount}}.");

        let mut vars = HashMap::new();
        vars.insert("name".to_string(), serde_json::json!("Ada"));
        vars.insert("amount".to_string(), serde_json::json!(12.5));

        assert_eq!(template.render(&vars), "Hello, Ada! You owe 12.5.");
    }

    #[test]
    fn template_with_defaults() {
        let template = PromptTemplate::new("greeting", "Hello, {{name}}! Your role is {{role}}.")
            .with_variable("name", VariableDefinition::required("User's name"))
            .with_variable(
                "role",
                VariableDefinition::optional("User's role").with_default(serde_json::json!("customer")),
            );

        let mut vars = HashMap::new();
        vars.insert("name".to_string(), serde_json::json!("Ada"));

        assert_eq!(template.render(&vars), "Hello, Ada! Your role is customer.");
    }

    #[test]
    fn render_checked_reports_missing_variables() {
        let template = answer_template();
        let mut vars = HashMap::new();
        vars.insert("user_query".to_string(), serde_json::json!("balance?"));

        let err = template.render_checked(&vars).unwrap_err();
        assert_eq!(
            err,
            PromptError::MissingVariables {
                template: "answer_user_query".to_string(),
                variables: vec!["customer_id".to_string()],
            }
        );
    }

    #[test]
    fn answer_system_prompt_names_the_namespace() {
        let template = answer_template();
        let mut vars = HashMap::new();
        vars.insert("namespace".to_string(), serde_json::json!("banking"));

        let system = template.render_system_prompt(&vars).expect("has system prompt");
        assert!(system.contains(r#"{"schemas": ["banking"]}"#));
        assert!(system.contains("execute_sql"));
    }

    #[test]
    fn compression_prompt_embeds_json_strings() {
        let template = message_compression_template();
        let mut vars = HashMap::new();
        vars.insert("sender_type".to_string(), serde_json::json!("\"customer\""));
        vars.insert("content".to_string(), serde_json::json!("\"I paid $40\""));

        let rendered = template.render_checked(&vars).expect("all variables present");
        let parsed: JsonValue = serde_json::from_str(&rendered).expect("valid JSON");
        assert_eq!(parsed["content"], "I paid $40");
    }
}
