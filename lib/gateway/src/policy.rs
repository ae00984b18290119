//! Query safety policy.
//!
//! Every `execute_sql` call is checked before it reaches the data source:
//! the statement must be a single read-only query, customer-scoped
//! relations must be filtered to the invocation's customer, and dependent
//! relations may only be filtered by key values an earlier customer-scoped
//! lookup returned.

use crate::error::PolicyViolation;
use crate::sql::{Token, tokenize};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use teller_core::CustomerId;
use tracing::debug;

/// Data-modifying and DDL keywords, matched against unquoted words.
const MUTATING_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "truncate", "create", "grant", "revoke", "merge",
    "copy", "upsert", "replace", "call", "do", "vacuum", "comment", "reindex", "refresh", "lock", "set",
];

/// Keywords that end a FROM item's alias position.
const CLAUSE_KEYWORDS: &[&str] = &[
    "where", "join", "left", "right", "inner", "outer", "full", "cross", "natural", "on", "using",
    "group", "order", "limit", "offset", "union", "except", "intersect", "having", "window",
    "fetch", "for", "lateral",
];

/// Operators that compare a column with a value.
const COMPARISON_SYMBOLS: &[&str] = &["=", "<>", "!=", "<", ">", "<=", ">=", "~", "!~"];
const COMPARISON_WORDS: &[&str] = &["in", "like", "ilike", "not", "is", "between", "similar", "any"];

/// Keywords that can widen a customer filter beyond a plain conjunction.
const WIDENING_KEYWORDS: &[&str] = &["or", "not", "case", "union", "intersect", "except"];

/// A relation whose rows belong to a customer only through a parent relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentRelation {
    /// The dependent relation, e.g. `transactions`.
    pub relation: String,
    /// Column referencing the parent, e.g. `account_id`.
    pub key: String,
    /// Customer-scoped parent relation, e.g. `accounts`.
    pub parent: String,
    /// Parent column the key references, e.g. `id`.
    #[serde(default = "default_parent_key")]
    pub parent_key: String,
}

fn default_parent_key() -> String {
    "id".to_string()
}

/// Configuration of the query policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyConfig {
    /// The only schema the model may see.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Column holding the owning customer's id.
    #[serde(default = "default_customer_column")]
    pub customer_column: String,
    /// Relations that must be filtered by the customer column.
    #[serde(default = "default_customer_scoped")]
    pub customer_scoped: Vec<String>,
    /// Relations reachable only through a customer-scoped parent.
    #[serde(default = "default_dependents")]
    pub dependents: Vec<DependentRelation>,
}

fn default_namespace() -> String {
    "public".to_string()
}

fn default_customer_column() -> String {
    "customer_id".to_string()
}

fn default_customer_scoped() -> Vec<String> {
    vec!["accounts".to_string()]
}

fn default_dependents() -> Vec<DependentRelation> {
    vec![DependentRelation {
        relation: "transactions".to_string(),
        key: "account_id".to_string(),
        parent: "accounts".to_string(),
        parent_key: default_parent_key(),
    }]
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            customer_column: default_customer_column(),
            customer_scoped: default_customer_scoped(),
            dependents: default_dependents(),
        }
    }
}

/// Key values resolved by customer-scoped lookups, per parent relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedIdentifiers(BTreeMap<String, BTreeSet<String>>);

impl ResolvedIdentifiers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records identifiers resolved from `parent`.
    pub fn record(&mut self, parent: &str, identifiers: impl IntoIterator<Item = String>) {
        self.0
            .entry(parent.to_string())
            .or_default()
            .extend(identifiers);
    }

    #[must_use]
    pub fn contains(&self, parent: &str, identifier: &str) -> bool {
        self.0.get(parent).is_some_and(|ids| ids.contains(identifier))
    }

    #[must_use]
    pub fn get(&self, parent: &str) -> Option<&BTreeSet<String>> {
        self.0.get(parent)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// What the policy learned about an accepted query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPlan {
    /// Relations the query reads, lowercased.
    pub relations: Vec<String>,
    /// Parent relation and key column whose values the rows resolve.
    pub resolves: Option<(String, String)>,
}

impl QueryPlan {
    /// Collects the resolved key values from the query's result rows.
    #[must_use]
    pub fn resolved_from(&self, rows: &[JsonValue]) -> Option<(String, Vec<String>)> {
        let (parent, key) = self.resolves.as_ref()?;
        let identifiers: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get(key))
            .filter_map(|value| match value {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect();
        Some((parent.clone(), identifiers))
    }
}

/// A relation named in a FROM or JOIN clause.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RelationRef {
    name: String,
    alias: Option<String>,
}

impl RelationRef {
    /// Names a column qualifier may use to refer to this relation.
    fn qualifiers(&self) -> Vec<String> {
        std::iter::once(self.name.clone()).chain(self.alias.clone()).collect()
    }
}

/// Values a column is compared against in a query.
#[derive(Debug, Default)]
struct ColumnFilter {
    /// Literals the column is compared to with `=` or `IN (...)`.
    literals: Vec<String>,
    /// The column is compared some other way.
    other_comparison: bool,
    /// The column appears at all.
    mentioned: bool,
}

/// The query policy.
#[derive(Debug, Clone, Default)]
pub struct QueryPolicy {
    config: PolicyConfig,
}

impl QueryPolicy {
    #[must_use]
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Checks the schemas requested from `list_tables`.
    ///
    /// An empty request means the fixed namespace.
    ///
    /// # Errors
    ///
    /// Returns `WrongNamespace` for any other schema.
    pub fn check_namespaces(&self, requested: &[String]) -> Result<(), PolicyViolation> {
        match requested
            .iter()
            .find(|schema| !schema.eq_ignore_ascii_case(&self.config.namespace))
        {
            Some(schema) => Err(PolicyViolation::WrongNamespace {
                requested: schema.clone(),
                allowed: self.config.namespace.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Checks `sql` for `customer_id` given what has been resolved so far.
    ///
    /// # Errors
    ///
    /// Returns the first policy the query violates.
    pub fn check(
        &self,
        sql: &str,
        customer_id: &CustomerId,
        resolved: &ResolvedIdentifiers,
    ) -> Result<QueryPlan, PolicyViolation> {
        let tokens = tokenize(sql)?;
        if let Some(keyword) = tokens.iter().find_map(mutating_keyword) {
            return Err(PolicyViolation::MutatingKeyword { keyword });
        }
        check_single_statement(&tokens)?;
        if !tokens
            .first()
            .is_some_and(|t| t.is_keyword("select") || t.is_keyword("with"))
        {
            return Err(PolicyViolation::NotAQuery);
        }

        let references = self.relations(&tokens)?;
        let relations: Vec<String> = references.iter().map(|r| r.name.clone()).collect();

        let protected: Vec<&RelationRef> = references
            .iter()
            .filter(|r| self.is_scoped(&r.name) || self.dependent(&r.name).is_some())
            .collect();
        if let Some(first) = protected.first() {
            if let Some(keyword) = WIDENING_KEYWORDS
                .iter()
                .find(|keyword| tokens.iter().any(|t| t.is_keyword(keyword)))
            {
                return Err(PolicyViolation::UnsupportedLogic {
                    relation: first.name.clone(),
                    keyword: keyword.to_ascii_uppercase(),
                });
            }
            if protected.len() > 1 {
                return Err(PolicyViolation::MultipleScopedRelations {
                    relations: protected.iter().map(|r| r.name.clone()).collect(),
                });
            }
            if tokens.iter().filter(|t| t.is_keyword("select")).count() > 1 {
                return Err(PolicyViolation::NestedQuery {
                    relation: first.name.clone(),
                });
            }
        }

        // Filters only count when they qualify the protected reference itself.
        if let [reference] = protected.as_slice() {
            let qualifiers = reference.qualifiers();
            if self.is_scoped(&reference.name) {
                self.check_customer_filter(&tokens, reference, &qualifiers, customer_id)?;
            }
            if let Some(dependent) = self.dependent(&reference.name) {
                self.check_dependent_filter(&tokens, dependent, &qualifiers, resolved)?;
            }
        }

        let resolves = match protected.as_slice() {
            [reference] if self.is_scoped(&reference.name) && self.dependent(&reference.name).is_none() => self
                .config
                .dependents
                .iter()
                .find(|d| d.parent.eq_ignore_ascii_case(&reference.name))
                .map(|d| (d.parent.clone(), d.parent_key.clone())),
            _ => None,
        };

        debug!(?relations, resolves = resolves.is_some(), "query accepted");
        Ok(QueryPlan { relations, resolves })
    }

    fn is_scoped(&self, relation: &str) -> bool {
        self.config
            .customer_scoped
            .iter()
            .any(|s| s.eq_ignore_ascii_case(relation))
    }

    fn dependent(&self, relation: &str) -> Option<&DependentRelation> {
        self.config
            .dependents
            .iter()
            .find(|d| d.relation.eq_ignore_ascii_case(relation))
    }

    fn check_customer_filter(
        &self,
        tokens: &[Token],
        reference: &RelationRef,
        qualifiers: &[String],
        customer_id: &CustomerId,
    ) -> Result<(), PolicyViolation> {
        let filter = column_filter(tokens, &self.config.customer_column, Some(qualifiers));
        if filter.other_comparison
            || filter
                .literals
                .iter()
                .any(|literal| literal != customer_id.as_str())
        {
            return Err(PolicyViolation::ForeignCustomer {
                relation: reference.name.clone(),
            });
        }
        if filter.literals.is_empty() {
            return Err(PolicyViolation::MissingCustomerFilter {
                relation: reference.name.clone(),
            });
        }
        Ok(())
    }

    fn check_dependent_filter(
        &self,
        tokens: &[Token],
        dependent: &DependentRelation,
        qualifiers: &[String],
        resolved: &ResolvedIdentifiers,
    ) -> Result<(), PolicyViolation> {
        if column_filter(tokens, &self.config.customer_column, None).mentioned {
            return Err(PolicyViolation::CustomerFilterOnDependent {
                relation: dependent.relation.clone(),
            });
        }

        let key_filter = column_filter(tokens, &dependent.key, Some(qualifiers));
        if key_filter.other_comparison || key_filter.literals.is_empty() {
            return Err(PolicyViolation::MissingDependentFilter {
                relation: dependent.relation.clone(),
                key: dependent.key.clone(),
            });
        }

        let unresolved: Vec<String> = key_filter
            .literals
            .into_iter()
            .filter(|literal| !resolved.contains(&dependent.parent, literal))
            .collect();
        if !unresolved.is_empty() {
            return Err(PolicyViolation::UnresolvedIdentifiers {
                relation: dependent.relation.clone(),
                parent: dependent.parent.clone(),
                identifiers: unresolved,
            });
        }
        Ok(())
    }

    /// Collects the relations named after FROM and JOIN, with their aliases.
    fn relations(&self, tokens: &[Token]) -> Result<Vec<RelationRef>, PolicyViolation> {
        let mut relations = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            if !(tokens[i].is_keyword("from") || tokens[i].is_keyword("join")) {
                i += 1;
                continue;
            }
            i += 1;

            loop {
                let Some(name) = tokens.get(i).and_then(Token::identifier) else {
                    break;
                };
                let mut relation = name;
                i += 1;
                if tokens.get(i).is_some_and(|t| t.is_symbol("."))
                    && let Some(qualified) = tokens.get(i + 1).and_then(Token::identifier)
                {
                    if !relation.eq_ignore_ascii_case(&self.config.namespace) {
                        return Err(PolicyViolation::ForeignNamespace { schema: relation });
                    }
                    relation = qualified;
                    i += 2;
                }
                if relation.starts_with("pg_") {
                    return Err(PolicyViolation::ForeignNamespace {
                        schema: "pg_catalog".to_string(),
                    });
                }

                let explicit = tokens.get(i).is_some_and(|t| t.is_keyword("as"));
                if explicit {
                    i += 1;
                }
                let alias = match tokens.get(i) {
                    Some(Token::Word(word))
                        if explicit || !CLAUSE_KEYWORDS.contains(&word.to_ascii_lowercase().as_str()) =>
                    {
                        Some(word.to_ascii_lowercase())
                    }
                    Some(Token::Quoted(quoted)) => Some(quoted.clone()),
                    _ => None,
                };
                if alias.is_some() {
                    i += 1;
                }
                relations.push(RelationRef { name: relation, alias });

                if tokens.get(i).is_some_and(|t| t.is_symbol(",")) {
                    i += 1;
                } else {
                    break;
                }
            }
        }

        Ok(relations)
    }
}

fn mutating_keyword(token: &Token) -> Option<String> {
    match token {
        Token::Word(word) if MUTATING_KEYWORDS.contains(&word.to_ascii_lowercase().as_str()) => {
            Some(word.to_ascii_uppercase())
        }
        _ => None,
    }
}

fn check_single_statement(tokens: &[Token]) -> Result<(), PolicyViolation> {
    let last_content = tokens.iter().rposition(|t| !t.is_symbol(";"));
    let separator = tokens.iter().position(|t| t.is_symbol(";"));
    match (separator, last_content) {
        (Some(sep), Some(last)) if sep < last => Err(PolicyViolation::MultipleStatements),
        _ => Ok(()),
    }
}

fn is_comparison(token: &Token) -> bool {
    match token {
        Token::Symbol(s) => COMPARISON_SYMBOLS.contains(&s.as_str()),
        Token::Word(w) => COMPARISON_WORDS.contains(&w.to_ascii_lowercase().as_str()),
        _ => false,
    }
}

/// Finds how `column` is compared throughout the query.
///
/// With `bound_to`, references qualified by any other name are ignored.
fn column_filter(tokens: &[Token], column: &str, bound_to: Option<&[String]>) -> ColumnFilter {
    let mut filter = ColumnFilter::default();

    for (k, token) in tokens.iter().enumerate() {
        if !token
            .identifier()
            .is_some_and(|name| name.eq_ignore_ascii_case(column))
        {
            continue;
        }
        let qualifier = (k >= 2 && tokens[k - 1].is_symbol("."))
            .then(|| tokens[k - 2].identifier())
            .flatten();
        if let (Some(allowed), Some(qualifier)) = (bound_to, &qualifier)
            && !allowed.iter().any(|name| name.eq_ignore_ascii_case(qualifier))
        {
            continue;
        }
        filter.mentioned = true;

        let next = tokens.get(k + 1);
        if next.is_some_and(|t| t.is_symbol("=")) {
            match tokens.get(k + 2).and_then(Token::literal) {
                Some(value) => filter.literals.push(value.to_string()),
                None if tokens.get(k + 2).is_some_and(|t| t.identifier().is_some()) => {}
                None => filter.other_comparison = true,
            }
            continue;
        }
        if next.is_some_and(|t| t.is_keyword("in")) {
            match in_list(tokens, k + 2) {
                Some(values) => filter.literals.extend(values),
                None => filter.other_comparison = true,
            }
            continue;
        }
        if next.is_some_and(is_comparison) {
            filter.other_comparison = true;
            continue;
        }

        // Step back over a qualifier such as `a.` in `a.customer_id`.
        let start = if qualifier.is_some() { k - 2 } else { k };
        let before = start.checked_sub(1).and_then(|p| tokens.get(p));
        if before.is_some_and(|t| t.is_symbol("=")) {
            match start.checked_sub(2).and_then(|p| tokens.get(p)) {
                Some(t) if t.literal().is_some() => {
                    filter.literals.extend(t.literal().map(str::to_string));
                }
                Some(t) if t.identifier().is_some() => {}
                _ => filter.other_comparison = true,
            }
        } else if before.is_some_and(is_comparison) {
            filter.other_comparison = true;
        }
    }

    filter
}

/// Reads `( literal, literal, ... )` starting at `start`.
fn in_list(tokens: &[Token], start: usize) -> Option<Vec<String>> {
    if !tokens.get(start)?.is_symbol("(") {
        return None;
    }
    let mut values = Vec::new();
    let mut i = start + 1;
    loop {
        values.push(tokens.get(i)?.literal()?.to_string());
        i += 1;
        // Skip a cast such as 'x'::uuid.
        if tokens.get(i).is_some_and(|t| t.is_symbol("::")) {
            i += 2;
        }
        match tokens.get(i)? {
            t if t.is_symbol(",") => i += 1,
            t if t.is_symbol(")") => return Some(values),
            _ => return None,
        }
    }
}
