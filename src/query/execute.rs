//! Execution pipeline: substitute, resolve, hand off.
//!
//! ```text
//! raw text ──► replace_query_variables ──► parse_with(one cache snapshot)
//!                                               │
//!                          errors ◄─────────────┤
//!                                               ▼
//!                                     ExecutionSink::execute (once)
//!                                               │
//!                                               ▼
//!                                       StatementOutcome
//! ```
//!
//! A statement is sent to the sink at most once. Sink failures come back
//! verbatim as `ExecutionError` and are never retried.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::ast::StatementKind;
use super::diagnostic::{Diagnostic, DiagnosticKind};
use super::variables::{replace_query_variables, VariableContext};
use super::{parse_with, ParseOptions, ParsedQuery};
use crate::config::Settings;
use crate::error::CoreError;
use crate::schema::{SchemaCacheManager, SchemaError, SchemaProvider};

/// Errors reported by, or about, the execution sink.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// The sink refused or failed the statement.
    #[error("execution failed: {0}")]
    Failed(String),

    /// The sink could not be reached.
    #[error("execution sink unavailable: {0}")]
    Unavailable(String),

    /// The sink answered but flagged errors on the result.
    #[error("statement returned errors: {}", .0.join("; "))]
    Statement(Vec<String>),

    /// A row does not have one value per column.
    #[error("malformed result: row {row} has {found} values for {expected} columns")]
    MalformedResult {
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// Tabular result returned by the sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    pub errors: Vec<String>,
    /// Set by sinks for INSERT statements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self {
            columns,
            rows,
            errors: Vec::new(),
            rows_affected: None,
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    pub fn with_rows_affected(mut self, n: u64) -> Self {
        self.rows_affected = Some(n);
        self
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Check that every row has one value per column.
    pub fn check_shape(&self) -> Result<(), ExecutionError> {
        let expected = self.columns.len();
        match self.rows.iter().position(|r| r.len() != expected) {
            Some(row) => Err(ExecutionError::MalformedResult {
                row,
                found: self.rows[row].len(),
                expected,
            }),
            None => Ok(()),
        }
    }

    /// Rows can be shown: no errors and a consistent shape.
    pub fn is_trusted(&self) -> bool {
        self.errors.is_empty() && self.check_shape().is_ok()
    }
}

/// Runs canonical statements against the relational store.
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    /// Execute one statement. Timeouts are the sink's concern.
    async fn execute(&self, statement: &str) -> Result<QueryResult, ExecutionError>;
}

/// What a successfully executed statement produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatementOutcome {
    Rows(QueryResult),
    Inserted { rows_affected: u64 },
}

impl StatementOutcome {
    /// One-line summary for the editor's notification area.
    pub fn summary(&self) -> String {
        match self {
            StatementOutcome::Rows(result) => {
                let n = result.rows.len();
                format!("{} row{} returned", n, if n == 1 { "" } else { "s" })
            }
            StatementOutcome::Inserted { rows_affected } => format!(
                "Inserted {} row{}",
                rows_affected,
                if *rows_affected == 1 { "" } else { "s" }
            ),
        }
    }

    /// Summary for a statement the sink failed.
    pub fn failure_summary(kind: StatementKind, error: &ExecutionError) -> String {
        match kind {
            StatementKind::Select => format!("Query failed: {}", error),
            StatementKind::Insert => format!("Insert failed, no rows written: {}", error),
        }
    }
}

/// Result of `QueryEngine::run`.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Parsing or validation failed; nothing was executed.
    Rejected(ParsedQuery),
    Executed {
        query: ParsedQuery,
        outcome: StatementOutcome,
    },
}

impl RunOutcome {
    pub fn query(&self) -> &ParsedQuery {
        match self {
            RunOutcome::Rejected(query) => query,
            RunOutcome::Executed { query, .. } => query,
        }
    }
}

/// Drives a query from raw text to an executed statement.
pub struct QueryEngine<P: SchemaProvider, S: ExecutionSink> {
    schema: Arc<SchemaCacheManager<P>>,
    sink: Arc<S>,
    options: ParseOptions,
}

impl<P: SchemaProvider, S: ExecutionSink> QueryEngine<P, S> {
    pub fn new(schema: Arc<SchemaCacheManager<P>>, sink: Arc<S>, options: ParseOptions) -> Self {
        Self {
            schema,
            sink,
            options,
        }
    }

    /// Build from settings, loading the schema cache up front when
    /// `schema.preload` is set.
    pub async fn from_settings(
        schema: Arc<SchemaCacheManager<P>>,
        sink: Arc<S>,
        settings: &Settings,
    ) -> Result<Self, SchemaError> {
        if settings.schema.preload {
            let cache = schema.get_cache().await?;
            debug!(forms = cache.len(), "schema preloaded");
        }
        Ok(Self::new(schema, sink, settings.query.parse_options()))
    }

    pub fn schema(&self) -> &Arc<SchemaCacheManager<P>> {
        &self.schema
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Substitute and validate without executing.
    pub async fn check(
        &self,
        text: &str,
        context: &VariableContext,
    ) -> Result<ParsedQuery, SchemaError> {
        let substitution = replace_query_variables(text, context);
        let cache = self.schema.get_cache().await?;
        let mut parsed = parse_with(&substitution.text, &cache, &self.options);

        for name in substitution.unresolved {
            parsed.warnings.push(Diagnostic::warning(
                DiagnosticKind::UnresolvedVariable,
                name.span.clone(),
                format!("variable '{}' has no value; using NULL", name.value),
            ));
        }
        Ok(parsed)
    }

    /// Substitute, validate, and execute once.
    ///
    /// Returns `Ok(RunOutcome::Rejected)` when the query has errors; the
    /// sink is not called in that case.
    pub async fn run(&self, text: &str, context: &VariableContext) -> Result<RunOutcome, CoreError> {
        let mut parsed = self.check(text, context).await?;
        if parsed.needs_substitution() {
            warn!("placeholders left after substitution");
            parsed = parsed.reject_placeholders();
        }
        let (Some(sql), Some(kind)) = (parsed.sql.clone(), parsed.kind) else {
            debug!(errors = parsed.errors.len(), "query rejected");
            return Ok(RunOutcome::Rejected(parsed));
        };

        info!(
            kind = ?kind,
            form_id = parsed.form_id.as_deref().unwrap_or_default(),
            "executing statement"
        );
        let result = match self.sink.execute(&sql).await {
            Ok(result) => result,
            Err(e) => {
                warn!(kind = ?kind, error = %e, "execution sink failed");
                return Err(e.into());
            }
        };

        if !result.errors.is_empty() {
            warn!(kind = ?kind, errors = result.errors.len(), "statement returned errors");
            return Err(ExecutionError::Statement(result.errors).into());
        }
        result.check_shape()?;

        let outcome = match kind {
            StatementKind::Select => StatementOutcome::Rows(result),
            StatementKind::Insert => StatementOutcome::Inserted {
                rows_affected: result.rows_affected.unwrap_or(result.rows.len() as u64),
            },
        };
        debug!(summary = %outcome.summary(), "statement complete");
        Ok(RunOutcome::Executed {
            query: parsed,
            outcome,
        })
    }
}
