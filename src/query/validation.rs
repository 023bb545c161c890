//! Semantic validation and canonicalization of parsed statements.
//!
//! The validator checks, in order:
//! - INSERT column and value counts agree (reported as syntax)
//! - every form reference resolves; the first unknown form stops validation
//! - every column reference resolves against its form
//!
//! On success every form and column reference in the returned statement is
//! rewritten to its canonical id, so emission never sees a label.

use std::sync::Arc;

use super::ast::*;
use super::diagnostic::{Diagnostic, DiagnosticKind};
use super::resolve::FieldResolver;
use super::span::{Span, Spanned};
use crate::schema::{FormDefinition, SchemaCache};

/// Result of validating one statement.
#[derive(Debug)]
pub struct Validation {
    /// The canonical statement, present only when no error was found.
    pub statement: Option<Statement>,
    /// Canonical id of the target form, once it resolved.
    pub form_id: Option<String>,
    /// Errors and warnings, errors first in discovery order.
    pub diagnostics: Vec<Diagnostic>,
}

impl Validation {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Validate a parsed statement against a schema snapshot.
///
/// # Example
///
/// ```ignore
/// use formql::query::validation;
///
/// let checked = validation::validate(statement, &cache);
/// if let Some(canonical) = checked.statement {
///     println!("{}", formql::query::emit::render(&canonical));
/// }
/// ```
pub fn validate(statement: Statement, cache: &SchemaCache) -> Validation {
    let mut validator = Validator::new(cache);
    let statement = validator.validate_statement(statement);
    Validation {
        statement,
        form_id: validator.form_id,
        diagnostics: validator.diagnostics,
    }
}

/// Internal validator state that collects diagnostics.
struct Validator<'c> {
    cache: &'c SchemaCache,
    form_id: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'c> Validator<'c> {
    fn new(cache: &'c SchemaCache) -> Self {
        Self {
            cache,
            form_id: None,
            diagnostics: Vec::new(),
        }
    }

    // ========================================================================
    // Diagnostic helpers
    // ========================================================================

    fn error(&mut self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(kind, span, message));
    }

    fn warning(&mut self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning(kind, span, message));
    }

    fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    // ========================================================================
    // Statement passes
    // ========================================================================

    fn validate_statement(&mut self, statement: Statement) -> Option<Statement> {
        // Pass 1: shape checks the grammar cannot express
        if let Statement::Insert(insert) = &statement {
            self.check_insert_arity(insert);
        }
        if self.has_errors() {
            return None;
        }

        // Pass 2: forms, then columns
        match statement {
            Statement::Select(select) => self.canonical_select(select).map(Statement::Select),
            Statement::Insert(insert) => self.canonical_insert(insert).map(Statement::Insert),
        }
    }

    fn check_insert_arity(&mut self, insert: &InsertStmt) {
        let expected = insert.columns.len();
        let (found, span) = match &insert.source {
            InsertSource::Values(values) => (Some(values.len()), values_span(values)),
            InsertSource::Select(select) => (
                select.projection.width(),
                Some(select.projection.span.clone()),
            ),
        };
        if let Some(found) = found.filter(|&n| n != expected) {
            self.error(
                DiagnosticKind::Syntax,
                span.unwrap_or_else(|| insert.form.span.clone()),
                format!(
                    "INSERT lists {} column{} but supplies {} value{}",
                    expected,
                    plural(expected),
                    found,
                    plural(found)
                ),
            );
        }
    }

    fn canonical_select(&mut self, mut select: SelectStmt) -> Option<SelectStmt> {
        let form = self.resolve_form(&mut select.form)?;
        self.form_id = Some(form.id.clone());
        self.canonicalize_select_columns(&mut select, &form);
        (!self.has_errors()).then_some(select)
    }

    fn canonical_insert(&mut self, mut insert: InsertStmt) -> Option<InsertStmt> {
        let target = self.resolve_form(&mut insert.form)?;
        self.form_id = Some(target.id.clone());

        // Both forms must resolve before any column is looked at.
        let source_form = match &mut insert.source {
            InsertSource::Select(select) => Some(self.resolve_form(&mut select.form)?),
            InsertSource::Values(_) => None,
        };

        let resolver = FieldResolver::new(&target);
        for column in &mut insert.columns {
            self.canonicalize_column(&resolver, column);
        }
        if let (InsertSource::Select(select), Some(source_form)) = (&mut insert.source, source_form)
        {
            self.canonicalize_select_columns(select, &source_form);
        }

        (!self.has_errors()).then_some(insert)
    }

    // ========================================================================
    // Reference resolution
    // ========================================================================

    /// Resolve a form reference in place, reporting `unknown_form` on failure.
    fn resolve_form(&mut self, form: &mut Spanned<String>) -> Option<Arc<FormDefinition>> {
        match self.cache.find_form(&form.value) {
            Some(def) => {
                let def = Arc::clone(def);
                form.value = def.id.clone();
                Some(def)
            }
            None => {
                self.error(
                    DiagnosticKind::UnknownForm,
                    form.span.clone(),
                    format!("unknown form '{}'", form.value),
                );
                None
            }
        }
    }

    fn canonicalize_select_columns(&mut self, select: &mut SelectStmt, form: &FormDefinition) {
        let resolver = FieldResolver::new(form);

        match &mut select.projection.value {
            Projection::Wildcard => {}
            Projection::Columns(columns) => {
                for column in columns {
                    self.canonicalize_column(&resolver, column);
                }
            }
            Projection::Aggregate { arg, .. } => {
                if let AggregateArg::Column(column) = arg {
                    self.canonicalize_column(&resolver, column);
                }
            }
        }

        if let Some(filter) = &mut select.filter {
            self.canonicalize_column(&resolver, &mut filter.first.column);
            for (_, comparison) in &mut filter.rest {
                self.canonicalize_column(&resolver, &mut comparison.column);
            }
        }

        if let Some(order) = &mut select.order_by {
            self.canonicalize_column(&resolver, &mut order.column);
        }
    }

    /// Rewrite a column reference to `FIELD("<canonical id>")`.
    fn canonicalize_column(&mut self, resolver: &FieldResolver<'_>, column: &mut Spanned<ColumnRef>) {
        match resolver.resolve(&column.value) {
            Ok(resolution) => {
                if resolution.is_ambiguous() {
                    self.warning(
                        DiagnosticKind::AmbiguousField,
                        column.span.clone(),
                        format!(
                            "'{}' matches several fields ({}, {}); using '{}'",
                            column.value.text(),
                            resolution.field.id,
                            resolution.also_matched.join(", "),
                            resolution.field.id
                        ),
                    );
                }
                column.value = ColumnRef::Field(resolution.field.id);
            }
            Err(e) => {
                self.error(DiagnosticKind::UnknownField, column.span.clone(), e.to_string());
            }
        }
    }
}

fn values_span(values: &[Spanned<Literal>]) -> Option<Span> {
    let first = values.first()?;
    let last = values.last()?;
    Some(first.span.start..last.span.end)
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
