//! The form query language.
//!
//! A restricted SQL subset that end users type into the query editor:
//!
//! ```text
//! statement    := select_stmt | insert_stmt
//! select_stmt  := SELECT select_list FROM [FORM] form_ref [WHERE predicate]
//!                 [ORDER BY column_ref [ASC|DESC]] [LIMIT n]
//! insert_stmt  := INSERT [INTO] [FORM] form_ref "(" column_list ")"
//!                 ( VALUES "(" value_list ")" | select_stmt )
//! select_list  := "*" | column_ref ("," column_ref)* | aggregate_call
//! column_ref   := FIELD("id") | identifier | "quoted"
//! predicate    := comparison ((AND | OR) comparison)*
//! ```
//!
//! # Example
//!
//! ```ignore
//! use formql::query::{self, QueryMode};
//!
//! let parsed = query::parse(r#"SELECT Status FROM intake"#, &cache, QueryMode::ReadOnly);
//! match parsed.sql {
//!     Some(sql) => println!("{}", sql),
//!     None => {
//!         for err in &parsed.errors {
//!             eprintln!("{}", err);
//!         }
//!     }
//! }
//! ```

pub mod ast;
pub mod diagnostic;
pub mod emit;
pub mod execute;
pub mod lexer;
pub mod parser;
pub mod resolve;
pub mod span;
pub mod validation;
pub mod variables;

pub use ast::{Statement, StatementKind};
pub use diagnostic::{Diagnostic, DiagnosticKind, ParseError, Severity};
pub use execute::{
    ExecutionError, ExecutionSink, QueryEngine, QueryResult, RunOutcome, StatementOutcome,
};
pub use resolve::{FieldResolver, Resolution, ResolveError, ResolvedField};
pub use span::{Span, Spanned};
pub use variables::{
    extract_query_variables, replace_query_variables, Substitution, VariableContext,
    VariableValue,
};

use serde::Serialize;

use crate::schema::SchemaCache;

/// Which statements a caller may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// The query editor: SELECT only.
    #[default]
    ReadOnly,
    /// SELECT and INSERT.
    ReadWrite,
}

impl QueryMode {
    pub fn allows(&self, kind: StatementKind) -> bool {
        match self {
            QueryMode::ReadOnly => kind == StatementKind::Select,
            QueryMode::ReadWrite => true,
        }
    }

    /// Message for a statement this mode does not accept.
    pub fn rejection_message(&self) -> &'static str {
        match self {
            QueryMode::ReadOnly => "Only SELECT statements allowed",
            QueryMode::ReadWrite => "Only SELECT and INSERT statements allowed",
        }
    }
}

/// Knobs for `parse_with`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub mode: QueryMode,
    /// Upper bound on collected errors.
    pub max_errors: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            mode: QueryMode::ReadOnly,
            max_errors: 50,
        }
    }
}

impl ParseOptions {
    pub fn new(mode: QueryMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// Result of checking one query.
///
/// Exactly one of `sql` and `errors` is non-empty.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedQuery {
    /// Canonical statement text, with every reference rewritten to its id.
    pub sql: Option<String>,
    /// Errors in report order: syntax first, then unknown form, then fields.
    pub errors: Vec<ParseError>,
    /// Non-blocking diagnostics such as ambiguous labels.
    pub warnings: Vec<Diagnostic>,
    /// Template variables referenced by the query text.
    pub variables: Vec<String>,
    pub kind: Option<StatementKind>,
    /// Canonical id of the statement's target form.
    pub form_id: Option<String>,
    /// Whether the canonical statement still carries `{{...}}` placeholders.
    #[serde(skip)]
    placeholders: bool,
}

impl ParsedQuery {
    /// Returns true if the query can be handed to the execution sink.
    pub fn is_ok(&self) -> bool {
        self.sql.is_some() && self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Whether unsubstituted placeholders remain in the canonical text.
    pub fn needs_substitution(&self) -> bool {
        self.sql.is_some() && self.placeholders
    }

    /// Turn a query that still needs substitution into a rejected one.
    pub(crate) fn reject_placeholders(mut self) -> Self {
        self.errors.push(Diagnostic::syntax(
            0..0,
            "Template variables must be substituted before execution",
        ));
        self.sql = None;
        self
    }

    fn rejected(errors: Vec<ParseError>, variables: Vec<String>) -> Self {
        Self {
            sql: None,
            errors,
            warnings: Vec::new(),
            variables,
            kind: None,
            form_id: None,
            placeholders: false,
        }
    }
}

/// Parse and validate a query with default options for `mode`.
pub fn parse(source: &str, cache: &SchemaCache, mode: QueryMode) -> ParsedQuery {
    parse_with(source, cache, &ParseOptions::new(mode))
}

/// Parse and validate a query.
///
/// Runs lexing, the leading-keyword check, parsing, and validation against
/// `cache`. Semantic checks only run on syntactically valid input.
pub fn parse_with(source: &str, cache: &SchemaCache, options: &ParseOptions) -> ParsedQuery {
    use chumsky::error::Rich;
    use chumsky::input::Input;
    use chumsky::span::SimpleSpan;
    use chumsky::Parser as _;

    let variables = extract_query_variables(source);
    let cap = |mut errors: Vec<ParseError>| {
        errors.truncate(options.max_errors.max(1));
        errors
    };

    // Step 1: Lexical analysis
    let tokens = match lexer::lex(source) {
        Ok(tokens) => tokens,
        Err(errs) => {
            let errors = errs
                .into_iter()
                .map(|e: Rich<'_, char>| {
                    let span = e.span();
                    Diagnostic::syntax(span.start..span.end, e.to_string())
                })
                .collect();
            return ParsedQuery::rejected(cap(errors), variables);
        }
    };

    // Step 2: Leading keyword
    if let Some(err) = check_leading_keyword(&tokens, options.mode) {
        return ParsedQuery::rejected(vec![err], variables);
    }

    // Step 3: Parsing
    let len = source.len();
    let eoi: SimpleSpan = (len..len).into();
    let token_stream = tokens.as_slice().map(
        eoi,
        |(tok, span): &(lexer::Token<'_>, SimpleSpan)| (tok, span),
    );
    let (statement, parse_errs) = parser::parser().parse(token_stream).into_output_errors();

    let statement = match statement {
        Some(stmt) if parse_errs.is_empty() => stmt,
        _ => {
            let errors = parse_errs
                .into_iter()
                .map(|e: Rich<'_, lexer::Token<'_>, SimpleSpan>| {
                    let span = e.span();
                    Diagnostic::syntax(span.start..span.end, e.to_string())
                })
                .collect();
            return ParsedQuery::rejected(cap(errors), variables);
        }
    };
    let kind = statement.kind();

    // Step 4: Validation and canonical emission
    let checked = validation::validate(statement, cache);
    let (errors, warnings): (Vec<_>, Vec<_>) = checked
        .diagnostics
        .into_iter()
        .partition(Diagnostic::is_error);

    match checked.statement {
        Some(canonical) if errors.is_empty() => {
            let tokens = emit::to_tokens(&canonical);
            ParsedQuery {
                sql: Some(tokens.serialize()),
                errors: Vec::new(),
                warnings,
                variables,
                kind: Some(kind),
                form_id: checked.form_id,
                placeholders: tokens.has_placeholders(),
            }
        }
        _ => ParsedQuery {
            sql: None,
            errors: cap(errors),
            warnings,
            variables,
            kind: Some(kind),
            form_id: checked.form_id,
            placeholders: false,
        },
    }
}

/// Reject empty input and statements the mode does not allow, before the
/// grammar reports something less helpful.
fn check_leading_keyword(
    tokens: &[(lexer::Token<'_>, chumsky::span::SimpleSpan)],
    mode: QueryMode,
) -> Option<ParseError> {
    let Some((first, span)) = tokens.first() else {
        return Some(Diagnostic::syntax(0..0, "Empty query"));
    };
    let kind = match first {
        lexer::Token::Select => StatementKind::Select,
        lexer::Token::Insert => StatementKind::Insert,
        _ => {
            return Some(Diagnostic::syntax(
                span.start..span.end,
                mode.rejection_message(),
            ))
        }
    };
    (!mode.allows(kind)).then(|| Diagnostic::syntax(span.start..span.end, mode.rejection_message()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, FieldType, FormDefinition};

    fn cache() -> SchemaCache {
        SchemaCache::from_forms(vec![FormDefinition::new("F", "Requests")
            .with_field(FieldDefinition::new("abc123", "Status", FieldType::Select))
            .with_field(FieldDefinition::new("n1", "Name", FieldType::Text))])
    }

    #[test]
    fn test_delete_rejected_in_read_only() {
        let parsed = parse("DELETE FROM F", &cache(), QueryMode::ReadOnly);
        assert!(parsed.sql.is_none());
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].kind, DiagnosticKind::Syntax);
        assert_eq!(parsed.errors[0].message, "Only SELECT statements allowed");
        assert_eq!(parsed.errors[0].span, 0..6);
    }

    #[test]
    fn test_insert_rejected_in_read_only_allowed_in_read_write() {
        let q = "INSERT F (Name) VALUES ('Bob')";
        let ro = parse(q, &cache(), QueryMode::ReadOnly);
        assert_eq!(ro.errors[0].message, "Only SELECT statements allowed");

        let rw = parse(q, &cache(), QueryMode::ReadWrite);
        assert!(rw.is_ok(), "{:?}", rw.errors);
        assert_eq!(rw.kind, Some(StatementKind::Insert));
    }

    #[test]
    fn test_update_rejected_in_read_write() {
        let parsed = parse("UPDATE F SET a = 1", &cache(), QueryMode::ReadWrite);
        assert_eq!(
            parsed.errors[0].message,
            "Only SELECT and INSERT statements allowed"
        );
    }

    #[test]
    fn test_empty_query() {
        let parsed = parse("  -- nothing\n", &cache(), QueryMode::ReadOnly);
        assert_eq!(parsed.errors[0].message, "Empty query");
    }

    #[test]
    fn test_syntax_errors_block_semantic_checks() {
        let parsed = parse("SELECT Missing FROM nowhere WHERE", &cache(), QueryMode::ReadOnly);
        assert!(parsed.has_errors());
        assert!(parsed
            .errors
            .iter()
            .all(|e| e.kind == DiagnosticKind::Syntax));
    }

    #[test]
    fn test_valid_query_has_sql_and_no_errors() {
        let parsed = parse("select status from requests", &cache(), QueryMode::ReadOnly);
        assert_eq!(parsed.sql.as_deref(), Some(r#"SELECT "abc123" FROM "F""#));
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.form_id.as_deref(), Some("F"));
    }

    #[test]
    fn test_variables_listed_and_kept() {
        let parsed = parse(
            "SELECT * FROM F WHERE Name = {{ current_user_id }}",
            &cache(),
            QueryMode::ReadOnly,
        );
        assert_eq!(parsed.variables, vec!["current_user_id"]);
        assert!(parsed.needs_substitution());
        assert_eq!(
            parsed.sql.as_deref(),
            Some(r#"SELECT * FROM "F" WHERE "n1" = {{current_user_id}}"#)
        );
    }

    #[test]
    fn test_error_cap() {
        let options = ParseOptions {
            mode: QueryMode::ReadOnly,
            max_errors: 1,
        };
        let parsed = parse_with("SELECT A, B, C FROM F", &cache(), &options);
        assert_eq!(parsed.errors.len(), 1);
    }
}
