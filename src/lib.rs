//! # formql
//!
//! Query and calculation engine for form submissions.
//!
//! ## Architecture
//!
//! Users write queries and formulas in terms of form fields. formql
//! resolves those references against the form schema and hands canonical
//! statements to an external store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Query text  /  Formula text                 │
//! │  (SELECT/INSERT with {{variables}}, #field formulas)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [variables, lexer, parser]
//! ┌─────────────────────────────────────────────────────────┐
//! │                     AST                                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [resolve + validation]  ◄── SchemaCache
//! ┌─────────────────────────────────────────────────────────┐
//! │          Canonical statement (ids only)                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [ExecutionSink]
//! ┌─────────────────────────────────────────────────────────┐
//! │        QueryResult ──► results (filter/sort/page)        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Formulas take a separate path through [`calc`]: parse, prefetch any
//! aggregate columns from a [`calc::SubmissionSource`], then evaluate
//! against the submission being edited.

pub mod calc;
pub mod config;
pub mod error;
pub mod hooks;
pub mod query;
pub mod results;
pub mod schema;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::calc::{
        evaluate_formula, validate_expression, CalcError, CalculationContext,
        CalculationEngine, SubmissionSource, Value,
    };
    pub use crate::config::Settings;
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::hooks::{QueryHook, SubmitEvent, SubmitQueryRegistry};
    pub use crate::query::{
        parse, parse_with, Diagnostic, DiagnosticKind, ExecutionSink, ParseOptions, ParsedQuery,
        QueryEngine, QueryMode, QueryResult, RunOutcome, VariableContext,
    };
    pub use crate::results::{
        FilterGroup, FilterOperator, GroupSpec, Page, ResultFilter, ResultView, SortSpec,
    };
    pub use crate::schema::{
        FieldDefinition, FieldType, FormDefinition, InMemorySchemaProvider, SchemaCache,
        SchemaCacheManager, SchemaProvider,
    };
}

pub use calc::{CalculationEngine, Value};
pub use error::{CoreError, CoreResult};
pub use query::{parse, ParsedQuery, QueryEngine, QueryMode};
pub use schema::{SchemaCache, SchemaCacheManager};
