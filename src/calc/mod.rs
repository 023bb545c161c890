//! Calculation engine for computed form fields.
//!
//! A calculation is a single expression such as
//! `ROUND(DIVIDE(#total, #count), 2)`. Evaluation runs in two stages:
//!
//! 1. Aggregate calls (`SUM(#score)`, `COUNT()`) that read other
//!    submissions are collected from the tree and their columns fetched in
//!    one pass through the [`SubmissionSource`] and [`AggregateCache`].
//! 2. The tree is evaluated synchronously against the form data and the
//!    prefetched columns.
//!
//! # Example
//!
//! ```ignore
//! use formql::calc::{CalculationContext, CalculationEngine};
//!
//! let engine = CalculationEngine::new();
//! let ctx = CalculationContext::new().with_field("price", 12.5).with_field("qty", 4);
//! let total = engine.evaluate_local("MULTIPLY(#price, #qty)", &ctx)?;
//! ```

pub mod aggregate;
pub mod ast;
pub mod error;
mod eval;
pub mod functions;
pub mod parser;
pub mod validate;
pub mod value;

pub use aggregate::{AggregateCache, InMemorySubmissions, SourceError, Submission, SubmissionSource};
pub use ast::Expr;
pub use error::{CalcError, CalcResult};
pub use functions::{catalog, lookup, Category, FunctionSpec};
pub use parser::parse_expression;
pub use validate::{validate_expression, ExpressionValidation};
pub use value::Value;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::CalculationSettings;
use crate::query::span::Spanned;
use eval::{aggregate_needs, Evaluator};
use functions::Env;

/// Inputs for one evaluation.
#[derive(Debug, Clone, Default)]
pub struct CalculationContext {
    /// Current field values of the submission being edited, by field id.
    pub form_data: BTreeMap<String, serde_json::Value>,
    /// Form whose submissions aggregates run over.
    pub target_form_id: Option<String>,
    /// Submissions supplied by the caller; skips the source when set.
    pub all_submissions: Option<Vec<Submission>>,
    /// Fixed clock for NOW/TODAY; the system clock when unset.
    pub now: Option<DateTime<Utc>>,
}

impl CalculationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form_data(mut self, form_data: BTreeMap<String, serde_json::Value>) -> Self {
        self.form_data = form_data;
        self
    }

    pub fn with_field(mut self, id: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.form_data.insert(id.into(), value.into());
        self
    }

    pub fn with_target_form(mut self, form_id: impl Into<String>) -> Self {
        self.target_form_id = Some(form_id.into());
        self
    }

    pub fn with_submissions(mut self, rows: Vec<Submission>) -> Self {
        self.all_submissions = Some(rows);
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn env(&self) -> Env {
        Env {
            now: self.now.unwrap_or_else(Utc::now),
        }
    }
}

/// Evaluates calculation expressions.
#[derive(Clone)]
pub struct CalculationEngine {
    source: Option<Arc<dyn SubmissionSource>>,
    cache: Arc<AggregateCache>,
}

impl std::fmt::Debug for CalculationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculationEngine")
            .field("has_source", &self.source.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}

impl Default for CalculationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CalculationEngine {
    /// An engine with no submission source. Aggregates work only over
    /// caller-supplied submissions or inline lists.
    pub fn new() -> Self {
        Self {
            source: None,
            cache: Arc::new(AggregateCache::disabled()),
        }
    }

    pub fn with_source(source: Arc<dyn SubmissionSource>, cache: Arc<AggregateCache>) -> Self {
        Self {
            source: Some(source),
            cache,
        }
    }

    /// Build from settings, creating the aggregate cache they describe.
    pub fn from_settings(settings: &CalculationSettings, source: Arc<dyn SubmissionSource>) -> Self {
        let cache = if settings.aggregate_cache_enabled {
            AggregateCache::new(Duration::from_secs(settings.aggregate_cache_ttl_seconds))
        } else {
            AggregateCache::disabled()
        };
        Self::with_source(source, Arc::new(cache))
    }

    pub fn cache(&self) -> &AggregateCache {
        &self.cache
    }

    /// Parse and evaluate `expression`, fetching aggregate columns as needed.
    pub async fn evaluate(&self, expression: &str, ctx: &CalculationContext) -> CalcResult<Value> {
        let expr = parse_expression(expression)?;
        self.evaluate_expr(&expr, ctx).await
    }

    /// Evaluate an already parsed expression.
    pub async fn evaluate_expr(
        &self,
        expr: &Spanned<Expr>,
        ctx: &CalculationContext,
    ) -> CalcResult<Value> {
        let columns = self.prefetch(expr, ctx).await?;
        self.run(expr, ctx, &columns)
    }

    /// Evaluate without touching the submission source.
    ///
    /// Aggregates over fields read `ctx.all_submissions`; without them they
    /// fail with an aggregate error.
    pub fn evaluate_local(&self, expression: &str, ctx: &CalculationContext) -> CalcResult<Value> {
        let expr = parse_expression(expression)?;
        let columns = local_columns(&expr.value, ctx);
        self.run(&expr, ctx, &columns)
    }

    fn run(
        &self,
        expr: &Spanned<Expr>,
        ctx: &CalculationContext,
        columns: &BTreeMap<String, Arc<Vec<Value>>>,
    ) -> CalcResult<Value> {
        Evaluator {
            data: &ctx.form_data,
            columns,
            target_form_id: ctx.target_form_id.as_deref(),
            env: ctx.env(),
        }
        .eval(expr)
    }

    async fn prefetch(
        &self,
        expr: &Spanned<Expr>,
        ctx: &CalculationContext,
    ) -> CalcResult<BTreeMap<String, Arc<Vec<Value>>>> {
        if ctx.all_submissions.is_some() {
            return Ok(local_columns(&expr.value, ctx));
        }
        let needs = aggregate_needs(&expr.value);
        let (Some(first), Some(source), Some(form_id)) =
            (needs.first(), self.source.as_deref(), ctx.target_form_id.as_deref())
        else {
            return Ok(BTreeMap::new());
        };

        let mut keys: Vec<String> = needs.iter().map(|(_, input)| input.key().to_string()).collect();
        keys.sort();
        keys.dedup();

        self.cache
            .columns(source, form_id, &keys)
            .await
            .map_err(|e| CalcError::Aggregate {
                function: first.0.to_ascii_uppercase(),
                form_id: form_id.to_string(),
                message: e.0,
            })
    }
}

/// Columns for aggregate calls taken from caller-supplied submissions.
fn local_columns(expr: &Expr, ctx: &CalculationContext) -> BTreeMap<String, Arc<Vec<Value>>> {
    let Some(rows) = ctx.all_submissions.as_deref() else {
        return BTreeMap::new();
    };
    aggregate_needs(expr)
        .into_iter()
        .map(|(_, input)| {
            let key = input.key().to_string();
            let column = Arc::new(aggregate::column(rows, &key));
            (key, column)
        })
        .collect()
}

/// Evaluate `expression` with a default engine and no submission source.
pub fn evaluate_formula(expression: &str, ctx: &CalculationContext) -> CalcResult<Value> {
    CalculationEngine::new().evaluate_local(expression, ctx)
}
