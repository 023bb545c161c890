//! Tree-walking evaluator.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::ast::Expr;
use super::error::{CalcError, CalcResult};
use super::functions::statistics::Aggregate;
use super::functions::{self, values_equal, Args, Env, FunctionKind};
use super::value::Value;
use crate::query::span::Spanned;

/// What an aggregate call reads from the target form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AggregateInput {
    /// `COUNT()`: one entry per submission.
    Rows,
    /// `SUM(#field)` and friends.
    Column(String),
}

impl AggregateInput {
    pub(crate) fn key(&self) -> &str {
        match self {
            AggregateInput::Rows => super::aggregate::ROW_COUNT_KEY,
            AggregateInput::Column(id) => id,
        }
    }
}

/// Which submission column an aggregate call needs, if any.
///
/// Aggregates over a literal list or any other expression work on that
/// value alone and need nothing fetched.
pub(crate) fn aggregate_input(args: &[Spanned<Expr>]) -> Option<AggregateInput> {
    match args.first().map(|a| &a.value) {
        None => Some(AggregateInput::Rows),
        Some(Expr::Field(id)) => Some(AggregateInput::Column(id.clone())),
        Some(_) => None,
    }
}

/// Aggregate calls in `expr` that need submissions, with their function name.
pub(crate) fn aggregate_needs(expr: &Expr) -> Vec<(&str, AggregateInput)> {
    let mut needs = Vec::new();
    expr.walk(&mut |e| {
        if let Expr::Call { name, args, .. } = e {
            let is_aggregate = functions::lookup(name)
                .is_some_and(|f| matches!(f.kind, FunctionKind::Aggregate));
            if is_aggregate {
                if let Some(input) = aggregate_input(args) {
                    needs.push((name.as_str(), input));
                }
            }
        }
    });
    needs
}

pub(crate) struct Evaluator<'a> {
    pub data: &'a BTreeMap<String, serde_json::Value>,
    /// Prefetched aggregate columns keyed by field id (or the row-count key).
    pub columns: &'a BTreeMap<String, Arc<Vec<Value>>>,
    pub target_form_id: Option<&'a str>,
    pub env: Env,
}

impl Evaluator<'_> {
    pub fn eval(&self, expr: &Spanned<Expr>) -> CalcResult<Value> {
        match &expr.value {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Field(id) => Ok(self.data.get(id).map_or(Value::Null, Value::from_json)),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<CalcResult<Vec<_>>>()
                .map(Value::List),
            Expr::Call { name, args, .. } => self.call(name, args),
        }
    }

    fn call(&self, name: &str, args: &[Spanned<Expr>]) -> CalcResult<Value> {
        let spec =
            functions::lookup(name).ok_or_else(|| CalcError::UnknownFunction(name.to_string()))?;
        spec.check_arity(args.len())?;

        match spec.kind {
            FunctionKind::Native(f) => {
                let values = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<CalcResult<Vec<_>>>()?;
                f(&Args::new(spec.name, &values), &self.env)
            }
            FunctionKind::Lazy => self.lazy(spec.name, args),
            FunctionKind::Aggregate => self.aggregate(spec.name, args),
        }
    }

    fn lazy(&self, name: &'static str, args: &[Spanned<Expr>]) -> CalcResult<Value> {
        match name {
            "IF" => {
                if self.eval(&args[0])?.is_truthy() {
                    self.eval(&args[1])
                } else if let Some(otherwise) = args.get(2) {
                    self.eval(otherwise)
                } else {
                    Ok(Value::Null)
                }
            }
            "AND" => {
                for arg in args {
                    if !self.eval(arg)?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "OR" => {
                for arg in args {
                    if self.eval(arg)?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            // SWITCH(value, case1, result1, ..., [default])
            "SWITCH" => {
                let subject = self.eval(&args[0])?;
                let mut rest = args[1..].chunks_exact(2);
                for pair in rest.by_ref() {
                    if values_equal(&subject, &self.eval(&pair[0])?) {
                        return self.eval(&pair[1]);
                    }
                }
                match rest.remainder() {
                    [default] => self.eval(default),
                    _ => Ok(Value::Null),
                }
            }
            other => Err(CalcError::UnknownFunction(other.to_string())),
        }
    }

    fn aggregate(&self, name: &'static str, args: &[Spanned<Expr>]) -> CalcResult<Value> {
        let aggregate =
            Aggregate::from_name(name).ok_or_else(|| CalcError::UnknownFunction(name.to_string()))?;

        let Some(input) = aggregate_input(args) else {
            // Aggregate over an inline value or list.
            let value = self.eval(&args[0])?;
            let sample = match value {
                Value::List(items) => items,
                scalar => vec![scalar],
            };
            return aggregate.compute(&sample);
        };

        let column = self.columns.get(input.key()).ok_or_else(|| CalcError::Aggregate {
            function: name.to_string(),
            form_id: self.target_form_id.unwrap_or_default().to_string(),
            message: match self.target_form_id {
                Some(_) => "no submissions available".to_string(),
                None => "no target form set".to_string(),
            },
        })?;

        match input {
            AggregateInput::Rows => Ok(Value::Number(column.len() as f64)),
            AggregateInput::Column(_) => aggregate.compute(column),
        }
    }
}
