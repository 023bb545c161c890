//! Built-in function catalog.
//!
//! Every function has a fixed arity range that is checked before it runs.
//! Most functions are `Native`: arguments are evaluated first and the
//! implementation sees plain values. `Lazy` functions (IF, AND, OR, SWITCH)
//! control evaluation of their own arguments, and `Aggregate` functions run
//! over submissions of the target form.

mod datetime;
mod logical;
mod math;
pub mod statistics;
mod text;
mod utility;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::{CalcError, CalcResult};
use super::value::Value;

/// Function grouping, as shown in the editor's function picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Arithmetic,
    Math,
    Logical,
    DateTime,
    String,
    Aggregate,
    Utility,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Arithmetic => "arithmetic",
            Category::Math => "math",
            Category::Logical => "logical",
            Category::DateTime => "date_time",
            Category::String => "string",
            Category::Aggregate => "aggregate",
            Category::Utility => "utility",
        }
    }
}

/// Signature of an eagerly evaluated built-in.
pub type NativeFn = fn(&Args<'_>, &Env) -> CalcResult<Value>;

#[derive(Clone, Copy)]
pub enum FunctionKind {
    Native(NativeFn),
    Lazy,
    Aggregate,
}

impl std::fmt::Debug for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionKind::Native(_) => f.write_str("Native"),
            FunctionKind::Lazy => f.write_str("Lazy"),
            FunctionKind::Aggregate => f.write_str("Aggregate"),
        }
    }
}

/// One catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub category: Category,
    pub min_args: usize,
    /// `None` means variadic.
    pub max_args: Option<usize>,
    pub kind: FunctionKind,
}

impl FunctionSpec {
    /// Fail unless `count` arguments fit this function.
    pub fn check_arity(&self, count: usize) -> CalcResult<()> {
        let too_few = count < self.min_args;
        let too_many = self.max_args.is_some_and(|max| count > max);
        if too_few || too_many {
            return Err(CalcError::arity(self.name, self.min_args, self.max_args, count));
        }
        Ok(())
    }
}

const fn native(
    name: &'static str,
    category: Category,
    min_args: usize,
    max_args: Option<usize>,
    f: NativeFn,
) -> FunctionSpec {
    FunctionSpec {
        name,
        category,
        min_args,
        max_args,
        kind: FunctionKind::Native(f),
    }
}

const fn special(
    name: &'static str,
    category: Category,
    min_args: usize,
    max_args: Option<usize>,
    kind: FunctionKind,
) -> FunctionSpec {
    FunctionSpec {
        name,
        category,
        min_args,
        max_args,
        kind,
    }
}

use Category as C;

static CATALOG: &[FunctionSpec] = &[
    // Arithmetic
    native("ADD", C::Arithmetic, 2, None, math::add),
    native("SUBTRACT", C::Arithmetic, 2, Some(2), math::subtract),
    native("MULTIPLY", C::Arithmetic, 2, None, math::multiply),
    native("DIVIDE", C::Arithmetic, 2, Some(2), math::divide),
    native("MOD", C::Arithmetic, 2, Some(2), math::modulo),
    // Math
    native("POWER", C::Math, 2, Some(2), math::power),
    native("SQRT", C::Math, 1, Some(1), math::sqrt),
    native("ABS", C::Math, 1, Some(1), math::abs),
    native("ROUND", C::Math, 1, Some(2), math::round),
    native("FLOOR", C::Math, 1, Some(1), math::floor),
    native("CEIL", C::Math, 1, Some(1), math::ceil),
    native("MAX", C::Math, 1, None, math::max),
    native("MIN", C::Math, 1, None, math::min),
    native("EXP", C::Math, 1, Some(1), math::exp),
    native("LOG", C::Math, 1, Some(2), math::log),
    native("LOG10", C::Math, 1, Some(1), math::log10),
    // Logical
    special("IF", C::Logical, 2, Some(3), FunctionKind::Lazy),
    special("AND", C::Logical, 1, None, FunctionKind::Lazy),
    special("OR", C::Logical, 1, None, FunctionKind::Lazy),
    native("NOT", C::Logical, 1, Some(1), logical::not),
    native("ISNULL", C::Logical, 1, Some(1), logical::is_null),
    native("IFNULL", C::Logical, 2, Some(2), logical::if_null),
    special("SWITCH", C::Logical, 3, None, FunctionKind::Lazy),
    // Date and time
    native("NOW", C::DateTime, 0, Some(0), datetime::now),
    native("TODAY", C::DateTime, 0, Some(0), datetime::today),
    native("DATEDIFF", C::DateTime, 2, Some(3), datetime::date_diff),
    native("DATEADD", C::DateTime, 2, Some(3), datetime::date_add),
    native("YEAR", C::DateTime, 1, Some(1), datetime::year),
    native("MONTH", C::DateTime, 1, Some(1), datetime::month),
    native("DAY", C::DateTime, 1, Some(1), datetime::day),
    native("HOUR", C::DateTime, 1, Some(1), datetime::hour),
    native("MINUTE", C::DateTime, 1, Some(1), datetime::minute),
    native("SECOND", C::DateTime, 1, Some(1), datetime::second),
    native("WEEKDAY", C::DateTime, 1, Some(1), datetime::weekday),
    native("ISWEEKEND", C::DateTime, 1, Some(1), datetime::is_weekend),
    // String
    native("LENGTH", C::String, 1, Some(1), text::length),
    native("UPPER", C::String, 1, Some(1), text::upper),
    native("LOWER", C::String, 1, Some(1), text::lower),
    native("CONCAT", C::String, 1, None, text::concat),
    native("SUBSTRING", C::String, 2, Some(3), text::substring),
    native("TRIM", C::String, 1, Some(1), text::trim),
    // Aggregate
    special("COUNT", C::Aggregate, 0, Some(1), FunctionKind::Aggregate),
    special("AVG", C::Aggregate, 1, Some(1), FunctionKind::Aggregate),
    special("SUM", C::Aggregate, 1, Some(1), FunctionKind::Aggregate),
    special("MEDIAN", C::Aggregate, 1, Some(1), FunctionKind::Aggregate),
    special("STDEV", C::Aggregate, 1, Some(1), FunctionKind::Aggregate),
    // Utility
    native("IN", C::Utility, 2, None, utility::in_list),
    native("CONTAINS", C::Utility, 2, Some(2), utility::contains),
    native("FORMAT", C::Utility, 1, Some(2), utility::format),
    native("UUID", C::Utility, 0, Some(0), utility::uuid),
    native("RANDOM", C::Utility, 0, Some(2), utility::random),
    native("LOOKUP", C::Utility, 3, Some(3), utility::lookup),
    native("REGEX", C::Utility, 2, Some(2), utility::regex_match),
    native("TO_NUMBER", C::Utility, 1, Some(1), utility::to_number),
    native("TO_STRING", C::Utility, 1, Some(1), utility::to_string),
    native("TO_DATE", C::Utility, 1, Some(2), utility::to_date),
];

/// Look up a function by name (case-insensitive).
pub fn lookup(name: &str) -> Option<&'static FunctionSpec> {
    CATALOG.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

/// The whole catalog, in category order.
pub fn catalog() -> &'static [FunctionSpec] {
    CATALOG
}

/// Ambient inputs for functions that read the clock.
#[derive(Debug, Clone, Copy)]
pub struct Env {
    pub now: DateTime<Utc>,
}

/// Evaluated arguments of one call, with typed accessors.
pub struct Args<'a> {
    pub function: &'static str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(function: &'static str, values: &'a [Value]) -> Self {
        Self { function, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn all(&self) -> &'a [Value] {
        self.values
    }

    /// Argument `i`, or Null when absent.
    pub fn get(&self, i: usize) -> &'a Value {
        static NULL: Value = Value::Null;
        self.values.get(i).unwrap_or(&NULL)
    }

    pub fn has(&self, i: usize) -> bool {
        i < self.values.len()
    }

    /// Numeric argument; Null stays `None`, anything else non-numeric fails.
    pub fn number(&self, i: usize) -> CalcResult<Option<f64>> {
        match self.get(i) {
            Value::Null => Ok(None),
            v => v
                .as_number()
                .map(Some)
                .ok_or_else(|| CalcError::type_error(self.function, "number", v.type_name())),
        }
    }

    /// Numeric argument that must be present.
    pub fn require_number(&self, i: usize) -> CalcResult<f64> {
        self.number(i)?
            .ok_or_else(|| CalcError::type_error(self.function, "number", "null"))
    }

    /// Integer argument that must be present.
    pub fn require_integer(&self, i: usize) -> CalcResult<i64> {
        let n = self.require_number(i)?;
        if n.fract() != 0.0 || n.abs() > i64::MAX as f64 {
            return Err(CalcError::evaluation(
                self.function,
                format!("expected a whole number, got {}", n),
            ));
        }
        Ok(n as i64)
    }

    /// Date argument; Null stays `None`, unparseable text fails.
    pub fn date(&self, i: usize) -> CalcResult<Option<DateTime<Utc>>> {
        match self.get(i) {
            Value::Null => Ok(None),
            v => v.as_date().map(Some).ok_or_else(|| {
                CalcError::evaluation(
                    self.function,
                    format!("cannot parse {} as a date", v),
                )
            }),
        }
    }

    /// Display text of argument `i`.
    pub fn text(&self, i: usize) -> String {
        self.get(i).to_display_string()
    }

    /// Optional text argument, falling back to `default`.
    pub fn text_or(&self, i: usize, default: &str) -> String {
        match self.get(i) {
            Value::Null => default.to_string(),
            v => v.to_display_string(),
        }
    }
}

/// Loose equality used by IN, SWITCH and LOOKUP.
///
/// Numbers compare numerically (numeric strings included), dates by
/// instant, everything else structurally.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            matches!((a.as_number(), b.as_number()), (Some(x), Some(y)) if x == y)
        }
        (Value::Date(_), _) | (_, Value::Date(_)) => {
            matches!((a.as_date(), b.as_date()), (Some(x), Some(y)) if x == y)
        }
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        _ => a == b,
    }
}

/// Reject non-finite arithmetic results.
pub(crate) fn finite(function: &str, n: f64) -> CalcResult<Value> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(CalcError::evaluation(function, "result is not a finite number"))
    }
}

/// Expand list arguments into their elements.
pub(crate) fn flatten(values: &[Value]) -> Vec<&Value> {
    let mut out = Vec::new();
    for v in values {
        match v {
            Value::List(items) => out.extend(items.iter()),
            other => out.push(other),
        }
    }
    out
}
