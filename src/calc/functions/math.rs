//! Arithmetic and math functions.
//!
//! Null inputs propagate: any Null operand yields Null. Division and
//! modulo by zero also yield Null rather than failing.

use super::{finite, flatten, Args, Env};
use crate::calc::error::{CalcError, CalcResult};
use crate::calc::value::Value;

/// Collect every argument as a number, or `None` if any is Null.
fn operands(args: &Args<'_>) -> CalcResult<Option<Vec<f64>>> {
    let mut out = Vec::with_capacity(args.len());
    for i in 0..args.len() {
        match args.number(i)? {
            Some(n) => out.push(n),
            None => return Ok(None),
        }
    }
    Ok(Some(out))
}

fn unary(args: &Args<'_>, f: impl FnOnce(f64) -> f64) -> CalcResult<Value> {
    match args.number(0)? {
        Some(n) => finite(args.function, f(n)),
        None => Ok(Value::Null),
    }
}

pub fn add(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    match operands(args)? {
        Some(ns) => finite(args.function, ns.iter().sum()),
        None => Ok(Value::Null),
    }
}

pub fn subtract(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    match operands(args)? {
        Some(ns) => finite(args.function, ns[0] - ns[1]),
        None => Ok(Value::Null),
    }
}

pub fn multiply(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    match operands(args)? {
        Some(ns) => finite(args.function, ns.iter().product()),
        None => Ok(Value::Null),
    }
}

pub fn divide(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    match operands(args)? {
        Some(ns) if ns[1] == 0.0 => Ok(Value::Null),
        Some(ns) => finite(args.function, ns[0] / ns[1]),
        None => Ok(Value::Null),
    }
}

pub fn modulo(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    match operands(args)? {
        Some(ns) if ns[1] == 0.0 => Ok(Value::Null),
        Some(ns) => finite(args.function, ns[0] % ns[1]),
        None => Ok(Value::Null),
    }
}

pub fn power(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    match operands(args)? {
        Some(ns) => finite(args.function, ns[0].powf(ns[1])),
        None => Ok(Value::Null),
    }
}

pub fn sqrt(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    match args.number(0)? {
        Some(n) if n < 0.0 => Err(CalcError::evaluation(
            args.function,
            "cannot take the square root of a negative number",
        )),
        Some(n) => finite(args.function, n.sqrt()),
        None => Ok(Value::Null),
    }
}

pub fn abs(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    unary(args, f64::abs)
}

/// `ROUND(x, places)`; halves round away from zero.
pub fn round(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    let Some(n) = args.number(0)? else {
        return Ok(Value::Null);
    };
    let places = if args.has(1) && !args.get(1).is_null() {
        args.require_integer(1)?
    } else {
        0
    };
    if !(-15..=15).contains(&places) {
        return Err(CalcError::evaluation(
            args.function,
            format!("decimal places must be between -15 and 15, got {}", places),
        ));
    }
    let factor = 10f64.powi(places.unsigned_abs() as i32);
    let rounded = if places >= 0 {
        (n * factor).round() / factor
    } else {
        (n / factor).round() * factor
    };
    finite(args.function, rounded)
}

pub fn floor(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    unary(args, f64::floor)
}

pub fn ceil(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    unary(args, f64::ceil)
}

/// Numbers among the (flattened) arguments, skipping nulls.
fn extremes(args: &Args<'_>) -> CalcResult<Vec<f64>> {
    flatten(args.all())
        .into_iter()
        .filter(|v| !v.is_null())
        .map(|v| {
            v.as_number()
                .ok_or_else(|| CalcError::type_error(args.function, "number", v.type_name()))
        })
        .collect()
}

pub fn max(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    Ok(extremes(args)?
        .into_iter()
        .reduce(f64::max)
        .map_or(Value::Null, Value::Number))
}

pub fn min(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    Ok(extremes(args)?
        .into_iter()
        .reduce(f64::min)
        .map_or(Value::Null, Value::Number))
}

pub fn exp(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    unary(args, f64::exp)
}

/// `LOG(x)` is the natural log; `LOG(x, base)` uses the given base.
pub fn log(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    let Some(n) = args.number(0)? else {
        return Ok(Value::Null);
    };
    if n <= 0.0 {
        return Err(CalcError::evaluation(
            args.function,
            "logarithm is only defined for positive numbers",
        ));
    }
    match args.number(1)? {
        None => finite(args.function, n.ln()),
        Some(base) if base <= 0.0 || base == 1.0 => Err(CalcError::evaluation(
            args.function,
            format!("invalid logarithm base {}", base),
        )),
        Some(base) => finite(args.function, n.log(base)),
    }
}

pub fn log10(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    match args.number(0)? {
        Some(n) if n <= 0.0 => Err(CalcError::evaluation(
            args.function,
            "logarithm is only defined for positive numbers",
        )),
        Some(n) => finite(args.function, n.log10()),
        None => Ok(Value::Null),
    }
}
