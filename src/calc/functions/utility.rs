//! Membership, conversion and formatting helpers.

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use rand::distr::Uniform;
use rand::Rng;
use regex::RegexBuilder;

use super::{flatten, values_equal, Args, Env};
use crate::calc::error::{CalcError, CalcResult};
use crate::calc::value::{format_number, parse_date, Value};

const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// `IN(value, a, b, ...)`; list arguments are expanded.
pub fn in_list(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    let needle = args.get(0);
    let found = flatten(&args.all()[1..])
        .into_iter()
        .any(|candidate| values_equal(needle, candidate));
    Ok(Value::Bool(found))
}

/// List membership, or substring search on text.
pub fn contains(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    let needle = args.get(1);
    let found = match args.get(0) {
        Value::Null => false,
        Value::List(items) => items.iter().any(|item| values_equal(item, needle)),
        haystack => haystack
            .to_display_string()
            .contains(&needle.to_display_string()),
    };
    Ok(Value::Bool(found))
}

fn check_strftime(function: &str, pattern: &str) -> CalcResult<()> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(CalcError::evaluation(
            function,
            format!("invalid date format '{}'", pattern),
        ));
    }
    Ok(())
}

/// `FORMAT(value, pattern)`.
///
/// Dates take a strftime pattern (`%Y-%m-%d` by default). Numbers take a
/// decimal count. Anything else is shown as text.
pub fn format(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    let value = args.get(0);
    let pattern = args.get(1);
    let date = match value {
        Value::Date(d) => Some(*d),
        Value::String(s) if pattern.to_display_string().contains('%') => parse_date(s),
        _ => None,
    };

    if let Some(date) = date {
        let pattern = args.text_or(1, "%Y-%m-%d");
        check_strftime(args.function, &pattern)?;
        return Ok(Value::String(date.format(&pattern).to_string()));
    }

    match (value, pattern) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Number(n), Value::Null) => Ok(Value::String(format_number(*n))),
        (Value::Number(n), _) => {
            let decimals = args.require_integer(1)?;
            if !(0..=15).contains(&decimals) {
                return Err(CalcError::evaluation(
                    args.function,
                    format!("decimal places must be between 0 and 15, got {}", decimals),
                ));
            }
            Ok(Value::String(format!("{:.*}", decimals as usize, n)))
        }
        (other, _) => Ok(Value::String(other.to_display_string())),
    }
}

pub fn uuid(_: &Args<'_>, _: &Env) -> CalcResult<Value> {
    Ok(Value::String(::uuid::Uuid::new_v4().to_string()))
}

/// `RANDOM()` is in `[0, 1)`, `RANDOM(max)` in `[0, max)`, and
/// `RANDOM(min, max)` in `[min, max)`.
pub fn random(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    let (low, high) = match args.len() {
        0 => (0.0, 1.0),
        1 => (0.0, args.require_number(0)?),
        _ => (args.require_number(0)?, args.require_number(1)?),
    };
    if low >= high {
        return Err(CalcError::evaluation(
            args.function,
            format!("empty range {}..{}", low, high),
        ));
    }
    // Finite bounds can still span more than f64::MAX.
    let range = Uniform::new(low, high).map_err(|e| {
        CalcError::evaluation(args.function, format!("invalid range {}..{}: {}", low, high, e))
    })?;
    Ok(Value::Number(rand::rng().sample(range)))
}

/// `LOOKUP(value, [keys...], [values...])`: the value paired with the first
/// matching key, or Null.
pub fn lookup(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    let (Value::List(keys), Value::List(values)) = (args.get(1), args.get(2)) else {
        return Err(CalcError::type_error(args.function, "list", args.get(1).type_name()));
    };
    let needle = args.get(0);
    Ok(keys
        .iter()
        .position(|key| values_equal(key, needle))
        .and_then(|i| values.get(i))
        .cloned()
        .unwrap_or(Value::Null))
}

/// `REGEX(text, pattern)`: whether the pattern matches anywhere in text.
pub fn regex_match(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    if args.get(0).is_null() {
        return Ok(Value::Null);
    }
    let pattern = args.text(1);
    let re = RegexBuilder::new(&pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| CalcError::evaluation(args.function, format!("invalid pattern: {}", e)))?;
    Ok(Value::Bool(re.is_match(&args.text(0))))
}

/// Unparseable input becomes Null.
pub fn to_number(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    Ok(args.get(0).as_number().map_or(Value::Null, Value::Number))
}

pub fn to_string(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    match args.get(0) {
        Value::Null => Ok(Value::Null),
        v => Ok(Value::String(v.to_display_string())),
    }
}

/// `TO_DATE(text)` or `TO_DATE(text, strftime)`. Failure is an error.
pub fn to_date(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    let value = args.get(0);
    if value.is_null() {
        return Ok(Value::Null);
    }
    let parsed = match args.get(1) {
        Value::Null => value.as_date(),
        pattern => {
            let pattern = pattern.to_display_string();
            check_strftime(args.function, &pattern)?;
            let text = value.to_display_string();
            NaiveDateTime::parse_from_str(&text, &pattern)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(&text, &pattern)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
    };
    parsed.map(Value::Date).ok_or_else(|| {
        CalcError::evaluation(args.function, format!("cannot parse {} as a date", value))
    })
}
