//! String functions. Lengths and offsets count characters, not bytes.

use super::{Args, Env};
use crate::calc::error::{CalcError, CalcResult};
use crate::calc::value::Value;

fn map_text(args: &Args<'_>, f: impl FnOnce(&str) -> String) -> CalcResult<Value> {
    match args.get(0) {
        Value::Null => Ok(Value::Null),
        v => Ok(Value::String(f(&v.to_display_string()))),
    }
}

pub fn length(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    Ok(Value::Number(args.text(0).chars().count() as f64))
}

pub fn upper(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    map_text(args, str::to_uppercase)
}

pub fn lower(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    map_text(args, str::to_lowercase)
}

pub fn trim(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    map_text(args, |s| s.trim().to_string())
}

/// Nulls contribute nothing.
pub fn concat(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    Ok(Value::String(
        args.all().iter().map(Value::to_display_string).collect(),
    ))
}

/// `SUBSTRING(text, start, length)` with a 0-based start.
pub fn substring(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    if args.get(0).is_null() {
        return Ok(Value::Null);
    }
    let text = args.text(0);
    let start = args.require_integer(1)?;
    if start < 0 {
        return Err(CalcError::evaluation(
            args.function,
            format!("start must not be negative, got {}", start),
        ));
    }
    let chars = text.chars().skip(start as usize);
    let out: String = match args.number(2)? {
        Some(_) => {
            let len = args.require_integer(2)?;
            if len < 0 {
                return Err(CalcError::evaluation(
                    args.function,
                    format!("length must not be negative, got {}", len),
                ));
            }
            chars.take(len as usize).collect()
        }
        None => chars.collect(),
    };
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn call(f: super::super::NativeFn, name: &'static str, values: &[Value]) -> CalcResult<Value> {
        f(&Args::new(name, values), &Env { now: Utc::now() })
    }

    #[test]
    fn test_length_counts_chars() {
        assert_eq!(call(length, "LENGTH", &[Value::from("héllo")]), Ok(Value::Number(5.0)));
        assert_eq!(call(length, "LENGTH", &[Value::Null]), Ok(Value::Number(0.0)));
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(call(upper, "UPPER", &[Value::from("abc")]), Ok(Value::from("ABC")));
        assert_eq!(call(trim, "TRIM", &[Value::from("  x ")]), Ok(Value::from("x")));
        assert_eq!(call(lower, "LOWER", &[Value::Null]), Ok(Value::Null));
    }

    #[test]
    fn test_concat_mixes_types() {
        assert_eq!(
            call(concat, "CONCAT", &[Value::from("n="), Value::Number(3.0), Value::Null]),
            Ok(Value::from("n=3"))
        );
    }

    #[test]
    fn test_substring() {
        let s = Value::from("Hello World");
        assert_eq!(
            call(substring, "SUBSTRING", &[s.clone(), Value::Number(6.0)]),
            Ok(Value::from("World"))
        );
        assert_eq!(
            call(substring, "SUBSTRING", &[s.clone(), Value::Number(0.0), Value::Number(5.0)]),
            Ok(Value::from("Hello"))
        );
        assert_eq!(
            call(substring, "SUBSTRING", &[s.clone(), Value::Number(50.0)]),
            Ok(Value::from(""))
        );
        assert!(call(substring, "SUBSTRING", &[s, Value::Number(-1.0)]).is_err());
    }
}
