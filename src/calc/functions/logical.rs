//! Eager logical functions. IF, AND, OR and SWITCH are lazy and live in
//! the evaluator.

use super::{Args, Env};
use crate::calc::error::CalcResult;
use crate::calc::value::Value;

pub fn not(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    Ok(Value::Bool(!args.get(0).is_truthy()))
}

/// True for Null and the empty string.
pub fn is_null(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    Ok(Value::Bool(args.get(0).is_blank()))
}

pub fn if_null(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    let value = args.get(0);
    if value.is_blank() {
        Ok(args.get(1).clone())
    } else {
        Ok(value.clone())
    }
}
