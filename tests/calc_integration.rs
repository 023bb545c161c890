//! Integration tests for the calculation engine.
//!
//! Formulas are evaluated the way a calculated field would evaluate them:
//! against the submission being edited, with aggregates reading every
//! submission of a target form.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use formql::calc::{
    self, AggregateCache, CalcError, CalculationContext, CalculationEngine, InMemorySubmissions,
    Submission, Value,
};
use serde_json::json;

fn order() -> CalculationContext {
    CalculationContext::new()
        .with_field("price", 19.99)
        .with_field("qty", "3")
        .with_field("customer", "  Ada Lovelace ")
        .with_field("placed", "2024-02-27")
        .with_field("express", true)
        .with_now(Utc.with_ymd_and_hms(2024, 3, 2, 9, 30, 0).unwrap())
}

fn row(score: serde_json::Value, team: &str) -> Submission {
    BTreeMap::from([
        ("score".to_string(), score),
        ("team".to_string(), json!(team)),
    ])
}

fn scores() -> Vec<Submission> {
    vec![
        row(json!(12), "red"),
        row(json!("8"), "blue"),
        row(json!(null), "red"),
        row(json!("absent"), "blue"),
        row(json!(20), "red"),
    ]
}

fn eval(expression: &str) -> Result<Value, CalcError> {
    calc::evaluate_formula(expression, &order())
}

#[test]
fn test_divide_by_zero_is_null() {
    assert_eq!(eval("DIVIDE(10, 0)"), Ok(Value::Null));
    assert_eq!(eval("MOD(10, 0)"), Ok(Value::Null));
}

#[test]
fn test_missing_field_propagates_null() {
    assert_eq!(eval("ADD(#missing_field, 1)"), Ok(Value::Null));
    assert_eq!(eval("IFNULL(ADD(#missing_field, 1), 0)"), Ok(Value::Number(0.0)));
}

#[test]
fn test_round_precision() {
    assert_eq!(eval("ROUND(1.2345)"), Ok(Value::Number(1.0)));
    assert_eq!(eval("ROUND(1.2345, 2)"), Ok(Value::Number(1.23)));
    assert_eq!(eval("ROUND(2.5)"), Ok(Value::Number(3.0)));
    assert_eq!(eval("ROUND(-2.5)"), Ok(Value::Number(-3.0)));
}

#[test]
fn test_order_total_formula() {
    let total = eval("ROUND(MULTIPLY(#price, #qty), 2)");
    assert_eq!(total, Ok(Value::Number(59.97)));

    let with_shipping = eval("ROUND(ADD(MULTIPLY(#price, #qty), IF(#express, 9.5, 0)), 2)");
    assert_eq!(with_shipping, Ok(Value::Number(69.47)));
}

#[test]
fn test_nested_calls_with_commas_in_strings() {
    assert_eq!(
        eval(r#"CONCAT(IF(#express, "Rush, today", "Standard"), " / ", UPPER(TRIM(#customer)))"#),
        Ok(Value::String("Rush, today / ADA LOVELACE".into()))
    );
}

#[test]
fn test_dates_use_context_clock() {
    assert_eq!(eval("DATEDIFF(#placed, TODAY(), \"days\")"), Ok(Value::Number(4.0)));
    assert_eq!(eval("ISWEEKEND(NOW())"), Ok(Value::Bool(true)));
    assert_eq!(eval("MONTH(DATEADD(#placed, 1, \"months\"))"), Ok(Value::Number(3.0)));
}

#[test]
fn test_arity_is_enforced() {
    let err = eval("ROUND(1, 2, 3)").unwrap_err();
    assert_eq!(err.kind(), "arity_error");
    assert_eq!(err.to_string(), "ROUND expects 1 to 2 arguments, got 3");

    assert_eq!(eval("NOW(1)").unwrap_err().kind(), "arity_error");
    assert_eq!(eval("IF(true)").unwrap_err().kind(), "arity_error");
}

#[test]
fn test_evaluation_errors_stop_evaluation() {
    let err = eval(r#"TO_DATE("not a date")"#).unwrap_err();
    assert!(matches!(err, CalcError::Evaluation { .. }));
    assert!(eval("SQRT(-4)").is_err());
    assert!(matches!(eval("ADD(1,"), Err(CalcError::Syntax { .. })));
}

#[test]
fn test_utility_functions() {
    assert_eq!(eval(r#"IN(#qty, [1, 2, 3])"#), Ok(Value::Bool(true)));
    assert_eq!(eval(r#"CONTAINS(#customer, "Love")"#), Ok(Value::Bool(true)));
    assert_eq!(
        eval(r#"LOOKUP("b", ["a", "b"], ["Alpha", "Beta"])"#),
        Ok(Value::String("Beta".into()))
    );
    assert_eq!(eval(r#"REGEX(TRIM(#customer), "^Ada")"#), Ok(Value::Bool(true)));
    assert_eq!(eval(r#"TO_NUMBER("oops")"#), Ok(Value::Null));
    assert_eq!(eval(r#"FORMAT(#price, 1)"#), Ok(Value::String("20.0".into())));

    let Ok(Value::String(id)) = eval("UUID()") else {
        panic!("UUID should return a string");
    };
    assert_eq!(id.len(), 36);
}

#[test]
fn test_aggregates_over_supplied_submissions() {
    let ctx = CalculationContext::new().with_submissions(scores());

    assert_eq!(calc::evaluate_formula("SUM(#score)", &ctx), Ok(Value::Number(40.0)));
    assert_eq!(
        calc::evaluate_formula("ROUND(AVG(#score), 2)", &ctx),
        Ok(Value::Number(13.33))
    );
    assert_eq!(calc::evaluate_formula("MEDIAN(#score)", &ctx), Ok(Value::Number(12.0)));
    assert_eq!(calc::evaluate_formula("COUNT()", &ctx), Ok(Value::Number(5.0)));
    assert_eq!(calc::evaluate_formula("COUNT(#score)", &ctx), Ok(Value::Number(4.0)));
}

#[tokio::test]
async fn test_aggregates_fetch_target_form_once() {
    let source = Arc::new(InMemorySubmissions::new().with_form("race", scores()));
    let engine = CalculationEngine::with_source(
        source,
        Arc::new(AggregateCache::new(Duration::from_secs(30))),
    );
    let ctx = CalculationContext::new().with_target_form("race");

    let spread = engine
        .evaluate("SUBTRACT(MAX(SUM(#score), 0), AVG(#score))", &ctx)
        .await;
    assert_eq!(spread.map(|v| v.as_number().map(|n| n.round())), Ok(Some(27.0)));
    assert_eq!(engine.cache().len(), 1);

    let unknown = engine
        .evaluate("SUM(#score)", &CalculationContext::new().with_target_form("nope"))
        .await;
    assert_eq!(unknown, Ok(Value::Number(0.0)));
}

#[test]
fn test_validate_expression_reports_everything() {
    let fields = ["price", "qty"];
    let ok = calc::validate_expression("MULTIPLY(#price, #qty)", &fields);
    assert!(ok.is_valid);

    let bad = calc::validate_expression("ADD(#price, #discount, FOO(1))", &fields);
    assert!(!bad.is_valid);
    assert!(bad.errors.iter().any(|e| e.contains("FOO")));
    assert!(bad.errors.iter().any(|e| e.contains("#discount")));
}

#[test]
fn test_cli_usage_formulas_are_valid() {
    let fields = ["price", "qty", "score"];
    for expression in ["ROUND(MULTIPLY(#price, #qty), 2)", "DIVIDE(SUM(#score), 2)"] {
        let result = calc::validate_expression(expression, &fields);
        assert!(result.is_valid, "{}: {:?}", expression, result.errors);
    }
    assert!(!calc::validate_expression("ROUND(#price * #qty, 2)", &fields).is_valid);
}

#[test]
fn test_catalog_is_complete() {
    let names: Vec<&str> = calc::catalog().iter().map(|f| f.name).collect();
    for expected in [
        "ADD", "SUBTRACT", "MULTIPLY", "DIVIDE", "MOD", "POWER", "SQRT", "ABS", "ROUND", "FLOOR",
        "CEIL", "MAX", "MIN", "EXP", "LOG", "LOG10", "IF", "AND", "OR", "NOT", "ISNULL", "IFNULL",
        "SWITCH", "NOW", "TODAY", "DATEDIFF", "DATEADD", "YEAR", "MONTH", "DAY", "HOUR", "MINUTE",
        "SECOND", "WEEKDAY", "ISWEEKEND", "LENGTH", "UPPER", "LOWER", "CONCAT", "SUBSTRING",
        "TRIM", "COUNT", "AVG", "SUM", "MEDIAN", "STDEV", "IN", "CONTAINS", "FORMAT", "UUID",
        "RANDOM", "LOOKUP", "REGEX", "TO_NUMBER", "TO_STRING", "TO_DATE",
    ] {
        assert!(names.contains(&expected), "missing {}", expected);
    }
    assert_eq!(names.len(), 56);
}
