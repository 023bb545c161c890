//! Pre-flight checks for the expression editor.
//!
//! Nothing is evaluated: the expression is parsed and every call and field
//! reference is checked against the catalog and the available fields.

use serde::Serialize;

use super::ast::Expr;
use super::functions;
use super::parser::parse_expression;

/// Outcome of [`validate_expression`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ExpressionValidation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Check syntax, function names, arity, and `#field` references.
///
/// All problems are reported, not just the first.
pub fn validate_expression<S: AsRef<str>>(
    expression: &str,
    available_fields: &[S],
) -> ExpressionValidation {
    let expr = match parse_expression(expression) {
        Ok(expr) => expr,
        Err(e) => return ExpressionValidation::from_errors(vec![e.to_string()]),
    };

    let mut errors = Vec::new();
    expr.value.walk(&mut |e| match e {
        Expr::Call { name, args, .. } => match functions::lookup(name) {
            None => errors.push(format!("unknown function '{}'", name)),
            Some(spec) => {
                if let Err(err) = spec.check_arity(args.len()) {
                    errors.push(err.to_string());
                }
            }
        },
        Expr::Field(id) => {
            if !available_fields.iter().any(|f| f.as_ref() == id) {
                let message = format!("unknown field '#{}'", id);
                if !errors.contains(&message) {
                    errors.push(message);
                }
            }
        }
        Expr::Literal(_) | Expr::List(_) => {}
    });

    ExpressionValidation::from_errors(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_expression() {
        let result = validate_expression("ROUND(DIVIDE(#total, #count), 2)", &["total", "count"]);
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_reports_every_problem() {
        let result = validate_expression("ADD(#a, FOO(#b), SQRT(1, 2))", &["a"]);
        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec![
                "unknown function 'FOO'".to_string(),
                "unknown field '#b'".to_string(),
                "SQRT expects exactly 1 argument, got 2".to_string(),
            ]
        );
    }

    #[test]
    fn test_syntax_error() {
        let result = validate_expression("ADD(1, ", &[] as &[&str]);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("syntax error"));
    }

    #[test]
    fn test_duplicate_field_reported_once() {
        let result = validate_expression("ADD(#x, #x)", &["y"]);
        assert_eq!(result.errors, vec!["unknown field '#x'".to_string()]);
    }
}
