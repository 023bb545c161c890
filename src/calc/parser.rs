//! Parser for calculation expressions using chumsky.
//!
//! ```text
//! expr  := call | list | field | number | string | word
//! call  := NAME "(" [expr ("," expr)*] ")"
//! list  := "[" [expr ("," expr)*] "]"
//! field := "#" id
//! ```
//!
//! Arguments are full expressions, so nested calls such as
//! `CONCAT(IF(#a, "x", "y"), "z")` split correctly on commas.

use chumsky::prelude::*;

use super::ast::Expr;
use super::error::CalcError;
use super::value::Value;
use crate::query::span::Spanned;

/// Convert a SimpleSpan to our Span type (Range<usize>)
fn to_span(span: SimpleSpan) -> std::ops::Range<usize> {
    span.start..span.end
}

/// Create the expression parser.
pub fn parser<'src>() -> impl Parser<'src, &'src str, Spanned<Expr>, extra::Err<Rich<'src, char>>>
{
    let ident = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice()
        .labelled("name");

    let number = just('-')
        .or_not()
        .then(text::digits(10))
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<f64>()
                .map(|n| Expr::Literal(Value::Number(n)))
                .map_err(|e| Rich::custom(span, e.to_string()))
        })
        .labelled("number");

    let escape = just('\\').ignore_then(choice((
        just('\\'),
        just('"'),
        just('\''),
        just('n').to('\n'),
        just('t').to('\t'),
    )));

    let double_quoted = just('"')
        .ignore_then(
            none_of("\\\"")
                .or(escape.clone())
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('"'));

    let single_quoted = just('\'')
        .ignore_then(none_of("\\'").or(escape).repeated().collect::<String>())
        .then_ignore(just('\''));

    let string = double_quoted
        .or(single_quoted)
        .map(|s| Expr::Literal(Value::String(s)))
        .labelled("string");

    let field = just('#')
        .ignore_then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
                .repeated()
                .at_least(1)
                .to_slice(),
        )
        .map(|id: &str| Expr::Field(id.to_string()))
        .labelled("field reference");

    // Bare words that are not calls are literals.
    let word = ident.clone().map(|w: &str| {
        Expr::Literal(match w.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            _ => Value::String(w.to_string()),
        })
    });

    recursive(|expr| {
        let items = expr
            .clone()
            .separated_by(just(',').padded())
            .collect::<Vec<_>>();

        let call = ident
            .map_with(|name: &str, e| (name.to_string(), to_span(e.span())))
            .then(
                items
                    .clone()
                    .delimited_by(just('(').padded(), just(')').padded()),
            )
            .map(|((name, name_span), args)| Expr::Call {
                name,
                name_span,
                args,
            });

        let list = items
            .delimited_by(just('[').padded(), just(']').padded())
            .map(Expr::List);

        choice((call, list, field, number, string, word))
            .map_with(|e, x| Spanned::new(e, to_span(x.span())))
            .padded()
    })
    .then_ignore(end())
}

/// Parse an expression, returning the first error.
pub fn parse_expression(source: &str) -> Result<Spanned<Expr>, CalcError> {
    parser().parse(source).into_result().map_err(|errs| {
        let first = errs.into_iter().next();
        match first {
            Some(e) => CalcError::Syntax {
                position: e.span().start,
                message: e.to_string(),
            },
            None => CalcError::Syntax {
                position: 0,
                message: "invalid expression".to_string(),
            },
        }
    })
}
