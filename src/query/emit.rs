//! Canonical statement emission.
//!
//! Renders a validated statement as PostgreSQL text. Column and form
//! references are expected to already carry canonical ids; they are emitted
//! as quoted identifiers regardless of how the user spelled them.

use super::ast::*;
use crate::sql::{Token, TokenStream};

/// Render a canonical statement to SQL text.
pub fn render(statement: &Statement) -> String {
    to_tokens(statement).serialize()
}

/// Build the token stream for a canonical statement.
pub fn to_tokens(statement: &Statement) -> TokenStream {
    let mut ts = TokenStream::new();
    match statement {
        Statement::Select(select) => select_tokens(&mut ts, select),
        Statement::Insert(insert) => insert_tokens(&mut ts, insert),
    }
    ts
}

fn select_tokens(ts: &mut TokenStream, select: &SelectStmt) {
    ts.push(Token::Select).space();
    match &select.projection.value {
        Projection::Wildcard => {
            ts.push(Token::Star);
        }
        Projection::Columns(columns) => {
            ts.comma_separated(columns, |ts, c| {
                ts.push(column(&c.value));
            });
        }
        Projection::Aggregate { func, arg } => {
            ts.push(Token::FunctionName(func.as_str().to_string())).lparen();
            match arg {
                AggregateArg::Star => ts.push(Token::Star),
                AggregateArg::Column(c) => ts.push(column(&c.value)),
            };
            ts.rparen();
        }
    }

    ts.space()
        .push(Token::From)
        .space()
        .push(Token::Ident(select.form.value.clone()));

    if let Some(filter) = &select.filter {
        ts.space().push(Token::Where).space();
        comparison_tokens(ts, &filter.first);
        for (op, comparison) in &filter.rest {
            ts.space()
                .push(match op {
                    LogicalOp::And => Token::And,
                    LogicalOp::Or => Token::Or,
                })
                .space();
            comparison_tokens(ts, comparison);
        }
    }

    if let Some(order) = &select.order_by {
        ts.space()
            .push(Token::OrderBy)
            .space()
            .push(column(&order.column.value))
            .space()
            .push(match order.direction {
                SortDirection::Asc => Token::Asc,
                SortDirection::Desc => Token::Desc,
            });
    }

    if let Some(limit) = &select.limit {
        ts.space()
            .push(Token::Limit)
            .space()
            .push(Token::LitInt(limit.value.min(i64::MAX as u64) as i64));
    }
}

fn insert_tokens(ts: &mut TokenStream, insert: &InsertStmt) {
    ts.push(Token::Insert)
        .space()
        .push(Token::Into)
        .space()
        .push(Token::Ident(insert.form.value.clone()))
        .space()
        .lparen()
        .comma_separated(&insert.columns, |ts, c| {
            ts.push(column(&c.value));
        })
        .rparen()
        .space();

    match &insert.source {
        InsertSource::Values(values) => {
            ts.push(Token::Values)
                .space()
                .lparen()
                .comma_separated(values, |ts, v| {
                    ts.push(literal(&v.value));
                })
                .rparen();
        }
        InsertSource::Select(select) => select_tokens(ts, select),
    }
}

fn comparison_tokens(ts: &mut TokenStream, comparison: &Comparison) {
    ts.push(column(&comparison.column.value)).space();

    // `= NULL` never matches in SQL; emit the test the user meant.
    if comparison.value.value == Literal::Null {
        match comparison.op {
            CompareOp::Eq => {
                ts.push(Token::IsNull);
                return;
            }
            CompareOp::NotEq => {
                ts.push(Token::IsNotNull);
                return;
            }
            _ => {}
        }
    }

    ts.push(match comparison.op {
        CompareOp::Eq => Token::Eq,
        CompareOp::NotEq => Token::Ne,
        CompareOp::Gt => Token::Gt,
        CompareOp::Lt => Token::Lt,
        CompareOp::GtEq => Token::Gte,
        CompareOp::LtEq => Token::Lte,
    })
    .space()
    .push(literal(&comparison.value.value));
}

fn column(c: &ColumnRef) -> Token {
    Token::Ident(c.text().to_string())
}

fn literal(l: &Literal) -> Token {
    match l {
        Literal::String(s) => Token::LitString(s.clone()),
        Literal::Number(n) => Token::number(n),
        Literal::Bool(b) => Token::LitBool(*b),
        Literal::Null => Token::LitNull,
        Literal::Variable(name) => Token::Placeholder(name.clone()),
    }
}
