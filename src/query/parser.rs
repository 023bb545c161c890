//! Parser for the form query language using chumsky.
//!
//! This module turns the lexer's token stream into an unresolved
//! `Statement`. It only checks shape; whether forms and fields exist is
//! decided later against the schema cache.

use chumsky::input::ValueInput;
use chumsky::prelude::*;

use super::ast::*;
use super::lexer::{unescape, Token};
use super::span::Spanned;

/// Convert a SimpleSpan to our Span type (Range<usize>)
fn to_span(span: SimpleSpan) -> std::ops::Range<usize> {
    span.start..span.end
}

/// Create the statement parser.
///
/// Accepts exactly one SELECT or INSERT statement, optionally followed by a
/// semicolon.
pub fn parser<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, Statement, extra::Err<Rich<'tokens, Token<'src>, SimpleSpan>>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    // ==========================================================================
    // Basic token parsers
    // ==========================================================================

    let word = select! {
        Token::Ident(s) => s.to_string(),
    }
    .labelled("identifier");

    let quoted = select! {
        Token::QuotedIdent(s) => unescape(s, '"'),
    }
    .labelled("quoted name");

    let string_lit = select! {
        Token::StringLit(s) => unescape(s, '\''),
    }
    .labelled("string literal");

    let variable = select! {
        Token::Variable(v) => v.to_string(),
    };

    // ==========================================================================
    // Column references: FIELD("id") | word | "quoted"
    // ==========================================================================

    let field_keyword = select! {
        Token::Ident(s) if s.eq_ignore_ascii_case("FIELD") => (),
    };

    let field_wrapper = field_keyword
        .ignore_then(
            quoted
                .clone()
                .or(string_lit.clone())
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map(ColumnRef::Field);

    // FIELD(...) first: a bare column that happens to be called "field"
    // falls through to the plain word alternative.
    let column_ref = choice((
        field_wrapper,
        word.clone().map(ColumnRef::Bare),
        quoted.clone().map(ColumnRef::Quoted),
    ))
    .map_with(|c, e| Spanned::new(c, to_span(e.span())))
    .labelled("column reference")
    .boxed();

    let column_list = column_ref
        .clone()
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>();

    // ==========================================================================
    // Form references
    // ==========================================================================

    let form_ref = choice((
        word.clone(),
        quoted.clone(),
        string_lit.clone(),
        variable.clone().map(|v| format!("{{{{{}}}}}", v)),
    ))
    .map_with(|f, e| Spanned::new(f, to_span(e.span())))
    .labelled("form reference")
    .boxed();

    // ==========================================================================
    // Literals
    // ==========================================================================

    let number = just(Token::Minus)
        .or_not()
        .then(select! { Token::Number(n) => n })
        .map(|(neg, n)| {
            if neg.is_some() {
                Literal::Number(format!("-{}", n))
            } else {
                Literal::Number(n.to_string())
            }
        });

    let literal = choice((
        string_lit.clone().map(Literal::String),
        quoted.clone().map(Literal::String),
        number,
        just(Token::True).to(Literal::Bool(true)),
        just(Token::False).to(Literal::Bool(false)),
        just(Token::Null).to(Literal::Null),
        variable.map(Literal::Variable),
    ))
    .map_with(|l, e| Spanned::new(l, to_span(e.span())))
    .labelled("literal")
    .boxed();

    // ==========================================================================
    // Select list: * | columns | AGG(column | *)
    // ==========================================================================

    let aggregate_func = select! { Token::Ident(s) => s }.try_map(|s, span| {
        AggregateFunc::from_str(s)
            .ok_or_else(|| Rich::custom(span, format!("'{}' is not an aggregate function", s)))
    });

    let aggregate = aggregate_func
        .then(
            just(Token::Star)
                .to(AggregateArg::Star)
                .or(column_ref.clone().map(AggregateArg::Column))
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map(|(func, arg)| Projection::Aggregate { func, arg });

    let projection = choice((
        just(Token::Star).to(Projection::Wildcard),
        aggregate,
        column_list.clone().map(Projection::Columns),
    ))
    .map_with(|p, e| Spanned::new(p, to_span(e.span())))
    .labelled("select list");

    // ==========================================================================
    // WHERE predicate
    // ==========================================================================

    let compare_op = select! {
        Token::Eq => CompareOp::Eq,
        Token::NotEq => CompareOp::NotEq,
        Token::Gt => CompareOp::Gt,
        Token::Lt => CompareOp::Lt,
        Token::GtEq => CompareOp::GtEq,
        Token::LtEq => CompareOp::LtEq,
    }
    .labelled("comparison operator");

    let comparison = column_ref
        .clone()
        .then(compare_op)
        .then(literal.clone())
        .map(|((column, op), value)| Comparison { column, op, value })
        .boxed();

    let logical = select! {
        Token::And => LogicalOp::And,
        Token::Or => LogicalOp::Or,
    };

    let predicate = comparison
        .clone()
        .then(logical.then(comparison).repeated().collect::<Vec<_>>())
        .map(|(first, rest)| Predicate { first, rest });

    // ==========================================================================
    // ORDER BY / LIMIT
    // ==========================================================================

    let direction = select! {
        Token::Asc => SortDirection::Asc,
        Token::Desc => SortDirection::Desc,
    };

    let order_by = just(Token::Order)
        .ignore_then(just(Token::By))
        .ignore_then(column_ref.clone())
        .then(direction.or_not())
        .map(|(column, direction)| OrderBy {
            column,
            direction: direction.unwrap_or_default(),
        });

    let limit = just(Token::Limit)
        .ignore_then(select! { Token::Number(n) => n }.try_map(|n, span| {
            n.parse::<u64>().map_err(|_| {
                Rich::custom(span, format!("LIMIT expects a whole number, found {}", n))
            })
        }))
        .map_with(|n, e| Spanned::new(n, to_span(e.span())));

    // ==========================================================================
    // Statements
    // ==========================================================================

    let select_stmt = just(Token::Select)
        .ignore_then(projection)
        .then_ignore(just(Token::From))
        .then_ignore(just(Token::Form).or_not())
        .then(form_ref.clone())
        .then(just(Token::Where).ignore_then(predicate).or_not())
        .then(order_by.or_not())
        .then(limit.or_not())
        .map(|((((projection, form), filter), order_by), limit)| SelectStmt {
            projection,
            form,
            filter,
            order_by,
            limit,
        })
        .boxed();

    let values = just(Token::Values)
        .ignore_then(
            literal
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map(InsertSource::Values);

    let insert_source = values.or(select_stmt
        .clone()
        .map(|s| InsertSource::Select(Box::new(s))));

    // INTO and FORM are each optional
    let insert_stmt = just(Token::Insert)
        .ignore_then(just(Token::Into).or_not())
        .ignore_then(just(Token::Form).or_not())
        .ignore_then(form_ref)
        .then(column_list.delimited_by(just(Token::LParen), just(Token::RParen)))
        .then(insert_source)
        .map(|((form, columns), source)| InsertStmt {
            form,
            columns,
            source,
        });

    choice((
        select_stmt.map(Statement::Select),
        insert_stmt.map(Statement::Insert),
    ))
    .then_ignore(just(Token::Semicolon).or_not())
    .then_ignore(end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lexer::lex;
    use chumsky::input::Input;

    /// Parse a statement or panic with the errors.
    fn parse_str(input: &str) -> Statement {
        try_parse_str(input).expect("parsing should succeed")
    }

    fn try_parse_str(input: &str) -> Result<Statement, String> {
        let tokens = lex(input).expect("lexing should succeed");
        let len = input.len();
        let token_stream = tokens.as_slice().map(
            (len..len).into(),
            |(tok, span): &(Token<'_>, SimpleSpan)| (tok, span),
        );
        let result = parser()
            .parse(token_stream)
            .into_result()
            .map_err(|errs| format!("{:?}", errs));
        result
    }

    fn select(input: &str) -> SelectStmt {
        match parse_str(input) {
            Statement::Select(s) => s,
            other => panic!("Expected SELECT, got {:?}", other),
        }
    }

    fn insert(input: &str) -> InsertStmt {
        match parse_str(input) {
            Statement::Insert(i) => i,
            other => panic!("Expected INSERT, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_select_star() {
        let stmt = select("SELECT * FROM intake");
        assert_eq!(stmt.projection.value, Projection::Wildcard);
        assert_eq!(stmt.form.value, "intake");
        assert!(stmt.filter.is_none());
    }

    #[test]
    fn test_parse_select_optional_form_keyword() {
        let stmt = select("SELECT Status FROM FORM intake");
        assert_eq!(stmt.form.value, "intake");
        assert_eq!(stmt.form.span, 24..30);
    }

    #[test]
    fn test_parse_column_ref_forms() {
        let stmt = select(r#"SELECT FIELD("abc123"), Status, "First Name" FROM f"#);
        match stmt.projection.value {
            Projection::Columns(cols) => {
                let refs: Vec<_> = cols.into_iter().map(|c| c.value).collect();
                assert_eq!(
                    refs,
                    vec![
                        ColumnRef::Field("abc123".into()),
                        ColumnRef::Bare("Status".into()),
                        ColumnRef::Quoted("First Name".into()),
                    ]
                );
            }
            other => panic!("Expected columns, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_field_named_field() {
        let stmt = select("SELECT field FROM f");
        match stmt.projection.value {
            Projection::Columns(cols) => assert_eq!(cols[0].value, ColumnRef::Bare("field".into())),
            other => panic!("Expected columns, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_aggregate() {
        let stmt = select(r#"SELECT COUNT(*) FROM F WHERE "Status" = 'approved'"#);
        assert_eq!(
            stmt.projection.value,
            Projection::Aggregate {
                func: AggregateFunc::Count,
                arg: AggregateArg::Star
            }
        );
        let filter = stmt.filter.expect("where clause");
        assert_eq!(filter.first.column.value, ColumnRef::Quoted("Status".into()));
        assert_eq!(filter.first.op, CompareOp::Eq);
        assert_eq!(filter.first.value.value, Literal::String("approved".into()));
    }

    #[test]
    fn test_parse_aggregate_over_column() {
        let stmt = select("SELECT sum(Amount) FROM F");
        match stmt.projection.value {
            Projection::Aggregate { func, arg } => {
                assert_eq!(func, AggregateFunc::Sum);
                assert!(matches!(arg, AggregateArg::Column(c) if c.value == ColumnRef::Bare("Amount".into())));
            }
            other => panic!("Expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_where_chain() {
        let stmt = select("SELECT * FROM F WHERE a = 1 AND b != -2.5 OR c >= TRUE");
        let filter = stmt.filter.unwrap();
        assert_eq!(filter.rest.len(), 2);
        assert_eq!(filter.rest[0].0, LogicalOp::And);
        assert_eq!(filter.rest[0].1.value.value, Literal::Number("-2.5".into()));
        assert_eq!(filter.rest[1].0, LogicalOp::Or);
        assert_eq!(filter.rest[1].1.op, CompareOp::GtEq);
    }

    #[test]
    fn test_parse_order_and_limit() {
        let stmt = select("SELECT * FROM F ORDER BY created_at DESC LIMIT 10;");
        let order = stmt.order_by.unwrap();
        assert_eq!(order.column.value, ColumnRef::Bare("created_at".into()));
        assert_eq!(order.direction, SortDirection::Desc);
        assert_eq!(stmt.limit.unwrap().value, 10);
    }

    #[test]
    fn test_parse_insert_keyword_variants() {
        let plain = insert("INSERT f1 (a, b) VALUES (1, 2)");
        let into = insert("INSERT INTO f1 (a, b) VALUES (1, 2)");
        let into_form = insert("INSERT INTO FORM f1 (a, b) VALUES (1, 2)");

        for stmt in [&plain, &into, &into_form] {
            assert_eq!(stmt.form.value, "f1");
            assert_eq!(stmt.columns.len(), 2);
            assert!(matches!(&stmt.source, InsertSource::Values(v) if v.len() == 2));
        }
    }

    #[test]
    fn test_parse_insert_select() {
        let stmt = insert("INSERT INTO archive (a) SELECT b FROM live WHERE b > 3");
        match stmt.source {
            InsertSource::Select(sel) => assert_eq!(sel.form.value, "live"),
            other => panic!("Expected INSERT ... SELECT, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_variable_literal() {
        let stmt = select("SELECT * FROM F WHERE owner = {{current_user_id}}");
        assert_eq!(
            stmt.filter.unwrap().first.value.value,
            Literal::Variable("current_user_id".into())
        );
    }

    #[test]
    fn test_parse_rejects_trailing_garbage() {
        assert!(try_parse_str("SELECT * FROM F extra").is_err());
    }

    #[test]
    fn test_parse_rejects_missing_from() {
        assert!(try_parse_str("SELECT a, b").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_column_list() {
        assert!(try_parse_str("INSERT INTO f () VALUES ()").is_err());
    }
}
