//! Integration tests for query checking.
//!
//! Each test builds a realistic form schema, runs complete query text through
//! `query::parse` and checks the canonical statement or the diagnostics the
//! editor would show.

use formql::query::{self, DiagnosticKind, ParseOptions, QueryMode, StatementKind};
use formql::schema::{FieldDefinition, FieldType, FormDefinition, SchemaCache};
use insta::assert_snapshot;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

const TICKET_ID: &str = "7f3c2a10-9b1e-4c55-8d2a-0e6b1f4a9c01";

fn schema() -> SchemaCache {
    SchemaCache::from_forms(vec![
        FormDefinition::new("F", "Requests")
            .with_field(FieldDefinition::new("abc123", "Status", FieldType::Select).with_order(1))
            .with_field(FieldDefinition::new("n1", "Name", FieldType::Text).with_order(2))
            .with_field(FieldDefinition::new("f2", "Notes", FieldType::Textarea).with_order(3))
            .with_field(FieldDefinition::new("p9", "Priority", FieldType::Number).with_order(4))
            .with_field(
                FieldDefinition::new(TICKET_ID, "Ticket Number", FieldType::Text).with_order(5),
            )
            .with_field(FieldDefinition::new("c4", "Café", FieldType::Text).with_order(6)),
        FormDefinition::new("archive", "Archived Requests")
            .with_field(FieldDefinition::new("x1", "Name", FieldType::Text)),
    ])
}

fn canonical(text: &str, mode: QueryMode) -> String {
    let parsed = query::parse(text, &schema(), mode);
    assert!(parsed.is_ok(), "{}: {:?}", text, parsed.errors);
    let sql = parsed.sql.unwrap_or_default();
    assert_valid_sql(&sql);
    sql
}

fn assert_valid_sql(sql: &str) {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .unwrap_or_else(|e| panic!("invalid SQL {:?}: {}", sql, e));
    assert_eq!(statements.len(), 1, "{}", sql);
}

#[test]
fn test_basic_select_surface_forms_agree() {
    let by_id = canonical(r#"SELECT "abc123" FROM F"#, QueryMode::ReadOnly);
    let by_wrapper = canonical(r#"SELECT FIELD("abc123") FROM F"#, QueryMode::ReadOnly);
    let by_label = canonical("SELECT Status FROM F", QueryMode::ReadOnly);

    assert_eq!(by_id, by_wrapper);
    assert_eq!(by_id, by_label);
    assert_snapshot!(by_label, @r#"SELECT "abc123" FROM "F""#);
}

#[test]
fn test_every_field_round_trips_through_all_reference_forms() {
    let cache = schema();
    let Some(form) = cache.form("F") else {
        panic!("form F missing");
    };

    for field in form.fields_in_order() {
        let expected = format!(r#"SELECT "{}" FROM "F""#, field.id);
        let label_upper = field.label.to_uppercase();
        let label_lower = field.label.to_lowercase();
        let forms = [
            format!(r#"SELECT FIELD("{}") FROM F"#, field.id),
            format!(r#"SELECT "{}" FROM F"#, field.id),
            format!(r#"SELECT "{}" FROM F"#, field.label),
            format!(r#"SELECT "{}" FROM F"#, label_upper),
            format!(r#"SELECT "{}" FROM F"#, label_lower),
        ];
        for text in &forms {
            assert_eq!(canonical(text, QueryMode::ReadOnly), expected, "{}", text);
        }
        if !field.label.contains(' ') {
            for bare in [&field.label, &label_upper, &label_lower] {
                let text = format!("SELECT {} FROM F", bare);
                assert_eq!(canonical(&text, QueryMode::ReadOnly), expected, "{}", text);
            }
        }
    }
}

#[test]
fn test_aggregate_with_where_uses_canonical_id() {
    let sql = canonical(
        r#"SELECT COUNT(*) FROM F WHERE "Status" = 'approved'"#,
        QueryMode::ReadOnly,
    );
    assert_snapshot!(sql, @r#"SELECT COUNT(*) FROM "F" WHERE "abc123" = 'approved'"#);
}

#[test]
fn test_aggregate_over_column() {
    let sql = canonical("SELECT AVG(Priority) FROM Requests", QueryMode::ReadOnly);
    assert_snapshot!(sql, @r#"SELECT AVG("p9") FROM "F""#);
}

#[test]
fn test_insert_with_mixed_references() {
    let sql = canonical(
        r#"INSERT F (Name, FIELD("f2"), Status) VALUES ('Bob','x','Active')"#,
        QueryMode::ReadWrite,
    );
    assert_snapshot!(sql, @r#"INSERT INTO "F" ("n1", "f2", "abc123") VALUES ('Bob', 'x', 'Active')"#);
}

#[test]
fn test_insert_optional_keywords_are_equivalent() {
    let bare = canonical("INSERT F (Name, Notes) VALUES (1, 2)", QueryMode::ReadWrite);
    let into = canonical("INSERT INTO F (Name, Notes) VALUES (1, 2)", QueryMode::ReadWrite);
    let into_form = canonical(
        "INSERT INTO FORM F (Name, Notes) VALUES (1, 2)",
        QueryMode::ReadWrite,
    );
    assert_eq!(bare, into);
    assert_eq!(bare, into_form);
    assert!(bare.starts_with(r#"INSERT INTO "F" ("n1", "f2")"#));
}

#[test]
fn test_insert_select_between_forms() {
    let sql = canonical(
        "INSERT INTO archive (Name) SELECT Name FROM F WHERE Status = 'closed'",
        QueryMode::ReadWrite,
    );
    assert_snapshot!(sql, @r#"INSERT INTO "archive" ("x1") SELECT "n1" FROM "F" WHERE "abc123" = 'closed'"#);
}

#[test]
fn test_uuid_field_through_wrapper_and_quotes() {
    let wrapped = canonical(
        &format!(r#"SELECT FIELD("{}") FROM F"#, TICKET_ID),
        QueryMode::ReadOnly,
    );
    let label = canonical(r#"SELECT "Ticket Number" FROM F"#, QueryMode::ReadOnly);
    assert_eq!(wrapped, label);
    assert_eq!(wrapped, format!(r#"SELECT "{}" FROM "F""#, TICKET_ID));
}

#[test]
fn test_delete_rejected_on_read_only_path() {
    let parsed = query::parse("DELETE FROM F", &schema(), QueryMode::ReadOnly);
    assert!(parsed.sql.is_none());
    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(parsed.errors[0].kind, DiagnosticKind::Syntax);
    assert!(parsed.errors[0].message.contains("Only SELECT"));
}

#[test]
fn test_unknown_field_reported_once() {
    let parsed = query::parse("SELECT Name, Colour FROM F", &schema(), QueryMode::ReadOnly);
    assert!(parsed.sql.is_none());
    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(parsed.errors[0].kind, DiagnosticKind::UnknownField);
    assert!(parsed.errors[0].message.contains("Colour"));
}

#[test]
fn test_unknown_wrapped_id_is_unknown_field() {
    let parsed = query::parse(
        r#"SELECT FIELD("does-not-exist") FROM F"#,
        &schema(),
        QueryMode::ReadOnly,
    );
    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(parsed.errors[0].kind, DiagnosticKind::UnknownField);
}

#[test]
fn test_unknown_form_short_circuits_field_checks() {
    let parsed = query::parse(
        "SELECT Colour, Shape FROM nowhere WHERE Size = 1",
        &schema(),
        QueryMode::ReadOnly,
    );
    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(parsed.errors[0].kind, DiagnosticKind::UnknownForm);
    assert!(parsed.form_id.is_none());
}

#[test]
fn test_syntax_errors_come_before_semantic_errors() {
    let parsed = query::parse("SELECT Colour FROM nowhere WHERE", &schema(), QueryMode::ReadOnly);
    assert!(parsed.has_errors());
    assert!(parsed.errors.iter().all(|e| e.kind == DiagnosticKind::Syntax));
}

#[test]
fn test_error_positions_point_at_offending_text() {
    let text = "SELECT Name, Colour FROM F";
    let parsed = query::parse(text, &schema(), QueryMode::ReadOnly);
    let span = parsed.errors[0].span.clone();
    assert_eq!(&text[span], "Colour");
}

#[test]
fn test_read_write_mode_rejects_update() {
    let options = ParseOptions::new(QueryMode::ReadWrite);
    let parsed = query::parse_with("UPDATE F SET Name = 'x'", &schema(), &options);
    assert_eq!(parsed.errors[0].message, "Only SELECT and INSERT statements allowed");
}

#[test]
fn test_order_by_and_limit_are_canonicalised() {
    let sql = canonical(
        "select * from Requests where Priority >= 2 and Status != 'closed' order by Priority desc limit 5",
        QueryMode::ReadOnly,
    );
    assert_snapshot!(sql, @r#"SELECT * FROM "F" WHERE "p9" >= 2 AND "abc123" <> 'closed' ORDER BY "p9" DESC LIMIT 5"#);
}

#[test]
fn test_non_ascii_bare_label() {
    for text in ["SELECT Café FROM F", "SELECT CAFÉ FROM F", "SELECT café FROM F"] {
        assert_eq!(canonical(text, QueryMode::ReadOnly), r#"SELECT "c4" FROM "F""#, "{}", text);
    }

    let text = "SELECT Name, Crème FROM F";
    let parsed = query::parse(text, &schema(), QueryMode::ReadOnly);
    assert_eq!(parsed.errors[0].kind, DiagnosticKind::UnknownField);
    assert_eq!(&text[parsed.errors[0].span.clone()], "Crème");
}

#[test]
fn test_malformed_placeholder_is_a_syntax_error() {
    for text in [
        "SELECT * FROM F WHERE Name = {{user-name}}",
        "SELECT * FROM F WHERE Name = {{1abc}}",
    ] {
        let parsed = query::parse(text, &schema(), QueryMode::ReadOnly);
        assert!(parsed.sql.is_none(), "{}", text);
        assert_eq!(parsed.errors[0].kind, DiagnosticKind::Syntax);
    }
}

#[test]
fn test_statement_kind_and_form_reported() {
    let parsed = query::parse("INSERT archive (Name) VALUES ('a')", &schema(), QueryMode::ReadWrite);
    assert_eq!(parsed.kind, Some(StatementKind::Insert));
    assert_eq!(parsed.form_id.as_deref(), Some("archive"));
}
