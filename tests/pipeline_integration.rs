//! End-to-end tests for the query pipeline.
//!
//! Drives `QueryEngine` from raw editor text through variable substitution,
//! validation against a cached schema, and a single hand-off to a recording
//! sink. Also covers submit hooks built on the same engine.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use formql::config::Settings;
use formql::hooks::{QueryHook, SubmitEvent, SubmitQueryRegistry};
use formql::query::{
    DiagnosticKind, ExecutionError, ExecutionSink, QueryEngine, QueryResult, RunOutcome,
    StatementOutcome, VariableContext,
};
use formql::results::{FilterOperator, ResultFilter, ResultView, SortSpec};
use formql::schema::{FieldDefinition, FieldType, FormDefinition, InMemorySchemaProvider, SchemaCacheManager};
use formql::CoreError;
use serde_json::json;

/// Records every statement and answers from a queue of canned responses.
#[derive(Default)]
struct ScriptedSink {
    seen: Mutex<Vec<String>>,
    responses: Mutex<Vec<Result<QueryResult, ExecutionError>>>,
}

impl ScriptedSink {
    fn answering(responses: Vec<Result<QueryResult, ExecutionError>>) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into_iter().rev().collect()),
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionSink for ScriptedSink {
    async fn execute(&self, statement: &str) -> Result<QueryResult, ExecutionError> {
        self.seen.lock().unwrap().push(statement.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok(QueryResult::default()))
    }
}

fn forms() -> Vec<FormDefinition> {
    vec![
        FormDefinition::new("F", "Requests")
            .with_field(FieldDefinition::new("abc123", "Status", FieldType::Select))
            .with_field(FieldDefinition::new("n1", "Name", FieldType::Text))
            .with_field(FieldDefinition::new("amt", "Amount", FieldType::Number)),
        FormDefinition::new("audit", "Audit Log")
            .with_field(FieldDefinition::new("a1", "Submission", FieldType::Text))
            .with_field(FieldDefinition::new("a2", "Form", FieldType::Text)),
    ]
}

fn engine(
    sink: Arc<ScriptedSink>,
    settings_toml: &str,
) -> (Arc<InMemorySchemaProvider>, QueryEngine<InMemorySchemaProvider, ScriptedSink>) {
    let settings = Settings::from_toml(settings_toml).unwrap();
    let provider = Arc::new(InMemorySchemaProvider::from_forms(forms()));
    let schema = Arc::new(SchemaCacheManager::new(Arc::clone(&provider)));
    let engine = QueryEngine::new(schema, sink, settings.query.parse_options());
    (provider, engine)
}

fn requests() -> QueryResult {
    QueryResult::new(
        vec!["n1".into(), "abc123".into(), "amt".into()],
        vec![
            vec![json!("Bob"), json!("approved"), json!(120)],
            vec![json!("Ada"), json!("pending"), json!(80)],
            vec![json!("Cy"), json!("approved"), json!("95.5")],
            vec![json!("Di"), json!("approved"), json!(null)],
        ],
    )
}

#[tokio::test]
async fn test_select_then_post_process() {
    let sink = Arc::new(ScriptedSink::answering(vec![Ok(requests())]));
    let (_, engine) = engine(Arc::clone(&sink), "");

    let outcome = engine
        .run(
            "SELECT Name, Status, Amount FROM {{current_form_id}} WHERE Status = 'approved'",
            &VariableContext::new().with_form_id("F"),
        )
        .await
        .unwrap();

    assert_eq!(
        sink.seen(),
        vec![r#"SELECT "n1", "abc123", "amt" FROM "F" WHERE "abc123" = 'approved'"#.to_string()]
    );

    let RunOutcome::Executed {
        outcome: StatementOutcome::Rows(result),
        ..
    } = outcome
    else {
        panic!("expected rows");
    };

    let view = ResultView::new()
        .filter(ResultFilter::new("abc123", FilterOperator::Equals, "approved"))
        .sort(SortSpec::desc("amt"))
        .page(1, 2);
    let first = view.apply(&result).unwrap();
    let again = view.apply(&result).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&again).unwrap()
    );
    assert_eq!(first.total_rows, 3);
    assert_eq!(first.total_pages, 2);
    let names: Vec<_> = first.result.rows.iter().map(|r| r[0].clone()).collect();
    assert_eq!(names, vec![json!("Bob"), json!("Cy")]);
}

#[tokio::test]
async fn test_read_only_settings_block_insert_before_sink() {
    let sink = Arc::new(ScriptedSink::default());
    let (_, engine) = engine(Arc::clone(&sink), "[query]\nread_only = true\n");

    let outcome = engine
        .run("INSERT F (Name) VALUES ('x')", &VariableContext::new())
        .await
        .unwrap();
    let RunOutcome::Rejected(parsed) = outcome else {
        panic!("insert should be rejected");
    };
    assert_eq!(parsed.errors[0].kind, DiagnosticKind::Syntax);
    assert!(sink.seen().is_empty());
}

#[tokio::test]
async fn test_insert_failure_is_surfaced_once() {
    let sink = Arc::new(ScriptedSink::answering(vec![Err(ExecutionError::Failed(
        "duplicate key".into(),
    ))]));
    let (_, engine) = engine(Arc::clone(&sink), "[query]\nread_only = false\n");

    let err = engine
        .run(
            "INSERT INTO FORM F (Name, Status) VALUES ('Bob', 'Active')",
            &VariableContext::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Execution(ExecutionError::Failed(ref m)) if m == "duplicate key"));
    assert_eq!(err.kind(), "execution_error");
    assert_eq!(sink.seen().len(), 1);
}

#[tokio::test]
async fn test_unresolved_variable_runs_as_null_with_warning() {
    let sink = Arc::new(ScriptedSink::default());
    let (_, engine) = engine(Arc::clone(&sink), "");

    let outcome = engine
        .run("SELECT * FROM F WHERE Name = {{reviewer}}", &VariableContext::new())
        .await
        .unwrap();

    assert_eq!(sink.seen(), vec![r#"SELECT * FROM "F" WHERE "n1" IS NULL"#.to_string()]);
    let warnings = &outcome.query().warnings;
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, DiagnosticKind::UnresolvedVariable);
}

#[tokio::test]
async fn test_placeholders_never_reach_the_sink() {
    let sink = Arc::new(ScriptedSink::default());
    let (_, engine) = engine(Arc::clone(&sink), "");
    let ctx = VariableContext::new().with_user_id("u-7");

    for text in [
        "SELECT * FROM F WHERE Name = {{user-name}}",
        "SELECT * FROM F WHERE Name = {{1abc}}",
        "SELECT * FROM F WHERE Name = {{ }}",
    ] {
        let outcome = engine.run(text, &ctx).await.unwrap();
        let RunOutcome::Rejected(parsed) = outcome else {
            panic!("{} should be rejected", text);
        };
        assert_eq!(parsed.errors[0].kind, DiagnosticKind::Syntax);
    }
    assert!(sink.seen().is_empty());

    engine
        .run("SELECT * FROM F WHERE Name = {{ current_user_id }}", &ctx)
        .await
        .unwrap();
    assert_eq!(sink.seen(), vec![r#"SELECT * FROM "F" WHERE "n1" = 'u-7'"#.to_string()]);
}

#[tokio::test]
async fn test_schema_refresh_picks_up_new_fields() {
    let sink = Arc::new(ScriptedSink::default());
    let (provider, engine) = engine(Arc::clone(&sink), "");
    let ctx = VariableContext::new();

    let before = engine.check("SELECT Region FROM F", &ctx).await.unwrap();
    assert_eq!(before.errors[0].kind, DiagnosticKind::UnknownField);

    provider
        .upsert_form(
            FormDefinition::new("F", "Requests")
                .with_field(FieldDefinition::new("abc123", "Status", FieldType::Select))
                .with_field(FieldDefinition::new("r7", "Region", FieldType::Text)),
        )
        .await;
    let stale = engine.check("SELECT Region FROM F", &ctx).await.unwrap();
    assert!(stale.has_errors(), "cache must not change until refreshed");

    engine.schema().refresh_cache().await.unwrap();
    let after = engine.check("SELECT Region FROM F", &ctx).await.unwrap();
    assert_eq!(after.sql.as_deref(), Some(r#"SELECT "r7" FROM "F""#));
}

#[tokio::test]
async fn test_submit_hook_runs_query_with_submission_variables() {
    let sink = Arc::new(ScriptedSink::default());
    let (_, engine) = engine(Arc::clone(&sink), "[query]\nread_only = false\n");
    let engine = Arc::new(engine);

    let registry = SubmitQueryRegistry::new();
    let hook = QueryHook::new(
        Arc::clone(&engine),
        "INSERT INTO audit (Submission, Form) VALUES ({{current_submission_id}}, {{current_form_id}})",
    );
    let handle = registry.register("audit_field", Arc::new(hook));

    let event = SubmitEvent {
        form_id: "F".into(),
        submission_id: "s-42".into(),
        user_id: Some("u-7".into()),
        ..SubmitEvent::default()
    };
    let outcomes = registry.run_all(&event).await;
    assert_eq!(outcomes["audit_field"], Ok(()));
    assert_eq!(
        sink.seen(),
        vec![r#"INSERT INTO "audit" ("a1", "a2") VALUES ('s-42', 'F')"#.to_string()]
    );

    drop(handle);
    assert!(registry.run_all(&event).await.is_empty());
    assert_eq!(sink.seen().len(), 1);
}

#[tokio::test]
async fn test_failing_hook_reports_query_error() {
    let sink = Arc::new(ScriptedSink::default());
    let (_, engine) = engine(Arc::clone(&sink), "");
    let registry = SubmitQueryRegistry::new();
    let _handle = registry.register(
        "broken",
        Arc::new(QueryHook::new(Arc::new(engine), "SELECT Missing FROM F")),
    );

    let outcomes = registry.run_all(&SubmitEvent::default()).await;
    let err = outcomes["broken"].clone().unwrap_err();
    assert_eq!(err.field_id, "broken");
    assert!(err.message.contains("Missing"));
    assert!(sink.seen().is_empty());
}
