//! Submit-triggered queries.
//!
//! A query field can be set to run its query whenever the form it sits on
//! is submitted. The field registers a [`QueryHook`] with the form's
//! [`SubmitQueryRegistry`]; the form calls [`SubmitQueryRegistry::run_all`]
//! after a successful save.

mod registry;

pub use registry::{HookError, RegistrationHandle, SubmitEvent, SubmitHook, SubmitQueryRegistry};

use std::sync::Arc;

use async_trait::async_trait;

use crate::query::variables::VariableContext;
use crate::query::{ExecutionSink, QueryEngine, RunOutcome};
use crate::schema::SchemaProvider;

/// Runs one query template against the engine on submit.
///
/// The template may use `{{current_form_id}}`, `{{current_submission_id}}` and
/// `{{current_user_id}}`, plus any extra variables given here.
pub struct QueryHook<P: SchemaProvider, S: ExecutionSink> {
    engine: Arc<QueryEngine<P, S>>,
    query: String,
    variables: VariableContext,
}

impl<P: SchemaProvider, S: ExecutionSink> QueryHook<P, S> {
    pub fn new(engine: Arc<QueryEngine<P, S>>, query: impl Into<String>) -> Self {
        Self {
            engine,
            query: query.into(),
            variables: VariableContext::new(),
        }
    }

    pub fn with_variables(mut self, variables: VariableContext) -> Self {
        self.variables = variables;
        self
    }

    fn context_for(&self, event: &SubmitEvent) -> VariableContext {
        let mut ctx = self
            .variables
            .clone()
            .with_form_id(event.form_id.clone())
            .with_submission_id(event.submission_id.clone());
        if let Some(user) = &event.user_id {
            ctx = ctx.with_user_id(user.clone());
        }
        ctx
    }
}

#[async_trait]
impl<P: SchemaProvider + 'static, S: ExecutionSink + 'static> SubmitHook for QueryHook<P, S> {
    async fn on_submit(&self, event: &SubmitEvent) -> Result<(), String> {
        let ctx = self.context_for(event);
        match self.engine.run(&self.query, &ctx).await {
            Ok(RunOutcome::Executed { .. }) => Ok(()),
            Ok(RunOutcome::Rejected(parsed)) => Err(parsed
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "query rejected".to_string())),
            Err(e) => Err(e.to_string()),
        }
    }
}
