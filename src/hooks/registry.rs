//! Registry of hooks that run when a form is submitted.
//!
//! A query field registers its hook when it is mounted and keeps the
//! returned [`RegistrationHandle`]. Dropping the handle unregisters the hook,
//! so a field that unmounts can never be called again. A newer registration
//! for the same field replaces the old one, and the old handle's drop then
//! leaves the newer one alone.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::calc::Submission;

/// The submission a hook is told about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitEvent {
    pub form_id: String,
    pub submission_id: String,
    pub user_id: Option<String>,
    pub data: Submission,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("submit hook for field '{field_id}' failed: {message}")]
pub struct HookError {
    pub field_id: String,
    pub message: String,
}

/// Work to do after a submission is saved.
#[async_trait]
pub trait SubmitHook: Send + Sync {
    async fn on_submit(&self, event: &SubmitEvent) -> Result<(), String>;
}

struct Entry {
    generation: u64,
    hook: Arc<dyn SubmitHook>,
}

#[derive(Default)]
struct Inner {
    hooks: DashMap<String, Entry>,
    next_generation: AtomicU64,
}

/// Hooks keyed by the id of the field that owns them.
#[derive(Clone, Default)]
pub struct SubmitQueryRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SubmitQueryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitQueryRegistry")
            .field("fields", &self.field_ids())
            .finish()
    }
}

impl SubmitQueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` for `field_id`, replacing any earlier one.
    #[must_use = "dropping the handle unregisters the hook"]
    pub fn register(
        &self,
        field_id: impl Into<String>,
        hook: Arc<dyn SubmitHook>,
    ) -> RegistrationHandle {
        let field_id = field_id.into();
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .inner
            .hooks
            .insert(field_id.clone(), Entry { generation, hook })
            .is_some();
        tracing::debug!(field_id = %field_id, replaced, "registered submit hook");
        RegistrationHandle {
            registry: Arc::downgrade(&self.inner),
            field_id,
            generation,
        }
    }

    pub fn is_registered(&self, field_id: &str) -> bool {
        self.inner.hooks.contains_key(field_id)
    }

    pub fn len(&self) -> usize {
        self.inner.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.hooks.is_empty()
    }

    /// Registered field ids, sorted.
    pub fn field_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.hooks.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Run every registered hook, one after another in field-id order.
    ///
    /// A failing hook does not stop the others; each outcome is returned
    /// keyed by field id.
    pub async fn run_all(&self, event: &SubmitEvent) -> BTreeMap<String, Result<(), HookError>> {
        // Snapshot first so no map guard is held across an await.
        let mut hooks: Vec<(String, Arc<dyn SubmitHook>)> = self
            .inner
            .hooks
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(&e.value().hook)))
            .collect();
        hooks.sort_by(|a, b| a.0.cmp(&b.0));

        let mut outcomes = BTreeMap::new();
        for (field_id, hook) in hooks {
            let outcome = hook.on_submit(event).await.map_err(|message| {
                tracing::warn!(field_id = %field_id, error = %message, "submit hook failed");
                HookError {
                    field_id: field_id.clone(),
                    message,
                }
            });
            outcomes.insert(field_id, outcome);
        }
        outcomes
    }
}

/// Keeps a hook registered while alive.
#[derive(Debug)]
pub struct RegistrationHandle {
    registry: Weak<Inner>,
    field_id: String,
    generation: u64,
}

impl RegistrationHandle {
    pub fn field_id(&self) -> &str {
        &self.field_id
    }
}

impl Drop for RegistrationHandle {
    fn drop(&mut self) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let removed = inner
            .hooks
            .remove_if(&self.field_id, |_, entry| entry.generation == self.generation)
            .is_some();
        if removed {
            tracing::debug!(field_id = %self.field_id, "unregistered submit hook");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl SubmitHook for Recorder {
        async fn on_submit(&self, event: &SubmitEvent) -> Result<(), String> {
            self.calls.lock().unwrap().push(event.submission_id.clone());
            if self.fail {
                Err("sink offline".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn event() -> SubmitEvent {
        SubmitEvent {
            form_id: "F".into(),
            submission_id: "s1".into(),
            ..SubmitEvent::default()
        }
    }

    #[tokio::test]
    async fn test_handle_drop_unregisters() {
        let registry = SubmitQueryRegistry::new();
        let hook = Arc::new(Recorder::default());
        let handle = registry.register("q1", hook.clone());
        assert!(registry.is_registered("q1"));

        registry.run_all(&event()).await;
        drop(handle);
        registry.run_all(&event()).await;

        assert!(registry.is_empty());
        assert_eq!(hook.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_handle_keeps_newer_registration() {
        let registry = SubmitQueryRegistry::new();
        let old = registry.register("q1", Arc::new(Recorder::default()));
        let newer = Arc::new(Recorder::default());
        let _current = registry.register("q1", newer.clone());
        drop(old);

        assert!(registry.is_registered("q1"));
        registry.run_all(&event()).await;
        assert_eq!(newer.calls.lock().unwrap().as_slice(), ["s1".to_string()]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let registry = SubmitQueryRegistry::new();
        let failing = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let ok = Arc::new(Recorder::default());
        let _a = registry.register("a", failing);
        let _b = registry.register("b", ok.clone());

        let outcomes = registry.run_all(&event()).await;
        assert!(outcomes["a"].is_err());
        assert_eq!(outcomes["b"], Ok(()));
        assert_eq!(ok.calls.lock().unwrap().len(), 1);
    }
}
