//! Submission access for aggregate functions.
//!
//! Aggregates (COUNT, SUM, AVG, MEDIAN, STDEV) run over every submission of
//! the target form. Submissions come from a [`SubmissionSource`]; fetched
//! columns are memoized in an [`AggregateCache`] for a short TTL so a form
//! with several aggregate calculations fetches once.
//!
//! # Key Format
//!
//! ```text
//! (form_id, field_id)   -> column of that field's values
//! (form_id, "*")        -> one Null per submission (row count)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;

use super::value::Value;

/// One submission's field values, keyed by field id.
pub type Submission = BTreeMap<String, serde_json::Value>;

/// Key used for the whole-row count column.
pub const ROW_COUNT_KEY: &str = "*";

#[derive(Error, Debug, Clone, PartialEq)]
#[error("submission source failed: {0}")]
pub struct SourceError(pub String);

/// Read access to stored submissions.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    async fn fetch_submissions(&self, form_id: &str) -> Result<Vec<Submission>, SourceError>;
}

/// Fixed submissions held in memory, keyed by form id.
#[derive(Debug, Default, Clone)]
pub struct InMemorySubmissions {
    forms: BTreeMap<String, Vec<Submission>>,
}

impl InMemorySubmissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form(mut self, form_id: impl Into<String>, rows: Vec<Submission>) -> Self {
        self.forms.insert(form_id.into(), rows);
        self
    }
}

#[async_trait]
impl SubmissionSource for InMemorySubmissions {
    async fn fetch_submissions(&self, form_id: &str) -> Result<Vec<Submission>, SourceError> {
        Ok(self.forms.get(form_id).cloned().unwrap_or_default())
    }
}

/// Pull one column out of a set of submissions.
///
/// Missing fields become Null. The row-count key yields one Null per row.
pub fn column(rows: &[Submission], field_id: &str) -> Vec<Value> {
    if field_id == ROW_COUNT_KEY {
        return vec![Value::Null; rows.len()];
    }
    rows.iter()
        .map(|row| row.get(field_id).map_or(Value::Null, Value::from_json))
        .collect()
}

struct CacheEntry {
    column: Arc<Vec<Value>>,
    fetched_at: Instant,
}

/// Time-boxed memo of aggregate columns.
pub struct AggregateCache {
    entries: DashMap<(String, String), CacheEntry>,
    ttl: Duration,
    enabled: bool,
}

impl std::fmt::Debug for AggregateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Default for AggregateCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl AggregateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            enabled: true,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::ZERO,
            enabled: false,
        }
    }

    fn fresh(&self, key: &(String, String)) -> Option<Arc<Vec<Value>>> {
        let entry = self.entries.get(key)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(Arc::clone(&entry.column))
        } else {
            None
        }
    }

    /// Fetch the requested columns of one form, using cached columns where
    /// still fresh. The source is called at most once.
    pub async fn columns(
        &self,
        source: &dyn SubmissionSource,
        form_id: &str,
        field_ids: &[String],
    ) -> Result<BTreeMap<String, Arc<Vec<Value>>>, SourceError> {
        let mut out = BTreeMap::new();
        let mut missing = Vec::new();
        for field_id in field_ids {
            let key = (form_id.to_string(), field_id.clone());
            match self.enabled.then(|| self.fresh(&key)).flatten() {
                Some(column) => {
                    tracing::debug!(form_id, field_id = %field_id, "aggregate cache hit");
                    out.insert(field_id.clone(), column);
                }
                None => missing.push(field_id.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(out);
        }

        let started = std::time::Instant::now();
        let rows = source.fetch_submissions(form_id).await.map_err(|e| {
            tracing::warn!(form_id, error = %e, "submission fetch failed");
            e
        })?;
        tracing::debug!(
            form_id,
            rows = rows.len(),
            columns = missing.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched submissions for aggregates"
        );

        for field_id in missing {
            let fetched = Arc::new(column(&rows, &field_id));
            if self.enabled {
                self.entries.insert(
                    (form_id.to_string(), field_id.clone()),
                    CacheEntry {
                        column: Arc::clone(&fetched),
                        fetched_at: Instant::now(),
                    },
                );
            }
            out.insert(field_id, fetched);
        }
        Ok(out)
    }

    /// Drop every cached column of one form.
    pub fn invalidate(&self, form_id: &str) {
        self.entries.retain(|(form, _), _| form != form_id);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
