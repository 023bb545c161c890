//! In-memory schema cache.
//!
//! # Design
//!
//! - One immutable `SchemaCache` snapshot per load
//! - Loaded lazily on first `get_cache()`, reloaded only by `refresh_cache()`
//! - A refresh builds the complete new snapshot before swapping it in, so a
//!   failed load leaves the previous snapshot (or nothing) in place
//! - Readers hold an `Arc<SchemaCache>` for a whole resolve-and-execute pass;
//!   a concurrent refresh never changes what they see

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::provider::{SchemaProvider, SchemaResult};
use super::types::{FieldDefinition, FormDefinition, SystemColumnDefinition};

/// A snapshot of every form visible to one organization.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    forms: BTreeMap<String, Arc<FormDefinition>>,
    last_refreshed: Option<DateTime<Utc>>,
}

impl SchemaCache {
    /// Build a snapshot from loaded forms.
    ///
    /// Forms without system columns receive the defaults.
    pub fn from_forms(forms: impl IntoIterator<Item = FormDefinition>) -> Self {
        let forms = forms
            .into_iter()
            .map(|f| {
                let form = f.with_default_system_columns();
                (form.id.clone(), Arc::new(form))
            })
            .collect();
        Self {
            forms,
            last_refreshed: Some(Utc::now()),
        }
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    /// Look up a form by exact id.
    pub fn form(&self, form_id: &str) -> Option<&Arc<FormDefinition>> {
        self.forms.get(form_id)
    }

    /// Resolve a form reference: exact id first, then case-insensitive name.
    ///
    /// Names are folded with Unicode lowercase, like field labels. When
    /// several forms share a name the one with the lowest id wins.
    pub fn find_form(&self, reference: &str) -> Option<&Arc<FormDefinition>> {
        if let Some(form) = self.forms.get(reference) {
            return Some(form);
        }
        let wanted = reference.to_lowercase();
        self.forms
            .values()
            .find(|f| f.name.to_lowercase() == wanted)
    }

    /// All forms, ordered by id.
    pub fn forms(&self) -> impl Iterator<Item = &Arc<FormDefinition>> {
        self.forms.values()
    }

    /// Fields of a form in display order, for the editor sidebar.
    pub fn fields_for(&self, form_id: &str) -> Vec<&FieldDefinition> {
        self.forms
            .get(form_id)
            .map(|f| f.fields_in_order())
            .unwrap_or_default()
    }

    /// System columns of a form, ordered by id.
    pub fn system_columns_for(&self, form_id: &str) -> Vec<&SystemColumnDefinition> {
        self.forms
            .get(form_id)
            .map(|f| f.system_columns.values().collect())
            .unwrap_or_default()
    }
}

/// Owns the current `SchemaCache` snapshot and reloads it from a provider.
pub struct SchemaCacheManager<P: SchemaProvider> {
    provider: Arc<P>,
    current: ArcSwapOption<SchemaCache>,
    /// Serializes loads so two first-time readers don't both hit the store.
    load_lock: Mutex<()>,
}

impl<P: SchemaProvider> SchemaCacheManager<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            current: ArcSwapOption::empty(),
            load_lock: Mutex::new(()),
        }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Snapshot currently held, without loading.
    pub fn peek(&self) -> Option<Arc<SchemaCache>> {
        self.current.load_full()
    }

    /// Return the cached snapshot, loading it on first call.
    pub async fn get_cache(&self) -> SchemaResult<Arc<SchemaCache>> {
        if let Some(cache) = self.current.load_full() {
            return Ok(cache);
        }

        let _guard = self.load_lock.lock().await;
        // Another caller may have finished loading while we waited.
        if let Some(cache) = self.current.load_full() {
            return Ok(cache);
        }
        self.load().await
    }

    /// Force a reload from the provider and swap in the new snapshot.
    ///
    /// On failure the previous snapshot stays in place and the error is
    /// returned.
    pub async fn refresh_cache(&self) -> SchemaResult<Arc<SchemaCache>> {
        let _guard = self.load_lock.lock().await;
        self.load().await
    }

    async fn load(&self) -> SchemaResult<Arc<SchemaCache>> {
        let started = Instant::now();
        debug!("loading schema cache");

        let forms = match self.fetch_forms().await {
            Ok(forms) => forms,
            Err(e) => {
                warn!(error = %e, "schema cache load failed; keeping previous snapshot");
                return Err(e);
            }
        };

        let snapshot = Arc::new(SchemaCache::from_forms(forms));
        self.current.store(Some(Arc::clone(&snapshot)));

        info!(
            forms = snapshot.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "schema cache loaded"
        );
        Ok(snapshot)
    }

    async fn fetch_forms(&self) -> SchemaResult<Vec<FormDefinition>> {
        self.provider.refresh().await?;
        self.provider.list_forms().await
    }
}
