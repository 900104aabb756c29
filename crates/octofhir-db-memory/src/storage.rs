use async_trait::async_trait;
use octofhir_core::{CanonicalKind, FhirVersion};
use octofhir_storage::{ResourceStore, StoreError, StoredCanonical, record_key};
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Options for the in-memory store.
///
/// `latency` simulates a networked backend; every `find`/`list` sleeps for
/// that long before answering.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub latency: Option<Duration>,
    /// When set, every query fails with `StoreError::Unavailable`.
    pub offline: bool,
}

/// In-memory canonical resource store using papaya lock-free HashMap.
///
/// Records are keyed by `Kind|url`; a later insert for the same key replaces
/// the earlier record.
#[derive(Debug)]
pub struct InMemoryResourceStore {
    pub(crate) data: Arc<PapayaHashMap<String, StoredCanonical>>,
    queries: AtomicU64,
    options: StoreOptions,
}

impl InMemoryResourceStore {
    /// Creates a new empty store with default options.
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    /// Creates a new empty store with the given options.
    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            queries: AtomicU64::new(0),
            options,
        }
    }

    /// Inserts or replaces a record.
    pub fn insert(&self, record: StoredCanonical) {
        let key = record.key();
        self.data.pin().insert(key, record);
    }

    /// Inserts raw FHIR JSON expressed in `version`.
    pub fn insert_json(&self, payload: Value, version: FhirVersion) -> Result<(), StoreError> {
        let kind = payload
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let url = payload
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let record = StoredCanonical::from_json(payload, version)
            .map_err(|e| StoreError::invalid_record(kind, url, e.to_string()))?;
        self.insert(record);
        Ok(())
    }

    pub fn remove(&self, kind: CanonicalKind, url: &str) -> Option<StoredCanonical> {
        let guard = self.data.pin();
        let removed = guard.remove(&record_key(kind, url)).cloned();
        removed
    }

    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `find` and `list` calls answered so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    async fn before_query(&self) -> Result<(), StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.options.latency {
            tokio::time::sleep(latency).await;
        }
        if self.options.offline {
            return Err(StoreError::unavailable("in-memory store is offline"));
        }
        Ok(())
    }
}

impl Default for InMemoryResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn find(
        &self,
        kind: CanonicalKind,
        canonical_url: &str,
    ) -> Result<Option<StoredCanonical>, StoreError> {
        self.before_query().await?;
        let guard = self.data.pin();
        let found = guard.get(&record_key(kind, canonical_url)).cloned();
        Ok(found)
    }

    async fn list(&self, kind: CanonicalKind) -> Result<Vec<StoredCanonical>, StoreError> {
        self.before_query().await?;
        let guard = self.data.pin();
        let mut records: Vec<StoredCanonical> = guard
            .iter()
            .filter(|(_, record)| record.kind == kind)
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}
