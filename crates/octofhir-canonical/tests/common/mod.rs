#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use octofhir_core::{CanonicalKind, FhirVersion};
use octofhir_db_memory::{InMemoryResourceStore, StoreOptions};
use octofhir_storage::{ResourceStore, StoreError, StoredCanonical};
use serde_json::{Value, json};
use tokio::sync::Semaphore;

pub fn store_with(resources: Vec<Value>) -> Arc<InMemoryResourceStore> {
    store_with_options(resources, StoreOptions::default())
}

pub fn store_with_options(resources: Vec<Value>, options: StoreOptions) -> Arc<InMemoryResourceStore> {
    let store = InMemoryResourceStore::with_options(options);
    for resource in resources {
        store.insert_json(resource, FhirVersion::R4).unwrap();
    }
    Arc::new(store)
}

pub fn slow(latency_ms: u64) -> StoreOptions {
    StoreOptions {
        latency: Some(Duration::from_millis(latency_ms)),
        offline: false,
    }
}

/// Store whose lookups block until [`GatedStore::release`] hands out a permit.
pub struct GatedStore {
    inner: Arc<InMemoryResourceStore>,
    gate: Semaphore,
    queries: AtomicUsize,
}

impl GatedStore {
    pub fn new(resources: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            inner: store_with(resources),
            gate: Semaphore::new(0),
            queries: AtomicUsize::new(0),
        })
    }

    /// Lets `lookups` pending or future lookups through.
    pub fn release(&self, lookups: usize) {
        self.gate.add_permits(lookups);
    }

    /// Lookups started, including those still waiting at the gate.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceStore for GatedStore {
    async fn find(
        &self,
        kind: CanonicalKind,
        canonical_url: &str,
    ) -> Result<Option<StoredCanonical>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        permit.forget();
        self.inner.find(kind, canonical_url).await
    }

    async fn list(&self, kind: CanonicalKind) -> Result<Vec<StoredCanonical>, StoreError> {
        self.inner.list(kind).await
    }

    fn backend_name(&self) -> &'static str {
        "gated"
    }
}

pub fn record(value: Value) -> StoredCanonical {
    StoredCanonical::from_json(value, FhirVersion::R4).unwrap()
}

pub fn structure_map(url: &str) -> Value {
    json!({
        "resourceType": "StructureMap",
        "url": url,
        "name": "M1",
        "status": "draft",
        "structure": [
            {"url": "http://hl7.org/fhir/StructureDefinition/QuestionnaireResponse", "mode": "source"},
            {"url": "http://hl7.org/fhir/StructureDefinition/Observation", "mode": "target"}
        ],
        "group": [{
            "name": "main",
            "typeMode": "none",
            "input": [{"name": "src", "mode": "source"}, {"name": "tgt", "mode": "target"}],
            "rule": [{"name": "status", "source": [{"context": "src"}],
                      "target": [{"context": "tgt", "contextType": "variable", "element": "status"}]}]
        }]
    })
}

pub fn patient_definition() -> Value {
    json!({
        "resourceType": "StructureDefinition",
        "url": "http://hl7.org/fhir/StructureDefinition/Patient",
        "version": "4.0.1",
        "name": "Patient",
        "status": "active",
        "kind": "resource",
        "abstract": false,
        "type": "Patient",
        "baseDefinition": "http://hl7.org/fhir/StructureDefinition/DomainResource",
        "derivation": "specialization",
        "snapshot": {"element": [
            {"id": "Patient", "path": "Patient", "min": 0, "max": "*"},
            {"id": "Patient.active", "path": "Patient.active", "min": 0, "max": "1", "type": [{"code": "boolean"}]},
            {"id": "Patient.name", "path": "Patient.name", "min": 0, "max": "*", "type": [{"code": "HumanName"}]}
        ]}
    })
}

/// A differential-only definition deriving from `base`.
pub fn profile(url: &str, type_name: &str, base: &str, differential: Vec<Value>) -> Value {
    json!({
        "resourceType": "StructureDefinition",
        "url": url,
        "name": url.rsplit('/').next().unwrap_or("profile"),
        "status": "draft",
        "kind": "resource",
        "abstract": false,
        "type": type_name,
        "baseDefinition": base,
        "derivation": "constraint",
        "differential": {"element": differential}
    })
}
