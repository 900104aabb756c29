mod common;

use std::sync::Arc;

use assert_json_diff::assert_json_eq;
use common::{patient_definition, profile, record, structure_map};
use octofhir_canonical::{ContextError, ResolutionContext};
use octofhir_core::{CanonicalKind, FhirVersion};
use octofhir_db_memory::InMemoryResourceStore;
use serde_json::json;

fn empty_store() -> Arc<InMemoryResourceStore> {
    Arc::new(InMemoryResourceStore::new())
}

#[tokio::test]
async fn bootstrapped_patient_definition_is_r5() {
    let store = empty_store();
    let context = ResolutionContext::builder(store.clone())
        .build_bootstrapped(vec![record(patient_definition())])
        .await
        .expect("bootstrap");

    let patient = context
        .resolve(
            CanonicalKind::StructureDefinition,
            "http://hl7.org/fhir/StructureDefinition/Patient",
        )
        .await
        .unwrap();

    assert_eq!(patient.schema_version, FhirVersion::R5);
    assert_eq!(patient.version.as_deref(), Some("4.0.1"));
    let source = patient_definition();
    for field in ["name", "kind", "type", "abstract", "baseDefinition", "derivation", "snapshot"] {
        assert_eq!(patient.payload[field], source[field], "field {field}");
    }
    // Served from the bootstrap set, never from the store.
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn bootstrap_preserves_input_order() {
    let context = ResolutionContext::builder(empty_store()).build();
    let urls = ["http://maps/C", "http://maps/A", "http://maps/B"];
    let registered = context
        .bootstrap(urls.iter().map(|url| record(structure_map(url))))
        .await
        .unwrap();
    assert_eq!(registered, 3);

    let order: Vec<String> = context
        .all(CanonicalKind::StructureMap)
        .map(|m| m.url.clone())
        .collect();
    assert_eq!(order, urls);
}

#[tokio::test]
async fn one_unconvertible_record_aborts_bootstrap() {
    let broken = json!({"resourceType": "StructureMap", "url": "http://maps/broken", "name": "broken"});

    let context = ResolutionContext::builder(empty_store()).build();
    let err = context
        .bootstrap(vec![
            record(patient_definition()),
            record(broken.clone()),
            record(structure_map("http://maps/ok")),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::Conversion(_)));
    assert!(context.cache().is_empty());

    let built = ResolutionContext::builder(empty_store())
        .build_bootstrapped(vec![record(broken)])
        .await;
    assert!(built.is_err());
}

#[tokio::test]
async fn bootstrap_generates_missing_snapshots() {
    let differential = vec![json!({
        "id": "Patient.name", "path": "Patient.name", "min": 1
    })];
    let context = ResolutionContext::builder(empty_store())
        .build_bootstrapped(vec![
            record(patient_definition()),
            record(profile(
                "http://example.org/StructureDefinition/NamedPatient",
                "Patient",
                "http://hl7.org/fhir/StructureDefinition/Patient",
                differential,
            )),
        ])
        .await
        .unwrap();

    let named = context
        .lookup(
            CanonicalKind::StructureDefinition,
            "http://example.org/StructureDefinition/NamedPatient",
        )
        .unwrap();
    assert_json_eq!(
        named.payload["snapshot"]["element"],
        json!([
            {"id": "Patient", "path": "Patient", "min": 0, "max": "*"},
            {"id": "Patient.active", "path": "Patient.active", "min": 0, "max": "1", "type": [{"code": "boolean"}]},
            {"id": "Patient.name", "path": "Patient.name", "min": 1, "max": "*", "type": [{"code": "HumanName"}]}
        ])
    );
}

#[tokio::test]
async fn snapshot_failure_aborts_bootstrap() {
    let orphan = profile(
        "http://example.org/StructureDefinition/Orphan",
        "Patient",
        "http://example.org/StructureDefinition/DoesNotExist",
        vec![json!({"id": "Patient", "path": "Patient"})],
    );

    let context = ResolutionContext::builder(empty_store()).build();
    let err = context
        .bootstrap(vec![record(structure_map("http://maps/ok")), record(orphan)])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(context.cache().is_empty());
}

#[tokio::test]
async fn snapshots_can_be_disabled() {
    let context = ResolutionContext::builder(empty_store())
        .generate_snapshots(false)
        .build_bootstrapped(vec![record(profile(
            "http://example.org/StructureDefinition/Orphan",
            "Patient",
            "http://example.org/StructureDefinition/DoesNotExist",
            vec![json!({"id": "Patient", "path": "Patient"})],
        ))])
        .await
        .unwrap();
    assert_eq!(context.cache().len(), 1);
}
