#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use octofhir_canonical::ResolutionContext;
use octofhir_core::{CanonicalResource, FhirVersion, ResourceInstance};
use octofhir_db_memory::InMemoryResourceStore;
use octofhir_transform::{MappingInterpreter, RuleError};
use serde_json::{Value, json};

pub const Q1: &str = "http://example.org/Questionnaire/Q1";
pub const M1: &str = "http://example.org/StructureMap/M1";
pub const OBSERVATION_SD: &str = "http://hl7.org/fhir/StructureDefinition/Observation";
pub const QR_SD: &str = "http://hl7.org/fhir/StructureDefinition/QuestionnaireResponse";

pub fn questionnaire(map_url: Option<&str>) -> Value {
    let mut questionnaire = json!({
        "resourceType": "Questionnaire",
        "url": Q1,
        "status": "active",
        "item": [
            {"linkId": "weight", "text": "Body weight (kg)", "type": "decimal"},
            {"linkId": "smoker", "text": "Smoker?", "type": "choice",
             "answerOption": [{"valueCoding": {"code": "yes"}}, {"valueCoding": {"code": "no"}}]}
        ]
    });
    if let Some(url) = map_url {
        questionnaire["extension"] = json!([{
            "url": "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-targetStructureMap",
            "valueCanonical": url
        }]);
    }
    questionnaire
}

/// R4 map from the weight answer to a body-weight Observation.
pub fn weight_map() -> Value {
    json!({
        "resourceType": "StructureMap",
        "url": M1,
        "name": "WeightToObservation",
        "status": "active",
        "structure": [
            {"url": QR_SD, "mode": "source", "alias": "QR"},
            {"url": OBSERVATION_SD, "mode": "target", "alias": "Obs"}
        ],
        "group": [{
            "name": "main",
            "typeMode": "none",
            "input": [
                {"name": "src", "type": "QR", "mode": "source"},
                {"name": "tgt", "type": "Obs", "mode": "target"}
            ],
            "rule": [
                {
                    "name": "status",
                    "source": [{"context": "src"}],
                    "target": [{
                        "context": "tgt", "contextType": "variable", "element": "status",
                        "transform": "copy", "parameter": [{"valueString": "final"}]
                    }]
                },
                {
                    "name": "weight",
                    "source": [{"context": "src"}],
                    "target": [{
                        "context": "tgt", "contextType": "variable", "element": "valueQuantity",
                        "transform": "evaluate", "parameter": [{"valueString": "weight"}]
                    }]
                }
            ]
        }]
    })
}

/// R4 Observation definition with the elements the weight map writes.
pub fn observation_definition() -> Value {
    json!({
        "resourceType": "StructureDefinition",
        "url": OBSERVATION_SD,
        "version": "4.0.1",
        "name": "Observation",
        "status": "active",
        "kind": "resource",
        "abstract": false,
        "type": "Observation",
        "baseDefinition": "http://hl7.org/fhir/StructureDefinition/DomainResource",
        "derivation": "specialization",
        "snapshot": {"element": [
            {"id": "Observation", "path": "Observation", "min": 0, "max": "*"},
            {"id": "Observation.status", "path": "Observation.status", "min": 1, "max": "1",
             "type": [{"code": "code"}]},
            {"id": "Observation.code", "path": "Observation.code", "min": 1, "max": "1",
             "type": [{"code": "CodeableConcept"}]},
            {"id": "Observation.subject", "path": "Observation.subject", "min": 0, "max": "1",
             "type": [{"code": "Reference"}]},
            {"id": "Observation.value[x]", "path": "Observation.value[x]", "min": 0, "max": "1",
             "type": [{"code": "Quantity"}, {"code": "string"}, {"code": "boolean"}]},
            {"id": "Observation.note", "path": "Observation.note", "min": 0, "max": "*",
             "type": [{"code": "Annotation"}]}
        ]}
    })
}

pub fn response(questionnaire: Option<&str>) -> Value {
    let mut response = json!({
        "resourceType": "QuestionnaireResponse",
        "id": "qr1",
        "status": "completed",
        "item": [
            {"linkId": "weight", "answer": [{"valueDecimal": 72.5}]},
            {"linkId": "smoker", "answer": [{"valueCoding": {"code": "no"}}]}
        ]
    });
    if let Some(url) = questionnaire {
        response["questionnaire"] = json!(url);
    }
    response
}

/// A store holding Q1 (bound to M1), M1 and the Observation definition, all R4.
pub fn bound_store() -> Arc<InMemoryResourceStore> {
    store_with(vec![
        questionnaire(Some(M1)),
        weight_map(),
        observation_definition(),
    ])
}

pub fn store_with(resources: Vec<Value>) -> Arc<InMemoryResourceStore> {
    let store = InMemoryResourceStore::new();
    for resource in resources {
        store
            .insert_json(resource, FhirVersion::R4)
            .expect("fixture is a canonical resource");
    }
    Arc::new(store)
}

pub fn context(store: Arc<InMemoryResourceStore>) -> Arc<ResolutionContext> {
    Arc::new(ResolutionContext::builder(store).build())
}

/// Follows `copy` and `evaluate` targets of a map's first group; a target
/// with the `fail` transform reports a rule error.
#[derive(Default)]
pub struct RuleFollowingInterpreter {
    pub runs: AtomicUsize,
}

impl RuleFollowingInterpreter {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MappingInterpreter for RuleFollowingInterpreter {
    async fn run(
        &self,
        _context: &ResolutionContext,
        source: &ResourceInstance,
        map: &CanonicalResource,
        target: &mut ResourceInstance,
    ) -> Result<(), RuleError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let rules = map.payload["group"][0]["rule"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        for rule in rules {
            let rule_id = rule["name"].as_str().unwrap_or("anonymous").to_string();
            for rule_target in rule["target"].as_array().into_iter().flatten() {
                let element = rule_target["element"].as_str().unwrap_or_default();
                let parameter = rule_target["parameter"][0]["valueString"].as_str();
                match rule_target["transform"].as_str() {
                    Some("copy") => {
                        target.set_field(element, json!(parameter.unwrap_or_default()));
                    }
                    Some("evaluate") => {
                        let link_id = parameter.unwrap_or_default();
                        let answer = answer_value(&source.content, link_id).ok_or_else(|| {
                            RuleError::new(&rule_id, format!("no answer for '{link_id}'"))
                        })?;
                        let value = if element == "valueQuantity" {
                            json!({"value": answer, "unit": "kg"})
                        } else {
                            answer
                        };
                        target.set_field(element, value);
                    }
                    Some("fail") => {
                        return Err(RuleError::new(rule_id, "transform refused"));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

fn answer_value(response: &Value, link_id: &str) -> Option<Value> {
    let item = response["item"]
        .as_array()?
        .iter()
        .find(|item| item["linkId"] == link_id)?;
    let answer = item["answer"].as_array()?.first()?.as_object()?;
    answer
        .iter()
        .find(|(key, _)| key.starts_with("value"))
        .map(|(_, value)| value.clone())
}
