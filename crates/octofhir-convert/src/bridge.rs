use octofhir_core::{CanonicalKind, CanonicalResource, FhirVersion};
use octofhir_storage::StoredCanonical;
use serde_json::Value;
use tracing::trace;

use crate::common::{Direction, Object, convert_metadata};
use crate::error::ConversionError;
use crate::{
    implementation_guide, instance, questionnaire, search_parameter, structure_definition,
    structure_map, value_set,
};

/// Translates resources between FHIR versions.
///
/// Implementations must be pure: the same input always yields the same
/// output, and `convert(x, v, v)` returns `x` unchanged.
pub trait VersionBridge: Send + Sync {
    /// Converts a FHIR JSON resource from one version to another.
    fn convert(
        &self,
        resource: &Value,
        from: FhirVersion,
        to: FhirVersion,
    ) -> Result<Value, ConversionError>;

    /// Converts a persisted record into a canonical resource in `to`.
    fn convert_canonical(
        &self,
        record: &StoredCanonical,
        to: FhirVersion,
    ) -> Result<CanonicalResource, ConversionError> {
        let payload = self.convert(&record.payload, record.schema_version, to)?;
        CanonicalResource::from_payload(payload, to).map_err(|e| {
            ConversionError::new(record.kind.as_str(), Some(record.url.clone()), e.to_string())
        })
    }

    /// Converts an already resolved canonical resource into `to`.
    fn convert_resource(
        &self,
        resource: &CanonicalResource,
        to: FhirVersion,
    ) -> Result<CanonicalResource, ConversionError> {
        if resource.schema_version == to {
            return Ok(resource.clone());
        }
        let payload = self.convert(&resource.payload, resource.schema_version, to)?;
        let mut converted = resource.with_payload(payload);
        converted.schema_version = to;
        Ok(converted)
    }
}

/// Rule-based R4 <-> R5 bridge.
#[derive(Debug, Clone, Copy, Default)]
pub struct FhirVersionBridge;

impl FhirVersionBridge {
    pub fn new() -> Self {
        Self
    }
}

impl VersionBridge for FhirVersionBridge {
    fn convert(
        &self,
        resource: &Value,
        from: FhirVersion,
        to: FhirVersion,
    ) -> Result<Value, ConversionError> {
        let mut converted = resource.clone();
        let object = converted
            .as_object_mut()
            .ok_or_else(|| ConversionError::not_a_resource("expected a JSON object"))?;
        if !object.contains_key("resourceType") {
            return Err(ConversionError::not_a_resource("missing resourceType"));
        }
        let Some(direction) = Direction::between(from, to) else {
            return Ok(converted);
        };
        convert_object(object, direction)?;
        let resource_type = object
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default();
        trace!(
            resource_type,
            from = from.label(),
            to = to.label(),
            "converted resource"
        );
        Ok(converted)
    }
}

fn convert_object(object: &mut Object, direction: Direction) -> Result<(), ConversionError> {
    let resource_type = object
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| ConversionError::not_a_resource("resourceType must be a string"))?
        .to_string();

    match resource_type.as_str() {
        "StructureDefinition" => structure_definition::convert(object, direction)?,
        "StructureMap" => structure_map::convert(object, direction)?,
        "Questionnaire" => questionnaire::convert(object, direction),
        "ValueSet" => value_set::convert(object, direction),
        "ImplementationGuide" => implementation_guide::convert(object, direction),
        "SearchParameter" => search_parameter::convert(object, direction),
        "Observation" => instance::observation(object, direction),
        _ => {}
    }
    if CanonicalKind::from_resource_type(&resource_type).is_some() {
        convert_metadata(object, &resource_type, direction);
    }

    if let Some(contained) = object.get_mut("contained").and_then(Value::as_array_mut) {
        for inner in contained.iter_mut().filter_map(Value::as_object_mut) {
            convert_object(inner, direction)?;
        }
    }
    Ok(())
}
