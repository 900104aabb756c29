//! Helpers shared by the per-resource converters.

use octofhir_core::FhirVersion;
use serde_json::{Map, Value};

use crate::error::ConversionError;

pub(crate) type Object = Map<String, Value>;

/// Direction of one conversion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    ToR5,
    ToR4,
}

impl Direction {
    /// `None` when both versions are equal.
    pub(crate) fn between(from: FhirVersion, to: FhirVersion) -> Option<Self> {
        match (from, to) {
            (FhirVersion::R4, FhirVersion::R5) => Some(Self::ToR5),
            (FhirVersion::R5, FhirVersion::R4) => Some(Self::ToR4),
            _ => None,
        }
    }
}

/// Prefix of the cross-version extensions defined for R5 elements.
pub const CROSS_VERSION_EXTENSION_BASE: &str =
    "http://hl7.org/fhir/5.0/StructureDefinition/extension-";

/// R5-only canonical metadata: (R5 element, extension element, extension value key).
const R5_METADATA: [(&str, &str, &str); 3] = [
    ("versionAlgorithmString", "versionAlgorithm", "valueString"),
    ("versionAlgorithmCoding", "versionAlgorithm", "valueCoding"),
    ("copyrightLabel", "copyrightLabel", "valueString"),
];

/// URL of the cross-version extension carrying `<resource_type>.<element>`.
pub fn cross_version_url(resource_type: &str, element: &str) -> String {
    format!("{CROSS_VERSION_EXTENSION_BASE}{resource_type}.{element}")
}

/// Moves R5-only canonical metadata into extensions (to R4) or back (to R5).
pub(crate) fn convert_metadata(resource: &mut Object, resource_type: &str, direction: Direction) {
    for (field, element, value_key) in R5_METADATA {
        let url = cross_version_url(resource_type, element);
        match direction {
            Direction::ToR4 => {
                if let Some(value) = resource.remove(field) {
                    let mut extension = Object::new();
                    extension.insert("url".to_string(), Value::String(url));
                    extension.insert(value_key.to_string(), value);
                    push_extension(resource, Value::Object(extension));
                }
            }
            Direction::ToR5 => {
                if let Some(value) = take_extension_value(resource, &url, value_key) {
                    resource.insert(field.to_string(), value);
                }
            }
        }
    }
}

pub(crate) fn push_extension(resource: &mut Object, extension: Value) {
    let slot = resource
        .entry("extension")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(extensions) = slot {
        extensions.push(extension);
    }
}

/// Removes the first extension with `url` carrying `value_key` and returns its value.
///
/// Drops the `extension` element once it is empty.
pub(crate) fn take_extension_value(
    resource: &mut Object,
    url: &str,
    value_key: &str,
) -> Option<Value> {
    let extensions = resource.get_mut("extension")?.as_array_mut()?;
    let index = extensions.iter().position(|ext| {
        ext.get("url").and_then(Value::as_str) == Some(url) && ext.get(value_key).is_some()
    })?;
    let mut extension = extensions.remove(index);
    if extensions.is_empty() {
        resource.remove("extension");
    }
    extension
        .as_object_mut()
        .and_then(|ext| ext.remove(value_key))
}

/// Object entries of the array element `key`; non-object entries are skipped.
pub(crate) fn objects_mut<'a>(
    owner: &'a mut Object,
    key: &str,
) -> impl Iterator<Item = &'a mut Object> + use<'a> {
    owner
        .get_mut(key)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object_mut)
}

/// Fails unless `element` is present, non-null and not an empty string or array.
pub(crate) fn require_element(resource: &Object, element: &str) -> Result<(), ConversionError> {
    let present = match resource.get(element) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    };
    if present {
        Ok(())
    } else {
        Err(ConversionError::missing_element(resource, element))
    }
}
