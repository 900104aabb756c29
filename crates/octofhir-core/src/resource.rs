use crate::error::{CoreError, Result};
use crate::fhir::{FhirVersion, is_valid_resource_type_name};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A concrete resource instance, the subject of one transform run.
///
/// Instances are owned by the caller for the duration of a request and are
/// never cached by the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub schema_version: FhirVersion,
    pub content: Value,
}

impl ResourceInstance {
    /// Wraps parsed FHIR JSON. The value must be an object with a valid `resourceType`.
    pub fn from_json(content: Value, schema_version: FhirVersion) -> Result<Self> {
        let resource_type = content
            .as_object()
            .ok_or_else(|| CoreError::invalid_resource("resource must be a JSON object"))?
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::invalid_resource("missing resourceType"))?;
        if !is_valid_resource_type_name(resource_type) {
            return Err(CoreError::invalid_resource(format!(
                "invalid resourceType '{resource_type}'"
            )));
        }
        Ok(Self {
            resource_type: resource_type.to_string(),
            schema_version,
            content,
        })
    }

    /// Allocates an empty instance of `resource_type`.
    pub fn empty(resource_type: impl Into<String>, schema_version: FhirVersion) -> Self {
        let resource_type = resource_type.into();
        let mut map = Map::new();
        map.insert(
            "resourceType".to_string(),
            Value::String(resource_type.clone()),
        );
        Self {
            resource_type,
            schema_version,
            content: Value::Object(map),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    /// Sets a top-level element. `resourceType` cannot be overwritten.
    pub fn set_field(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if key == "resourceType" {
            return;
        }
        if let Some(obj) = self.content.as_object_mut() {
            obj.insert(key, value);
        }
    }

    pub fn remove_field(&mut self, key: &str) -> Option<Value> {
        if key == "resourceType" {
            return None;
        }
        self.content.as_object_mut().and_then(|obj| obj.remove(key))
    }

    /// Names of populated top-level elements, excluding `resourceType`.
    pub fn field_names(&self) -> Vec<&str> {
        self.content
            .as_object()
            .map(|obj| {
                obj.keys()
                    .map(String::as_str)
                    .filter(|k| *k != "resourceType")
                    .collect()
            })
            .unwrap_or_default()
    }
}
