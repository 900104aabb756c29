//! Canonical references and canonical resources.
//!
//! A canonical resource is any definitional resource addressable by its
//! canonical URL (StructureDefinition, StructureMap, ValueSet, ...). The
//! payload is kept as FHIR JSON; accessors pull out the handful of fields the
//! context needs for indexing.

use crate::error::{CoreError, Result};
use crate::fhir::{CanonicalKind, FhirVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A canonical URL, optionally pinned to a business version (`url|version`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalReference {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CanonicalReference {
    /// Parses `url` or `url|version`. The split happens on the last `|`.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        let (url, version) = match reference.rsplit_once('|') {
            Some((url, version)) => {
                let version = version.trim();
                (url.trim(), (!version.is_empty()).then(|| version.to_string()))
            }
            None => (reference, None),
        };
        if url.is_empty() {
            return Err(CoreError::invalid_canonical(reference));
        }
        Ok(Self {
            url: url.to_string(),
            version,
        })
    }

    pub fn unversioned(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            version: None,
        }
    }

    /// Whether a resource carrying `version` satisfies this reference.
    pub fn accepts(&self, version: Option<&str>) -> bool {
        match (&self.version, version) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => wanted == actual,
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for CanonicalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}|{}", self.url, version),
            None => f.write_str(&self.url),
        }
    }
}

impl FromStr for CanonicalReference {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A resolved canonical resource in a known FHIR version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalResource {
    pub kind: CanonicalKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub schema_version: FhirVersion,
    pub payload: Value,
}

impl CanonicalResource {
    /// Builds a canonical resource from FHIR JSON.
    ///
    /// The payload must be an object whose `resourceType` names a canonical
    /// kind and which carries a non-empty `url`.
    pub fn from_payload(payload: Value, schema_version: FhirVersion) -> Result<Self> {
        let obj = payload
            .as_object()
            .ok_or_else(|| CoreError::invalid_resource("canonical resource must be a JSON object"))?;
        let resource_type = obj
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::invalid_resource("missing resourceType"))?;
        let kind = CanonicalKind::from_str(resource_type)?;
        let url = obj
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CoreError::invalid_resource(format!("{resource_type} without url")))?
            .to_string();
        let version = obj
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            kind,
            url,
            version,
            schema_version,
            payload,
        })
    }

    /// Returns a copy with a replaced payload, keeping identity fields.
    pub fn with_payload(&self, payload: Value) -> Self {
        Self {
            kind: self.kind,
            url: self.url.clone(),
            version: self.version.clone(),
            schema_version: self.schema_version,
            payload,
        }
    }

    pub fn reference(&self) -> CanonicalReference {
        CanonicalReference {
            url: self.url.clone(),
            version: self.version.clone(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(Value::as_str)
    }

    /// `name` of the resource, falling back to the URL.
    pub fn display_name(&self) -> &str {
        self.get_str("name").unwrap_or(&self.url)
    }
}

/// Extension URL carried by Questionnaires naming the StructureMap used by `$extract`.
pub const TARGET_STRUCTURE_MAP_EXTENSION: &str =
    "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-targetStructureMap";

/// Finds the first extension with `url` in a resource or element.
pub fn find_extension<'a>(element: &'a Value, url: &str) -> Option<&'a Value> {
    element
        .get("extension")
        .and_then(Value::as_array)?
        .iter()
        .find(|ext| ext.get("url").and_then(Value::as_str) == Some(url))
}

/// Primitive string value of an extension (`value[x]` of any string-like type).
pub fn extension_string_value(extension: &Value) -> Option<&str> {
    ["valueCanonical", "valueUri", "valueUrl", "valueString", "valueCode"]
        .iter()
        .find_map(|key| extension.get(*key).and_then(Value::as_str))
}
