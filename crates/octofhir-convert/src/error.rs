use serde_json::{Map, Value};
use thiserror::Error;

/// A resource could not be carried across FHIR versions.
///
/// Raised when a mandatory element is missing or has no representation in the
/// target version. Never swallowed by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot convert {resource_kind} ({}): {reason}", .url.as_deref().unwrap_or("no url"))]
pub struct ConversionError {
    pub resource_kind: String,
    pub url: Option<String>,
    pub reason: String,
}

impl ConversionError {
    pub fn new(
        resource_kind: impl Into<String>,
        url: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            resource_kind: resource_kind.into(),
            url,
            reason: reason.into(),
        }
    }

    /// The input is not a FHIR resource at all.
    pub fn not_a_resource(reason: impl Into<String>) -> Self {
        Self::new("unknown", None, reason)
    }

    pub(crate) fn missing_element(resource: &Map<String, Value>, element: &str) -> Self {
        let kind = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let url = resource
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self::new(kind, url, format!("missing mandatory element '{element}'"))
    }
}
