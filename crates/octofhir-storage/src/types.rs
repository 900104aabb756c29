//! Record types exchanged with resource stores.

use octofhir_core::{CanonicalKind, CanonicalResource, CoreError, FhirVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A canonical resource as persisted by a store, in the store's native FHIR version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCanonical {
    /// The canonical kind (resource type).
    pub kind: CanonicalKind,
    /// The canonical URL.
    pub url: String,
    /// Business version, when the resource declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// FHIR version the payload is expressed in.
    pub schema_version: FhirVersion,
    /// The full resource content as JSON.
    pub payload: Value,
}

impl StoredCanonical {
    /// Builds a record from raw FHIR JSON, extracting kind, url and version.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is not a canonical resource with a url.
    pub fn from_json(payload: Value, schema_version: FhirVersion) -> Result<Self, CoreError> {
        let resource = CanonicalResource::from_payload(payload, schema_version)?;
        Ok(Self::from(resource))
    }

    /// Key used by stores that index records by kind and url.
    #[must_use]
    pub fn key(&self) -> String {
        record_key(self.kind, &self.url)
    }
}

impl From<CanonicalResource> for StoredCanonical {
    fn from(resource: CanonicalResource) -> Self {
        Self {
            kind: resource.kind,
            url: resource.url,
            version: resource.version,
            schema_version: resource.schema_version,
            payload: resource.payload,
        }
    }
}

/// Index key for a canonical record: `Kind|url`.
#[must_use]
pub fn record_key(kind: CanonicalKind, url: &str) -> String {
    format!("{kind}|{url}")
}
