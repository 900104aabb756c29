//! FHIR wire formats: JSON and XML.

mod shape;
mod xml;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use shape::ElementShape;

pub const FHIR_NAMESPACE: &str = "http://hl7.org/fhir";
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FhirFormat {
    Json,
    Xml,
}

impl FhirFormat {
    /// Parses a media type or a `_format` shorthand. Parameters such as
    /// `; charset=utf-8` and `fhirVersion=4.0` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/fhir+json" | "application/json" | "json" => Some(Self::Json),
            "application/fhir+xml" | "application/xml" | "text/xml" | "xml" => Some(Self::Xml),
            _ => None,
        }
    }

    /// Picks the first supported entry of an `Accept` header.
    pub fn negotiate(accept: &str) -> Option<Self> {
        accept.split(',').find_map(Self::from_mime)
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Json => "application/fhir+json",
            Self::Xml => "application/fhir+xml",
        }
    }
}

impl fmt::Display for FhirFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Xml => write!(f, "xml"),
        }
    }
}

impl FromStr for FhirFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_mime(s).ok_or_else(|| FormatError::Unsupported(s.to_string()))
    }
}

#[derive(Debug, Clone, Error)]
pub enum FormatError {
    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Invalid XML: {0}")]
    Xml(String),

    #[error("Unsupported format: {0}")]
    Unsupported(String),
}

impl From<serde_json::Error> for FormatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<quick_xml::Error> for FormatError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}

/// Parses a resource using the built-in element shape for XML.
pub fn decode(body: &[u8], format: FhirFormat) -> Result<Value, FormatError> {
    decode_with(body, format, |_| ElementShape::builtin())
}

/// Parses a resource. `shape_for` is asked for the shape of every resource
/// type met in an XML document (root and contained).
pub fn decode_with<F>(body: &[u8], format: FhirFormat, shape_for: F) -> Result<Value, FormatError>
where
    F: Fn(&str) -> ElementShape,
{
    match format {
        FhirFormat::Json => {
            let value: Value = serde_json::from_slice(body)?;
            if !value.is_object() {
                return Err(FormatError::Json("resource must be a JSON object".into()));
            }
            Ok(value)
        }
        FhirFormat::Xml => {
            let text =
                std::str::from_utf8(body).map_err(|e| FormatError::Xml(e.to_string()))?;
            xml::from_xml(text, &shape_for)
        }
    }
}

pub fn encode(resource: &Value, format: FhirFormat) -> Result<Vec<u8>, FormatError> {
    match format {
        FhirFormat::Json => Ok(serde_json::to_vec_pretty(resource)?),
        FhirFormat::Xml => xml::to_xml(resource),
    }
}
