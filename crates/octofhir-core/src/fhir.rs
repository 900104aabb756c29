use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// FHIR version enumeration.
///
/// Only the two versions bridged by the converter are modelled: R4 is the
/// version persisted by most stores, R5 is the working model of the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FhirVersion {
    #[serde(rename = "4.0.1", alias = "R4")]
    R4,
    #[serde(rename = "5.0.0", alias = "R5")]
    R5,
}

impl FhirVersion {
    /// Short release label, e.g. "R4".
    pub fn label(&self) -> &'static str {
        match self {
            FhirVersion::R4 => "R4",
            FhirVersion::R5 => "R5",
        }
    }
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FhirVersion::R4 => write!(f, "4.0.1"),
            FhirVersion::R5 => write!(f, "5.0.0"),
        }
    }
}

impl FromStr for FhirVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "4.0.1" | "4.0" | "R4" => Ok(FhirVersion::R4),
            "5.0.0" | "5.0" | "R5" => Ok(FhirVersion::R5),
            _ => Err(CoreError::invalid_fhir_version(s)),
        }
    }
}

impl Default for FhirVersion {
    fn default() -> Self {
        FhirVersion::R5
    }
}

/// Kinds of canonical (definitional) resources the context can cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalKind {
    StructureDefinition,
    StructureMap,
    ValueSet,
    CodeSystem,
    Questionnaire,
    ImplementationGuide,
    SearchParameter,
}

impl CanonicalKind {
    pub const ALL: [CanonicalKind; 7] = [
        CanonicalKind::StructureDefinition,
        CanonicalKind::StructureMap,
        CanonicalKind::ValueSet,
        CanonicalKind::CodeSystem,
        CanonicalKind::Questionnaire,
        CanonicalKind::ImplementationGuide,
        CanonicalKind::SearchParameter,
    ];

    /// The FHIR `resourceType` name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalKind::StructureDefinition => "StructureDefinition",
            CanonicalKind::StructureMap => "StructureMap",
            CanonicalKind::ValueSet => "ValueSet",
            CanonicalKind::CodeSystem => "CodeSystem",
            CanonicalKind::Questionnaire => "Questionnaire",
            CanonicalKind::ImplementationGuide => "ImplementationGuide",
            CanonicalKind::SearchParameter => "SearchParameter",
        }
    }

    /// Returns the kind for a resource type name, or `None` for
    /// non-canonical resource types.
    pub fn from_resource_type(resource_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == resource_type)
    }
}

impl fmt::Display for CanonicalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_resource_type(s).ok_or_else(|| CoreError::invalid_kind(s))
    }
}

/// Validate if a string is a valid FHIR resource type name
pub fn is_valid_resource_type_name(name: &str) -> bool {
    // FHIR resource type names must start with uppercase letter and contain only letters
    !name.is_empty()
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_uppercase())
            .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fhir_version_display() {
        assert_eq!(FhirVersion::R4.to_string(), "4.0.1");
        assert_eq!(FhirVersion::R5.to_string(), "5.0.0");
        assert_eq!(FhirVersion::R4.label(), "R4");
    }

    #[test]
    fn test_fhir_version_from_str() {
        assert_eq!(FhirVersion::from_str("4.0.1").unwrap(), FhirVersion::R4);
        assert_eq!(FhirVersion::from_str("r4").unwrap(), FhirVersion::R4);
        assert_eq!(FhirVersion::from_str("5.0.0").unwrap(), FhirVersion::R5);
        assert_eq!(FhirVersion::from_str("R5").unwrap(), FhirVersion::R5);

        assert!(FhirVersion::from_str("R4B").is_err());
        assert!(FhirVersion::from_str("3.0.2").is_err());
    }

    #[test]
    fn test_fhir_version_serialization() {
        let json = serde_json::to_string(&FhirVersion::R4).unwrap();
        assert_eq!(json, "\"4.0.1\"");

        let version: FhirVersion = serde_json::from_str("\"5.0.0\"").unwrap();
        assert_eq!(version, FhirVersion::R5);
        let version: FhirVersion = serde_json::from_str("\"R4\"").unwrap();
        assert_eq!(version, FhirVersion::R4);
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in CanonicalKind::ALL {
            let parsed = CanonicalKind::from_str(&kind.to_string()).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_kind_rejects_instances() {
        assert!(CanonicalKind::from_resource_type("Patient").is_none());
        match CanonicalKind::from_str("QuestionnaireResponse") {
            Err(CoreError::InvalidKind(name)) => assert_eq!(name, "QuestionnaireResponse"),
            other => panic!("expected InvalidKind, got {other:?}"),
        }
    }

    #[test]
    fn test_is_valid_resource_type_name() {
        assert!(is_valid_resource_type_name("Patient"));
        assert!(is_valid_resource_type_name("QuestionnaireResponse"));

        assert!(!is_valid_resource_type_name("patient"));
        assert!(!is_valid_resource_type_name("Patient123"));
        assert!(!is_valid_resource_type_name(""));
    }
}
