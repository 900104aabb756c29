//! # octofhir-convert
//!
//! Version bridge between FHIR R4 and FHIR R5 JSON representations.
//!
//! ## Overview
//!
//! [`VersionBridge`] converts canonical resources (StructureDefinition,
//! StructureMap, Questionnaire, ValueSet, CodeSystem, ImplementationGuide,
//! SearchParameter) and resource instances between versions. Elements with no
//! home in the target version are dropped; elements the target requires are
//! synthesised with fixed defaults. R5-only canonical metadata travels through
//! R4 as cross-version extensions so it survives a round trip.
//!
//! Conversion of a resource into its own version is the identity.
//!
//! ## Example
//!
//! ```ignore
//! use octofhir_convert::{FhirVersionBridge, VersionBridge};
//! use octofhir_core::FhirVersion;
//!
//! let bridge = FhirVersionBridge::new();
//! let r5 = bridge.convert(&questionnaire, FhirVersion::R4, FhirVersion::R5)?;
//! ```

mod bridge;
mod common;
mod error;
mod implementation_guide;
mod instance;
mod questionnaire;
mod search_parameter;
mod structure_definition;
mod structure_map;
mod value_set;

pub use bridge::{FhirVersionBridge, VersionBridge};
pub use common::{CROSS_VERSION_EXTENSION_BASE, cross_version_url};
pub use error::ConversionError;

/// Type alias for a shared bridge trait object.
pub type DynVersionBridge = std::sync::Arc<dyn VersionBridge>;
