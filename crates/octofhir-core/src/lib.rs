pub mod canonical;
pub mod error;
pub mod fhir;
pub mod resource;

pub use canonical::{
    CanonicalReference, CanonicalResource, TARGET_STRUCTURE_MAP_EXTENSION,
    extension_string_value, find_extension,
};
pub use error::{CoreError, ErrorCategory, Result};
pub use fhir::{CanonicalKind, FhirVersion, is_valid_resource_type_name};
pub use resource::ResourceInstance;
