//! In-memory canonical resource store for OctoFHIR.
//!
//! This crate provides an in-memory implementation of the `ResourceStore`
//! trait from `octofhir-storage`, using papaya lock-free HashMap for
//! concurrent access.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_db_memory::InMemoryResourceStore;
//! use octofhir_core::{CanonicalKind, FhirVersion};
//!
//! let store = InMemoryResourceStore::new();
//! store.load_dir("definitions/", FhirVersion::R4).await?;
//! let map = store.find(CanonicalKind::StructureMap, "http://example.org/StructureMap/M1").await?;
//! ```

mod loader;
pub mod storage;

// Re-export the ResourceStore trait for convenience
pub use octofhir_storage::{ResourceStore, StoreError, StoredCanonical};

pub use storage::{InMemoryResourceStore, StoreOptions};

/// Creates a new shareable in-memory store.
pub fn create_resource_store() -> octofhir_storage::DynResourceStore {
    std::sync::Arc::new(InMemoryResourceStore::new())
}
