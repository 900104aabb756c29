//! # octofhir-storage
//!
//! Store abstraction for persisted canonical resources.
//!
//! This crate defines the trait the resolution context consumes when a
//! canonical URL is not yet cached. It does not contain any implementations;
//! those are provided by separate crates (`octofhir-db-memory`).
//!
//! ## Overview
//!
//! The main trait is [`ResourceStore`], which answers two questions:
//! - which record has this kind and canonical URL (`find`)
//! - which records of a kind exist (`list`)
//!
//! ## Example
//!
//! ```ignore
//! use octofhir_core::CanonicalKind;
//! use octofhir_storage::{DynResourceStore, StoreError};
//!
//! async fn has_map(store: &DynResourceStore, url: &str) -> Result<bool, StoreError> {
//!     Ok(store.find(CanonicalKind::StructureMap, url).await?.is_some())
//! }
//! ```

mod error;
mod traits;
mod types;

// Re-export everything from submodules
pub use error::{ErrorCategory, StoreError};
pub use traits::ResourceStore;
pub use types::{StoredCanonical, record_key};

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shared store trait object.
pub type DynResourceStore = std::sync::Arc<dyn ResourceStore>;
