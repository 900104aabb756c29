//! # octofhir-canonical
//!
//! Process-local cache and resolver for FHIR canonical resources.
//!
//! ## Overview
//!
//! - [`CanonicalCache`]: insertion-ordered (kind, url) map, no I/O
//! - [`OverlayCache`]: private writes over a shared cache, promoted explicitly
//! - [`ResolutionContext`]: cache hit, or single-flight fetch from a
//!   [`ResourceStore`](octofhir_storage::ResourceStore), conversion to the
//!   working FHIR version and registration
//!
//! Contexts are explicit values; share one behind an `Arc` and derive a
//! [`ScopedContext`] per transform run to keep speculative resolutions out of
//! the shared cache.
//!
//! ## Example
//!
//! ```ignore
//! use octofhir_canonical::ResolutionContext;
//! use octofhir_core::{CanonicalKind, FhirVersion};
//!
//! let context = ResolutionContext::builder(store)
//!     .working_version(FhirVersion::R5)
//!     .build_bootstrapped(core_definitions)
//!     .await?;
//! let map = context.resolve(CanonicalKind::StructureMap, "http://example.org/StructureMap/M1").await?;
//! ```

pub mod cache;
pub mod conformance;
pub mod context;
pub mod error;
pub mod observer;
pub mod overlay;
mod snapshot;

pub use cache::{CacheKey, CanonicalCache, CanonicalIter, CanonicalStore, DynCanonicalStore};
pub use conformance::undeclared_elements;
pub use context::{ResolutionContext, ResolutionContextBuilder, ScopedContext, definition_type};
pub use error::{ContextError, ErrorCategory};
pub use observer::{ContextObserver, NoopObserver, ResolveOutcome, TracingObserver};
pub use overlay::OverlayCache;
