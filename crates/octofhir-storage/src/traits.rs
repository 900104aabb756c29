//! Store traits for the canonical resource store abstraction.

use async_trait::async_trait;
use octofhir_core::CanonicalKind;

use crate::error::StoreError;
use crate::types::StoredCanonical;

/// Lookup of persisted canonical resources by kind and canonical URL.
///
/// Implementations must be thread-safe (`Send + Sync`). The resolution context
/// never caches absence: a `None` is re-queried on the next resolve.
///
/// # Example
///
/// ```ignore
/// use octofhir_storage::{ResourceStore, StoreError, StoredCanonical};
///
/// async fn get_map(store: &dyn ResourceStore, url: &str) -> Result<Option<StoredCanonical>, StoreError> {
///     store.find(CanonicalKind::StructureMap, url).await
/// }
/// ```
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Finds the record for `kind` with the given canonical URL.
    ///
    /// Returns `None` if no record exists.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store could not answer (timeout,
    /// connection failure, corrupt record), never for a missing record.
    async fn find(
        &self,
        kind: CanonicalKind,
        canonical_url: &str,
    ) -> Result<Option<StoredCanonical>, StoreError>;

    /// Lists every record of `kind`, in a stable order.
    ///
    /// Used to seed a context from the store's full definition set.
    ///
    /// # Errors
    ///
    /// Returns an error when the store could not answer.
    async fn list(&self, kind: CanonicalKind) -> Result<Vec<StoredCanonical>, StoreError>;

    /// Returns the name of this store backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
