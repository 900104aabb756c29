//! In-memory canonical resource cache.
//!
//! Entries are keyed by (kind, canonical URL) and kept in registration order.
//! The cache never performs I/O; filling it on a miss is the job of the
//! resolution context.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use octofhir_core::{CanonicalKind, CanonicalResource};
use parking_lot::RwLock;

/// Cache key: resource kind plus canonical URL (without version).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CanonicalKind,
    pub url: String,
}

impl CacheKey {
    pub fn new(kind: CanonicalKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }

    pub fn of(resource: &CanonicalResource) -> Self {
        Self::new(resource.kind, resource.url.clone())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.kind, self.url)
    }
}

/// Storage of resolved canonical resources.
///
/// `lookup` after `register` with the same key returns the registered value.
pub trait CanonicalStore: Send + Sync {
    /// Inserts or replaces the entry for the resource's key.
    ///
    /// A replaced entry keeps its registration position. Returns the previous value.
    fn register(&self, resource: Arc<CanonicalResource>) -> Option<Arc<CanonicalResource>>;

    fn lookup(&self, kind: CanonicalKind, url: &str) -> Option<Arc<CanonicalResource>>;

    /// Entries of `kind` in registration order.
    fn all(&self, kind: CanonicalKind) -> CanonicalIter;

    fn remove(&self, kind: CanonicalKind, url: &str) -> Option<Arc<CanonicalResource>>;

    /// Drops every entry.
    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Type alias for a shared cache trait object.
pub type DynCanonicalStore = Arc<dyn CanonicalStore>;

/// Iterator over a point-in-time view of cache entries.
///
/// Cloning yields an independent iterator over the same view; `rewind`
/// restarts it.
#[derive(Debug, Clone)]
pub struct CanonicalIter {
    entries: Arc<[Arc<CanonicalResource>]>,
    position: usize,
}

impl CanonicalIter {
    pub(crate) fn new(entries: Vec<Arc<CanonicalResource>>) -> Self {
        Self {
            entries: entries.into(),
            position: 0,
        }
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }
}

impl Iterator for CanonicalIter {
    type Item = Arc<CanonicalResource>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.entries.get(self.position).cloned();
        if item.is_some() {
            self.position += 1;
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CanonicalIter {}

/// Insertion-ordered cache guarded by a read-write lock.
#[derive(Debug, Default)]
pub struct CanonicalCache {
    entries: RwLock<IndexMap<CacheKey, Arc<CanonicalResource>>>,
}

impl CanonicalCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CanonicalStore for CanonicalCache {
    fn register(&self, resource: Arc<CanonicalResource>) -> Option<Arc<CanonicalResource>> {
        let key = CacheKey::of(&resource);
        self.entries.write().insert(key, resource)
    }

    fn lookup(&self, kind: CanonicalKind, url: &str) -> Option<Arc<CanonicalResource>> {
        self.entries.read().get(&CacheKey::new(kind, url)).cloned()
    }

    fn all(&self, kind: CanonicalKind) -> CanonicalIter {
        let entries = self
            .entries
            .read()
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .map(|(_, resource)| resource.clone())
            .collect();
        CanonicalIter::new(entries)
    }

    fn remove(&self, kind: CanonicalKind, url: &str) -> Option<Arc<CanonicalResource>> {
        self.entries.write().shift_remove(&CacheKey::new(kind, url))
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}
