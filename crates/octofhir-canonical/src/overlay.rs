//! Private overlay over a shared cache.
//!
//! Reads fall through to the base on a local miss; writes and removals stay
//! local until [`OverlayCache::promote`]. Dropping the overlay discards them.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use octofhir_core::{CanonicalKind, CanonicalResource};
use parking_lot::RwLock;
use tracing::debug;

use crate::cache::{CacheKey, CanonicalIter, CanonicalStore, DynCanonicalStore};

#[derive(Default)]
struct OverlayState {
    local: IndexMap<CacheKey, Arc<CanonicalResource>>,
    /// Base keys removed from this overlay's view.
    hidden: HashSet<CacheKey>,
}

pub struct OverlayCache {
    base: DynCanonicalStore,
    state: RwLock<OverlayState>,
}

impl OverlayCache {
    pub fn new(base: DynCanonicalStore) -> Self {
        Self {
            base,
            state: RwLock::new(OverlayState::default()),
        }
    }

    /// Number of entries written to this overlay and not yet promoted.
    pub fn local_len(&self) -> usize {
        self.state.read().local.len()
    }

    /// Registers every local entry in the base, in local registration order.
    ///
    /// Returns the number of promoted entries. Removals stay local.
    pub fn promote(&self) -> usize {
        let entries: Vec<Arc<CanonicalResource>> = {
            let mut state = self.state.write();
            state.local.drain(..).map(|(_, resource)| resource).collect()
        };
        let count = entries.len();
        for resource in entries {
            self.base.register(resource);
        }
        debug!(count, "promoted overlay entries");
        count
    }

    /// Drops local writes and removals.
    pub fn discard(&self) {
        let mut state = self.state.write();
        state.local.clear();
        state.hidden.clear();
    }
}

impl std::fmt::Debug for OverlayCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("OverlayCache")
            .field("local", &state.local.len())
            .field("hidden", &state.hidden.len())
            .finish()
    }
}

impl CanonicalStore for OverlayCache {
    fn register(&self, resource: Arc<CanonicalResource>) -> Option<Arc<CanonicalResource>> {
        let key = CacheKey::of(&resource);
        let (previous, was_hidden) = {
            let mut state = self.state.write();
            let was_hidden = state.hidden.remove(&key);
            (state.local.insert(key.clone(), resource), was_hidden)
        };
        match previous {
            Some(previous) => Some(previous),
            None if was_hidden => None,
            None => self.base.lookup(key.kind, &key.url),
        }
    }

    fn lookup(&self, kind: CanonicalKind, url: &str) -> Option<Arc<CanonicalResource>> {
        let key = CacheKey::new(kind, url);
        {
            let state = self.state.read();
            if let Some(resource) = state.local.get(&key) {
                return Some(resource.clone());
            }
            if state.hidden.contains(&key) {
                return None;
            }
        }
        self.base.lookup(kind, url)
    }

    /// Base entries first (shadowed ones replaced in place, hidden ones
    /// skipped), then entries that exist only in the overlay.
    fn all(&self, kind: CanonicalKind) -> CanonicalIter {
        let base: Vec<Arc<CanonicalResource>> = self.base.all(kind).collect();
        let state = self.state.read();
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(base.len() + state.local.len());

        for resource in base {
            let key = CacheKey::of(&resource);
            if state.hidden.contains(&key) {
                continue;
            }
            match state.local.get(&key) {
                Some(local) => entries.push(local.clone()),
                None => entries.push(resource),
            }
            seen.insert(key);
        }
        entries.extend(
            state
                .local
                .iter()
                .filter(|(key, _)| key.kind == kind && !seen.contains(*key))
                .map(|(_, resource)| resource.clone()),
        );
        CanonicalIter::new(entries)
    }

    fn remove(&self, kind: CanonicalKind, url: &str) -> Option<Arc<CanonicalResource>> {
        let key = CacheKey::new(kind, url);
        let in_base = self.base.lookup(kind, url);
        let mut state = self.state.write();
        let local = state.local.shift_remove(&key);
        let was_hidden = if in_base.is_some() {
            !state.hidden.insert(key)
        } else {
            false
        };
        local.or(if was_hidden { None } else { in_base })
    }

    /// Resets the overlay to a pristine view of the base.
    fn clear(&self) {
        self.discard();
    }

    fn len(&self) -> usize {
        let state = self.state.read();
        let local_only = state
            .local
            .keys()
            .filter(|key| self.base.lookup(key.kind, &key.url).is_none())
            .count();
        let hidden_in_base = state
            .hidden
            .iter()
            .filter(|key| self.base.lookup(key.kind, &key.url).is_some())
            .count();
        (self.base.len() + local_only).saturating_sub(hidden_in_base)
    }
}
