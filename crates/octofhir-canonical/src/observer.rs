//! Observation hooks for the resolution context.

use std::fmt;

use octofhir_core::{CanonicalKind, FhirVersion};
use tracing::{debug, trace};

/// How a `resolve` call was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Served from the cache without touching the store.
    CacheHit,
    /// This call queried the store and registered the result.
    Fetched,
    /// Joined a fetch already in flight for the same key.
    Coalesced,
    NotFound,
    Failed,
}

impl fmt::Display for ResolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CacheHit => "cache_hit",
            Self::Fetched => "fetched",
            Self::Coalesced => "coalesced",
            Self::NotFound => "not_found",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Trace sink invoked at the context's extension points.
///
/// All methods default to no-ops.
pub trait ContextObserver: Send + Sync {
    fn on_resolve(&self, _kind: CanonicalKind, _url: &str, _outcome: ResolveOutcome) {}

    fn on_convert(&self, _kind: CanonicalKind, _url: &str, _from: FhirVersion, _to: FhirVersion) {}

    fn on_register(&self, _kind: CanonicalKind, _url: &str) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ContextObserver for NoopObserver {}

/// Emits a `tracing` event for every hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ContextObserver for TracingObserver {
    fn on_resolve(&self, kind: CanonicalKind, url: &str, outcome: ResolveOutcome) {
        match outcome {
            ResolveOutcome::CacheHit => trace!(%kind, url, %outcome, "resolve"),
            _ => debug!(%kind, url, %outcome, "resolve"),
        }
    }

    fn on_convert(&self, kind: CanonicalKind, url: &str, from: FhirVersion, to: FhirVersion) {
        debug!(%kind, url, from = from.label(), to = to.label(), "convert");
    }

    fn on_register(&self, kind: CanonicalKind, url: &str) {
        trace!(%kind, url, "register");
    }
}
