//! Resolution context: cache, version bridge and store behind one resolve call.

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use octofhir_convert::{DynVersionBridge, FhirVersionBridge};
use octofhir_core::{CanonicalKind, CanonicalReference, CanonicalResource, FhirVersion};
use octofhir_storage::{DynResourceStore, StoreError, StoredCanonical};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CanonicalCache, CanonicalIter, DynCanonicalStore};
use crate::error::ContextError;
use crate::observer::{ContextObserver, NoopObserver, ResolveOutcome};
use crate::overlay::OverlayCache;
use crate::snapshot::{elements, has_differential, has_snapshot, merge_differential};

type ResolveResult = Result<Arc<CanonicalResource>, ContextError>;
type InFlight = DashMap<CacheKey, Arc<OnceCell<ResolveResult>>>;

/// Builder for [`ResolutionContext`].
pub struct ResolutionContextBuilder {
    store: DynResourceStore,
    bridge: DynVersionBridge,
    cache: Option<DynCanonicalStore>,
    working_version: FhirVersion,
    store_timeout: Option<Duration>,
    observer: Arc<dyn ContextObserver>,
    generate_snapshots: bool,
}

impl ResolutionContextBuilder {
    pub fn new(store: DynResourceStore) -> Self {
        Self {
            store,
            bridge: Arc::new(FhirVersionBridge::new()),
            cache: None,
            working_version: FhirVersion::R5,
            store_timeout: None,
            observer: Arc::new(NoopObserver),
            generate_snapshots: true,
        }
    }

    pub fn bridge(mut self, bridge: DynVersionBridge) -> Self {
        self.bridge = bridge;
        self
    }

    /// Uses an existing cache instead of a fresh [`CanonicalCache`].
    pub fn cache(mut self, cache: DynCanonicalStore) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn working_version(mut self, version: FhirVersion) -> Self {
        self.working_version = version;
        self
    }

    /// Upper bound for one store query. `None` waits for the store.
    pub fn store_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ContextObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Whether bootstrap fills in missing StructureDefinition snapshots.
    pub fn generate_snapshots(mut self, enabled: bool) -> Self {
        self.generate_snapshots = enabled;
        self
    }

    pub fn build(self) -> ResolutionContext {
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(CanonicalCache::new()));
        ResolutionContext {
            shared: cache.clone(),
            cache,
            store: self.store,
            bridge: self.bridge,
            working_version: self.working_version,
            store_timeout: self.store_timeout,
            observer: self.observer,
            generate_snapshots: self.generate_snapshots,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Builds the context and seeds it from `base`.
    ///
    /// The context is only returned when bootstrap succeeded.
    pub async fn build_bootstrapped<I>(self, base: I) -> Result<ResolutionContext, ContextError>
    where
        I: IntoIterator<Item = StoredCanonical>,
    {
        let context = self.build();
        context.bootstrap(base).await?;
        Ok(context)
    }
}

/// Cache-and-resolver for canonical resources in one working FHIR version.
///
/// Resolution of a missing key is single-flight: concurrent callers share one
/// store query and one conversion, and all observe the same `Arc`. Scoped
/// contexts join the same in-flight table as their parent.
pub struct ResolutionContext {
    cache: DynCanonicalStore,
    /// Cache of the root context; equal to `cache` outside a scope.
    shared: DynCanonicalStore,
    store: DynResourceStore,
    bridge: DynVersionBridge,
    working_version: FhirVersion,
    store_timeout: Option<Duration>,
    observer: Arc<dyn ContextObserver>,
    generate_snapshots: bool,
    in_flight: Arc<InFlight>,
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("store", &self.store.backend_name())
            .field("working_version", &self.working_version)
            .field("cached", &self.cache.len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl ResolutionContext {
    pub fn builder(store: DynResourceStore) -> ResolutionContextBuilder {
        ResolutionContextBuilder::new(store)
    }

    pub fn working_version(&self) -> FhirVersion {
        self.working_version
    }

    pub fn bridge(&self) -> &DynVersionBridge {
        &self.bridge
    }

    /// Converts every record to the working version and registers them.
    ///
    /// Fail-fast: on any conversion or snapshot error nothing is registered.
    /// Returns the number of registered entries, including bases fetched from
    /// the store while generating snapshots.
    pub async fn bootstrap<I>(&self, base: I) -> Result<usize, ContextError>
    where
        I: IntoIterator<Item = StoredCanonical>,
    {
        let converted = base
            .into_iter()
            .map(|record| self.convert_record(&record))
            .collect::<Result<Vec<_>, _>>()?;

        let scope = self.scoped();
        for resource in converted {
            scope.register(Arc::new(resource));
        }

        if self.generate_snapshots {
            let pending: Vec<Arc<CanonicalResource>> = scope
                .all(CanonicalKind::StructureDefinition)
                .filter(|sd| has_differential(sd) && !has_snapshot(sd))
                .collect();
            for definition in pending {
                let expanded = scope.snapshot(&definition).await?;
                scope.register(Arc::new(expanded));
            }
        }

        let registered = scope.promote();
        info!(
            registered,
            fhir.version = self.working_version.label(),
            "bootstrapped canonical context"
        );
        Ok(registered)
    }

    /// Returns the cached resource or fetches, converts and registers it.
    ///
    /// `reference` may pin a business version (`url|version`); a cached or
    /// stored resource with another version does not satisfy it.
    pub async fn resolve(&self, kind: CanonicalKind, reference: &str) -> ResolveResult {
        let reference = CanonicalReference::parse(reference).map_err(|_| {
            ContextError::InvalidReference {
                reference: reference.to_string(),
            }
        })?;
        let url = reference.url.as_str();

        if let Some(hit) = self.cache.lookup(kind, url) {
            self.observer.on_resolve(kind, url, ResolveOutcome::CacheHit);
            return Self::check_pinned(kind, &reference, hit);
        }

        let key = CacheKey::new(kind, url);
        let cell = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let mut leader = false;
        let result = cell
            .get_or_init(|| {
                leader = true;
                self.fetch(kind, url)
            })
            .await
            .clone()
            .map(|resource| self.adopt(resource));
        // Adopt before releasing the cell so late callers find the entry.
        self.in_flight
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));

        let outcome = match &result {
            Ok(_) if leader => ResolveOutcome::Fetched,
            Ok(_) => ResolveOutcome::Coalesced,
            Err(e) if e.is_not_found() => ResolveOutcome::NotFound,
            Err(_) => ResolveOutcome::Failed,
        };
        self.observer.on_resolve(kind, url, outcome);

        Self::check_pinned(kind, &reference, result?)
    }

    /// Like [`resolve`](Self::resolve) but `None` when the resource does not
    /// exist or the store cannot be reached.
    pub async fn resolve_or_null(
        &self,
        kind: CanonicalKind,
        reference: &str,
    ) -> Result<Option<Arc<CanonicalResource>>, ContextError> {
        match self.resolve(kind, reference).await {
            Ok(resource) => Ok(Some(resource)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) if e.is_unreachable() => {
                debug!(%kind, reference, error = %e, "store unreachable, treating as absent");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Expands a differential StructureDefinition into its snapshot form.
    ///
    /// Walks `baseDefinition` until a base carrying a snapshot (or the chain
    /// root) is reached, then merges the differentials downwards.
    pub async fn snapshot(
        &self,
        definition: &CanonicalResource,
    ) -> Result<CanonicalResource, ContextError> {
        if definition.kind != CanonicalKind::StructureDefinition {
            return Err(ContextError::invalid_definition(
                &definition.url,
                format!("{} has no snapshot form", definition.kind),
            ));
        }
        if !has_differential(definition) {
            if has_snapshot(definition) {
                return Ok(definition.clone());
            }
            return Err(ContextError::invalid_definition(
                &definition.url,
                "neither snapshot nor differential present",
            ));
        }

        let mut chain = vec![definition.url.clone()];
        let mut visited = HashSet::from([definition.url.clone()]);
        // Bases without a snapshot, nearest first.
        let mut layers: Vec<Arc<CanonicalResource>> = Vec::new();
        let mut root: Option<Arc<CanonicalResource>> = None;
        let mut next = definition.get_str("baseDefinition").map(str::to_string);

        while let Some(base_reference) = next.take() {
            chain.push(base_reference.clone());
            let base_url = CanonicalReference::parse(&base_reference)
                .map(|r| r.url)
                .unwrap_or(base_reference);
            if !visited.insert(base_url.clone()) {
                return Err(ContextError::CyclicDefinition { chain });
            }
            let base = self
                .resolve(CanonicalKind::StructureDefinition, &base_url)
                .await?;
            if has_snapshot(&base) {
                root = Some(base);
                break;
            }
            next = base.get_str("baseDefinition").map(str::to_string);
            layers.push(base);
        }

        let (mut merged, mut current_type) = match &root {
            Some(root) => (
                elements(root, "snapshot").to_vec(),
                root.get_str("type").unwrap_or_default().to_string(),
            ),
            None => (Vec::new(), String::new()),
        };
        for layer in layers.iter().rev().map(Arc::as_ref).chain([definition]) {
            let layer_type = layer.get_str("type").unwrap_or_default();
            merged = merge_differential(
                &merged,
                &current_type,
                elements(layer, "differential"),
                layer_type,
            );
            current_type = layer_type.to_string();
        }

        debug!(
            url = %definition.url,
            depth = layers.len() + usize::from(root.is_some()),
            elements = merged.len(),
            "generated snapshot"
        );
        let mut payload = definition.payload.clone();
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("snapshot".to_string(), json!({ "element": merged }));
        }
        Ok(definition.with_payload(payload))
    }

    /// A derived context whose writes stay in a private overlay.
    pub fn scoped(&self) -> ScopedContext {
        let overlay = Arc::new(OverlayCache::new(self.cache.clone()));
        let context = ResolutionContext {
            cache: overlay.clone(),
            shared: self.shared.clone(),
            store: self.store.clone(),
            bridge: self.bridge.clone(),
            working_version: self.working_version,
            store_timeout: self.store_timeout,
            observer: self.observer.clone(),
            generate_snapshots: self.generate_snapshots,
            in_flight: self.in_flight.clone(),
        };
        ScopedContext { context, overlay }
    }

    pub fn lookup(&self, kind: CanonicalKind, url: &str) -> Option<Arc<CanonicalResource>> {
        self.cache.lookup(kind, url)
    }

    pub fn all(&self, kind: CanonicalKind) -> CanonicalIter {
        self.cache.all(kind)
    }

    /// Registers a resource already expressed in the working version.
    pub fn register(&self, resource: Arc<CanonicalResource>) -> Option<Arc<CanonicalResource>> {
        if resource.schema_version != self.working_version {
            warn!(
                kind = %resource.kind,
                url = %resource.url,
                version = resource.schema_version.label(),
                "registering resource outside the working version"
            );
        }
        let (kind, url) = (resource.kind, resource.url.clone());
        let previous = self.cache.register(resource);
        self.observer.on_register(kind, &url);
        previous
    }

    pub fn remove(&self, kind: CanonicalKind, url: &str) -> Option<Arc<CanonicalResource>> {
        self.cache.remove(kind, url)
    }

    /// Drops every cached entry.
    pub fn reset(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &DynCanonicalStore {
        &self.cache
    }

    fn check_pinned(
        kind: CanonicalKind,
        reference: &CanonicalReference,
        resource: Arc<CanonicalResource>,
    ) -> ResolveResult {
        if reference.accepts(resource.version.as_deref()) {
            Ok(resource)
        } else {
            Err(ContextError::not_found(kind, reference.to_string()))
        }
    }

    /// Store query and conversion shared by every caller of one cell.
    ///
    /// Registration is left to each caller so scoped results stay in their
    /// overlay.
    async fn fetch(&self, kind: CanonicalKind, url: &str) -> ResolveResult {
        // A fill may have completed between the caller's cache check and
        // the creation of this cell.
        if let Some(hit) = self.shared.lookup(kind, url) {
            return Ok(hit);
        }
        let record = self
            .query_store(kind, url)
            .await?
            .ok_or_else(|| ContextError::not_found(kind, url))?;
        Ok(Arc::new(self.convert_record(&record)?))
    }

    /// Registers a freshly resolved resource unless this cache already sees it.
    fn adopt(&self, resource: Arc<CanonicalResource>) -> Arc<CanonicalResource> {
        match self.cache.lookup(resource.kind, &resource.url) {
            Some(existing) => existing,
            None => {
                self.register(resource.clone());
                resource
            }
        }
    }

    async fn query_store(
        &self,
        kind: CanonicalKind,
        url: &str,
    ) -> Result<Option<StoredCanonical>, ContextError> {
        let query = self.store.find(kind, url);
        let result = match self.store_timeout {
            Some(limit) => tokio::time::timeout(limit, query).await.map_err(|_| {
                ContextError::store_unavailable(
                    kind,
                    url,
                    format!("no answer within {}ms", limit.as_millis()),
                )
            })?,
            None => query.await,
        };
        result.map_err(|e: StoreError| {
            if e.is_unreachable() {
                ContextError::store_unavailable(kind, url, e.to_string())
            } else {
                ContextError::store(kind, url, e.to_string())
            }
        })
    }

    fn convert_record(&self, record: &StoredCanonical) -> Result<CanonicalResource, ContextError> {
        let resource = self
            .bridge
            .convert_canonical(record, self.working_version)?;
        if record.schema_version != self.working_version {
            self.observer.on_convert(
                record.kind,
                &record.url,
                record.schema_version,
                self.working_version,
            );
        }
        Ok(resource)
    }
}

/// A context over a private overlay of its parent's cache.
///
/// Dropping it discards everything it resolved or registered unless
/// [`promote`](Self::promote) was called.
#[derive(Debug)]
pub struct ScopedContext {
    context: ResolutionContext,
    overlay: Arc<OverlayCache>,
}

impl ScopedContext {
    /// Pushes the overlay's entries into the parent cache.
    pub fn promote(&self) -> usize {
        self.overlay.promote()
    }

    pub fn discard(&self) {
        self.overlay.discard();
    }

    /// Number of entries held only by this scope.
    pub fn local_len(&self) -> usize {
        self.overlay.local_len()
    }
}

impl Deref for ScopedContext {
    type Target = ResolutionContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// Root type of a StructureDefinition's elements.
pub fn definition_type(definition: &CanonicalResource) -> Option<&str> {
    definition.get_str("type").or_else(|| {
        elements(definition, "snapshot")
            .first()
            .and_then(|root| root.get("path"))
            .and_then(Value::as_str)
    })
}
