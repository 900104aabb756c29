mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{GatedStore, slow, store_with, store_with_options, structure_map};
use octofhir_canonical::{ContextError, ContextObserver, ResolutionContext, ResolveOutcome};
use octofhir_core::{CanonicalKind, CanonicalResource, FhirVersion};
use octofhir_db_memory::{InMemoryResourceStore, StoreOptions};
use serde_json::json;

const MAP_URL: &str = "http://example.org/StructureMap/M1";

#[derive(Default)]
struct CountingObserver {
    fetched: AtomicUsize,
    coalesced: AtomicUsize,
    converted: AtomicUsize,
}

impl ContextObserver for CountingObserver {
    fn on_resolve(&self, _kind: CanonicalKind, _url: &str, outcome: ResolveOutcome) {
        match outcome {
            ResolveOutcome::Fetched => self.fetched.fetch_add(1, Ordering::SeqCst),
            ResolveOutcome::Coalesced => self.coalesced.fetch_add(1, Ordering::SeqCst),
            _ => 0,
        };
    }

    fn on_convert(&self, _kind: CanonicalKind, _url: &str, _from: FhirVersion, _to: FhirVersion) {
        self.converted.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn resolve_fetches_converts_and_registers() {
    let store = store_with(vec![structure_map(MAP_URL)]);
    let context = ResolutionContext::builder(store.clone()).build();

    let map = context
        .resolve(CanonicalKind::StructureMap, MAP_URL)
        .await
        .expect("map resolves");
    assert_eq!(map.schema_version, FhirVersion::R5);
    assert!(map.payload["group"][0].get("typeMode").is_none());

    let cached = context
        .lookup(CanonicalKind::StructureMap, MAP_URL)
        .expect("registered");
    assert!(Arc::ptr_eq(&map, &cached));

    // Second resolve is served from the cache.
    context
        .resolve(CanonicalKind::StructureMap, MAP_URL)
        .await
        .unwrap();
    assert_eq!(store.query_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_resolves_share_one_store_query() {
    let store = store_with_options(vec![structure_map(MAP_URL)], slow(50));
    let observer = Arc::new(CountingObserver::default());
    let context = Arc::new(
        ResolutionContext::builder(store.clone())
            .observer(observer.clone())
            .build(),
    );

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let context = context.clone();
            tokio::spawn(async move { context.resolve(CanonicalKind::StructureMap, MAP_URL).await })
        })
        .collect();

    let results: Vec<Arc<CanonicalResource>> = futures_util::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task").expect("resolve"))
        .collect();

    assert_eq!(store.query_count(), 1);
    assert_eq!(observer.converted.load(Ordering::SeqCst), 1);
    let fetched = observer.fetched.load(Ordering::SeqCst);
    assert!(fetched >= 1);
    assert!(fetched + observer.coalesced.load(Ordering::SeqCst) <= 50);
    let first = &results[0];
    assert!(results.iter().all(|r| Arc::ptr_eq(r, first)));
    assert_eq!(context.cache().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn scoped_resolves_share_the_parent_store_query() {
    let store = store_with_options(vec![structure_map(MAP_URL)], slow(50));
    let context = Arc::new(ResolutionContext::builder(store.clone()).build());

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let context = context.clone();
            tokio::spawn(async move {
                let scope = context.scoped();
                let map = scope.resolve(CanonicalKind::StructureMap, MAP_URL).await;
                (map, scope.local_len())
            })
        })
        .collect();

    let results: Vec<(Arc<CanonicalResource>, usize)> = futures_util::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| {
            let (map, local) = joined.expect("task");
            (map.expect("resolve"), local)
        })
        .collect();

    assert_eq!(store.query_count(), 1);
    let first = &results[0].0;
    assert!(results.iter().all(|(map, _)| Arc::ptr_eq(map, first)));
    // Each scope registered into its own overlay only.
    assert!(results.iter().all(|(_, local)| *local == 1));
    assert!(context.cache().is_empty());
}

#[tokio::test]
async fn scoped_and_root_callers_coalesce() {
    let store = store_with_options(vec![structure_map(MAP_URL)], slow(50));
    let context = ResolutionContext::builder(store.clone()).build();
    let scope = context.scoped();

    let (root, scoped) = tokio::join!(
        context.resolve(CanonicalKind::StructureMap, MAP_URL),
        scope.resolve(CanonicalKind::StructureMap, MAP_URL),
    );
    let (root, scoped) = (root.unwrap(), scoped.unwrap());

    assert_eq!(store.query_count(), 1);
    assert!(Arc::ptr_eq(&root, &scoped));
    assert_eq!(context.cache().len(), 1);
    // The root registration is visible through the overlay.
    assert_eq!(scope.local_len(), 0);
}

#[tokio::test]
async fn aborted_leader_hands_the_fill_to_a_waiter() {
    let store = GatedStore::new(vec![structure_map(MAP_URL)]);
    let context = Arc::new(ResolutionContext::builder(store.clone()).build());

    let leader = tokio::spawn({
        let context = context.clone();
        async move { context.resolve(CanonicalKind::StructureMap, MAP_URL).await }
    });
    while store.query_count() == 0 {
        tokio::task::yield_now().await;
    }
    let waiter = tokio::spawn({
        let context = context.clone();
        async move { context.resolve(CanonicalKind::StructureMap, MAP_URL).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    leader.abort();
    assert!(leader.await.unwrap_err().is_cancelled());
    store.release(1);

    let map = waiter.await.expect("task").expect("waiter resolves");
    assert_eq!(store.query_count(), 2);
    assert_eq!(context.cache().len(), 1);
    let cached = context.lookup(CanonicalKind::StructureMap, MAP_URL).unwrap();
    assert!(Arc::ptr_eq(&map, &cached));
}

#[tokio::test]
async fn cached_read_does_not_wait_for_another_fill() {
    const OTHER_URL: &str = "http://example.org/StructureMap/M2";
    let store = GatedStore::new(vec![structure_map(MAP_URL), structure_map(OTHER_URL)]);
    let context = Arc::new(ResolutionContext::builder(store.clone()).build());

    store.release(1);
    let cached = context
        .resolve(CanonicalKind::StructureMap, MAP_URL)
        .await
        .unwrap();

    let pending = tokio::spawn({
        let context = context.clone();
        async move { context.resolve(CanonicalKind::StructureMap, OTHER_URL).await }
    });
    while store.query_count() < 2 {
        tokio::task::yield_now().await;
    }

    let read = tokio::time::timeout(
        Duration::from_millis(50),
        context.resolve(CanonicalKind::StructureMap, MAP_URL),
    )
    .await
    .expect("cached read is not blocked")
    .unwrap();
    assert!(Arc::ptr_eq(&read, &cached));
    assert!(!pending.is_finished());

    store.release(1);
    pending.await.expect("task").expect("other map resolves");
    assert_eq!(context.cache().len(), 2);
}

#[tokio::test]
async fn missing_map_is_not_found_and_not_registered() {
    let store = Arc::new(InMemoryResourceStore::new());
    let context = ResolutionContext::builder(store.clone()).build();

    let err = context
        .resolve(CanonicalKind::StructureMap, "http://example/missing")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContextError::NotFound { kind: CanonicalKind::StructureMap, ref url } if url == "http://example/missing"
    ));
    assert!(context.cache().is_empty());

    // Absence is not cached: the next resolve queries again.
    let _ = context
        .resolve(CanonicalKind::StructureMap, "http://example/missing")
        .await;
    assert_eq!(store.query_count(), 2);
}

#[tokio::test]
async fn late_store_record_is_found_on_retry() {
    let store = Arc::new(InMemoryResourceStore::new());
    let context = ResolutionContext::builder(store.clone()).build();

    assert!(
        context
            .resolve_or_null(CanonicalKind::StructureMap, MAP_URL)
            .await
            .unwrap()
            .is_none()
    );

    store.insert_json(structure_map(MAP_URL), FhirVersion::R4).unwrap();
    assert!(
        context
            .resolve_or_null(CanonicalKind::StructureMap, MAP_URL)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn store_timeout_is_distinguished_from_not_found() {
    let store = store_with_options(vec![structure_map(MAP_URL)], slow(500));
    let context = ResolutionContext::builder(store)
        .store_timeout(Some(Duration::from_millis(20)))
        .build();

    let err = context
        .resolve(CanonicalKind::StructureMap, MAP_URL)
        .await
        .unwrap_err();
    assert!(err.is_unreachable());
    assert!(!err.is_not_found());

    let absent = context
        .resolve_or_null(CanonicalKind::StructureMap, MAP_URL)
        .await
        .unwrap();
    assert!(absent.is_none());
    assert!(context.cache().is_empty());
}

#[tokio::test]
async fn offline_store_is_unreachable() {
    let store = Arc::new(InMemoryResourceStore::with_options(StoreOptions {
        latency: None,
        offline: true,
    }));
    let context = ResolutionContext::builder(store).build();

    let err = context
        .resolve(CanonicalKind::ValueSet, "http://vs/a")
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::StoreUnavailable { .. }));
}

#[tokio::test]
async fn conversion_failure_surfaces_and_registers_nothing() {
    let store = store_with(vec![json!({
        "resourceType": "StructureMap",
        "url": MAP_URL,
        "name": "broken"
    })]);
    let context = ResolutionContext::builder(store).build();

    let err = context
        .resolve(CanonicalKind::StructureMap, MAP_URL)
        .await
        .unwrap_err();
    match err {
        ContextError::Conversion(e) => {
            assert_eq!(e.resource_kind, "StructureMap");
            assert_eq!(e.url.as_deref(), Some(MAP_URL));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(context.cache().is_empty());

    // Conversion errors are not swallowed by resolve_or_null.
    assert!(
        context
            .resolve_or_null(CanonicalKind::StructureMap, MAP_URL)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn pinned_version_must_match() {
    let mut map = structure_map(MAP_URL);
    map["version"] = json!("1.0.0");
    let store = store_with(vec![map]);
    let context = ResolutionContext::builder(store).build();

    let found = context
        .resolve(CanonicalKind::StructureMap, &format!("{MAP_URL}|1.0.0"))
        .await
        .unwrap();
    assert_eq!(found.version.as_deref(), Some("1.0.0"));

    let err = context
        .resolve(CanonicalKind::StructureMap, &format!("{MAP_URL}|2.0.0"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("|2.0.0"));
}

#[tokio::test]
async fn register_then_lookup_reads_own_write() {
    let context = ResolutionContext::builder(Arc::new(InMemoryResourceStore::new())).build();
    let resource = Arc::new(
        CanonicalResource::from_payload(
            json!({"resourceType": "CodeSystem", "url": "http://cs/a", "content": "complete"}),
            FhirVersion::R5,
        )
        .unwrap(),
    );

    context.register(resource.clone());
    let found = context.lookup(CanonicalKind::CodeSystem, "http://cs/a").unwrap();
    assert_eq!(*found, *resource);

    let resolved = context
        .resolve(CanonicalKind::CodeSystem, "http://cs/a")
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&resolved, &resource));

    context.remove(CanonicalKind::CodeSystem, "http://cs/a");
    assert!(context.lookup(CanonicalKind::CodeSystem, "http://cs/a").is_none());
}

#[tokio::test]
async fn scoped_context_confines_resolutions_until_promoted() {
    let store = store_with(vec![structure_map(MAP_URL)]);
    let context = ResolutionContext::builder(store).build();

    {
        let scope = context.scoped();
        scope
            .resolve(CanonicalKind::StructureMap, MAP_URL)
            .await
            .unwrap();
        assert_eq!(scope.local_len(), 1);
        assert!(scope.lookup(CanonicalKind::StructureMap, MAP_URL).is_some());
        assert!(context.lookup(CanonicalKind::StructureMap, MAP_URL).is_none());
    }
    assert!(context.cache().is_empty());

    let scope = context.scoped();
    scope
        .resolve(CanonicalKind::StructureMap, MAP_URL)
        .await
        .unwrap();
    assert_eq!(scope.promote(), 1);
    assert!(context.lookup(CanonicalKind::StructureMap, MAP_URL).is_some());
}

#[tokio::test]
async fn reset_clears_every_entry() {
    let store = store_with(vec![structure_map(MAP_URL)]);
    let context = ResolutionContext::builder(store).build();
    context
        .resolve(CanonicalKind::StructureMap, MAP_URL)
        .await
        .unwrap();

    context.reset();
    assert_eq!(context.all(CanonicalKind::StructureMap).count(), 0);
}
