use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use octofhir_canonical::{ResolutionContext, TracingObserver};
use octofhir_config::AppConfig;
use octofhir_core::CanonicalKind;
use octofhir_db_memory::InMemoryResourceStore;
use octofhir_storage::{ResourceStore, StoredCanonical};
use octofhir_transform::FhirFormat;
use tracing::info;

/// Store and context built from configuration plus command-line overrides.
pub struct Workspace {
    pub store: Arc<InMemoryResourceStore>,
    pub context: Arc<ResolutionContext>,
}

pub async fn open(cfg: &AppConfig, store_dir: Option<&str>, base_dir: Option<&str>) -> Result<Workspace> {
    let version = cfg.packages.version().map_err(anyhow::Error::msg)?;
    let working_version = cfg.context.working_version().map_err(anyhow::Error::msg)?;

    let store = Arc::new(InMemoryResourceStore::new());
    if let Some(dir) = store_dir.or(cfg.packages.store_dir.as_deref()) {
        store
            .load_dir(dir, version)
            .await
            .with_context(|| format!("loading store directory {dir}"))?;
    }

    let base = match base_dir.or(cfg.packages.base_dir.as_deref()) {
        Some(dir) => load_base(dir, version).await?,
        None => Vec::new(),
    };
    let base_count = base.len();

    let context = ResolutionContext::builder(store.clone())
        .working_version(working_version)
        .store_timeout(cfg.context.store_timeout())
        .generate_snapshots(cfg.context.generate_snapshots)
        .observer(Arc::new(TracingObserver))
        .build_bootstrapped(base)
        .await
        .context("bootstrapping base definitions")?;

    info!(
        stored = store.len(),
        base = base_count,
        working_version = %working_version,
        "resolution context ready"
    );
    Ok(Workspace {
        store,
        context: Arc::new(context),
    })
}

/// Every canonical record of a base directory.
async fn load_base(dir: &str, version: octofhir_core::FhirVersion) -> Result<Vec<StoredCanonical>> {
    let staging = InMemoryResourceStore::new();
    staging
        .load_dir(dir, version)
        .await
        .with_context(|| format!("loading base directory {dir}"))?;
    let mut records = Vec::with_capacity(staging.len());
    for kind in CanonicalKind::ALL {
        records.extend(staging.list(kind).await?);
    }
    Ok(records)
}

/// Picks the wire format from a file extension; anything but `.xml` is JSON.
pub fn file_format(path: &Path) -> FhirFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("xml") => FhirFormat::Xml,
        _ => FhirFormat::Json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_format() {
        assert_eq!(file_format(Path::new("qr.xml")), FhirFormat::Xml);
        assert_eq!(file_format(Path::new("qr.XML")), FhirFormat::Xml);
        assert_eq!(file_format(Path::new("qr.json")), FhirFormat::Json);
        assert_eq!(file_format(Path::new("qr")), FhirFormat::Json);
    }

    #[tokio::test]
    async fn test_open_loads_store_and_base() {
        let store_dir = tempfile::tempdir().expect("tmp dir");
        let base_dir = tempfile::tempdir().expect("tmp dir");
        std::fs::write(
            store_dir.path().join("q.json"),
            json!({
                "resourceType": "Questionnaire",
                "url": "http://example.org/Questionnaire/Q1",
                "status": "active"
            })
            .to_string(),
        )
        .expect("write questionnaire");
        std::fs::write(
            base_dir.path().join("sd.json"),
            json!({
                "resourceType": "StructureDefinition",
                "url": "http://hl7.org/fhir/StructureDefinition/Basic",
                "name": "Basic",
                "kind": "resource",
                "type": "Basic",
                "status": "active"
            })
            .to_string(),
        )
        .expect("write definition");

        let workspace = open(
            &AppConfig::default(),
            store_dir.path().to_str(),
            base_dir.path().to_str(),
        )
        .await
        .expect("workspace opens");

        assert_eq!(workspace.store.len(), 1);
        assert!(
            workspace
                .context
                .lookup(
                    CanonicalKind::StructureDefinition,
                    "http://hl7.org/fhir/StructureDefinition/Basic"
                )
                .is_some()
        );
        workspace
            .context
            .resolve(CanonicalKind::Questionnaire, "http://example.org/Questionnaire/Q1")
            .await
            .expect("store-backed resolve");
    }

    #[tokio::test]
    async fn test_open_fails_on_unconvertible_base() {
        let base_dir = tempfile::tempdir().expect("tmp dir");
        std::fs::write(
            base_dir.path().join("map.json"),
            json!({
                "resourceType": "StructureMap",
                "url": "http://example.org/StructureMap/broken",
                "name": "broken"
            })
            .to_string(),
        )
        .expect("write map");

        let err = open(&AppConfig::default(), None, base_dir.path().to_str())
            .await
            .err()
            .expect("bootstrap fails");
        assert!(format!("{err:#}").contains("bootstrapping base definitions"));
    }
}
