//! Filesystem loading of canonical resources into the in-memory store.
//!
//! Every `*.json` file of a directory is read; Bundles are unpacked and
//! resources that are not canonical (instances, OperationOutcomes, ...) are
//! skipped.

use std::path::Path;

use octofhir_core::{CanonicalKind, FhirVersion};
use octofhir_storage::{StoreError, StoredCanonical};
use serde_json::Value;
use tracing::{debug, info};

use crate::storage::InMemoryResourceStore;

impl InMemoryResourceStore {
    /// Loads all canonical resources found in `dir` (non-recursive).
    ///
    /// Returns the number of records inserted.
    ///
    /// # Errors
    ///
    /// Fails on unreadable directories/files and on files that are not JSON.
    pub async fn load_dir(&self, dir: impl AsRef<Path>, version: FhirVersion) -> Result<usize, StoreError> {
        let dir = dir.as_ref();
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        // Deterministic load order so replacements are reproducible.
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let bytes = tokio::fs::read(&path).await?;
            let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::invalid_record("file", path.display().to_string(), e.to_string())
            })?;
            loaded += self.load_value(value, version);
        }
        info!(dir = %dir.display(), loaded, fhir.version = version.label(), "loaded canonical resources");
        Ok(loaded)
    }

    /// Inserts a resource or every canonical resource of a Bundle.
    ///
    /// Returns the number of records inserted.
    pub fn load_value(&self, value: Value, version: FhirVersion) -> usize {
        let resource_type = value
            .get("resourceType")
            .and_then(Value::as_str)
            .map(str::to_string);
        match resource_type.as_deref() {
            Some("Bundle") => value
                .get("entry")
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|entry| entry.get("resource"))
                        .map(|resource| self.load_value(resource.clone(), version))
                        .sum()
                })
                .unwrap_or(0),
            Some(rt) if CanonicalKind::from_resource_type(rt).is_some() => {
                match StoredCanonical::from_json(value, version) {
                    Ok(record) => {
                        self.insert(record);
                        1
                    }
                    Err(e) => {
                        debug!(resource_type = rt, error = %e, "skipping canonical resource");
                        0
                    }
                }
            }
            other => {
                debug!(resource_type = ?other, "skipping non-canonical resource");
                0
            }
        }
    }
}
