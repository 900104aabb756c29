use std::collections::HashSet;

use octofhir_core::CanonicalResource;
use serde_json::Value;

use crate::snapshot::elements;

/// Paths of instance elements that the definition's snapshot does not declare.
///
/// Nested objects are checked only below elements that declare children of
/// their own (backbone elements); datatypes are not expanded. Returns nothing
/// when the definition has no snapshot.
pub fn undeclared_elements(instance: &Value, definition: &CanonicalResource) -> Vec<String> {
    let snapshot = elements(definition, "snapshot");
    if snapshot.is_empty() {
        return Vec::new();
    }
    let declared: HashSet<&str> = snapshot
        .iter()
        .filter_map(|element| element.get("path").and_then(Value::as_str))
        .collect();
    let root = definition
        .get_str("type")
        .or_else(|| instance.get("resourceType").and_then(Value::as_str))
        .unwrap_or_default();

    let mut found = Vec::new();
    check_object(instance, root, &declared, &mut found);
    found
}

fn check_object(value: &Value, path: &str, declared: &HashSet<&str>, found: &mut Vec<String>) {
    let Some(obj) = value.as_object() else {
        return;
    };
    for (name, child) in obj {
        if name == "resourceType" {
            continue;
        }
        let field = name.strip_prefix('_').unwrap_or(name);
        let Some(child_path) = declared_path(path, field, declared) else {
            found.push(format!("{path}.{field}"));
            continue;
        };
        if !has_children(&child_path, declared) {
            continue;
        }
        match child {
            Value::Array(items) => {
                for item in items {
                    check_object(item, &child_path, declared, found);
                }
            }
            other => check_object(other, &child_path, declared, found),
        }
    }
}

fn declared_path(parent: &str, field: &str, declared: &HashSet<&str>) -> Option<String> {
    let direct = format!("{parent}.{field}");
    if declared.contains(direct.as_str()) {
        return Some(direct);
    }
    // Choice elements: `value[x]` declares `valueQuantity`, `valueString`, ...
    declared.iter().find_map(|path| {
        let stem = path
            .strip_prefix(parent)?
            .strip_prefix('.')?
            .strip_suffix("[x]")?;
        let suffix = field.strip_prefix(stem)?;
        (!stem.contains('.') && suffix.starts_with(|c: char| c.is_ascii_uppercase()))
            .then(|| (*path).to_string())
    })
}

fn has_children(path: &str, declared: &HashSet<&str>) -> bool {
    let prefix = format!("{path}.");
    declared.iter().any(|p| p.starts_with(&prefix))
}
