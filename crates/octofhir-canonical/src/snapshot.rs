//! Differential to snapshot merging.

use octofhir_core::CanonicalResource;
use serde_json::Value;

pub(crate) fn elements<'a>(definition: &'a CanonicalResource, part: &str) -> &'a [Value] {
    definition
        .payload
        .get(part)
        .and_then(|p| p.get("element"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub(crate) fn has_snapshot(definition: &CanonicalResource) -> bool {
    !elements(definition, "snapshot").is_empty()
}

pub(crate) fn has_differential(definition: &CanonicalResource) -> bool {
    !elements(definition, "differential").is_empty()
}

/// Applies `differential` on top of `base`.
///
/// Base elements are rebased from `base_type` to `type_name` first (for
/// specialisations). Differential elements match base elements by `id`, or by
/// `path` when either side has no id; a match overwrites the base element's
/// properties, anything else is inserted after its parent's last descendant.
pub(crate) fn merge_differential(
    base: &[Value],
    base_type: &str,
    differential: &[Value],
    type_name: &str,
) -> Vec<Value> {
    let mut merged: Vec<Value> = base
        .iter()
        .map(|element| rebase(element, base_type, type_name))
        .collect();

    for diff in differential {
        let Some(diff_obj) = diff.as_object() else {
            continue;
        };
        match merged.iter_mut().find(|element| same_element(element, diff)) {
            Some(existing) => {
                if let Some(target) = existing.as_object_mut() {
                    for (key, value) in diff_obj {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
            None => {
                let position = insert_position(&merged, path_of(diff));
                merged.insert(position, diff.clone());
            }
        }
    }
    merged
}

fn path_of(element: &Value) -> &str {
    element.get("path").and_then(Value::as_str).unwrap_or_default()
}

fn same_element(element: &Value, diff: &Value) -> bool {
    match (
        element.get("id").and_then(Value::as_str),
        diff.get("id").and_then(Value::as_str),
    ) {
        (Some(a), Some(b)) => a == b,
        _ => !path_of(diff).is_empty() && path_of(element) == path_of(diff),
    }
}

fn insert_position(merged: &[Value], path: &str) -> usize {
    let Some((parent, _)) = path.rsplit_once('.') else {
        return merged.len();
    };
    let prefix = format!("{parent}.");
    merged
        .iter()
        .rposition(|element| {
            let candidate = path_of(element);
            candidate == parent || candidate.starts_with(&prefix)
        })
        .map_or(merged.len(), |index| index + 1)
}

fn rebase(element: &Value, base_type: &str, type_name: &str) -> Value {
    let mut element = element.clone();
    if base_type == type_name || base_type.is_empty() {
        return element;
    }
    if let Some(obj) = element.as_object_mut() {
        for field in ["path", "id"] {
            let rebased = obj
                .get(field)
                .and_then(Value::as_str)
                .and_then(|value| rebase_path(value, base_type, type_name));
            if let Some(rebased) = rebased {
                obj.insert(field.to_string(), Value::String(rebased));
            }
        }
    }
    element
}

fn rebase_path(path: &str, base_type: &str, type_name: &str) -> Option<String> {
    if path == base_type {
        return Some(type_name.to_string());
    }
    path.strip_prefix(base_type)
        .filter(|rest| rest.starts_with('.'))
        .map(|rest| format!("{type_name}{rest}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constraint_overwrites_matching_elements() {
        let base = vec![
            json!({"id": "Patient", "path": "Patient", "min": 0, "max": "*"}),
            json!({"id": "Patient.name", "path": "Patient.name", "min": 0, "max": "*"}),
            json!({"id": "Patient.gender", "path": "Patient.gender", "min": 0, "max": "1"}),
        ];
        let diff = vec![json!({"id": "Patient.name", "path": "Patient.name", "min": 1})];

        let merged = merge_differential(&base, "Patient", &diff, "Patient");
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1], json!({"id": "Patient.name", "path": "Patient.name", "min": 1, "max": "*"}));
    }

    #[test]
    fn test_specialisation_rebases_and_inserts() {
        let base = vec![
            json!({"id": "DomainResource", "path": "DomainResource"}),
            json!({"id": "DomainResource.text", "path": "DomainResource.text"}),
        ];
        let diff = vec![
            json!({"id": "Patient", "path": "Patient", "short": "Patient"}),
            json!({"id": "Patient.active", "path": "Patient.active"}),
        ];

        let merged = merge_differential(&base, "DomainResource", &diff, "Patient");
        let paths: Vec<&str> = merged.iter().map(path_of).collect();
        assert_eq!(paths, vec!["Patient", "Patient.text", "Patient.active"]);
        assert_eq!(merged[0]["short"], "Patient");
    }

    #[test]
    fn test_new_child_goes_after_parent_descendants() {
        let base = vec![
            json!({"path": "Observation"}),
            json!({"path": "Observation.component"}),
            json!({"path": "Observation.component.code"}),
            json!({"path": "Observation.status"}),
        ];
        let diff = vec![json!({"path": "Observation.component.extra"})];

        let merged = merge_differential(&base, "Observation", &diff, "Observation");
        let paths: Vec<&str> = merged.iter().map(path_of).collect();
        assert_eq!(
            paths,
            vec![
                "Observation",
                "Observation.component",
                "Observation.component.code",
                "Observation.component.extra",
                "Observation.status"
            ]
        );
    }

    #[test]
    fn test_rebase_path_requires_segment_boundary() {
        assert_eq!(rebase_path("Element.id", "Element", "Quantity").as_deref(), Some("Quantity.id"));
        assert_eq!(rebase_path("ElementDefinition.id", "Element", "Quantity"), None);
    }
}
