//! ImplementationGuide: example flags on definition resources and page names.

use serde_json::{Value, json};
use tracing::debug;

use crate::common::{Direction, Object, objects_mut};

pub(crate) fn convert(resource: &mut Object, direction: Direction) {
    let url = resource
        .get("url")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let Some(definition) = resource
        .get_mut("definition")
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    for entry in objects_mut(definition, "resource") {
        match direction {
            Direction::ToR5 => resource_to_r5(entry),
            Direction::ToR4 => resource_to_r4(entry, &url),
        }
    }
    if let Some(page) = definition.get_mut("page").and_then(Value::as_object_mut) {
        convert_page(page, direction);
    }
}

fn resource_to_r5(entry: &mut Object) {
    if let Some(flag) = entry.remove("exampleBoolean") {
        entry.insert("isExample".to_string(), flag);
    }
    if let Some(profile) = entry.remove("exampleCanonical") {
        entry.insert("isExample".to_string(), Value::Bool(true));
        entry.insert("profile".to_string(), json!([profile]));
    }
}

fn resource_to_r4(entry: &mut Object, guide_url: &str) {
    let is_example = entry.remove("isExample").and_then(|v| v.as_bool());
    let profiles = entry.remove("profile");
    let profiles = profiles
        .as_ref()
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    match (is_example, profiles.first()) {
        (Some(true), Some(profile)) => {
            if profiles.len() > 1 {
                debug!(
                    guide = guide_url,
                    dropped = profiles.len() - 1,
                    "R4 exampleCanonical keeps only the first profile"
                );
            }
            entry.insert("exampleCanonical".to_string(), profile.clone());
        }
        (Some(flag), _) => {
            entry.insert("exampleBoolean".to_string(), Value::Bool(flag));
        }
        (None, _) => {}
    }
}

/// R4 `page.nameUrl` is R5 `page.name`.
fn convert_page(page: &mut Object, direction: Direction) {
    let (from, to) = match direction {
        Direction::ToR5 => ("nameUrl", "name"),
        Direction::ToR4 => ("name", "nameUrl"),
    };
    if let Some(name) = page.remove(from) {
        page.insert(to.to_string(), name);
    }
    for child in objects_mut(page, "page") {
        convert_page(child, direction);
    }
}
