use serde_json::Value;

use crate::common::{Direction, Object};

pub(crate) fn convert(resource: &mut Object, direction: Direction) {
    match direction {
        Direction::ToR5 => {
            resource.remove("xpath");
            if let Some(usage) = resource.remove("xpathUsage") {
                let mode = match usage.as_str() {
                    Some("normal") => "normal",
                    Some("phonetic") => "phonetic",
                    _ => "other",
                };
                resource.insert(
                    "processingMode".to_string(),
                    Value::String(mode.to_string()),
                );
            }
        }
        Direction::ToR4 => {
            resource.remove("constraint");
            if let Some(mode) = resource.remove("processingMode") {
                resource.insert("xpathUsage".to_string(), mode);
            }
        }
    }
}
