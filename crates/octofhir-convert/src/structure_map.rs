//! StructureMap: group type modes, rule names and target context types.

use serde_json::Value;

use crate::common::{Direction, Object, objects_mut, require_element};
use crate::error::ConversionError;

pub(crate) fn convert(resource: &mut Object, direction: Direction) -> Result<(), ConversionError> {
    for element in ["url", "name", "group"] {
        require_element(resource, element)?;
    }

    if direction == Direction::ToR4 {
        resource.remove("const");
    }

    for group in objects_mut(resource, "group") {
        match direction {
            Direction::ToR5 => {
                if group.get("typeMode").and_then(Value::as_str) == Some("none") {
                    group.remove("typeMode");
                }
            }
            Direction::ToR4 => {
                group
                    .entry("typeMode")
                    .or_insert_with(|| Value::String("none".to_string()));
            }
        }
        let mut index = 0;
        convert_rules(group, direction, &mut index);
    }
    Ok(())
}

/// Rules are numbered depth-first within their group, starting at 1.
fn convert_rules(owner: &mut Object, direction: Direction, index: &mut usize) {
    for rule in objects_mut(owner, "rule") {
        *index += 1;
        if direction == Direction::ToR4 && !rule.contains_key("name") {
            rule.insert("name".to_string(), Value::String(format!("rule{index}")));
        }
        for target in objects_mut(rule, "target") {
            match direction {
                Direction::ToR5 => {
                    target.remove("contextType");
                }
                Direction::ToR4 => {
                    if target.contains_key("context") && !target.contains_key("contextType") {
                        target.insert(
                            "contextType".to_string(),
                            Value::String("variable".to_string()),
                        );
                    }
                }
            }
        }
        convert_rules(rule, direction, index);
    }
}
