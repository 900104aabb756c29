//! Questionnaire: choice item types vs. `coding` + `answerConstraint`.

use serde_json::Value;

use crate::common::{Direction, Object, objects_mut};

pub(crate) fn convert(resource: &mut Object, direction: Direction) {
    convert_items(resource, direction);
}

fn convert_items(owner: &mut Object, direction: Direction) {
    for item in objects_mut(owner, "item") {
        match direction {
            Direction::ToR5 => item_to_r5(item),
            Direction::ToR4 => item_to_r4(item),
        }
        convert_items(item, direction);
    }
}

fn item_to_r5(item: &mut Object) {
    let constraint = match item.get("type").and_then(Value::as_str) {
        Some("choice") => "optionsOnly",
        Some("open-choice") => "optionsOrType",
        _ => return,
    };
    item.insert("type".to_string(), Value::String("coding".to_string()));
    item.insert(
        "answerConstraint".to_string(),
        Value::String(constraint.to_string()),
    );
}

fn item_to_r4(item: &mut Object) {
    item.remove("disabledDisplay");
    let constraint = item.remove("answerConstraint");
    if item.get("type").and_then(Value::as_str) != Some("coding") {
        return;
    }
    let r4_type = match constraint.as_ref().and_then(Value::as_str) {
        Some("optionsOrType" | "optionsOrString") => "open-choice",
        _ => "choice",
    };
    item.insert("type".to_string(), Value::String(r4_type.to_string()));
}
