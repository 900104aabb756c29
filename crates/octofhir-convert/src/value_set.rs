use serde_json::Value;

use crate::common::{Direction, Object, objects_mut};

pub(crate) fn convert(resource: &mut Object, direction: Direction) {
    if direction != Direction::ToR4 {
        return;
    }
    resource.remove("scope");
    if let Some(compose) = resource.get_mut("compose").and_then(Value::as_object_mut) {
        for part in ["include", "exclude"] {
            for set in objects_mut(compose, part) {
                set.remove("copyright");
            }
        }
    }
    if let Some(expansion) = resource.get_mut("expansion").and_then(Value::as_object_mut) {
        expansion.remove("next");
    }
}
