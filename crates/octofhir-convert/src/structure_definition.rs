use serde_json::Value;

use crate::common::{Direction, Object, require_element};
use crate::error::ConversionError;

/// ElementDefinition elements introduced in R5.
const R5_ONLY_ELEMENT_FIELDS: [&str; 2] = ["mustHaveValue", "valueAlternatives"];

pub(crate) fn convert(resource: &mut Object, direction: Direction) -> Result<(), ConversionError> {
    for element in ["url", "type", "kind"] {
        require_element(resource, element)?;
    }

    // STU3 string context, valid in neither version.
    resource.remove("contextType");

    if direction == Direction::ToR4 {
        for part in ["snapshot", "differential"] {
            let elements = resource
                .get_mut(part)
                .and_then(|p| p.get_mut("element"))
                .and_then(Value::as_array_mut);
            for element in elements.into_iter().flatten().filter_map(Value::as_object_mut) {
                for field in R5_ONLY_ELEMENT_FIELDS {
                    element.remove(field);
                }
            }
        }
    }
    Ok(())
}
