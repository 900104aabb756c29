//! Instance-level conversions.

use crate::common::{Direction, Object};

/// Observation elements introduced in R5.
const R5_ONLY_OBSERVATION_FIELDS: [&str; 4] = [
    "triggeredBy",
    "instantiatesCanonical",
    "instantiatesReference",
    "bodyStructure",
];

pub(crate) fn observation(resource: &mut Object, direction: Direction) {
    if direction == Direction::ToR4 {
        for field in R5_ONLY_OBSERVATION_FIELDS {
            resource.remove(field);
        }
    }
}
