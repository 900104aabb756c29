use std::collections::HashMap;

use octofhir_core::CanonicalResource;
use serde_json::Value;

/// Element names that repeat wherever they occur.
const REPEATING: &[&str] = &[
    "extension",
    "modifierExtension",
    "contained",
    "identifier",
    "coding",
    "given",
    "prefix",
    "suffix",
    "line",
    "telecom",
    "item",
    "answer",
    "enableWhen",
    "answerOption",
    "initial",
    "note",
    "category",
    "component",
    "referenceRange",
    "interpretation",
    "hasMember",
    "derivedFrom",
    "basedOn",
    "partOf",
    "performer",
    "entry",
    "link",
    "concept",
    "designation",
    "include",
    "exclude",
    "useContext",
    "jurisdiction",
    "contact",
    "tag",
    "security",
    "profile",
    "group",
    "rule",
    "input",
    "structure",
    "import",
    "dependent",
    "parameter",
    "element",
    "targetProfile",
    "constraint",
    "mapping",
];

const BOOLEANS: &[&str] = &[
    "abstract",
    "active",
    "experimental",
    "required",
    "repeats",
    "readOnly",
    "mustSupport",
    "isModifier",
    "isSummary",
    "inactive",
    "userSelected",
    "lockedDate",
    "immutable",
    "multipleResultsAllowed",
];

const INTEGERS: &[&str] = &["min", "maxLength", "total", "offset", "count", "rank"];

/// Choice-type suffixes with a non-string JSON representation.
const TYPED_SUFFIXES: &[(&str, &str)] = &[
    ("Boolean", "boolean"),
    ("Integer", "integer"),
    ("Integer64", "integer64"),
    ("Decimal", "decimal"),
    ("PositiveInt", "positiveInt"),
    ("UnsignedInt", "unsignedInt"),
];

/// Datatypes whose `value` element is a decimal, by the holding element's suffix.
const QUANTITY_HOLDERS: &[&str] = &["Quantity", "Age", "Duration", "Distance", "Count", "Money"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct ElementInfo {
    repeats: bool,
    type_code: Option<String>,
}

/// What the XML reader needs to know about a resource type's elements:
/// whether an element repeats and which primitive type it carries.
///
/// Built from a StructureDefinition snapshot when one is available; paths
/// the snapshot does not cover (datatype internals, other resource types)
/// fall back to built-in name lists.
#[derive(Debug, Clone, Default)]
pub struct ElementShape {
    elements: HashMap<String, ElementInfo>,
    /// `Observation.value` for `Observation.value[x]`.
    choices: Vec<(String, ElementInfo)>,
}

impl ElementShape {
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn from_definition(definition: &CanonicalResource) -> Self {
        let mut shape = Self::default();
        let elements = definition
            .get("snapshot")
            .and_then(|s| s.get("element"))
            .and_then(Value::as_array);
        for element in elements.into_iter().flatten() {
            let Some(path) = element.get("path").and_then(Value::as_str) else {
                continue;
            };
            let repeats = element
                .get("max")
                .and_then(Value::as_str)
                .is_some_and(|max| max != "0" && max != "1");
            let types = element
                .get("type")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let type_code = match types {
                [single] => single.get("code").and_then(Value::as_str).map(str::to_string),
                _ => None,
            };
            let info = ElementInfo { repeats, type_code };
            match path.strip_suffix("[x]") {
                Some(prefix) => shape.choices.push((prefix.to_string(), info)),
                None => {
                    shape.elements.insert(path.to_string(), info);
                }
            }
        }
        shape
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.choices.is_empty()
    }

    fn info(&self, path: &str) -> Option<&ElementInfo> {
        self.elements.get(path).or_else(|| {
            self.choices
                .iter()
                .find(|(prefix, _)| {
                    path.strip_prefix(prefix.as_str())
                        .filter(|rest| !rest.contains('.'))
                        .and_then(|rest| rest.chars().next())
                        .is_some_and(char::is_uppercase)
                })
                .map(|(_, info)| info)
        })
    }

    /// Whether `name` at `path` is a list in JSON.
    pub fn repeats(&self, path: &str, name: &str) -> bool {
        match self.info(path) {
            Some(info) => info.repeats,
            None => REPEATING.contains(&name),
        }
    }

    /// Primitive type code of `name` at `path`, when it is not a string.
    pub fn primitive_type(&self, path: &str, name: &str) -> Option<&str> {
        if let Some(code) = self.info(path).and_then(|i| i.type_code.as_deref()) {
            return Some(code);
        }
        if let Some((_, code)) = TYPED_SUFFIXES
            .iter()
            .filter(|(suffix, _)| name.len() > suffix.len() && name.ends_with(suffix))
            .max_by_key(|(suffix, _)| suffix.len())
        {
            return Some(code);
        }
        if name == "value" && path.rsplit('.').nth(1).is_some_and(holds_quantity) {
            return Some("decimal");
        }
        if BOOLEANS.contains(&name) {
            Some("boolean")
        } else if INTEGERS.contains(&name) {
            Some("integer")
        } else {
            None
        }
    }

    /// Converts an XML `value` attribute into its JSON form.
    pub fn typed_value(&self, path: &str, name: &str, raw: &str) -> Value {
        match self.primitive_type(path, name) {
            Some("boolean") => match raw {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(raw.to_string()),
            },
            Some("integer" | "positiveInt" | "unsignedInt") => raw
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            Some("decimal") => raw
                .parse::<serde_json::Number>()
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            _ => Value::String(raw.to_string()),
        }
    }
}

fn holds_quantity(element: &str) -> bool {
    element == "quantity" || QUANTITY_HOLDERS.iter().any(|suffix| element.ends_with(suffix))
}
