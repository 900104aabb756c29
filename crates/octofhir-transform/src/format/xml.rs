//! FHIR XML <-> FHIR JSON.
//!
//! Primitives travel as `value` attributes, element ids as `id` attributes
//! and extension urls as `url` attributes. A JSON primitive's `_name`
//! companion (id and extensions) becomes the children of the XML element.
//! Contained resources are wrapped by their holding element.

use std::fmt::Display;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

use super::shape::ElementShape;
use super::{FHIR_NAMESPACE, FormatError, XHTML_NAMESPACE};

type Object = Map<String, Value>;

/// Deepest element nesting accepted when reading.
const MAX_DEPTH: usize = 128;

fn xml_err(err: impl Display) -> FormatError {
    FormatError::Xml(err.to_string())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

pub(super) fn to_xml(resource: &Value) -> Result<Vec<u8>, FormatError> {
    let resource = resource
        .as_object()
        .ok_or_else(|| FormatError::Xml("resource must be a JSON object".into()))?;
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write_resource(&mut writer, resource, true)?;
    Ok(writer.into_inner())
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), FormatError> {
    writer.write_event(event).map_err(xml_err)
}

fn write_resource(
    writer: &mut Writer<Vec<u8>>,
    resource: &Object,
    root: bool,
) -> Result<(), FormatError> {
    let resource_type = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| FormatError::Xml("missing resourceType".into()))?;
    let mut start = BytesStart::new(resource_type);
    if root {
        start.push_attribute(("xmlns", FHIR_NAMESPACE));
    }
    emit(writer, Event::Start(start))?;
    // A resource's id is an element, not an attribute.
    write_members(writer, resource, &["resourceType"])?;
    emit(writer, Event::End(BytesEnd::new(resource_type)))
}

fn write_members(
    writer: &mut Writer<Vec<u8>>,
    members: &Object,
    skip: &[&str],
) -> Result<(), FormatError> {
    for (name, value) in members {
        if skip.contains(&name.as_str()) {
            continue;
        }
        match name.strip_prefix('_') {
            Some(base) => {
                // Only a primitive's extensions, without a value.
                if !members.contains_key(base) {
                    write_property(writer, base, &Value::Null, Some(value))?;
                }
            }
            None => write_property(writer, name, value, members.get(&format!("_{name}")))?,
        }
    }
    Ok(())
}

fn write_property(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    value: &Value,
    meta: Option<&Value>,
) -> Result<(), FormatError> {
    match value {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let item_meta = meta.and_then(|m| m.get(index)).filter(|m| !m.is_null());
                write_property(writer, name, item, item_meta)?;
            }
            Ok(())
        }
        Value::Object(resource) if resource.contains_key("resourceType") => {
            emit(writer, Event::Start(BytesStart::new(name)))?;
            write_resource(writer, resource, false)?;
            emit(writer, Event::End(BytesEnd::new(name)))
        }
        Value::Object(element) => write_element(writer, name, element),
        Value::Null => match meta {
            Some(Value::Array(metas)) => {
                for item_meta in metas {
                    write_primitive(writer, name, None, Some(item_meta))?;
                }
                Ok(())
            }
            Some(item_meta) => write_primitive(writer, name, None, Some(item_meta)),
            None => Ok(()),
        },
        Value::String(xhtml) if name == "div" => write_xhtml(writer, xhtml),
        Value::String(text) => write_primitive(writer, name, Some(text.clone()), meta),
        Value::Number(number) => write_primitive(writer, name, Some(number.to_string()), meta),
        Value::Bool(flag) => write_primitive(writer, name, Some(flag.to_string()), meta),
    }
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    element: &Object,
) -> Result<(), FormatError> {
    let mut start = BytesStart::new(name);
    let mut skip = vec!["id"];
    if let Some(id) = element.get("id").and_then(Value::as_str) {
        start.push_attribute(("id", id));
    }
    if name == "extension" || name == "modifierExtension" {
        if let Some(url) = element.get("url").and_then(Value::as_str) {
            start.push_attribute(("url", url));
        }
        skip.push("url");
    }

    if element.keys().all(|k| skip.contains(&k.as_str())) {
        return emit(writer, Event::Empty(start));
    }
    emit(writer, Event::Start(start))?;
    write_members(writer, element, &skip)?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn write_primitive(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    value: Option<String>,
    meta: Option<&Value>,
) -> Result<(), FormatError> {
    let mut start = BytesStart::new(name);
    let meta = meta.and_then(Value::as_object);
    if let Some(id) = meta.and_then(|m| m.get("id")).and_then(Value::as_str) {
        start.push_attribute(("id", id));
    }
    if let Some(value) = value.as_deref() {
        start.push_attribute(("value", value));
    }

    match meta.filter(|m| m.keys().any(|k| k != "id")) {
        Some(meta) => {
            emit(writer, Event::Start(start))?;
            write_members(writer, meta, &["id"])?;
            emit(writer, Event::End(BytesEnd::new(name)))
        }
        None => emit(writer, Event::Empty(start)),
    }
}

fn write_xhtml(writer: &mut Writer<Vec<u8>>, xhtml: &str) -> Result<(), FormatError> {
    if xhtml.trim_start().starts_with("<div") {
        return emit(writer, Event::Text(BytesText::from_escaped(xhtml)));
    }
    let mut start = BytesStart::new("div");
    start.push_attribute(("xmlns", XHTML_NAMESPACE));
    emit(writer, Event::Start(start))?;
    emit(writer, Event::Text(BytesText::new(xhtml)))?;
    emit(writer, Event::End(BytesEnd::new("div")))
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

pub(super) fn from_xml<F>(text: &str, shape_for: &F) -> Result<Value, FormatError>
where
    F: Fn(&str) -> ElementShape,
{
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                check_namespace(&start)?;
                let resource_type = local_name(&start)?;
                let resource = read_resource(&mut reader, &resource_type, shape_for, 1)?;
                return Ok(Value::Object(resource));
            }
            Event::Empty(start) => {
                check_namespace(&start)?;
                let resource_type = local_name(&start)?;
                return Ok(Value::Object(empty_resource(resource_type)));
            }
            Event::Eof => return Err(FormatError::Xml("document has no root element".into())),
            _ => {}
        }
    }
}

fn check_namespace(start: &BytesStart<'_>) -> Result<(), FormatError> {
    match attributes(start, true)?
        .into_iter()
        .find(|(key, _)| key == "xmlns")
    {
        Some((_, namespace)) if namespace != FHIR_NAMESPACE => Err(FormatError::Xml(format!(
            "root element is in namespace '{namespace}', expected {FHIR_NAMESPACE}"
        ))),
        _ => Ok(()),
    }
}

fn empty_resource(resource_type: String) -> Object {
    let mut resource = Object::new();
    resource.insert("resourceType".to_string(), Value::String(resource_type));
    resource
}

fn read_resource<F>(
    reader: &mut Reader<&[u8]>,
    resource_type: &str,
    shape_for: &F,
    depth: usize,
) -> Result<Object, FormatError>
where
    F: Fn(&str) -> ElementShape,
{
    let shape = shape_for(resource_type);
    let mut resource = empty_resource(resource_type.to_string());
    read_children(reader, &shape, resource_type, &mut resource, shape_for, depth)?;
    Ok(resource)
}

/// Reads child elements into `target` until the enclosing end tag. Returns
/// the resource when the enclosing element only wraps one.
fn read_children<F>(
    reader: &mut Reader<&[u8]>,
    shape: &ElementShape,
    path: &str,
    target: &mut Object,
    shape_for: &F,
    depth: usize,
) -> Result<Option<Object>, FormatError>
where
    F: Fn(&str) -> ElementShape,
{
    let mut wrapped = None;
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                if depth >= MAX_DEPTH {
                    return Err(FormatError::Xml(format!(
                        "nesting too deep at {path} (limit {MAX_DEPTH})"
                    )));
                }
                let name = local_name(&start)?;
                if is_resource_name(&name) {
                    wrapped = Some(read_resource(reader, &name, shape_for, depth + 1)?);
                    continue;
                }
                let child_path = format!("{path}.{name}");
                if name == "div" {
                    let inner = reader.read_text(start.name()).map_err(xml_err)?;
                    let xhtml =
                        format!("<div xmlns=\"{XHTML_NAMESPACE}\">{}</div>", inner.trim());
                    insert(target, shape, &child_path, &name, Value::String(xhtml));
                    continue;
                }
                let attrs = attributes(&start, false)?;
                let mut children = Object::new();
                let wrapped_resource = read_children(
                    reader,
                    shape,
                    &child_path,
                    &mut children,
                    shape_for,
                    depth + 1,
                )?;
                match wrapped_resource {
                    Some(resource) => {
                        insert(target, shape, &child_path, &name, Value::Object(resource));
                    }
                    None => finish_element(target, shape, &child_path, &name, attrs, children),
                }
            }
            Event::Empty(start) => {
                let name = local_name(&start)?;
                if is_resource_name(&name) {
                    wrapped = Some(empty_resource(name));
                    continue;
                }
                let child_path = format!("{path}.{name}");
                let attrs = attributes(&start, false)?;
                finish_element(target, shape, &child_path, &name, attrs, Object::new());
            }
            Event::End(_) => return Ok(wrapped),
            Event::Eof => {
                return Err(FormatError::Xml(format!("unexpected end of document in {path}")));
            }
            _ => {}
        }
    }
}

fn finish_element(
    target: &mut Object,
    shape: &ElementShape,
    path: &str,
    name: &str,
    attrs: Vec<(String, String)>,
    children: Object,
) {
    let mut id = None;
    let mut url = None;
    let mut raw_value = None;
    for (key, value) in attrs {
        match key.as_str() {
            "id" => id = Some(value),
            "url" => url = Some(value),
            "value" => raw_value = Some(value),
            _ => {}
        }
    }

    match raw_value {
        Some(raw) => {
            let value = shape.typed_value(path, name, &raw);
            let mut meta = children;
            if let Some(id) = id {
                meta.insert("id".to_string(), Value::String(id));
            }
            insert_primitive(target, shape, path, name, value, meta);
        }
        None => {
            let mut element = Object::new();
            if let Some(id) = id {
                element.insert("id".to_string(), Value::String(id));
            }
            if let Some(url) = url {
                element.insert("url".to_string(), Value::String(url));
            }
            element.extend(children);
            insert(target, shape, path, name, Value::Object(element));
        }
    }
}

/// Adds `value` under `name`, as a list when the element repeats. Returns
/// the list index the value landed at.
fn insert(
    target: &mut Object,
    shape: &ElementShape,
    path: &str,
    name: &str,
    value: Value,
) -> Option<usize> {
    let repeats = shape.repeats(path, name);
    match target.get_mut(name) {
        Some(Value::Array(items)) => {
            items.push(value);
            Some(items.len() - 1)
        }
        // A repeated sibling the shape did not know about.
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
            Some(1)
        }
        None if repeats => {
            target.insert(name.to_string(), Value::Array(vec![value]));
            Some(0)
        }
        None => {
            target.insert(name.to_string(), value);
            None
        }
    }
}

fn insert_primitive(
    target: &mut Object,
    shape: &ElementShape,
    path: &str,
    name: &str,
    value: Value,
    meta: Object,
) {
    let meta_key = format!("_{name}");
    let index = insert(target, shape, path, name, value);
    let meta = (!meta.is_empty()).then_some(Value::Object(meta));

    match index {
        None => {
            if let Some(meta) = meta {
                target.insert(meta_key, meta);
            }
        }
        Some(index) => {
            if meta.is_some() && !target.contains_key(&meta_key) {
                target.insert(meta_key.clone(), Value::Array(Vec::new()));
            }
            let Some(slot) = target.get_mut(&meta_key) else {
                return;
            };
            if !slot.is_array() {
                let first = slot.take();
                *slot = Value::Array(vec![first]);
            }
            let Value::Array(metas) = slot else {
                return;
            };
            // Companion lists stay index-aligned with their values.
            if metas.len() < index {
                metas.resize(index, Value::Null);
            }
            metas.push(meta.unwrap_or(Value::Null));
        }
    }
}

fn is_resource_name(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn local_name(start: &BytesStart<'_>) -> Result<String, FormatError> {
    std::str::from_utf8(start.local_name().as_ref())
        .map(str::to_string)
        .map_err(xml_err)
}

fn attributes(
    start: &BytesStart<'_>,
    keep_namespaces: bool,
) -> Result<Vec<(String, String)>, FormatError> {
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(xml_err)?;
        if key.starts_with("xmlns") && !keep_namespaces {
            continue;
        }
        let value = attr.unescape_value().map_err(xml_err)?;
        attrs.push((key.to_string(), value.into_owned()));
    }
    Ok(attrs)
}
