//! Loading descriptors from JSON.
//!
//! Only the data subset of a descriptor can be expressed in JSON. Fields
//! that hold callbacks (`events`, `hooks`, `methods` and top-level lifecycle
//! shorthands) are refused with [`ValidationError::RequiresCode`]. Unknown
//! fields are ignored.
//!
//! ```json
//! {
//!   "type": "form",
//!   "namespace": "form",
//!   "props": { "modelValue": { "user": { "name": "" } } },
//!   "children": [
//!     { "type": "input", "key": "name", "props": { "modelValue": { "path": "user.name" } } }
//!   ]
//! }
//! ```

use crate::descriptor::{Children, Descriptor, DirectiveObject, DirectiveSpec, Slots, TypeSpec};
use crate::error::ValidationError;
use crate::lifecycle::Lifecycle;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

const CODE_FIELDS: [&str; 3] = ["events", "hooks", "methods"];

impl Descriptor {
    /// Build a descriptor from a JSON object
    pub fn from_json(value: &Value) -> Result<Descriptor, ValidationError> {
        let object = value.as_object().ok_or_else(|| invalid("descriptor", "expected an object"))?;
        parse_descriptor(object)
    }

    pub fn from_json_str(source: &str) -> Result<Descriptor, ValidationError> {
        let value: Value =
            serde_json::from_str(source).map_err(|err| invalid("descriptor", &err.to_string()))?;
        Self::from_json(&value)
    }
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn parse_descriptor(object: &Map<String, Value>) -> Result<Descriptor, ValidationError> {
    for field in object.keys() {
        if CODE_FIELDS.contains(&field.as_str()) || Lifecycle::parse(field).is_some() {
            return Err(ValidationError::RequiresCode {
                field: field.clone(),
            });
        }
    }

    let ty = match object.get("type") {
        Some(Value::String(name)) if !name.is_empty() => TypeSpec::Name(name.clone()),
        Some(Value::Object(inner)) => TypeSpec::Inline(Box::new(parse_descriptor(inner)?)),
        Some(Value::String(_)) | None | Some(Value::Null) => return Err(ValidationError::MissingType),
        Some(_) => return Err(invalid("type", "expected a tag name or an inline descriptor")),
    };
    let mut descriptor = Descriptor::new(ty);

    for (field, value) in object {
        match field.as_str() {
            "type" => {}
            "name" => descriptor.name = Some(string_field(field, value)?),
            "key" => descriptor.key = Some(string_field(field, value)?),
            "wrapper" => {
                descriptor.wrapper = value
                    .as_bool()
                    .ok_or_else(|| invalid(field, "expected a boolean"))?;
            }
            "namespace" if !value.is_null() => {
                descriptor.namespace = Some(string_field(field, value)?.into());
            }
            "inject" if !value.is_null() => descriptor.inject = Some(string_field(field, value)?.into()),
            "provide" if !value.is_null() => {
                let provide = value
                    .as_object()
                    .ok_or_else(|| invalid(field, "expected {key, value}"))?;
                let key = match provide.get("key") {
                    Some(Value::String(key)) if !key.is_empty() => key.clone(),
                    _ => return Err(ValidationError::InvalidProvideKey),
                };
                descriptor = descriptor
                    .with_provide(key, provide.get("value").cloned().unwrap_or(Value::Null));
            }
            "props" => {
                descriptor.props = value
                    .as_object()
                    .cloned()
                    .ok_or_else(|| invalid(field, "expected an object"))?;
            }
            "children" => descriptor.children = parse_children(value)?,
            "directives" => descriptor.directives = parse_directives(value)?,
            "slots" => descriptor.slots = parse_slots(value)?,
            other => debug!(field = other, "Ignoring unknown descriptor field"),
        }
    }

    Ok(descriptor)
}

fn string_field(field: &str, value: &Value) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(invalid(field, "expected a string")),
    }
}

fn parse_children(value: &Value) -> Result<Option<Children>, ValidationError> {
    Ok(match value {
        Value::Null => None,
        Value::String(text) => Some(Children::Text(text.clone())),
        Value::Object(object) => Some(Children::One(Box::new(parse_descriptor(object)?))),
        Value::Array(items) if items.iter().all(Value::is_object) => {
            let list = items
                .iter()
                .filter_map(Value::as_object)
                .map(parse_descriptor)
                .collect::<Result<Vec<_>, _>>()?;
            Some(Children::Many(list))
        }
        other => Some(Children::Invalid(other.clone())),
    })
}

fn is_directive_object(object: &Map<String, Value>) -> bool {
    ["value", "arg", "modifiers"]
        .iter()
        .any(|field| object.contains_key(*field))
}

fn parse_directives(value: &Value) -> Result<IndexMap<String, DirectiveSpec>, ValidationError> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid("directives", "expected an object"))?;

    let mut directives = IndexMap::new();
    for (name, raw) in object {
        let spec = match raw {
            Value::Object(inner) if is_directive_object(inner) => {
                DirectiveSpec::Object(DirectiveObject::from_data(inner))
            }
            Value::Array(items) => DirectiveSpec::Many(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(inner) if is_directive_object(inner) => DirectiveObject::from_data(inner),
                        other => DirectiveObject::new(other.clone()),
                    })
                    .collect(),
            ),
            other => DirectiveSpec::value(other.clone()),
        };
        directives.insert(name.clone(), spec);
    }
    Ok(directives)
}

fn parse_slots(value: &Value) -> Result<Option<Slots>, ValidationError> {
    Ok(match value {
        Value::Null => None,
        Value::String(text) => Some(Slots::Default(Children::Text(text.clone()))),
        Value::Object(named) => {
            let mut slots = IndexMap::new();
            for (name, content) in named {
                if let Some(children) = parse_children(content)? {
                    slots.insert(name.clone(), children);
                }
            }
            Some(Slots::Named(slots))
        }
        _ => return Err(invalid("slots", "expected a string or an object of slot contents")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Key;
    use serde_json::json;

    #[test]
    fn test_loads_nested_descriptor() {
        let descriptor = Descriptor::from_json(&json!({
            "type": "form",
            "namespace": "form",
            "wrapper": false,
            "props": { "modelValue": { "name": "" } },
            "children": [
                { "type": "input", "key": 1 },
                { "type": "span", "children": "label" }
            ]
        }))
        .unwrap();

        assert_eq!(descriptor.namespace, Some(Key::from("form")));
        assert!(!descriptor.wrapper);
        match &descriptor.children {
            Some(Children::Many(list)) => {
                assert_eq!(list[0].key.as_deref(), Some("1"));
                assert!(matches!(list[1].children, Some(Children::Text(ref t)) if t == "label"));
            }
            other => panic!("expected a list, got {other:?}"),
        }
    }

    #[test]
    fn test_directive_shapes() {
        let descriptor = Descriptor::from_json(&json!({
            "type": "div",
            "directives": {
                "dcShow": false,
                "dcPermission": { "value": "admin", "arg": "role" },
                "dcStyle": [{ "value": "red", "arg": "color" }, { "value": "1px", "arg": "border" }],
                "dcLazy": { "num": 4 }
            }
        }))
        .unwrap();

        assert!(matches!(descriptor.directives["dcShow"], DirectiveSpec::Plain(_)));
        assert!(matches!(descriptor.directives["dcPermission"], DirectiveSpec::Object(_)));
        assert!(matches!(&descriptor.directives["dcStyle"], DirectiveSpec::Many(list) if list.len() == 2));
        assert!(matches!(descriptor.directives["dcLazy"], DirectiveSpec::Plain(_)));
    }

    #[test]
    fn test_code_fields_are_refused() {
        for field in ["events", "hooks", "methods", "mounted"] {
            let mut value = json!({ "type": "div" });
            value[field] = json!({});
            assert_eq!(
                Descriptor::from_json(&value).unwrap_err(),
                ValidationError::RequiresCode {
                    field: field.to_string()
                }
            );
        }
    }

    #[test]
    fn test_missing_type_and_bad_children() {
        assert_eq!(
            Descriptor::from_json(&json!({ "props": {} })).unwrap_err(),
            ValidationError::MissingType
        );
        let descriptor = Descriptor::from_json(&json!({ "type": "ul", "children": [1, 2] })).unwrap();
        assert!(matches!(descriptor.children, Some(Children::Invalid(_))));
    }

    #[test]
    fn test_from_str_reports_parse_errors() {
        assert!(matches!(
            Descriptor::from_json_str("{ not json"),
            Err(ValidationError::InvalidField { field, .. }) if field == "descriptor"
        ));
        assert!(Descriptor::from_json_str(r#"{ "type": "p", "slots": { "footer": "bye" } }"#).is_ok());
    }
}
