//! Two-way model bindings declared through the `modelValue` prop.
//!
//! `modelValue` takes one of two shapes:
//!
//! ```json
//! { "namespace": "form", "props": { "modelValue": { "name": "", "age": 0 } } }
//! { "props": { "modelValue": { "path": "name", "value": "Ann" } } }
//! ```
//!
//! The first seeds the namespace root with defaults, the second binds a cell
//! at `<base path>.<path>`.

use dcstruct_store::PATH_SEPARATOR;
use serde::Deserialize;
use serde_json::{Map, Number, Value};

pub const MODEL_PROP: &str = "modelValue";
pub const MODEL_UPDATE_EVENT: &str = "onUpdate:modelValue";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBinding {
    pub path: String,
    #[serde(default)]
    pub value: Option<Value>,
    /// Force `value` into the store even when the path already exists
    #[serde(default)]
    pub immediate: bool,
    /// Coerce incoming values to numbers
    #[serde(default)]
    pub number: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub precision: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelSpec {
    /// Path binding relative to the base path
    Binding(ModelBinding),
    /// Defaults object for the namespace root
    Defaults(Value),
}

impl ModelSpec {
    pub fn from_props(props: &Map<String, Value>) -> Option<ModelSpec> {
        let raw = props.get(MODEL_PROP)?;
        let object = raw.as_object()?;
        if object.get("path").map_or(false, Value::is_string) {
            serde_json::from_value(raw.clone())
                .ok()
                .map(ModelSpec::Binding)
        } else {
            Some(ModelSpec::Defaults(raw.clone()))
        }
    }
}

impl ModelBinding {
    /// Apply number coercion, clamping and rounding.
    ///
    /// Returns `None` when the value must be rejected (a non-numeric input on a
    /// number binding). Bindings without `number` pass values through.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        if !self.number {
            return Some(value);
        }
        let mut n = match &value {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            Value::Bool(b) => f64::from(u8::from(*b)),
            _ => return None,
        };
        if n.is_nan() {
            return None;
        }
        if let Some(min) = self.min {
            n = n.max(min);
        }
        if let Some(max) = self.max {
            n = n.min(max);
        }
        if let Some(precision) = self.precision {
            let factor = 10f64.powi(precision as i32);
            n = (n * factor).round() / factor;
        }
        number_value(n)
    }
}

fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Value::Number(Number::from(n as i64)))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}

/// Join two optional path segments with the store separator
pub fn join_path(base: Option<&str>, tail: Option<&str>) -> Option<String> {
    match (base.filter(|b| !b.is_empty()), tail.filter(|t| !t.is_empty())) {
        (Some(base), Some(tail)) => Some(format!("{base}{PATH_SEPARATOR}{tail}")),
        (Some(base), None) => Some(base.to_string()),
        (None, Some(tail)) => Some(tail.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number_binding() -> ModelBinding {
        ModelBinding {
            path: "age".into(),
            value: None,
            immediate: false,
            number: true,
            min: Some(0.0),
            max: Some(120.0),
            precision: Some(1),
        }
    }

    #[test]
    fn test_parses_binding_and_defaults() {
        let props = json!({ "modelValue": { "path": "name", "value": "Ann", "immediate": true } });
        let spec = ModelSpec::from_props(props.as_object().unwrap()).unwrap();
        match spec {
            ModelSpec::Binding(binding) => {
                assert_eq!(binding.path, "name");
                assert_eq!(binding.value, Some(json!("Ann")));
                assert!(binding.immediate);
            }
            other => panic!("expected binding, got {other:?}"),
        }

        let props = json!({ "modelValue": { "name": "" } });
        assert_eq!(
            ModelSpec::from_props(props.as_object().unwrap()),
            Some(ModelSpec::Defaults(json!({ "name": "" })))
        );

        let props = json!({ "modelValue": "plain" });
        assert_eq!(ModelSpec::from_props(props.as_object().unwrap()), None);
    }

    #[test]
    fn test_number_coercion() {
        let binding = number_binding();
        assert_eq!(binding.coerce(json!("42")), Some(json!(42)));
        assert_eq!(binding.coerce(json!("-5")), Some(json!(0)));
        assert_eq!(binding.coerce(json!(500)), Some(json!(120)));
        assert_eq!(binding.coerce(json!(3.14159)), Some(json!(3.1)));
        assert_eq!(binding.coerce(json!("abc")), None);
        assert_eq!(binding.coerce(json!(null)), None);
    }

    #[test]
    fn test_zero_minimum_is_honoured() {
        let binding = ModelBinding {
            max: None,
            precision: None,
            ..number_binding()
        };
        assert_eq!(binding.coerce(json!(-3)), Some(json!(0)));
    }

    #[test]
    fn test_plain_binding_passes_through() {
        let binding = ModelBinding {
            number: false,
            ..number_binding()
        };
        assert_eq!(binding.coerce(json!("abc")), Some(json!("abc")));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path(Some("form"), Some("name")), Some("form.name".into()));
        assert_eq!(join_path(None, Some("name")), Some("name".into()));
        assert_eq!(join_path(Some("form"), None), Some("form".into()));
        assert_eq!(join_path(Some(""), Some("")), None);
    }
}
