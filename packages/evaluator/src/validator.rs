//! Structural validation of descriptor trees
use crate::descriptor::{Children, Descriptor, Slots, TypeSpec};
use crate::directives::OBJECT_ONLY_DIRECTIVES;
use crate::error::{Diagnostic, ValidationError};
use crate::model::{ModelSpec, MODEL_PROP};
use crate::modifiers;
use std::collections::HashMap;

/// Check the fields of one descriptor that make it unrenderable.
///
/// Inline component types are checked recursively; children are not.
pub fn validate_descriptor(descriptor: &Descriptor) -> Result<(), ValidationError> {
    match &descriptor.ty {
        TypeSpec::Name(name) if name.trim().is_empty() => return Err(ValidationError::MissingType),
        TypeSpec::Inline(inner) => validate_descriptor(inner)?,
        _ => {}
    }

    if let Some(provide) = &descriptor.provide {
        if provide.key.is_empty() {
            return Err(ValidationError::InvalidProvideKey);
        }
    }
    if descriptor.inject.as_ref().map_or(false, |key| key.is_empty()) {
        return Err(ValidationError::InvalidField {
            field: "inject".to_string(),
            message: "key must not be empty".to_string(),
        });
    }
    if descriptor.namespace.as_ref().map_or(false, |key| key.is_empty()) {
        return Err(ValidationError::InvalidField {
            field: "namespace".to_string(),
            message: "namespace must not be empty".to_string(),
        });
    }

    if let Some(raw) = descriptor.props.get(MODEL_PROP) {
        let is_binding = raw.get("path").is_some();
        if !raw.is_object() || (is_binding && !matches!(ModelSpec::from_props(&descriptor.props), Some(ModelSpec::Binding(_)))) {
            return Err(ValidationError::InvalidField {
                field: MODEL_PROP.to_string(),
                message: "expected a defaults object or {path, value, ...} with a string path".to_string(),
            });
        }
    }

    for key in descriptor.events.keys() {
        modifiers::parse_event_key(key)?;
    }

    Ok(())
}

/// Deep validator collecting every problem in a tree
pub struct Validator {
    /// Collected diagnostics
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    /// Validate a descriptor and everything below it
    pub fn validate(&mut self, root: &Descriptor) -> Vec<Diagnostic> {
        self.diagnostics.clear();
        self.validate_node(root, &root.display_name());
        std::mem::take(&mut self.diagnostics)
    }

    fn validate_node(&mut self, descriptor: &Descriptor, trail: &str) {
        if let Err(err) = validate_descriptor(descriptor) {
            self.diagnostics
                .push(Diagnostic::error(format!("{trail}: {err}")));
        }

        for name in OBJECT_ONLY_DIRECTIVES {
            if let Some(spec) = descriptor.directives.get(name) {
                if !spec.is_object_form() {
                    self.diagnostics.push(Diagnostic::error(format!(
                        "{trail}: directive '{name}' must be given as an object with value, arg and modifiers"
                    )));
                }
            }
        }

        if let Some(children) = &descriptor.children {
            self.validate_children(children, trail);
        }
        match &descriptor.slots {
            Some(Slots::Default(children)) => self.validate_children(children, &format!("{trail}#default")),
            Some(Slots::Named(named)) => {
                for (name, children) in named {
                    self.validate_children(children, &format!("{trail}#{name}"));
                }
            }
            None => {}
        }
    }

    fn validate_children(&mut self, children: &Children, trail: &str) {
        match children {
            Children::One(child) => {
                self.validate_node(child, &format!("{trail} > {}", child.display_name()));
            }
            Children::Many(list) => {
                self.check_duplicate_keys(list, trail);
                for (index, child) in list.iter().enumerate() {
                    self.validate_node(
                        child,
                        &format!("{trail} > {}[{index}]", child.display_name()),
                    );
                }
            }
            Children::Invalid(value) => {
                self.diagnostics.push(Diagnostic::error(format!(
                    "{trail}: unsupported children value {value}"
                )));
            }
            // Produced at resolution time
            Children::Text(_) | Children::Function(_) | Children::Node(_) => {}
        }
    }

    /// Explicit sibling keys must be unique within one list
    fn check_duplicate_keys(&mut self, list: &[Descriptor], trail: &str) {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for child in list {
            let Some(key) = child.key.as_deref().or(child.name.as_deref()) else {
                continue;
            };
            let count = seen.entry(key).or_insert(0);
            *count += 1;
            if *count == 2 {
                self.diagnostics.push(Diagnostic::warning(format!(
                    "{trail}: duplicate sibling key '{key}'. Each item should have a unique key."
                )));
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Symbol;
    use crate::descriptor::DirectiveObject;
    use crate::error::DiagnosticLevel;
    use crate::events::EventBinding;
    use serde_json::json;

    #[test]
    fn test_validator_rejects_empty_type() {
        assert_eq!(
            validate_descriptor(&Descriptor::new("")),
            Err(ValidationError::MissingType)
        );
        assert_eq!(
            validate_descriptor(&Descriptor::new(Descriptor::new(" "))),
            Err(ValidationError::MissingType)
        );
    }

    #[test]
    fn test_validator_rejects_unknown_modifier() {
        let descriptor = Descriptor::new("button").on("click.sometimes", EventBinding::new(|_| Ok(())));
        assert!(matches!(
            validate_descriptor(&descriptor),
            Err(ValidationError::UnknownModifier { modifier, .. }) if modifier == "sometimes"
        ));
    }

    #[test]
    fn test_validator_checks_provide_key() {
        assert_eq!(
            validate_descriptor(&Descriptor::new("div").with_provide("", json!(1))),
            Err(ValidationError::InvalidProvideKey)
        );
        assert!(validate_descriptor(&Descriptor::new("div").with_provide(Symbol::new("theme"), json!(1))).is_ok());
    }

    #[test]
    fn test_validator_checks_model_shape() {
        let bad = Descriptor::new("input").with_prop("modelValue", json!({ "path": 3 }));
        assert!(matches!(
            validate_descriptor(&bad),
            Err(ValidationError::InvalidField { field, .. }) if field == "modelValue"
        ));
        let good = Descriptor::new("input").with_prop("modelValue", json!({ "path": "name" }));
        assert!(validate_descriptor(&good).is_ok());
    }

    #[test]
    fn test_validator_collects_deep_problems() {
        let tree = Descriptor::new("ul")
            .with_child(Descriptor::new("li").with_key("a"))
            .with_child(Descriptor::new("li").with_key("a"))
            .with_child(
                Descriptor::new("li")
                    .with_directive("dcThrottle", json!(200))
                    .with_child(Descriptor::new("")),
            );

        let diagnostics = Validator::new().validate(&tree);
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics
            .iter()
            .any(|d| d.level == DiagnosticLevel::Warning && d.message.contains("duplicate sibling key 'a'")));
        assert!(diagnostics.iter().any(|d| d.message.contains("dcThrottle")));
        assert!(diagnostics.iter().any(|d| d.message.contains("ul > li[2] > ")));
    }

    #[test]
    fn test_validator_accepts_object_form() {
        let tree = Descriptor::new("button").with_directive(
            "dcDebounce",
            DirectiveObject::new(crate::events::Handler::new(|_| Ok(()))).with_arg("200"),
        );
        assert!(Validator::new().validate(&tree).is_empty());
    }
}
