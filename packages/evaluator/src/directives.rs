//! # Directive Normalizer
//!
//! Converts a descriptor's directive map into an ordered list of
//! [`DirectiveTuple`]s that the host applies to the element.
//!
//! ## Resolution order
//!
//! 1. built-in directives ([`crate::builtins`])
//! 2. the global directive registry
//! 3. the host's dynamic resolution
//!
//! Unresolved names and object-only directives given a non-object value are
//! skipped with a [`Diagnostic`]. The conditional gate (`dcIf`) and the lazy
//! directive (`dcLazy`) are consumed by the composer and never appear in the
//! output.

use crate::builtins;
use crate::descriptor::{DirectiveObject, DirectiveSpec, DirectiveValue};
use crate::error::Diagnostic;
use crate::host::{Host, HostElement};
use crate::registry;
use crate::vdom::Uid;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

pub const CONDITIONAL_DIRECTIVE: &str = "dcIf";
pub const LAZY_DIRECTIVE: &str = "dcLazy";
pub const SHOW_DIRECTIVE: &str = "dcShow";

/// Directives that only accept the `{value, arg, modifiers}` form
pub const OBJECT_ONLY_DIRECTIVES: [&str; 3] = ["dcDebounce", "dcThrottle", "dcPermission"];

/// Value, argument and modifiers handed to a directive implementation
#[derive(Debug, Clone)]
pub struct DirectiveBinding {
    pub name: String,
    pub value: DirectiveValue,
    pub arg: Option<String>,
    pub modifiers: Map<String, Value>,
}

impl DirectiveBinding {
    pub fn new(name: impl Into<String>, value: impl Into<DirectiveValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            arg: None,
            modifiers: Map::new(),
        }
    }

    fn from_object(name: &str, object: &DirectiveObject) -> Self {
        Self {
            name: name.to_string(),
            value: object.value.clone(),
            arg: object.arg.clone(),
            modifiers: object.modifiers.clone(),
        }
    }

    pub fn modifier(&self, name: &str) -> Option<&Value> {
        self.modifiers.get(name)
    }

    /// `arg` read as milliseconds, or `default`
    pub fn arg_millis(&self, default: u64) -> Duration {
        let ms = self
            .arg
            .as_deref()
            .and_then(|arg| arg.parse::<u64>().ok())
            .unwrap_or(default);
        Duration::from_millis(ms)
    }

    /// Stash key unique to this binding on its element
    pub fn stash_key(&self) -> String {
        match &self.arg {
            Some(arg) => format!("{}:{}", self.name, arg),
            None => self.name.clone(),
        }
    }
}

/// Behaviour attached to a rendered element. All hooks default to no-ops.
pub trait Directive {
    fn mounted(&self, _el: &Rc<dyn HostElement>, _binding: &DirectiveBinding, _host: &Rc<dyn Host>) {}

    /// Returning false vetoes the update of this element
    fn before_update(
        &self,
        _el: &Rc<dyn HostElement>,
        _binding: &DirectiveBinding,
        _host: &Rc<dyn Host>,
    ) -> bool {
        true
    }

    fn updated(&self, _el: &Rc<dyn HostElement>, _binding: &DirectiveBinding, _host: &Rc<dyn Host>) {}

    fn before_unmount(
        &self,
        _el: &Rc<dyn HostElement>,
        _binding: &DirectiveBinding,
        _host: &Rc<dyn Host>,
    ) {
    }
}

/// Resolved directive ready for the host
#[derive(Clone)]
pub struct DirectiveTuple {
    pub implementation: Rc<dyn Directive>,
    pub binding: DirectiveBinding,
}

impl fmt::Debug for DirectiveTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveTuple")
            .field("binding", &self.binding)
            .finish()
    }
}

pub fn resolve_directive(name: &str, host: &dyn Host) -> Option<Rc<dyn Directive>> {
    builtins::lookup(name)
        .or_else(|| registry::lookup_directive(name))
        .or_else(|| host.resolve_directive(name))
}

/// Evaluate the conditional gate. A missing gate renders.
pub fn evaluate_condition(spec: Option<&DirectiveSpec>) -> bool {
    match spec {
        None => true,
        Some(DirectiveSpec::Plain(DirectiveValue::Data(Value::Object(object)))) => {
            object.get("value").map_or(true, crate::descriptor::truthy)
        }
        Some(DirectiveSpec::Plain(value)) => value.is_truthy(),
        Some(DirectiveSpec::Object(object)) => object.value.is_truthy(),
        Some(DirectiveSpec::Many(objects)) => objects.iter().all(|o| o.value.is_truthy()),
    }
}

pub fn normalize_directives(
    directives: &IndexMap<String, DirectiveSpec>,
    host: &dyn Host,
    uid: Option<&Uid>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<DirectiveTuple> {
    let mut tuples = Vec::new();

    for (name, spec) in directives {
        if name == CONDITIONAL_DIRECTIVE || name == LAZY_DIRECTIVE {
            continue;
        }

        let Some(implementation) = resolve_directive(name, host) else {
            warn!(directive = %name, "Unresolved directive skipped");
            diagnostics.push(
                Diagnostic::warning(format!("Directive '{name}' could not be resolved")).with_uid(uid),
            );
            continue;
        };

        if OBJECT_ONLY_DIRECTIVES.contains(&name.as_str()) && !spec.is_object_form() {
            warn!(directive = %name, "Directive requires object form");
            diagnostics.push(
                Diagnostic::error(format!(
                    "Directive '{name}' must be given as an object with value, arg and modifiers"
                ))
                .with_uid(uid),
            );
            continue;
        }

        match spec {
            DirectiveSpec::Plain(DirectiveValue::Data(Value::Object(object))) => {
                let object = DirectiveObject::from_data(object);
                tuples.push(DirectiveTuple {
                    implementation,
                    binding: DirectiveBinding::from_object(name, &object),
                });
            }
            DirectiveSpec::Plain(value) => tuples.push(DirectiveTuple {
                implementation,
                binding: DirectiveBinding::new(name.as_str(), value.clone()),
            }),
            DirectiveSpec::Object(object) => tuples.push(DirectiveTuple {
                implementation,
                binding: DirectiveBinding::from_object(name, object),
            }),
            DirectiveSpec::Many(objects) => {
                for object in objects {
                    tuples.push(DirectiveTuple {
                        implementation: implementation.clone(),
                        binding: DirectiveBinding::from_object(name, object),
                    });
                }
            }
        }
    }

    debug!(count = tuples.len(), "Normalized directives");
    tuples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Compute;
    use crate::headless::HeadlessHost;
    use serde_json::json;

    struct Marker;
    impl Directive for Marker {}

    fn names(tuples: &[DirectiveTuple]) -> Vec<&str> {
        tuples.iter().map(|t| t.binding.name.as_str()).collect()
    }

    #[test]
    fn test_preserves_declaration_order_and_skips_gates() {
        let host = HeadlessHost::new();
        let mut directives = IndexMap::new();
        directives.insert("dcStyle".to_string(), DirectiveSpec::value(json!("red")));
        directives.insert("dcIf".to_string(), DirectiveSpec::value(true));
        directives.insert("dcShow".to_string(), DirectiveSpec::value(true));
        directives.insert("dcLazy".to_string(), DirectiveSpec::value(true));

        let mut diagnostics = Vec::new();
        let tuples = normalize_directives(&directives, &host, None, &mut diagnostics);
        assert_eq!(names(&tuples), vec!["dcStyle", "dcShow"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_array_expands_to_several_tuples() {
        let host = HeadlessHost::new();
        let mut directives = IndexMap::new();
        directives.insert(
            "dcStyle".to_string(),
            DirectiveSpec::Many(vec![
                DirectiveObject::new(json!("red")).with_arg("color"),
                DirectiveObject::new(json!("bold")).with_arg("font-weight"),
            ]),
        );

        let tuples = normalize_directives(&directives, &host, None, &mut Vec::new());
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[1].binding.arg.as_deref(), Some("font-weight"));
    }

    #[test]
    fn test_object_only_directive_rejects_plain_value() {
        let host = HeadlessHost::new();
        let mut directives = IndexMap::new();
        directives.insert("dcDebounce".to_string(), DirectiveSpec::handler(|_| Ok(())));
        directives.insert(
            "dcThrottle".to_string(),
            DirectiveSpec::from(DirectiveObject::new(DirectiveValue::Handler(
                crate::events::Handler::new(|_| Ok(())),
            ))),
        );

        let mut diagnostics = Vec::new();
        let tuples = normalize_directives(&directives, &host, None, &mut diagnostics);
        assert_eq!(names(&tuples), vec!["dcThrottle"]);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("dcDebounce"));
    }

    #[test]
    fn test_unresolved_directive_is_reported() {
        let host = HeadlessHost::new();
        let mut directives = IndexMap::new();
        directives.insert("dcMissing".to_string(), DirectiveSpec::value(true));

        let mut diagnostics = Vec::new();
        let uid = Uid::new("dc-9");
        assert!(normalize_directives(&directives, &host, Some(&uid), &mut diagnostics).is_empty());
        assert_eq!(diagnostics[0].uid, Some(uid));
    }

    #[test]
    fn test_host_directive_resolution() {
        let host = HeadlessHost::new();
        host.add_directive("tooltip", Rc::new(Marker));
        let mut directives = IndexMap::new();
        directives.insert("tooltip".to_string(), DirectiveSpec::value(json!("hi")));

        let tuples = normalize_directives(&directives, &host, None, &mut Vec::new());
        assert_eq!(names(&tuples), vec!["tooltip"]);
    }

    #[test]
    fn test_plain_object_reads_value_arg_modifiers() {
        let host = HeadlessHost::new();
        let mut directives = IndexMap::new();
        directives.insert(
            "dcPermission".to_string(),
            DirectiveSpec::value(json!({ "value": "admin", "arg": "role" })),
        );
        let tuples = normalize_directives(&directives, &host, None, &mut Vec::new());
        assert_eq!(tuples[0].binding.value.resolve(), json!("admin"));
        assert_eq!(tuples[0].binding.arg.as_deref(), Some("role"));
    }

    #[test]
    fn test_condition_evaluation() {
        assert!(evaluate_condition(None));
        assert!(!evaluate_condition(Some(&DirectiveSpec::value(false))));
        assert!(evaluate_condition(Some(&DirectiveSpec::value(json!(1)))));
        assert!(!evaluate_condition(Some(&DirectiveSpec::Plain(DirectiveValue::Compute(
            Compute::new(|| json!(false))
        )))));
        assert!(!evaluate_condition(Some(&DirectiveSpec::value(json!({ "value": false })))));
    }
}
