//! # Structural descriptors
//!
//! A [`Descriptor`] is the declarative description of one node: its type,
//! attributes, children, directives, events, hooks, slots and model binding.
//!
//! ## Identity
//!
//! Every descriptor gets a [`DescriptorId`] when it is built. `Clone` keeps
//! the id, so a cloned descriptor shares its render cache entry;
//! [`Descriptor::fork`] allocates a fresh one.
//!
//! ## Building
//!
//! ```ignore
//! let form = Descriptor::new("form")
//!     .with_namespace("form")
//!     .with_prop("modelValue", json!({ "name": "" }))
//!     .with_child(
//!         Descriptor::new("input")
//!             .with_prop("modelValue", json!({ "path": "name" })),
//!     );
//! ```

use crate::context::{Key, RenderContext};
use crate::events::{EventBinding, Handler};
use crate::lifecycle::{HookArgs, HookFn, Lifecycle};
use crate::vdom::RenderNode;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DESCRIPTOR_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(u64);

impl DescriptorId {
    fn next() -> Self {
        Self(NEXT_DESCRIPTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// Render function of a functional component
pub type RenderFn = Rc<dyn Fn(&Map<String, Value>, &[RenderNode]) -> RenderNode>;

/// Functional component passed directly as a descriptor type
#[derive(Clone)]
pub struct FunctionComponent {
    name: String,
    render: RenderFn,
}

impl FunctionComponent {
    pub fn new(
        name: impl Into<String>,
        render: impl Fn(&Map<String, Value>, &[RenderNode]) -> RenderNode + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, props: &Map<String, Value>, children: &[RenderNode]) -> RenderNode {
        (self.render)(props, children)
    }

    pub fn ptr_eq(&self, other: &FunctionComponent) -> bool {
        Rc::ptr_eq(&self.render, &other.render)
    }
}

impl fmt::Debug for FunctionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionComponent({})", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum TypeSpec {
    /// Native tag or component name
    Name(String),
    Function(FunctionComponent),
    /// Inline component described by another descriptor
    Inline(Box<Descriptor>),
}

impl From<&str> for TypeSpec {
    fn from(name: &str) -> Self {
        TypeSpec::Name(name.to_string())
    }
}

impl From<String> for TypeSpec {
    fn from(name: String) -> Self {
        TypeSpec::Name(name)
    }
}

impl From<FunctionComponent> for TypeSpec {
    fn from(component: FunctionComponent) -> Self {
        TypeSpec::Function(component)
    }
}

impl From<Descriptor> for TypeSpec {
    fn from(descriptor: Descriptor) -> Self {
        TypeSpec::Inline(Box::new(descriptor))
    }
}

/// Callback producing children at resolution time
#[derive(Clone)]
pub struct ChildrenFn(Rc<dyn Fn(&RenderContext<'_>) -> Children>);

impl ChildrenFn {
    pub fn new(f: impl Fn(&RenderContext<'_>) -> Children + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, cx: &RenderContext<'_>) -> Children {
        (self.0)(cx)
    }
}

impl fmt::Debug for ChildrenFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChildrenFn")
    }
}

#[derive(Debug, Clone)]
pub enum Children {
    Text(String),
    One(Box<Descriptor>),
    Many(Vec<Descriptor>),
    Function(ChildrenFn),
    /// Already built render node, passed through untouched
    Node(RenderNode),
    /// Unsupported shape from loaded data; reported and omitted
    Invalid(Value),
}

impl Children {
    pub fn from_fn(f: impl Fn(&RenderContext<'_>) -> Children + 'static) -> Self {
        Children::Function(ChildrenFn::new(f))
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(text.to_string())
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(text)
    }
}

impl From<Descriptor> for Children {
    fn from(descriptor: Descriptor) -> Self {
        Children::One(Box::new(descriptor))
    }
}

impl From<Vec<Descriptor>> for Children {
    fn from(descriptors: Vec<Descriptor>) -> Self {
        Children::Many(descriptors)
    }
}

impl From<RenderNode> for Children {
    fn from(node: RenderNode) -> Self {
        Children::Node(node)
    }
}

#[derive(Debug, Clone)]
pub enum Slots {
    /// Default slot content given directly
    Default(Children),
    Named(IndexMap<String, Children>),
}

/// Lazily computed directive value
#[derive(Clone)]
pub struct Compute(Rc<dyn Fn() -> Value>);

impl Compute {
    pub fn new(f: impl Fn() -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for Compute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Compute")
    }
}

#[derive(Debug, Clone)]
pub enum DirectiveValue {
    Data(Value),
    Handler(Handler),
    Compute(Compute),
}

impl DirectiveValue {
    /// Current data value; handlers have none
    pub fn resolve(&self) -> Value {
        match self {
            DirectiveValue::Data(value) => value.clone(),
            DirectiveValue::Compute(compute) => compute.call(),
            DirectiveValue::Handler(_) => Value::Null,
        }
    }

    /// JavaScript-style truthiness of the resolved value
    pub fn is_truthy(&self) -> bool {
        match self {
            DirectiveValue::Handler(_) => true,
            other => truthy(&other.resolve()),
        }
    }

    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            DirectiveValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }
}

impl From<Value> for DirectiveValue {
    fn from(value: Value) -> Self {
        DirectiveValue::Data(value)
    }
}

impl From<bool> for DirectiveValue {
    fn from(value: bool) -> Self {
        DirectiveValue::Data(Value::Bool(value))
    }
}

impl From<Handler> for DirectiveValue {
    fn from(handler: Handler) -> Self {
        DirectiveValue::Handler(handler)
    }
}

impl From<Compute> for DirectiveValue {
    fn from(compute: Compute) -> Self {
        DirectiveValue::Compute(compute)
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `{value, arg, modifiers}` directive form
#[derive(Debug, Clone)]
pub struct DirectiveObject {
    pub value: DirectiveValue,
    pub arg: Option<String>,
    pub modifiers: Map<String, Value>,
}

impl DirectiveObject {
    pub fn new(value: impl Into<DirectiveValue>) -> Self {
        Self {
            value: value.into(),
            arg: None,
            modifiers: Map::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = Some(arg.into());
        self
    }

    pub fn with_modifier(mut self, name: impl Into<String>, value: Value) -> Self {
        self.modifiers.insert(name.into(), value);
        self
    }

    /// Read `{value, arg, modifiers}` out of a plain data object
    pub fn from_data(object: &Map<String, Value>) -> Self {
        let arg = match object.get("arg") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Self {
            value: DirectiveValue::Data(object.get("value").cloned().unwrap_or(Value::Null)),
            arg,
            modifiers: object
                .get("modifiers")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DirectiveSpec {
    Plain(DirectiveValue),
    Object(DirectiveObject),
    /// Several bindings of the same directive
    Many(Vec<DirectiveObject>),
}

impl DirectiveSpec {
    pub fn value(value: impl Into<DirectiveValue>) -> Self {
        DirectiveSpec::Plain(value.into())
    }

    pub fn handler(f: impl Fn(&crate::events::DomEvent) -> crate::rate_limit::HandlerResult + 'static) -> Self {
        DirectiveSpec::Plain(DirectiveValue::Handler(Handler::new(f)))
    }

    pub fn compute(f: impl Fn() -> Value + 'static) -> Self {
        DirectiveSpec::Plain(DirectiveValue::Compute(Compute::new(f)))
    }

    /// Accepted where an object form is required: the object form itself or a
    /// plain data object
    pub fn is_object_form(&self) -> bool {
        match self {
            DirectiveSpec::Object(_) => true,
            DirectiveSpec::Plain(DirectiveValue::Data(Value::Object(_))) => true,
            _ => false,
        }
    }
}

impl From<DirectiveObject> for DirectiveSpec {
    fn from(object: DirectiveObject) -> Self {
        DirectiveSpec::Object(object)
    }
}

/// `{key, value}` provision made available to descendants
#[derive(Debug, Clone, PartialEq)]
pub struct Provide {
    pub key: Key,
    pub value: Value,
}

/// Extra callable exposed on a wrapped instance
#[derive(Clone)]
pub struct MethodFn(Rc<dyn Fn(&[Value]) -> Value>);

impl MethodFn {
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl fmt::Debug for MethodFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MethodFn")
    }
}

#[derive(Debug, Clone)]
pub struct Descriptor {
    id: DescriptorId,
    pub ty: TypeSpec,
    pub name: Option<String>,
    pub key: Option<String>,
    /// Wrapped nodes get an instance with lifecycle and local state
    pub wrapper: bool,
    pub namespace: Option<Key>,
    pub inject: Option<Key>,
    pub provide: Option<Provide>,
    pub props: Map<String, Value>,
    pub children: Option<Children>,
    pub directives: IndexMap<String, DirectiveSpec>,
    pub events: IndexMap<String, EventBinding>,
    pub hooks: IndexMap<Lifecycle, HookFn>,
    /// Lifecycle callbacks given at the top level; `hooks` wins on conflict
    pub lifecycle: IndexMap<Lifecycle, HookFn>,
    pub slots: Option<Slots>,
    pub methods: IndexMap<String, MethodFn>,
}

impl Descriptor {
    pub fn new(ty: impl Into<TypeSpec>) -> Self {
        Self {
            id: DescriptorId::next(),
            ty: ty.into(),
            name: None,
            key: None,
            wrapper: true,
            namespace: None,
            inject: None,
            provide: None,
            props: Map::new(),
            children: None,
            directives: IndexMap::new(),
            events: IndexMap::new(),
            hooks: IndexMap::new(),
            lifecycle: IndexMap::new(),
            slots: None,
            methods: IndexMap::new(),
        }
    }

    pub fn id(&self) -> DescriptorId {
        self.id
    }

    /// Copy with a fresh identity
    pub fn fork(&self) -> Self {
        Self {
            id: DescriptorId::next(),
            ..self.clone()
        }
    }

    /// Name used in logs and diagnostics
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.ty {
            TypeSpec::Name(name) => name.clone(),
            TypeSpec::Function(component) => component.name().to_string(),
            TypeSpec::Inline(inner) => inner.display_name(),
        }
    }

    /// Shorthand and explicit hooks merged, explicit winning
    pub fn merged_hooks(&self) -> IndexMap<Lifecycle, HookFn> {
        let mut merged = self.lifecycle.clone();
        for (stage, hook) in &self.hooks {
            merged.insert(*stage, hook.clone());
        }
        merged
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Render without an instance
    pub fn pure(mut self) -> Self {
        self.wrapper = false;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<Key>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_inject(mut self, key: impl Into<Key>) -> Self {
        self.inject = Some(key.into());
        self
    }

    pub fn with_provide(mut self, key: impl Into<Key>, value: Value) -> Self {
        self.provide = Some(Provide {
            key: key.into(),
            value,
        });
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }

    pub fn with_children(mut self, children: impl Into<Children>) -> Self {
        self.children = Some(children.into());
        self
    }

    /// Append one child descriptor
    pub fn with_child(mut self, child: Descriptor) -> Self {
        self.children = Some(match self.children.take() {
            None => Children::One(Box::new(child)),
            Some(Children::One(first)) => Children::Many(vec![*first, child]),
            Some(Children::Many(mut list)) => {
                list.push(child);
                Children::Many(list)
            }
            Some(_) => Children::One(Box::new(child)),
        });
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_children(Children::Text(text.into()))
    }

    pub fn with_children_fn(self, f: impl Fn(&RenderContext<'_>) -> Children + 'static) -> Self {
        self.with_children(Children::from_fn(f))
    }

    pub fn with_directive(mut self, name: impl Into<String>, spec: impl Into<DirectiveSpec>) -> Self {
        self.directives.insert(name.into(), spec.into());
        self
    }

    pub fn on(mut self, key: impl Into<String>, binding: impl Into<EventBinding>) -> Self {
        self.events.insert(key.into(), binding.into());
        self
    }

    pub fn with_hook(mut self, stage: Lifecycle, f: impl Fn(&HookArgs<'_>) + 'static) -> Self {
        self.hooks.insert(stage, HookFn::new(f));
        self
    }

    /// Top-level lifecycle shorthand
    pub fn with_lifecycle(mut self, stage: Lifecycle, f: impl Fn(&HookArgs<'_>) + 'static) -> Self {
        self.lifecycle.insert(stage, HookFn::new(f));
        self
    }

    pub fn with_slot(mut self, name: impl Into<String>, content: impl Into<Children>) -> Self {
        let mut named = match self.slots.take() {
            Some(Slots::Named(named)) => named,
            Some(Slots::Default(children)) => {
                let mut named = IndexMap::new();
                named.insert("default".to_string(), children);
                named
            }
            None => IndexMap::new(),
        };
        named.insert(name.into(), content.into());
        self.slots = Some(Slots::Named(named));
        self
    }

    pub fn with_default_slot(mut self, content: impl Into<Children>) -> Self {
        self.slots = Some(Slots::Default(content.into()));
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        self.methods.insert(name.into(), MethodFn::new(f));
        self
    }
}

impl From<bool> for DirectiveSpec {
    fn from(value: bool) -> Self {
        DirectiveSpec::value(value)
    }
}

impl From<Value> for DirectiveSpec {
    fn from(value: Value) -> Self {
        DirectiveSpec::value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clone_keeps_identity_fork_does_not() {
        let original = Descriptor::new("div");
        let copy = original.clone();
        let forked = original.fork();

        assert_eq!(original.id(), copy.id());
        assert_ne!(original.id(), forked.id());
    }

    #[test]
    fn test_with_child_accumulates() {
        let list = Descriptor::new("ul")
            .with_child(Descriptor::new("li"))
            .with_child(Descriptor::new("li"))
            .with_child(Descriptor::new("li"));
        match list.children {
            Some(Children::Many(items)) => assert_eq!(items.len(), 3),
            other => panic!("expected many children, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_hooks_override_shorthand() {
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let (a, b) = (log.clone(), log.clone());
        let descriptor = Descriptor::new("div")
            .with_lifecycle(Lifecycle::Mounted, move |_| a.borrow_mut().push("shorthand"))
            .with_hook(Lifecycle::Mounted, move |_| b.borrow_mut().push("explicit"));

        let hooks = descriptor.merged_hooks();
        assert_eq!(hooks.len(), 1);
        let uid = crate::vdom::Uid::new("dc-test");
        hooks[&Lifecycle::Mounted].call(&HookArgs {
            uid: &uid,
            stage: Lifecycle::Mounted,
            error: None,
        });
        assert_eq!(*log.borrow(), vec!["explicit"]);
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!({})));
        assert!(DirectiveValue::from(Compute::new(|| json!(true))).is_truthy());
    }

    #[test]
    fn test_object_form_detection() {
        assert!(DirectiveSpec::from(DirectiveObject::new(json!(1))).is_object_form());
        assert!(DirectiveSpec::value(json!({ "value": 1 })).is_object_form());
        assert!(!DirectiveSpec::value(json!(200)).is_object_form());
        assert!(!DirectiveSpec::handler(|_| Ok(())).is_object_form());
    }

    #[test]
    fn test_directive_object_from_data() {
        let object = json!({ "value": "x", "arg": 500, "modifiers": { "leading": true } });
        let parsed = DirectiveObject::from_data(object.as_object().unwrap());
        assert_eq!(parsed.arg.as_deref(), Some("500"));
        assert_eq!(parsed.modifiers["leading"], json!(true));
        assert_eq!(parsed.value.resolve(), json!("x"));
    }
}
