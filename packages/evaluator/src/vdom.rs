//! Render nodes produced by the composer.
//!
//! The node shape is what the host reconciler consumes. Callbacks
//! (listeners, directive implementations, function components) serialize by
//! name only.

use crate::descriptor::{Descriptor, FunctionComponent};
use crate::directives::DirectiveTuple;
use crate::events::NormalizedHandler;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Stable per-instance identifier, also published as the `data-uid` attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uid {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

pub const UID_ATTR: &str = "data-uid";

/// Component resolved by the host or the global registry. The handle is
/// opaque to the core.
#[derive(Clone)]
pub struct ComponentRef {
    name: String,
    handle: Option<Rc<dyn Any>>,
}

impl ComponentRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: None,
        }
    }

    pub fn with_handle(name: impl Into<String>, handle: Rc<dyn Any>) -> Self {
        Self {
            name: name.into(),
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle<T: 'static>(&self) -> Option<&T> {
        self.handle.as_ref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentRef({})", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum ResolvedType {
    Native(String),
    Component(ComponentRef),
    Function(FunctionComponent),
    Inline(Box<Descriptor>),
}

impl ResolvedType {
    pub fn name(&self) -> String {
        match self {
            ResolvedType::Native(tag) => tag.clone(),
            ResolvedType::Component(component) => component.name().to_string(),
            ResolvedType::Function(component) => component.name().to_string(),
            ResolvedType::Inline(descriptor) => descriptor.display_name(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, ResolvedType::Native(_))
    }
}

impl Serialize for ResolvedType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ElementNode {
    #[serde(rename = "type")]
    pub ty: ResolvedType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,
    pub attrs: Map<String, Value>,
    #[serde(serialize_with = "listener_keys", skip_serializing_if = "IndexMap::is_empty")]
    pub listeners: IndexMap<String, NormalizedHandler>,
    #[serde(serialize_with = "directive_summaries", skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<DirectiveTuple>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderNode>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub slots: IndexMap<String, Vec<RenderNode>>,
}

impl ElementNode {
    pub fn new(ty: ResolvedType) -> Self {
        Self {
            ty,
            key: None,
            uid: None,
            attrs: Map::new(),
            listeners: IndexMap::new(),
            directives: Vec::new(),
            children: Vec::new(),
            slots: IndexMap::new(),
        }
    }

    pub fn listener(&self, key: &str) -> Option<&NormalizedHandler> {
        self.listeners.get(key)
    }

    pub fn directive(&self, name: &str) -> Option<&DirectiveTuple> {
        self.directives.iter().find(|tuple| tuple.binding.name == name)
    }
}

/// Node tree handed to the host
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RenderNode {
    Element(ElementNode),
    Text {
        content: String,
    },
    Fragment {
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        children: Vec<RenderNode>,
    },
    /// Nothing rendered. A wrapped instance that renders nothing keeps its uid
    /// here so the host can find it again.
    Empty {
        #[serde(skip_serializing_if = "Option::is_none")]
        uid: Option<Uid>,
    },
}

impl RenderNode {
    pub fn element(ty: ResolvedType) -> Self {
        RenderNode::Element(ElementNode::new(ty))
    }

    pub fn native(tag: impl Into<String>) -> Self {
        Self::element(ResolvedType::Native(tag.into()))
    }

    pub fn text(content: impl Into<String>) -> Self {
        RenderNode::Text {
            content: content.into(),
        }
    }

    pub fn fragment(key: Option<String>, children: Vec<RenderNode>) -> Self {
        RenderNode::Fragment { key, children }
    }

    pub fn empty() -> Self {
        RenderNode::Empty { uid: None }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        if let RenderNode::Element(ref mut element) = self {
            element.attrs.insert(key.into(), value);
        }
        self
    }

    pub fn with_child(mut self, child: RenderNode) -> Self {
        if let RenderNode::Element(ref mut element) = self {
            element.children.push(child);
        }
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        match self {
            RenderNode::Element(ref mut element) => element.key = Some(key.into()),
            RenderNode::Fragment {
                key: ref mut fragment_key,
                ..
            } => *fragment_key = Some(key.into()),
            _ => {}
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RenderNode::Empty { .. })
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            RenderNode::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Uid of the instance behind this node, if any
    pub fn uid(&self) -> Option<&Uid> {
        match self {
            RenderNode::Element(element) => element.uid.as_ref(),
            RenderNode::Empty { uid } => uid.as_ref(),
            _ => None,
        }
    }

    /// Direct child nodes, including slot content
    pub fn children(&self) -> Vec<&RenderNode> {
        match self {
            RenderNode::Element(element) => element
                .children
                .iter()
                .chain(element.slots.values().flatten())
                .collect(),
            RenderNode::Fragment { children, .. } => children.iter().collect(),
            _ => Vec::new(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut RenderNode> {
        match self {
            RenderNode::Element(element) => element
                .children
                .iter_mut()
                .chain(element.slots.values_mut().flatten())
                .collect(),
            RenderNode::Fragment { children, .. } => children.iter_mut().collect(),
            _ => Vec::new(),
        }
    }

    /// Depth-first search for the node of an instance
    pub fn find(&self, uid: &Uid) -> Option<&RenderNode> {
        if self.uid() == Some(uid) {
            return Some(self);
        }
        self.children().into_iter().find_map(|child| child.find(uid))
    }

    pub fn find_mut(&mut self, uid: &Uid) -> Option<&mut RenderNode> {
        if self.uid() == Some(uid) {
            return Some(self);
        }
        self.children_mut()
            .into_iter()
            .find_map(|child| child.find_mut(uid))
    }

    /// Every instance uid in the subtree, in pre-order
    pub fn uids(&self) -> Vec<Uid> {
        let mut out = Vec::new();
        self.collect_uids(&mut out);
        out
    }

    fn collect_uids(&self, out: &mut Vec<Uid>) {
        if let Some(uid) = self.uid() {
            out.push(uid.clone());
        }
        for child in self.children() {
            child.collect_uids(out);
        }
    }

    /// Concatenated text content of the subtree
    pub fn text_content(&self) -> String {
        match self {
            RenderNode::Text { content } => content.clone(),
            other => other
                .children()
                .into_iter()
                .map(RenderNode::text_content)
                .collect(),
        }
    }
}

fn listener_keys<S: Serializer>(
    listeners: &IndexMap<String, NormalizedHandler>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(listeners.len()))?;
    for key in listeners.keys() {
        seq.serialize_element(key)?;
    }
    seq.end()
}

fn directive_summaries<S: Serializer>(
    directives: &[DirectiveTuple],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(directives.len()))?;
    for tuple in directives {
        seq.serialize_element(&DirectiveSummary(tuple))?;
    }
    seq.end()
}

struct DirectiveSummary<'a>(&'a DirectiveTuple);

impl Serialize for DirectiveSummary<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let binding = &self.0.binding;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &binding.name)?;
        if binding.value.as_handler().is_none() {
            map.serialize_entry("value", &binding.value.resolve())?;
        }
        if let Some(arg) = &binding.arg {
            map.serialize_entry("arg", arg)?;
        }
        if !binding.modifiers.is_empty() {
            map.serialize_entry("modifiers", &binding.modifiers)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_by_uid_through_slots_and_fragments() {
        let mut slot_owner = ElementNode::new(ResolvedType::Native("div".into()));
        let mut inner = ElementNode::new(ResolvedType::Native("span".into()));
        inner.uid = Some(Uid::new("dc-2"));
        slot_owner
            .slots
            .insert("footer".into(), vec![RenderNode::fragment(None, vec![RenderNode::Element(inner)])]);
        slot_owner.uid = Some(Uid::new("dc-1"));
        let tree = RenderNode::Element(slot_owner);

        assert!(tree.find(&Uid::new("dc-2")).is_some());
        assert_eq!(tree.uids(), vec![Uid::new("dc-1"), Uid::new("dc-2")]);
    }

    #[test]
    fn test_serializes_shape() {
        let node = RenderNode::native("p")
            .with_attr("class", json!("lead"))
            .with_child(RenderNode::text("hello"))
            .with_key("intro");
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "element",
                "type": "p",
                "key": "intro",
                "attrs": { "class": "lead" },
                "children": [{ "kind": "text", "content": "hello" }]
            })
        );
        assert_eq!(serde_json::to_value(RenderNode::empty()).unwrap(), json!({ "kind": "empty" }));
    }

    #[test]
    fn test_text_content() {
        let node = RenderNode::native("div")
            .with_child(RenderNode::text("a"))
            .with_child(RenderNode::fragment(None, vec![RenderNode::text("b")]));
        assert_eq!(node.text_content(), "ab");
    }

    #[test]
    fn test_component_handle_downcast() {
        let component = ComponentRef::with_handle("Card", Rc::new(42u32));
        assert_eq!(component.handle::<u32>(), Some(&42));
        assert_eq!(component.handle::<String>(), None);
    }
}
