//! Render cache keyed by descriptor identity plus a content fingerprint.
//!
//! The fingerprint is a shallow CRC32 over the data parts of a descriptor and
//! the position it is rendered at. Mutating a descriptor in place after it
//! was cached changes the fingerprint, so the stale node is missed rather than
//! returned. Descriptors that produce children or directive values at
//! resolution time are never cached.

use crate::descriptor::{Children, Descriptor, DescriptorId, DirectiveSpec, DirectiveValue, Slots, TypeSpec};
use crate::vdom::RenderNode;
use crc32fast::Hasher;
use dcstruct_store::LruCache;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub id: DescriptorId,
    pub fingerprint: u32,
}

/// Where a descriptor is rendered, folded into its fingerprint
#[derive(Debug, Default)]
pub struct Position<'a> {
    pub parent: Option<&'a str>,
    pub slot: Option<&'a str>,
    pub base_path: Option<&'a str>,
    /// Current store value behind the descriptor's model binding
    pub model: Option<&'a Value>,
}

impl CacheKey {
    pub fn for_descriptor(descriptor: &Descriptor, position: &Position<'_>) -> Self {
        let mut hasher = Hasher::new();
        hash_descriptor(&mut hasher, descriptor);
        for part in [position.parent, position.slot, position.base_path] {
            hash_str(&mut hasher, part.unwrap_or(""));
        }
        if let Some(model) = position.model {
            hash_value(&mut hasher, model);
        }
        Self {
            id: descriptor.id(),
            fingerprint: hasher.finalize(),
        }
    }
}

fn hash_str(hasher: &mut Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_value(hasher: &mut Hasher, value: &Value) {
    hash_str(hasher, &value.to_string());
}

fn hash_descriptor(hasher: &mut Hasher, descriptor: &Descriptor) {
    match &descriptor.ty {
        TypeSpec::Name(name) => hash_str(hasher, name),
        TypeSpec::Function(component) => hash_str(hasher, component.name()),
        TypeSpec::Inline(inner) => hasher.update(&inner.id().as_u64().to_le_bytes()),
    }
    hash_str(hasher, descriptor.name.as_deref().unwrap_or(""));
    hash_str(hasher, descriptor.key.as_deref().unwrap_or(""));
    hasher.update(&[u8::from(descriptor.wrapper)]);
    if let Some(namespace) = &descriptor.namespace {
        hash_str(hasher, &namespace.to_string());
    }
    if let Some(provide) = &descriptor.provide {
        hash_str(hasher, &provide.key.to_string());
        hash_value(hasher, &provide.value);
    }
    for (name, value) in &descriptor.props {
        hash_str(hasher, name);
        hash_value(hasher, value);
    }
    for (name, spec) in &descriptor.directives {
        hash_str(hasher, name);
        match spec {
            DirectiveSpec::Plain(DirectiveValue::Data(value)) => hash_value(hasher, value),
            DirectiveSpec::Object(object) => hash_value(hasher, &object.value.resolve()),
            DirectiveSpec::Many(objects) => {
                for object in objects {
                    hash_value(hasher, &object.value.resolve());
                }
            }
            DirectiveSpec::Plain(_) => {}
        }
    }
    for key in descriptor.events.keys() {
        hash_str(hasher, key);
    }
    if let Some(children) = &descriptor.children {
        hash_children(hasher, children);
    }
    match &descriptor.slots {
        Some(Slots::Default(children)) => hash_children(hasher, children),
        Some(Slots::Named(named)) => {
            for (name, children) in named {
                hash_str(hasher, name);
                hash_children(hasher, children);
            }
        }
        None => {}
    }
}

fn hash_children(hasher: &mut Hasher, children: &Children) {
    match children {
        Children::Text(text) => hash_str(hasher, text),
        Children::One(child) => hasher.update(&child.id().as_u64().to_le_bytes()),
        Children::Many(list) => {
            hasher.update(&(list.len() as u64).to_le_bytes());
            for child in list {
                hasher.update(&child.id().as_u64().to_le_bytes());
            }
        }
        Children::Invalid(value) => hash_value(hasher, value),
        Children::Function(_) | Children::Node(_) => {}
    }
}

/// Whether a descriptor's output depends only on its data
pub fn is_cacheable(descriptor: &Descriptor) -> bool {
    let dynamic_children = |children: &Children| matches!(children, Children::Function(_));
    if descriptor.children.as_ref().map_or(false, dynamic_children) {
        return false;
    }
    let dynamic_slots = match &descriptor.slots {
        Some(Slots::Default(children)) => dynamic_children(children),
        Some(Slots::Named(named)) => named.values().any(dynamic_children),
        None => false,
    };
    if dynamic_slots {
        return false;
    }
    !descriptor.directives.values().any(|spec| match spec {
        DirectiveSpec::Plain(value) => matches!(value, DirectiveValue::Compute(_)),
        DirectiveSpec::Object(object) => matches!(object.value, DirectiveValue::Compute(_)),
        DirectiveSpec::Many(objects) => objects
            .iter()
            .any(|object| matches!(object.value, DirectiveValue::Compute(_))),
    })
}

/// Shared handle over a bounded LRU of rendered nodes
#[derive(Debug, Clone)]
pub struct RenderCache {
    inner: Rc<RefCell<LruCache<CacheKey, RenderNode>>>,
}

impl RenderCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(LruCache::with_capacity(capacity))),
        }
    }

    /// Cached node, refreshing its recency
    pub fn get(&self, key: &CacheKey) -> Option<RenderNode> {
        self.inner.borrow_mut().get(key).cloned()
    }

    pub fn peek(&self, key: &CacheKey) -> Option<RenderNode> {
        self.inner.borrow().peek(key).cloned()
    }

    pub fn set(&self, key: CacheKey, node: RenderNode) {
        if let Some((evicted, _)) = self.inner.borrow_mut().set(key, node) {
            debug!(descriptor = %evicted.id, "Render cache evicted entry");
        }
    }

    pub fn has(&self, key: &CacheKey) -> bool {
        self.inner.borrow().has(key)
    }

    pub fn remove(&self, key: &CacheKey) -> Option<RenderNode> {
        self.inner.borrow_mut().remove(key)
    }

    /// Drop every entry of a descriptor, whatever its fingerprint.
    /// Returns the number of entries removed.
    pub fn remove_descriptor(&self, id: DescriptorId) -> usize {
        let mut inner = self.inner.borrow_mut();
        let keys: Vec<CacheKey> = inner.keys().filter(|key| key.id == id).copied().collect();
        for key in &keys {
            inner.remove(key);
        }
        keys.len()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.borrow().capacity()
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(dcstruct_store::DEFAULT_CAPACITY)
    }
}

thread_local! {
    static SHARED: RenderCache = RenderCache::default();
}

/// This thread's shared render cache
pub fn shared() -> RenderCache {
    SHARED.with(|cache| cache.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(descriptor: &Descriptor) -> CacheKey {
        CacheKey::for_descriptor(descriptor, &Position::default())
    }

    #[test]
    fn test_clone_hits_mutation_misses() {
        let descriptor = Descriptor::new("div").with_prop("title", json!("a"));
        let cache = RenderCache::new(10);
        cache.set(key(&descriptor), RenderNode::native("div"));

        assert!(cache.has(&key(&descriptor.clone())));

        let mut mutated = descriptor.clone();
        mutated.props.insert("title".into(), json!("b"));
        assert!(!cache.has(&key(&mutated)));
        assert!(!cache.has(&key(&descriptor.fork())));
    }

    #[test]
    fn test_position_is_part_of_the_key() {
        let descriptor = Descriptor::new("li");
        let first = CacheKey::for_descriptor(
            &descriptor,
            &Position {
                slot: Some("0"),
                ..Position::default()
            },
        );
        let second = CacheKey::for_descriptor(
            &descriptor,
            &Position {
                slot: Some("1"),
                ..Position::default()
            },
        );
        assert_eq!(first.id, second.id);
        assert_ne!(first, second);
    }

    #[test]
    fn test_lru_eviction_respects_recent_reads() {
        let cache = RenderCache::new(2);
        let (a, b, c) = (Descriptor::new("a"), Descriptor::new("b"), Descriptor::new("p"));
        cache.set(key(&a), RenderNode::native("a"));
        cache.set(key(&b), RenderNode::native("b"));
        assert!(cache.get(&key(&a)).is_some());

        cache.set(key(&c), RenderNode::native("p"));
        assert!(cache.has(&key(&a)));
        assert!(!cache.has(&key(&b)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_remove_descriptor_drops_all_fingerprints() {
        let cache = RenderCache::new(10);
        let mut descriptor = Descriptor::new("div");
        cache.set(key(&descriptor), RenderNode::native("div"));
        descriptor.props.insert("x".into(), json!(1));
        cache.set(key(&descriptor), RenderNode::native("div"));

        assert_eq!(cache.remove_descriptor(descriptor.id()), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_dynamic_descriptors_are_not_cacheable() {
        assert!(is_cacheable(&Descriptor::new("div").with_text("static")));
        assert!(!is_cacheable(
            &Descriptor::new("div").with_children_fn(|_| Children::Text("now".into()))
        ));
        assert!(!is_cacheable(
            &Descriptor::new("div").with_directive("dcShow", DirectiveSpec::compute(|| json!(true)))
        ));
    }
}
