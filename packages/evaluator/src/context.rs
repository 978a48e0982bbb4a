//! Resolution context: provide/inject scope chain and the view handed to
//! render-time callbacks.
//!
//! A [`Scope`] is a persistent linked list of frames. Providing a value pushes
//! a frame and returns a new scope; the parent scope is untouched, so sibling
//! subtrees never see each other's provisions.

use crate::composer::Composer;
use crate::vdom::Uid;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// Unique, non-string key. Two symbols with the same description are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    id: u64,
    description: String,
}

impl Symbol {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// Provide/inject and namespace key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Symbol(Symbol),
}

impl Key {
    pub fn is_empty(&self) -> bool {
        matches!(self, Key::Name(name) if name.is_empty())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Symbol(symbol) => symbol.fmt(f),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Key::Symbol(symbol)
    }
}

thread_local! {
    static NAMESPACE_KEY: Key = Key::Symbol(Symbol::new("dc-namespace"));
}

/// Reserved key under which a namespaced node provides its base path
pub fn namespace_key() -> Key {
    NAMESPACE_KEY.with(|key| key.clone())
}

struct Frame {
    key: Key,
    value: Value,
    parent: Option<Rc<Frame>>,
}

#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Rc<Frame>>,
}

impl Scope {
    pub fn root() -> Self {
        Self::default()
    }

    /// New scope with `key` bound to `value`, shadowing outer bindings
    pub fn provide(&self, key: Key, value: Value) -> Scope {
        Scope {
            head: Some(Rc::new(Frame {
                key,
                value,
                parent: self.head.clone(),
            })),
        }
    }

    /// Nearest binding for `key`
    pub fn inject(&self, key: &Key) -> Option<Value> {
        let mut frame = self.head.as_deref();
        while let Some(current) = frame {
            if &current.key == key {
                return Some(current.value.clone());
            }
            frame = current.parent.as_deref();
        }
        None
    }

    /// Base path provided by the nearest namespaced ancestor
    pub fn namespace(&self) -> Option<String> {
        match self.inject(&namespace_key())? {
            Value::String(path) => Some(path),
            _ => None,
        }
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frame = self.head.as_deref();
        while let Some(current) = frame {
            depth += 1;
            frame = current.parent.as_deref();
        }
        depth
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("depth", &self.depth()).finish()
    }
}

/// Internal state threaded through tree resolution
#[derive(Clone, Debug, Default)]
pub(crate) struct ResolveCtx {
    pub scope: Scope,
    pub parent: Option<Uid>,
    pub depth: usize,
}

impl ResolveCtx {
    pub fn base_path(&self) -> Option<String> {
        self.scope.namespace()
    }

    pub fn child(&self, scope: Scope, parent: Option<Uid>) -> Self {
        Self {
            scope,
            parent: parent.or_else(|| self.parent.clone()),
            depth: self.depth + 1,
        }
    }
}

/// View passed to children and slot functions while they are evaluated
pub struct RenderContext<'a> {
    pub(crate) composer: &'a Composer,
    pub(crate) ctx: &'a ResolveCtx,
}

impl RenderContext<'_> {
    /// Base path of the nearest namespace, if any
    pub fn base_path(&self) -> Option<String> {
        self.ctx.base_path()
    }

    /// Instance that owns the children being produced
    pub fn owner(&self) -> Option<&Uid> {
        self.ctx.parent.as_ref()
    }

    pub fn inject(&self, key: &Key) -> Option<Value> {
        self.ctx.scope.inject(key)
    }

    /// Store value at `path`, relative to the current base path
    pub fn model(&self, path: &str) -> Option<Value> {
        let full = crate::model::join_path(self.base_path().as_deref(), Some(path));
        self.composer.store().value(&full?)
    }

    /// Nested object of every stored value under the current base path
    pub fn raw_model(&self) -> Value {
        self.composer.store().to_raw_object(self.base_path().as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inject_finds_nearest_provider() {
        let root = Scope::root().provide("theme".into(), json!("light"));
        let inner = root.provide("theme".into(), json!("dark"));

        assert_eq!(inner.inject(&"theme".into()), Some(json!("dark")));
        assert_eq!(root.inject(&"theme".into()), Some(json!("light")));
        assert_eq!(root.inject(&"missing".into()), None);
    }

    #[test]
    fn test_sibling_scopes_are_isolated() {
        let root = Scope::root();
        let left = root.provide("side".into(), json!("left"));
        let right = root.provide("side".into(), json!("right"));

        assert_eq!(left.inject(&"side".into()), Some(json!("left")));
        assert_eq!(right.inject(&"side".into()), Some(json!("right")));
        assert_eq!(root.depth(), 0);
    }

    #[test]
    fn test_symbols_with_same_description_differ() {
        let a = Symbol::new("token");
        let b = Symbol::new("token");
        assert_ne!(a, b);

        let scope = Scope::root().provide(a.clone().into(), json!(1));
        assert_eq!(scope.inject(&a.into()), Some(json!(1)));
        assert_eq!(scope.inject(&b.into()), None);
    }

    #[test]
    fn test_namespace_is_reserved_symbol() {
        let scope = Scope::root()
            .provide("dc-namespace".into(), json!("not-this"))
            .provide(namespace_key(), json!("form.user"));
        assert_eq!(scope.namespace(), Some("form.user".to_string()));
        assert_eq!(namespace_key().to_string(), "Symbol(dc-namespace)");
    }
}
