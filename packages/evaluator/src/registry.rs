//! Global component and directive registries.
//!
//! Registration must happen before the first resolution that needs it. While
//! a tree is being resolved ([`ResolutionGuard`] is held) the registries are
//! read-only and registering fails with [`RegistryError::Busy`].

use crate::directives::Directive;
use crate::error::RegistryError;
use crate::vdom::ComponentRef;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

thread_local! {
    static RESOLVING: Cell<usize> = const { Cell::new(0) };
    static COMPONENTS: Registry<ComponentRef> = Registry::new("component");
    static DIRECTIVES: Registry<Rc<dyn Directive>> = Registry::new("directive");
}

/// Held for the duration of a top-level resolution
pub struct ResolutionGuard {
    _private: (),
}

impl ResolutionGuard {
    pub fn enter() -> Self {
        RESOLVING.with(|count| count.set(count.get() + 1));
        Self { _private: () }
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|count| count.set(count.get().saturating_sub(1)));
    }
}

pub fn is_resolving() -> bool {
    RESOLVING.with(|count| count.get() > 0)
}

/// Name → item map with the register-before-use rule
pub struct Registry<T: Clone> {
    kind: &'static str,
    entries: RefCell<IndexMap<String, T>>,
}

impl<T: Clone> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RefCell::new(IndexMap::new()),
        }
    }

    /// Add or replace an entry, returning the previous one
    pub fn register(&self, name: &str, item: T) -> Result<Option<T>, RegistryError> {
        self.check_writable(name)?;
        debug!(kind = self.kind, name, "Registered");
        Ok(self.entries.borrow_mut().insert(name.to_string(), item))
    }

    pub fn unregister(&self, name: &str) -> Result<Option<T>, RegistryError> {
        self.check_writable(name)?;
        Ok(self.entries.borrow_mut().shift_remove(name))
    }

    pub fn get(&self, name: &str) -> Option<T> {
        self.entries.borrow().get(name).cloned()
    }

    /// Exact name, then camelCase, then PascalCase
    pub fn lookup(&self, name: &str) -> Option<T> {
        name_variants(name)
            .into_iter()
            .find_map(|variant| self.get(&variant))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn check_writable(&self, name: &str) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName { kind: self.kind });
        }
        if is_resolving() {
            return Err(RegistryError::Busy {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

pub fn register_component(name: &str, component: ComponentRef) -> Result<(), RegistryError> {
    COMPONENTS.with(|registry| registry.register(name, component).map(|_| ()))
}

pub fn unregister_component(name: &str) -> Result<Option<ComponentRef>, RegistryError> {
    COMPONENTS.with(|registry| registry.unregister(name))
}

pub fn lookup_component(name: &str) -> Option<ComponentRef> {
    COMPONENTS.with(|registry| registry.lookup(name))
}

pub fn register_directive(name: &str, directive: Rc<dyn Directive>) -> Result<(), RegistryError> {
    DIRECTIVES.with(|registry| registry.register(name, directive).map(|_| ()))
}

pub fn unregister_directive(name: &str) -> Result<Option<Rc<dyn Directive>>, RegistryError> {
    DIRECTIVES.with(|registry| registry.unregister(name))
}

pub fn lookup_directive(name: &str) -> Option<Rc<dyn Directive>> {
    DIRECTIVES.with(|registry| registry.lookup(name))
}

/// `my-card` → `myCard`
pub fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' || c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn name_variants(name: &str) -> Vec<String> {
    let camel = camelize(name);
    let pascal = capitalize(&camel);
    let mut variants = vec![name.to_string()];
    for variant in [camel, pascal] {
        if !variants.contains(&variant) {
            variants.push(variant);
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_tries_case_variants() {
        let registry = Registry::new("component");
        registry.register("MyCard", 1).unwrap();

        assert_eq!(registry.lookup("my-card"), Some(1));
        assert_eq!(registry.lookup("myCard"), Some(1));
        assert_eq!(registry.lookup("MyCard"), Some(1));
        assert_eq!(registry.lookup("card"), None);
    }

    #[test]
    fn test_register_while_resolving_is_refused() {
        let registry = Registry::new("directive");
        {
            let _guard = ResolutionGuard::enter();
            assert!(is_resolving());
            assert_eq!(
                registry.register("late", 1),
                Err(RegistryError::Busy {
                    kind: "directive",
                    name: "late".into()
                })
            );
        }
        assert!(!is_resolving());
        assert_eq!(registry.register("late", 1), Ok(None));
        assert_eq!(registry.register("late", 2), Ok(Some(1)));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let registry: Registry<u8> = Registry::new("component");
        assert_eq!(
            registry.register("", 1),
            Err(RegistryError::EmptyName { kind: "component" })
        );
    }

    #[test]
    fn test_global_component_registry() {
        register_component("global-test-card", ComponentRef::new("GlobalTestCard")).unwrap();
        assert_eq!(
            lookup_component("global-test-card").map(|c| c.name().to_string()),
            Some("GlobalTestCard".to_string())
        );
        unregister_component("global-test-card").unwrap();
        assert!(lookup_component("global-test-card").is_none());
    }

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("my-fancy-card"), "myFancyCard");
        assert_eq!(camelize("plain"), "plain");
        assert_eq!(capitalize("myCard"), "MyCard");
    }
}
