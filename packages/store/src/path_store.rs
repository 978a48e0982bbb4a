//! # Path Store
//!
//! Flat map from dotted path strings to namespace roots or observable cells.
//!
//! ## Entries
//!
//! - A **root** is a plain JSON object stored verbatim under a namespace key.
//!   It holds default values for the paths below it.
//! - A **cell** is a [`ModelCell`] bound to a single path such as
//!   `form.user.name`.
//!
//! ## Seeding rules for `set`
//!
//! 1. Plain object value: stored verbatim as a root.
//! 2. Path without a separator: a fresh cell.
//! 3. Dotted path with an existing cell: the cell is written in place, so every
//!    holder of the cell keeps seeing the same identity.
//! 4. Dotted path, nil value: the cell is seeded from the parent root's
//!    matching field.
//! 5. Otherwise: a fresh cell holding the value.
//!
//! An explicit value always wins unless it is nil.
//!
//! ## Re-entrancy
//!
//! The store is a cheap handle over shared state. No borrow is held while a
//! cell notifies its subscribers, and [`PathStore::to_raw_object`] works on a
//! snapshot, so a subscriber may call back into the store.

use crate::cell::ModelCell;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, warn};

pub const PATH_SEPARATOR: char = '.';

/// Value stored under a path
#[derive(Debug, Clone)]
pub enum StoreEntry {
    /// Namespace root holding default values
    Root(Value),
    /// Observable cell bound to a path
    Cell(ModelCell),
}

impl StoreEntry {
    /// Current contents, with cells unwrapped
    pub fn current(&self) -> Value {
        match self {
            StoreEntry::Root(value) => value.clone(),
            StoreEntry::Cell(cell) => cell.get(),
        }
    }

    pub fn as_cell(&self) -> Option<&ModelCell> {
        match self {
            StoreEntry::Cell(cell) => Some(cell),
            StoreEntry::Root(_) => None,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, StoreEntry::Root(_))
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: IndexMap<String, StoreEntry>,
    bindings: HashMap<String, usize>,
}

/// Handle over a path-addressed model store
#[derive(Debug, Clone, Default)]
pub struct PathStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry at `path`, if any
    pub fn get(&self, path: &str) -> Option<StoreEntry> {
        self.inner.borrow().entries.get(path).cloned()
    }

    /// Entry at `path`, or `default` when unbound
    pub fn get_or(&self, path: &str, default: StoreEntry) -> StoreEntry {
        self.get(path).unwrap_or(default)
    }

    /// Cell at `path`, if the entry exists and is a cell
    pub fn cell(&self, path: &str) -> Option<ModelCell> {
        self.get(path).and_then(|entry| entry.as_cell().cloned())
    }

    /// Current value at `path` with cells unwrapped
    pub fn value(&self, path: &str) -> Option<Value> {
        self.get(path).map(|entry| entry.current())
    }

    /// Store a value at `path`, following the seeding rules in the module docs
    pub fn set(&self, path: &str, value: Option<Value>) {
        let value = value.filter(|v| !v.is_null());

        if let Some(object @ Value::Object(_)) = value {
            debug!(path, "Storing namespace root");
            self.inner
                .borrow_mut()
                .entries
                .insert(path.to_string(), StoreEntry::Root(object));
            return;
        }

        let Some((parent_path, field)) = path.rsplit_once(PATH_SEPARATOR) else {
            self.inner.borrow_mut().entries.insert(
                path.to_string(),
                StoreEntry::Cell(ModelCell::new(value.unwrap_or(Value::Null))),
            );
            return;
        };

        let (existing, parent_default) = {
            let inner = self.inner.borrow();
            let existing = inner.entries.get(path).and_then(|e| e.as_cell().cloned());
            let parent_default = match inner.entries.get(parent_path) {
                Some(StoreEntry::Root(Value::Object(fields))) => {
                    fields.get(field).filter(|v| !v.is_null()).cloned()
                }
                _ => None,
            };
            (existing, parent_default)
        };

        match (existing, value, parent_default) {
            (Some(cell), Some(value), default) => {
                if let Some(default) = default.filter(|d| *d != value) {
                    warn!(
                        path,
                        explicit = %value,
                        parent_default = %default,
                        "Existing cell receives an explicit value that disagrees with its parent default"
                    );
                }
                cell.set(value);
            }
            (Some(cell), None, Some(default)) => cell.set(default),
            (Some(_), None, None) => {
                debug!(path, "Nil write to an existing cell ignored");
            }
            (None, None, Some(default)) => {
                debug!(path, parent = parent_path, "Seeding cell from parent root");
                self.insert_cell(path, default);
            }
            (None, value, _) => self.insert_cell(path, value.unwrap_or(Value::Null)),
        }
    }

    fn insert_cell(&self, path: &str, value: Value) {
        self.inner
            .borrow_mut()
            .entries
            .insert(path.to_string(), StoreEntry::Cell(ModelCell::new(value)));
    }

    /// Write to an existing cell. Unbound paths and roots are left alone.
    pub fn update(&self, path: &str, value: Value) -> bool {
        match self.cell(path) {
            Some(cell) => {
                cell.set(value);
                true
            }
            None => false,
        }
    }

    pub fn has(&self, path: &str) -> bool {
        self.inner.borrow().entries.contains_key(path)
    }

    pub fn remove(&self, path: &str) -> Option<StoreEntry> {
        let mut inner = self.inner.borrow_mut();
        inner.bindings.remove(path);
        inner.entries.shift_remove(path)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.entries.clear();
        inner.bindings.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().entries.keys().cloned().collect()
    }

    /// Register one more owner of `path`, returning the new count
    pub fn bind(&self, path: &str) -> usize {
        let mut inner = self.inner.borrow_mut();
        let count = inner.bindings.entry(path.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop one owner of `path`. The entry is destroyed with its last owner.
    ///
    /// Returns true when the entry was removed. Releasing a path with no
    /// owners does nothing.
    pub fn release(&self, path: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(count) = inner.bindings.get_mut(path) else {
            return false;
        };
        *count -= 1;
        if *count > 0 {
            return false;
        }
        inner.bindings.remove(path);
        debug!(path, "Last binding released, removing entry");
        inner.entries.shift_remove(path).is_some()
    }

    /// Number of owners currently bound to `path`
    pub fn binding_count(&self, path: &str) -> usize {
        self.inner.borrow().bindings.get(path).copied().unwrap_or(0)
    }

    /// Rebuild a plain nested object from the stored paths.
    ///
    /// With a prefix, only keys whose leading segments equal the prefix
    /// segments take part, and the prefix is stripped. Matching is segment
    /// by segment: `a.bc` does not match the prefix `a.b`.
    pub fn to_raw_object(&self, prefix: Option<&str>) -> Value {
        let prefix_segments: Vec<&str> = match prefix {
            Some(p) if !p.is_empty() => p.split(PATH_SEPARATOR).collect(),
            _ => Vec::new(),
        };

        let mut matched: Vec<(Vec<String>, StoreEntry)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .filter_map(|(key, entry)| {
                let segments: Vec<&str> = key.split(PATH_SEPARATOR).collect();
                let is_match = segments.len() >= prefix_segments.len()
                    && segments.iter().zip(&prefix_segments).all(|(a, b)| a == b);
                is_match.then(|| {
                    let rest = segments[prefix_segments.len()..]
                        .iter()
                        .map(|s| s.to_string())
                        .collect();
                    (rest, entry.clone())
                })
            })
            .collect();

        // Shallow keys first so deeper cells overlay root defaults
        matched.sort_by_key(|(rest, _)| rest.len());

        let mut result = Value::Object(Map::new());
        for (rest, entry) in matched {
            let value = entry.current();
            if rest.is_empty() {
                if value.is_object() {
                    deep_merge(&mut result, value);
                } else {
                    debug!(?prefix, "Scalar stored at the prefix itself is not an object; skipped");
                }
                continue;
            }
            insert_at(&mut result, &rest, value);
        }
        result
    }
}

fn insert_at(target: &mut Value, segments: &[String], value: Value) {
    let mut current = target;
    for (index, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(fields) = current else {
            unreachable!("coerced to an object above");
        };
        if index == segments.len() - 1 {
            match fields.get_mut(segment) {
                Some(existing) if existing.is_object() && value.is_object() => {
                    deep_merge(existing, value);
                }
                _ => {
                    fields.insert(segment.clone(), value);
                }
            }
            return;
        }
        current = fields
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_fields), Value::Object(source_fields)) => {
            for (key, value) in source_fields {
                match target_fields.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value);
                    }
                    _ => {
                        target_fields.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_round_trip() {
        let store = PathStore::new();
        let obj = json!({ "name": "Ann", "age": 18, "tags": ["a", "b"] });
        store.set("form", Some(obj.clone()));

        assert!(store.get("form").unwrap().is_root());
        assert_eq!(store.to_raw_object(Some("form")), obj);
    }

    #[test]
    fn test_undotted_path_creates_cell() {
        let store = PathStore::new();
        store.set("count", Some(json!(3)));
        let cell = store.cell("count").expect("cell");
        assert_eq!(cell.get(), json!(3));
    }

    #[test]
    fn test_second_set_mutates_same_cell() {
        let store = PathStore::new();
        store.set("a.b", Some(json!(1)));
        let first = store.cell("a.b").unwrap();

        store.set("a.b", Some(json!(2)));
        let second = store.cell("a.b").unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(first.get(), json!(2));
    }

    #[test]
    fn test_nil_value_seeds_from_parent_root() {
        let store = PathStore::new();
        store.set("form", Some(json!({ "name": "Zhang", "age": 18 })));
        store.set("form.name", None);
        store.set("form.age", Some(Value::Null));

        assert_eq!(store.value("form.name"), Some(json!("Zhang")));
        assert_eq!(store.value("form.age"), Some(json!(18)));
    }

    #[test]
    fn test_explicit_value_beats_parent_default() {
        let store = PathStore::new();
        store.set("form", Some(json!({ "name": "Zhang" })));
        store.set("form.name", Some(json!("Li")));
        assert_eq!(store.value("form.name"), Some(json!("Li")));
    }

    #[test]
    fn test_nil_write_keeps_existing_cell_value() {
        let store = PathStore::new();
        store.set("a.b", Some(json!("kept")));
        store.set("a.b", None);
        assert_eq!(store.value("a.b"), Some(json!("kept")));
    }

    #[test]
    fn test_update_only_touches_bound_cells() {
        let store = PathStore::new();
        assert!(!store.update("missing.path", json!(1)));
        assert!(!store.has("missing.path"));

        store.set("root", Some(json!({ "x": 1 })));
        assert!(!store.update("root", json!(5)));
        assert_eq!(store.value("root"), Some(json!({ "x": 1 })));

        store.set("a.b", Some(json!(1)));
        assert!(store.update("a.b", json!(9)));
        assert_eq!(store.value("a.b"), Some(json!(9)));
    }

    #[test]
    fn test_prefix_matching_is_segment_wise() {
        let store = PathStore::new();
        store.set("a.b.c", Some(json!(1)));
        store.set("a.bc", Some(json!(2)));

        assert_eq!(store.to_raw_object(Some("a.b")), json!({ "c": 1 }));
    }

    #[test]
    fn test_raw_object_without_prefix_nests_everything() {
        let store = PathStore::new();
        store.set("form.user.name", Some(json!("Ann")));
        store.set("form.user.age", Some(json!(30)));
        store.set("other", Some(json!(true)));

        assert_eq!(
            store.to_raw_object(None),
            json!({
                "form": { "user": { "name": "Ann", "age": 30 } },
                "other": true
            })
        );
    }

    #[test]
    fn test_cells_overlay_root_defaults() {
        let store = PathStore::new();
        store.set("form", Some(json!({ "name": "Zhang", "age": 18 })));
        store.set("form.name", Some(json!("Li")));

        assert_eq!(
            store.to_raw_object(Some("form")),
            json!({ "name": "Li", "age": 18 })
        );
    }

    #[test]
    fn test_bind_release_destroys_with_last_owner() {
        let store = PathStore::new();
        store.set("ns.field", Some(json!(1)));
        store.bind("ns.field");
        store.bind("ns.field");

        assert!(!store.release("ns.field"));
        assert!(store.has("ns.field"));
        assert!(store.release("ns.field"));
        assert!(!store.has("ns.field"));
        assert!(!store.release("ns.field"));
    }
}
