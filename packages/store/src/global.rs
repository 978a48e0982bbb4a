//! Process-wide model store.
//!
//! Rendering is single threaded, so "process-wide" means one store per UI
//! thread. [`inspect`] exposes the raw maps for debugging, the same way a
//! browser build would hang them off a global object.

use crate::path_store::{PathStore, StoreEntry};
use serde_json::{json, Map, Value};

thread_local! {
    static STORE: PathStore = PathStore::new();
}

/// Handle to this thread's shared store
pub fn store() -> PathStore {
    STORE.with(|store| store.clone())
}

/// Snapshot of the shared store for external inspection.
///
/// `roots` holds namespace roots verbatim, `cells` holds the current value of
/// every cell, both keyed by their full dotted path. `models` is the nested
/// view produced by `to_raw_object(None)`.
pub fn inspect() -> Value {
    snapshot(&store())
}

/// Same as [`inspect`], for any store handle
pub fn snapshot(store: &PathStore) -> Value {
    let mut roots = Map::new();
    let mut cells = Map::new();
    for key in store.keys() {
        match store.get(&key) {
            Some(StoreEntry::Root(value)) => {
                roots.insert(key, value);
            }
            Some(StoreEntry::Cell(cell)) => {
                cells.insert(key, cell.get());
            }
            None => {}
        }
    }
    json!({
        "roots": roots,
        "cells": cells,
        "models": store.to_raw_object(None),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_splits_roots_and_cells() {
        let store = PathStore::new();
        store.set("form", Some(json!({ "name": "default" })));
        store.set("form.name", Some(json!("Ann")));

        let snap = snapshot(&store);
        assert_eq!(snap["roots"]["form"], json!({ "name": "default" }));
        assert_eq!(snap["cells"]["form.name"], json!("Ann"));
        assert_eq!(snap["models"], json!({ "form": { "name": "Ann" } }));
    }

    #[test]
    fn test_global_handle_is_shared() {
        let a = store();
        let b = store();
        a.set("global_test_key", Some(json!(1)));
        assert_eq!(b.value("global_test_key"), Some(json!(1)));
        a.remove("global_test_key");
    }
}
