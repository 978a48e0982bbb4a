//! Tests for render caching across compositions

use dcstruct_evaluator::{Children, Composer, ComposerConfig, Descriptor, HeadlessHost, Lifecycle};
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;

fn composer(capacity: usize) -> Rc<Composer> {
    Composer::isolated(
        Rc::new(HeadlessHost::new()),
        ComposerConfig {
            cache_capacity: capacity,
            ..ComposerConfig::default()
        },
    )
}

#[test]
fn test_capacity_bounds_entries() {
    let composer = composer(2);
    for label in ["a", "b", "c"] {
        composer.compose(&Descriptor::new("p").with_text(label)).unwrap();
    }
    assert_eq!(composer.cache().len(), 2);
    assert_eq!(composer.cache().capacity(), 2);
}

#[test]
fn test_recompose_reuses_instance_and_entry() {
    let composer = composer(16);
    let created = Rc::new(Cell::new(0));
    let counter = created.clone();
    let descriptor = Descriptor::new("article")
        .with_hook(Lifecycle::Created, move |_| counter.set(counter.get() + 1))
        .with_child(Descriptor::new("h1").with_text("Title"));

    let first = composer.compose(&descriptor).unwrap();
    let entries = composer.cache().len();
    let second = composer.compose(&descriptor).unwrap();

    assert_eq!(first.uids(), second.uids());
    assert_eq!(composer.cache().len(), entries);
    assert_eq!(created.get(), 1);
}

#[test]
fn test_forked_descriptor_gets_its_own_instance() {
    let composer = composer(16);
    let descriptor = Descriptor::new("p").with_text("same");
    let a = composer.compose(&descriptor).unwrap();
    let b = composer.compose(&descriptor.fork()).unwrap();
    assert_ne!(a.uid(), b.uid());
}

#[test]
fn test_child_update_invalidates_ancestors() {
    let composer = composer(16);
    let tree = Descriptor::new("form").with_namespace("c").with_child(
        Descriptor::new("section")
            .with_child(Descriptor::new("input").with_prop("modelValue", json!({ "path": "v", "value": 1 }))),
    );
    let node = composer.compose(&tree).unwrap();
    let input = node.uids()[2].clone();

    composer.set_model(&input, json!(2)).unwrap();
    let again = composer.compose(&tree).unwrap();
    let found = again.find(&input).unwrap().as_element().unwrap();
    assert_eq!(found.attrs["modelValue"], json!(2));
}

#[test]
fn test_direct_store_write_invalidates_cached_ancestors() {
    let composer = composer(16);
    let tree = Descriptor::new("form").with_namespace("g").with_child(
        Descriptor::new("input").with_prop("modelValue", json!({ "path": "name", "value": "x" })),
    );
    let node = composer.compose(&tree).unwrap();
    let input = node.uids()[1].clone();

    assert!(composer.store().update("g.name", json!("changed")));
    let again = composer.compose(&tree).unwrap();
    let found = again.find(&input).unwrap().as_element().unwrap();
    assert_eq!(found.attrs["modelValue"], json!("changed"));
}

#[test]
fn test_function_children_are_never_cached() {
    let composer = composer(16);
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let descriptor = Descriptor::new("div").with_children_fn(move |_| {
        counter.set(counter.get() + 1);
        Children::Text("live".into())
    });

    composer.compose(&descriptor).unwrap();
    composer.compose(&descriptor).unwrap();
    assert_eq!(calls.get(), 2);
    assert!(composer.cache().is_empty());
}
