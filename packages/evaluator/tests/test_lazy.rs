//! Tests for incremental list loading

use dcstruct_evaluator::lazy::{LOADED_ATTR, REMAIN_ATTR};
use dcstruct_evaluator::{
    ComposerConfig, Descriptor, Harness, HostElement, LazyOptions, ScrollMetrics, Uid,
};
use serde_json::json;

const AT_BOTTOM: ScrollMetrics = ScrollMetrics {
    scroll_top: 900.0,
    client_height: 100.0,
    scroll_height: 1000.0,
};

fn items(n: usize) -> Vec<Descriptor> {
    (0..n)
        .map(|i| Descriptor::new("li").with_key(format!("item-{i}")).with_text(i.to_string()))
        .collect()
}

fn rendered_items(harness: &Harness, list: &Uid) -> usize {
    let tree = harness.composer().tree().unwrap();
    tree.find(list).unwrap().uids().len() - 1
}

#[test]
fn test_list_grows_by_step_on_scroll() {
    let mut harness = Harness::new();
    let list = Descriptor::new("ul")
        .with_directive("dcLazy", true)
        .with_children(items(20));
    let uid = harness.render(&list).unwrap().uid().cloned().unwrap();

    let el = harness.element(&uid).unwrap();
    assert_eq!(rendered_items(&harness, &uid), 8);
    assert_eq!(el.attribute(LOADED_ATTR).as_deref(), Some("8"));
    assert_eq!(el.attribute(REMAIN_ATTR).as_deref(), Some("12"));

    let mut seen = Vec::new();
    for _ in 0..5 {
        harness.scroll(&uid, AT_BOTTOM);
        seen.push(rendered_items(&harness, &uid));
    }
    assert_eq!(seen, vec![11, 14, 17, 20, 20]);
    assert_eq!(el.attribute(REMAIN_ATTR).as_deref(), Some("0"));
    assert_eq!(harness.composer().instance(&uid).unwrap().lazy_progress(), Some((20, 20)));
}

#[test]
fn test_new_items_are_mounted() {
    let mut harness = Harness::new();
    let list = Descriptor::new("ul")
        .with_directive("dcLazy", json!({ "num": 2, "step": 2 }))
        .with_children(items(5));
    let node = harness.render(&list).unwrap();
    let uid = node.uid().cloned().unwrap();
    assert_eq!(node.uids().len(), 3);

    harness.scroll(&uid, AT_BOTTOM);
    let tree = harness.composer().tree().unwrap();
    let uids = tree.find(&uid).unwrap().uids();
    assert_eq!(uids.len(), 5);
    for item in &uids[1..] {
        assert!(harness.is_mounted(item));
    }
    assert!(harness.element(&uid).unwrap().contains(uids[4].as_str()));
}

#[test]
fn test_scroll_above_bottom_loads_nothing() {
    let mut harness = Harness::new();
    let list = Descriptor::new("ul")
        .with_directive("dcLazy", true)
        .with_children(items(20));
    let uid = harness.render(&list).unwrap().uid().cloned().unwrap();

    harness.scroll(&uid, ScrollMetrics::new(0.0, 100.0, 1000.0));
    assert_eq!(rendered_items(&harness, &uid), 8);
}

#[test]
fn test_short_list_renders_everything_without_listener() {
    let mut harness = Harness::new();
    let list = Descriptor::new("ul")
        .with_directive("dcLazy", true)
        .with_children(items(5));
    let uid = harness.render(&list).unwrap().uid().cloned().unwrap();

    assert_eq!(rendered_items(&harness, &uid), 5);
    let el = harness.element(&uid).unwrap();
    assert_eq!(el.listener_count("scroll"), 0);
    assert!(el.attribute(LOADED_ATTR).is_none());
}

#[test]
fn test_config_sets_lazy_defaults() {
    let mut harness = Harness::with_config(ComposerConfig {
        lazy: LazyOptions { num: 4, step: 10 },
        ..ComposerConfig::default()
    });
    let list = Descriptor::new("ul")
        .with_directive("dcLazy", true)
        .with_children(items(12));
    let uid = harness.render(&list).unwrap().uid().cloned().unwrap();

    assert_eq!(rendered_items(&harness, &uid), 4);
    harness.scroll(&uid, AT_BOTTOM);
    assert_eq!(rendered_items(&harness, &uid), 12);
}

#[test]
fn test_unmount_removes_scroll_listener() {
    let mut harness = Harness::new();
    let list = Descriptor::new("ul")
        .with_directive("dcLazy", true)
        .with_children(items(20));
    let uid = harness.render(&list).unwrap().uid().cloned().unwrap();
    let el = harness.element(&uid).unwrap();
    assert_eq!(el.listener_count("scroll"), 1);

    harness.unmount(&uid);
    assert_eq!(el.listener_count("scroll"), 0);
}
