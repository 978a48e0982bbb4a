//! Tests for event normalization on mounted elements

use dcstruct_evaluator::{
    Descriptor, DomEvent, EventBinding, Harness, HandlerError, Lifecycle, Uid,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

fn counting() -> (Rc<Cell<u32>>, EventBinding) {
    let count = Rc::new(Cell::new(0));
    let seen = count.clone();
    (
        count,
        EventBinding::new(move |_| {
            seen.set(seen.get() + 1);
            Ok(())
        }),
    )
}

fn render(harness: &mut Harness, descriptor: &Descriptor) -> Uid {
    harness.render(descriptor).unwrap().uid().cloned().unwrap()
}

#[test]
fn test_debounce_runs_once_after_quiet_window() {
    let mut harness = Harness::new();
    let (count, binding) = counting();
    let uid = render(
        &mut harness,
        &Descriptor::new("button").on("click.stop", binding.debounce(200)),
    );

    harness.dispatch(&uid, &DomEvent::new("click"));
    harness.advance(Duration::from_millis(50));
    harness.dispatch(&uid, &DomEvent::new("click"));
    harness.advance(Duration::from_millis(50));
    harness.dispatch(&uid, &DomEvent::new("click"));

    harness.advance(Duration::from_millis(199));
    assert_eq!(count.get(), 0);
    harness.advance(Duration::from_millis(1));
    assert_eq!(count.get(), 1);

    harness.advance(Duration::from_millis(1000));
    assert_eq!(count.get(), 1);
}

#[test]
fn test_debounce_key_uses_configured_default() {
    let mut harness = Harness::new();
    let (count, binding) = counting();
    let uid = render(&mut harness, &Descriptor::new("input").on("input.debounce", binding));

    harness.dispatch(&uid, &DomEvent::new("input"));
    harness.advance(Duration::from_millis(299));
    assert_eq!(count.get(), 0);
    harness.advance(Duration::from_millis(1));
    assert_eq!(count.get(), 1);
}

#[test]
fn test_throttle_runs_leading_edge() {
    let mut harness = Harness::new();
    let (count, binding) = counting();
    let uid = render(&mut harness, &Descriptor::new("div").on("scroll", binding.throttle(100)));

    for _ in 0..5 {
        harness.dispatch(&uid, &DomEvent::new("scroll"));
    }
    assert_eq!(count.get(), 1);
    harness.advance(Duration::from_millis(100));
    assert_eq!(count.get(), 2);
}

#[test]
fn test_no_debounced_call_after_unmount() {
    let mut harness = Harness::new();
    let (count, binding) = counting();
    let uid = render(&mut harness, &Descriptor::new("button").on("click", binding.debounce(200)));

    harness.dispatch(&uid, &DomEvent::new("click"));
    assert!(harness.unmount(&uid));
    harness.advance(Duration::from_millis(1000));
    assert_eq!(count.get(), 0);
    assert!(!harness.dispatch(&uid, &DomEvent::new("click")));
}

#[test]
fn test_keyboard_filter_on_mounted_element() {
    let mut harness = Harness::new();
    let (count, binding) = counting();
    let uid = render(&mut harness, &Descriptor::new("input").on("keyup.enter", binding));

    harness.dispatch(&uid, &DomEvent::new("keyup").with_key("a", 65));
    harness.dispatch(&uid, &DomEvent::new("keyup").with_key("Enter", 13));
    assert_eq!(count.get(), 1);
}

#[test]
fn test_error_callback_keeps_error_away_from_host() {
    let mut harness = Harness::new();
    let recovered = Rc::new(RefCell::new(Vec::new()));
    let sink = recovered.clone();
    let binding = EventBinding::new(|_| Err(HandlerError::new("invalid form")))
        .on_error(move |err, _| sink.borrow_mut().push(err.message.clone()));
    let uid = render(&mut harness, &Descriptor::new("form").on("submit", binding));

    harness.dispatch(&uid, &DomEvent::new("submit"));
    assert_eq!(*recovered.borrow(), vec!["invalid form".to_string()]);
    assert!(harness.host().errors().is_empty());
}

#[test]
fn test_errors_without_callback_reach_the_host() {
    let mut harness = Harness::new();
    let captured = Rc::new(RefCell::new(Vec::new()));
    let sink = captured.clone();
    let uid = render(
        &mut harness,
        &Descriptor::new("form")
            .on("submit", EventBinding::new(|_| Err(HandlerError::new("invalid form"))))
            .with_hook(Lifecycle::ErrorCaptured, move |args| {
                sink.borrow_mut().push(args.error.unwrap_or_default().to_string())
            }),
    );

    harness.dispatch(&uid, &DomEvent::new("submit"));
    let errors = harness.host().errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].uid.as_ref(), Some(&uid));
    assert_eq!(*captured.borrow(), vec!["Handler failed: invalid form".to_string()]);
}

#[test]
fn test_deferred_errors_reach_the_host() {
    let mut harness = Harness::new();
    let uid = render(
        &mut harness,
        &Descriptor::new("input").on(
            "input",
            EventBinding::new(|_| Err(HandlerError::new("late failure"))).debounce(50),
        ),
    );

    harness.dispatch(&uid, &DomEvent::new("input"));
    assert!(harness.host().errors().is_empty());
    harness.advance(Duration::from_millis(50));

    let errors = harness.host().errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].uid.as_ref(), Some(&uid));
    assert!(errors[0].message.contains("late failure"));
}

#[test]
fn test_once_per_element() {
    let mut harness = Harness::new();
    let (count, binding) = counting();
    let uid = render(&mut harness, &Descriptor::new("button").on("click", binding.once()));

    harness.dispatch(&uid, &DomEvent::new("click"));
    harness.dispatch(&uid, &DomEvent::new("click"));
    assert_eq!(count.get(), 1);
}

#[test]
fn test_click_outside_directive_on_mounted_tree() {
    let mut harness = Harness::new();
    let (count, binding) = counting();
    let handler = dcstruct_evaluator::Handler::new(move |event| binding.handler.call(event));
    let tree = Descriptor::new("div")
        .with_directive("dcClickOutside", dcstruct_evaluator::DirectiveSpec::value(handler))
        .with_child(Descriptor::new("button"));
    let node = harness.render(&tree).unwrap();
    let inner = node.children()[0].uid().cloned().unwrap();

    harness
        .host()
        .dispatch_document(&DomEvent::new("click").with_target(inner.as_str()));
    assert_eq!(count.get(), 0);
    harness
        .host()
        .dispatch_document(&DomEvent::new("click").with_target("elsewhere"));
    assert_eq!(count.get(), 1);
}
