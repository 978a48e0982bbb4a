//! Built-in directives.
//!
//! | name | behaviour |
//! |------|-----------|
//! | `dcShow` | `display: none` while falsy |
//! | `dcHtml` / `dcText` | inner HTML / text content |
//! | `dcOnce` | render once, refuse later updates |
//! | `dcPre` | skip compilation-style attributes, refuse updates |
//! | `dcCloak` | drop the cloak attribute once mounted |
//! | `dcFocus` | focus on mount, focus/blur on update |
//! | `dcClickOutside` | run the handler for document clicks outside the element |
//! | `dcDebounce` / `dcThrottle` | rate-limited click handler |
//! | `dcPermission` | hide the element when the permission check fails |
//! | `dcLongpress` | run the handler after a sustained press |
//! | `dcCopy` | copy the value to the clipboard on click |
//! | `dcStyle` | set the style property named by `arg` |

use crate::descriptor::DirectiveValue;
use crate::directives::{Directive, DirectiveBinding};
use crate::error::{EvalError, HandlerError};
use crate::events::{DomEvent, Handler};
use crate::host::{Host, HostElement, ListenerId};
use crate::modifiers::RateLimitSpec;
use crate::rate_limit::{RateLimitKind, RateLimitOptions, RateLimiter};
use crate::scheduler::TimerId;
use serde_json::Value;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_RATE_LIMIT_MS: u64 = 300;
pub const DEFAULT_LONGPRESS_MS: u64 = 500;

const ONCE_ATTR: &str = "data-dc-once";
const PRE_ATTR: &str = "data-dc-pre";

pub fn lookup(name: &str) -> Option<Rc<dyn Directive>> {
    let directive: Rc<dyn Directive> = match name {
        "dcShow" => Rc::new(Show),
        "dcHtml" => Rc::new(Html),
        "dcText" => Rc::new(TextContent),
        "dcOnce" => Rc::new(Once),
        "dcPre" => Rc::new(Pre),
        "dcCloak" => Rc::new(Cloak),
        "dcFocus" => Rc::new(Focus),
        "dcClickOutside" => Rc::new(ClickOutside),
        "dcDebounce" => Rc::new(RateLimited(RateLimitKind::Debounce)),
        "dcThrottle" => Rc::new(RateLimited(RateLimitKind::Throttle)),
        "dcPermission" => Rc::new(Permission),
        "dcLongpress" => Rc::new(Longpress),
        "dcCopy" => Rc::new(Clipboard),
        "dcStyle" => Rc::new(Style),
        _ => return None,
    };
    Some(directive)
}

pub fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn report(host: &Weak<dyn Host>, el: &Rc<dyn HostElement>, err: HandlerError) {
    match host.upgrade() {
        Some(host) => host.capture_error(el.uid().as_ref(), &EvalError::Handler(err)),
        None => warn!(error = %err, "Directive handler failed after host was dropped"),
    }
}

fn require_handler<'a>(binding: &'a DirectiveBinding) -> Option<&'a Handler> {
    let handler = binding.value.as_handler();
    if handler.is_none() {
        warn!(directive = %binding.name, "Directive expects a handler value");
    }
    handler
}

/// Listener ids and cleanup state kept on the element between hooks
struct Attached {
    listeners: Vec<ListenerId>,
    document: Option<ListenerId>,
    limiter: Option<RateLimiter>,
    timer: Option<Rc<Cell<Option<TimerId>>>>,
}

impl Attached {
    fn new() -> Self {
        Self {
            listeners: Vec::new(),
            document: None,
            limiter: None,
            timer: None,
        }
    }

    fn stash(self, el: &Rc<dyn HostElement>, key: &str) {
        el.stash(key, Rc::new(self) as Rc<dyn Any>);
    }

    fn release(el: &Rc<dyn HostElement>, key: &str, host: &Rc<dyn Host>) {
        let Some(stashed) = el.unstash(key) else {
            return;
        };
        let Ok(attached) = stashed.downcast::<Attached>() else {
            return;
        };
        for id in &attached.listeners {
            el.remove_listener(*id);
        }
        if let Some(id) = attached.document {
            host.unlisten_document(id);
        }
        if let Some(limiter) = &attached.limiter {
            limiter.cancel();
        }
        if let Some(timer) = attached.timer.as_ref().and_then(|t| t.take()) {
            host.scheduler().clear_timeout(timer);
        }
    }
}

struct Show;

impl Show {
    fn apply(el: &Rc<dyn HostElement>, binding: &DirectiveBinding) {
        if binding.value.is_truthy() {
            el.set_style("display", None);
        } else {
            el.set_style("display", Some("none"));
        }
    }
}

impl Directive for Show {
    fn mounted(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        Self::apply(el, binding);
    }

    fn updated(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        Self::apply(el, binding);
    }
}

struct Html;

impl Directive for Html {
    fn mounted(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        el.set_inner_html(&text_of(&binding.value.resolve()));
    }

    fn updated(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        self.mounted(el, binding, host);
    }
}

struct TextContent;

impl Directive for TextContent {
    fn mounted(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        el.set_text_content(&text_of(&binding.value.resolve()));
    }

    fn updated(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        self.mounted(el, binding, host);
    }
}

struct Once;

impl Directive for Once {
    fn mounted(&self, el: &Rc<dyn HostElement>, _binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        el.set_attribute(ONCE_ATTR, "");
    }

    fn before_update(&self, el: &Rc<dyn HostElement>, _binding: &DirectiveBinding, _host: &Rc<dyn Host>) -> bool {
        el.attribute(ONCE_ATTR).is_none()
    }
}

struct Pre;

impl Directive for Pre {
    fn mounted(&self, el: &Rc<dyn HostElement>, _binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        el.set_attribute(PRE_ATTR, "");
        for name in el.attribute_names() {
            if name.starts_with("v-") || name.starts_with("dc-") {
                el.remove_attribute(&name);
            }
        }
    }

    fn before_update(&self, _el: &Rc<dyn HostElement>, _binding: &DirectiveBinding, _host: &Rc<dyn Host>) -> bool {
        false
    }
}

struct Cloak;

impl Directive for Cloak {
    fn mounted(&self, el: &Rc<dyn HostElement>, _binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        el.remove_attribute("v-cloak");
        el.remove_attribute("dc-cloak");
    }
}

struct Focus;

impl Directive for Focus {
    fn mounted(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        if binding.value.resolve() != Value::Bool(false) {
            el.focus();
        }
    }

    fn updated(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        if binding.value.resolve() == Value::Bool(false) {
            el.blur();
        } else {
            el.focus();
        }
    }
}

struct ClickOutside;

impl Directive for ClickOutside {
    fn mounted(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        let Some(handler) = require_handler(binding).cloned() else {
            return;
        };
        let element = Rc::downgrade(el);
        let weak_host = Rc::downgrade(host);
        let id = host.listen_document(
            "click",
            Rc::new(move |event: &DomEvent| {
                let Some(el) = element.upgrade() else {
                    return;
                };
                let inside = event.target.as_deref().map_or(false, |target| el.contains(target));
                if !inside {
                    if let Err(err) = handler.call(event) {
                        report(&weak_host, &el, err);
                    }
                }
            }),
        );
        let mut attached = Attached::new();
        attached.document = Some(id);
        attached.stash(el, &binding.stash_key());
    }

    fn before_unmount(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        Attached::release(el, &binding.stash_key(), host);
    }
}

struct RateLimited(RateLimitKind);

impl Directive for RateLimited {
    fn mounted(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        let Some(handler) = require_handler(binding).cloned() else {
            return;
        };
        let spec = RateLimitSpec {
            delay: Some(binding.arg_millis(DEFAULT_RATE_LIMIT_MS).as_millis() as u64),
            leading: binding.modifier("leading").and_then(Value::as_bool),
            trailing: binding.modifier("trailing").and_then(Value::as_bool),
            max_wait: binding.modifier("maxWait").and_then(Value::as_u64),
        };
        let options = RateLimitOptions::from_spec(
            self.0,
            &spec,
            Duration::from_millis(DEFAULT_RATE_LIMIT_MS),
        );

        let weak_host = Rc::downgrade(host);
        let weak_el = Rc::downgrade(el);
        let limiter = RateLimiter::new(
            host.scheduler(),
            options,
            Rc::new(move |event: &DomEvent| handler.call(event)),
            Rc::new(move |err: HandlerError| {
                if let Some(el) = weak_el.upgrade() {
                    report(&weak_host, &el, err);
                }
            }),
        );

        let listener_limiter = limiter.clone();
        let sync_host = Rc::downgrade(host);
        let sync_el = Rc::downgrade(el);
        let id = el.add_listener(
            "click",
            Rc::new(move |event: &DomEvent| {
                if let Err(err) = listener_limiter.call(event) {
                    if let Some(el) = sync_el.upgrade() {
                        report(&sync_host, &el, err);
                    }
                }
            }),
        );

        let mut attached = Attached::new();
        attached.listeners.push(id);
        attached.limiter = Some(limiter);
        attached.stash(el, &binding.stash_key());
    }

    fn before_unmount(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        Attached::release(el, &binding.stash_key(), host);
    }
}

struct Permission;

impl Permission {
    fn allowed(binding: &DirectiveBinding, host: &Rc<dyn Host>) -> bool {
        match &binding.value {
            DirectiveValue::Compute(compute) => crate::descriptor::truthy(&compute.call()),
            DirectiveValue::Handler(_) => true,
            DirectiveValue::Data(value) => match binding.arg.as_deref() {
                Some(checker) => match host.permission_checker(checker) {
                    Some(check) => check(value),
                    None => {
                        warn!(checker, "Unknown permission checker; allowing");
                        true
                    }
                },
                None => true,
            },
        }
    }

    fn apply(el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        if Self::allowed(binding, host) {
            el.remove_attribute("data-dc-denied");
            el.set_style("display", None);
        } else {
            el.set_attribute("data-dc-denied", "");
            el.set_style("display", Some("none"));
        }
    }
}

impl Directive for Permission {
    fn mounted(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        Self::apply(el, binding, host);
    }

    fn updated(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        Self::apply(el, binding, host);
    }
}

struct Longpress;

const PRESS_START: [&str; 2] = ["mousedown", "touchstart"];
const PRESS_END: [&str; 4] = ["mouseup", "mouseleave", "touchend", "touchcancel"];

impl Directive for Longpress {
    fn mounted(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        let Some(handler) = require_handler(binding).cloned() else {
            return;
        };
        let delay = binding.arg_millis(DEFAULT_LONGPRESS_MS);
        let timer: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));
        let mut attached = Attached::new();

        for event_name in PRESS_START {
            let timer = timer.clone();
            let handler = handler.clone();
            let scheduler = host.scheduler();
            let weak_host = Rc::downgrade(host);
            let weak_el = Rc::downgrade(el);
            let id = el.add_listener(
                event_name,
                Rc::new(move |event: &DomEvent| {
                    if timer.get().is_some() {
                        return;
                    }
                    let pressed = event.clone();
                    let handler = handler.clone();
                    let weak_host = weak_host.clone();
                    let weak_el = weak_el.clone();
                    let fired = timer.clone();
                    let id = scheduler.set_timeout(delay, move || {
                        fired.set(None);
                        if let Err(err) = handler.call(&pressed) {
                            if let Some(el) = weak_el.upgrade() {
                                report(&weak_host, &el, err);
                            }
                        }
                    });
                    timer.set(Some(id));
                }),
            );
            attached.listeners.push(id);
        }

        for event_name in PRESS_END {
            let timer = timer.clone();
            let scheduler = host.scheduler();
            let id = el.add_listener(
                event_name,
                Rc::new(move |_: &DomEvent| {
                    if let Some(id) = timer.take() {
                        scheduler.clear_timeout(id);
                    }
                }),
            );
            attached.listeners.push(id);
        }

        attached.timer = Some(timer);
        attached.stash(el, &binding.stash_key());
    }

    fn before_unmount(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        Attached::release(el, &binding.stash_key(), host);
    }
}

struct Clipboard;

const COPY_VALUE_KEY: &str = "dcCopy:value";

impl Directive for Clipboard {
    fn mounted(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        let value = Rc::new(RefCell::new(binding.value.clone()));
        el.stash(COPY_VALUE_KEY, value.clone() as Rc<dyn Any>);

        let weak_host = Rc::downgrade(host);
        let weak_el = Rc::downgrade(el);
        let id = el.add_listener(
            "click",
            Rc::new(move |_: &DomEvent| {
                let (Some(host), Some(el)) = (weak_host.upgrade(), weak_el.upgrade()) else {
                    return;
                };
                let text = text_of(&value.borrow().resolve());
                if let Err(err) = host.write_clipboard(&text) {
                    report(&weak_host, &el, err);
                }
            }),
        );
        let mut attached = Attached::new();
        attached.listeners.push(id);
        attached.stash(el, &binding.stash_key());
    }

    fn updated(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        let stashed = el
            .stashed(COPY_VALUE_KEY)
            .and_then(|any| any.downcast::<RefCell<DirectiveValue>>().ok());
        if let Some(cell) = stashed {
            *cell.borrow_mut() = binding.value.clone();
        }
    }

    fn before_unmount(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, host: &Rc<dyn Host>) {
        el.unstash(COPY_VALUE_KEY);
        Attached::release(el, &binding.stash_key(), host);
    }
}

struct Style;

impl Style {
    fn apply(el: &Rc<dyn HostElement>, binding: &DirectiveBinding) {
        let value = binding.value.resolve();
        match (&binding.arg, value) {
            (Some(property), Value::Null | Value::Bool(false)) => el.set_style(property, None),
            (Some(property), value) => el.set_style(property, Some(&text_of(&value))),
            (None, Value::Object(styles)) => {
                for (property, value) in styles {
                    match value {
                        Value::Null | Value::Bool(false) => el.set_style(&property, None),
                        value => el.set_style(&property, Some(&text_of(&value))),
                    }
                }
            }
            (None, _) => warn!("dcStyle needs an arg naming the property or an object value"),
        }
    }
}

impl Directive for Style {
    fn mounted(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        Self::apply(el, binding);
    }

    fn updated(&self, el: &Rc<dyn HostElement>, binding: &DirectiveBinding, _host: &Rc<dyn Host>) {
        Self::apply(el, binding);
    }
}
