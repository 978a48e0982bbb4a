//! # Event Normalizer
//!
//! Turns a descriptor's event map into host-ready handlers.
//!
//! ## Wrapping order
//!
//! Layers are applied innermost to outermost, regardless of how the flags were
//! declared:
//!
//! 1. keyboard filter (`key*` events with a key flag set)
//! 2. once guard
//! 3. error recovery through the binding's `error` callback
//! 4. debounce / throttle
//!
//! Host guards (`stop`, `prevent`, `self`, mouse buttons, system keys,
//! `exact`) run synchronously in [`NormalizedHandler::invoke`] before the
//! layered call.
//!
//! ## Usage
//!
//! ```ignore
//! let binding = EventBinding::new(|_| Ok(())).debounce(200);
//! let handler = normalize_event("click.stop", &binding, &cx)?;
//! assert_eq!(handler.key(), "onClick");
//! ```

use crate::error::{HandlerError, ValidationError};
use crate::modifiers::{self, Modifier, ModifierSet, RateLimitSpec};
use crate::rate_limit::{HandlerResult, RateLimiter};
use crate::scheduler::Scheduler;
use indexmap::IndexMap;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Event delivered by the host
#[derive(Debug, Clone, Default)]
pub struct DomEvent {
    pub name: String,
    pub key: Option<String>,
    pub key_code: Option<u32>,
    pub button: Option<MouseButton>,
    pub ctrl_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
    /// Uid of the element the event originated on
    pub target: Option<String>,
    /// Uid of the element whose listener is running
    pub current_target: Option<String>,
    pub detail: Value,
    propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl DomEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>, code: u32) -> Self {
        self.key = Some(key.into());
        self.key_code = Some(code);
        self
    }

    pub fn with_key_code(mut self, code: u32) -> Self {
        self.key_code = Some(code);
        self
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = Some(button);
        self
    }

    pub fn with_system_keys(mut self, ctrl: bool, shift: bool, alt: bool, meta: bool) -> Self {
        self.ctrl_key = ctrl;
        self.shift_key = shift;
        self.alt_key = alt;
        self.meta_key = meta;
        self
    }

    pub fn with_target(mut self, uid: impl Into<String>) -> Self {
        self.target = Some(uid.into());
        self
    }

    pub fn with_current_target(mut self, uid: impl Into<String>) -> Self {
        self.current_target = Some(uid.into());
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    pub fn is_keyboard(&self) -> bool {
        self.name.starts_with("key")
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

/// User event handler
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&DomEvent) -> HandlerResult>);

impl Handler {
    pub fn new(f: impl Fn(&DomEvent) -> HandlerResult + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &DomEvent) -> HandlerResult {
        (self.0)(event)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// Receives `(error, event)` when a handler fails
#[derive(Clone)]
pub struct ErrorCallback(Rc<dyn Fn(&HandlerError, &DomEvent)>);

impl ErrorCallback {
    pub fn new(f: impl Fn(&HandlerError, &DomEvent) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, error: &HandlerError, event: &DomEvent) {
        (self.0)(error, event)
    }
}

impl fmt::Debug for ErrorCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorCallback")
    }
}

/// Event map value: a handler plus optional flags and error callback
#[derive(Debug, Clone)]
pub struct EventBinding {
    pub handler: Handler,
    pub error: Option<ErrorCallback>,
    pub flags: ModifierSet,
}

impl EventBinding {
    pub fn new(f: impl Fn(&DomEvent) -> HandlerResult + 'static) -> Self {
        Self::from(Handler::new(f))
    }

    pub fn with(mut self, modifier: Modifier) -> Self {
        self.flags.set(modifier, true);
        self
    }

    pub fn once(self) -> Self {
        self.with(Modifier::Once)
    }

    pub fn debounce(mut self, ms: u64) -> Self {
        self.flags.set(Modifier::Debounce, ms);
        self
    }

    pub fn throttle(mut self, ms: u64) -> Self {
        self.flags.set(Modifier::Throttle, ms);
        self
    }

    pub fn rate_limit(mut self, modifier: Modifier, spec: RateLimitSpec) -> Self {
        self.flags.set(modifier, spec);
        self
    }

    pub fn on_error(mut self, f: impl Fn(&HandlerError, &DomEvent) + 'static) -> Self {
        self.error = Some(ErrorCallback::new(f));
        self
    }
}

impl From<Handler> for EventBinding {
    fn from(handler: Handler) -> Self {
        Self {
            handler,
            error: None,
            flags: ModifierSet::new(),
        }
    }
}

type Layer = Rc<dyn Fn(&DomEvent) -> HandlerResult>;

struct HandlerInner {
    key: String,
    event: String,
    flags: ModifierSet,
    call: Layer,
    limiter: Option<RateLimiter>,
    detached: Rc<Cell<bool>>,
}

/// Fully wrapped handler, exposed to the host under [`NormalizedHandler::key`]
#[derive(Clone)]
pub struct NormalizedHandler {
    inner: Rc<HandlerInner>,
}

impl NormalizedHandler {
    /// Plain handler with no modifiers, used for composer-provided listeners
    pub fn from_fn(key: &str, f: impl Fn(&DomEvent) -> HandlerResult + 'static) -> Self {
        Self {
            inner: Rc::new(HandlerInner {
                key: modifiers::handler_key(key),
                event: modifiers::event_name(&modifiers::handler_key(key)),
                flags: ModifierSet::new(),
                call: Rc::new(f),
                limiter: None,
                detached: Rc::new(Cell::new(false)),
            }),
        }
    }

    /// Host-convention key, e.g. `onClick`
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Event name the host listens for, e.g. `click`
    pub fn event(&self) -> &str {
        &self.inner.event
    }

    pub fn flags(&self) -> &ModifierSet {
        &self.inner.flags
    }

    /// Run the handler for one dispatched event
    pub fn invoke(&self, event: &DomEvent) -> HandlerResult {
        if self.inner.detached.get() {
            return Ok(());
        }
        if !self.inner.flags.guard(event, event.is_keyboard()) {
            debug!(key = %self.inner.key, "Event blocked by modifier guard");
            return Ok(());
        }
        match &self.inner.limiter {
            Some(limiter) => limiter.call(event),
            None => (self.inner.call)(event),
        }
    }

    /// Set once a `once` handler has run; the host should drop the listener
    pub fn is_detached(&self) -> bool {
        self.inner.detached.get()
    }

    pub fn is_pending(&self) -> bool {
        self.inner
            .limiter
            .as_ref()
            .map_or(false, RateLimiter::is_pending)
    }

    /// Cancel a pending debounced or throttled call
    pub fn cancel(&self) {
        if let Some(limiter) = &self.inner.limiter {
            limiter.cancel();
        }
    }
}

impl fmt::Debug for NormalizedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedHandler")
            .field("key", &self.inner.key)
            .field("flags", &self.inner.flags)
            .finish()
    }
}

/// Shared inputs for normalizing the events of one node
#[derive(Clone)]
pub struct EventContext {
    pub scheduler: Scheduler,
    pub default_rate_limit_ms: u64,
    /// Sink for failures raised by deferred (rate-limited) runs
    pub on_deferred_error: Rc<dyn Fn(HandlerError)>,
}

impl EventContext {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            default_rate_limit_ms: 300,
            on_deferred_error: Rc::new(|err: HandlerError| warn!(error = %err, "Unhandled deferred handler error")),
        }
    }
}

/// Normalize one event entry
pub fn normalize_event(
    key: &str,
    binding: &EventBinding,
    cx: &EventContext,
) -> Result<NormalizedHandler, ValidationError> {
    let (base, mut flags) = modifiers::parse_event_key(key)?;
    flags.merge(&binding.flags);

    let handler_key = modifiers::handler_key(&base);
    let event = modifiers::event_name(&handler_key);
    let detached = Rc::new(Cell::new(false));

    let user = binding.handler.clone();
    let mut layer: Layer = Rc::new(move |e: &DomEvent| user.call(e));

    let filters = flags.keyboard_filters();
    if event.starts_with("key") && !filters.is_empty() {
        let inner = layer;
        layer = Rc::new(move |e: &DomEvent| {
            if filters.iter().any(|m| m.matches_key(e)) {
                inner(e)
            } else {
                Ok(())
            }
        });
    }

    if flags.is_set(Modifier::Once) {
        let inner = layer;
        let marks = RefCell::new(HashSet::new());
        let detached = detached.clone();
        layer = Rc::new(move |e: &DomEvent| {
            let mark = e.current_target.clone().unwrap_or_default();
            if !marks.borrow_mut().insert(mark) {
                return Ok(());
            }
            detached.set(true);
            inner(e)
        });
    }

    if let Some(callback) = binding.error.clone() {
        let inner = layer;
        let key = handler_key.clone();
        layer = Rc::new(move |e: &DomEvent| match inner(e) {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(key = %key, error = %err, "Handler error recovered");
                callback.call(&err, e);
                Ok(())
            }
        });
    }

    let limiter = flags.rate_limit(cx.default_rate_limit_ms).map(|options| {
        debug!(key = %handler_key, kind = ?options.kind, wait_ms = options.wait.as_millis() as u64, "Rate limiting handler");
        RateLimiter::new(
            cx.scheduler.clone(),
            options,
            layer.clone(),
            cx.on_deferred_error.clone(),
        )
    });

    Ok(NormalizedHandler {
        inner: Rc::new(HandlerInner {
            key: handler_key,
            event,
            flags,
            call: layer,
            limiter,
            detached,
        }),
    })
}

/// Normalize a whole event map. Keys mapping to the same host key keep the
/// last declaration.
pub fn normalize_events(
    events: &IndexMap<String, EventBinding>,
    cx: &EventContext,
) -> Result<IndexMap<String, NormalizedHandler>, ValidationError> {
    let mut handlers = IndexMap::new();
    for (key, binding) in events {
        let handler = normalize_event(key, binding, cx)?;
        if let Some(previous) = handlers.insert(handler.key().to_string(), handler) {
            warn!(key = %previous.key(), "Event declared twice; keeping the last binding");
            previous.cancel();
        }
    }
    Ok(handlers)
}

/// Cancel pending timers of every handler
pub fn cancel_all<'a>(handlers: impl IntoIterator<Item = &'a NormalizedHandler>) {
    for handler in handlers {
        handler.cancel();
    }
}
