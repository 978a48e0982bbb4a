//! # Headless host
//!
//! In-memory [`Host`] used by tests, benches and the CLI. Elements are plain
//! attribute maps, time is the virtual [`Scheduler`] and errors are recorded
//! instead of reported.
//!
//! [`Harness`] drives a [`Composer`] against this host the way a UI runtime
//! would: it mounts rendered nodes as elements, runs lifecycle hooks, wires
//! listeners and directives, and patches elements when an instance asks for
//! an update.
//!
//! Only wrapped nodes get live elements. Pure nodes are walked for their
//! children and otherwise ignored.
//!
//! ```ignore
//! let mut harness = Harness::new();
//! let node = harness.render(&descriptor)?;
//! let uid = node.uid().cloned().unwrap();
//! harness.dispatch(&uid, &DomEvent::new("click"));
//! harness.advance(Duration::from_millis(200));
//! ```

use crate::composer::Composer;
use crate::config::ComposerConfig;
use crate::descriptor::Descriptor;
use crate::directives::{Directive, DirectiveTuple};
use crate::error::{EvalError, EvalResult, HandlerError};
use crate::events::{DomEvent, NormalizedHandler};
use crate::host::{Host, HostElement, Listener, ListenerId, PermissionFn, ScrollMetrics};
use crate::lifecycle::{HookArgs, HookFn, Lifecycle};
use crate::scheduler::Scheduler;
use crate::vdom::{ComponentRef, RenderNode, Uid};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

static NEXT_LISTENER: AtomicU64 = AtomicU64::new(1);

fn next_listener_id() -> ListenerId {
    ListenerId(NEXT_LISTENER.fetch_add(1, Ordering::Relaxed))
}

/// Error handed to [`Host::capture_error`]
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedError {
    pub uid: Option<Uid>,
    pub message: String,
}

pub struct HeadlessElement {
    tag: String,
    uid: Option<Uid>,
    attrs: RefCell<IndexMap<String, String>>,
    styles: RefCell<IndexMap<String, String>>,
    inner_html: RefCell<Option<String>>,
    text: RefCell<Option<String>>,
    focused: Cell<bool>,
    descendants: RefCell<Vec<String>>,
    listeners: RefCell<Vec<(ListenerId, String, Listener)>>,
    scroll: Cell<ScrollMetrics>,
    stash: RefCell<HashMap<String, Rc<dyn Any>>>,
}

impl HeadlessElement {
    pub fn new(tag: impl Into<String>, uid: Option<Uid>) -> Self {
        Self {
            tag: tag.into(),
            uid,
            attrs: RefCell::new(IndexMap::new()),
            styles: RefCell::new(IndexMap::new()),
            inner_html: RefCell::new(None),
            text: RefCell::new(None),
            focused: Cell::new(false),
            descendants: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            scroll: Cell::new(ScrollMetrics::default()),
            stash: RefCell::new(HashMap::new()),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Uids of elements rendered inside this one
    pub fn set_descendants(&self, uids: Vec<String>) {
        *self.descendants.borrow_mut() = uids;
    }

    pub fn set_scroll_metrics(&self, metrics: ScrollMetrics) {
        self.scroll.set(metrics);
    }

    pub fn is_focused(&self) -> bool {
        self.focused.get()
    }

    pub fn inner_html(&self) -> Option<String> {
        self.inner_html.borrow().clone()
    }

    pub fn text_content(&self) -> Option<String> {
        self.text.borrow().clone()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(_, name, _)| name == event)
            .count()
    }

    /// Run every listener registered for `event.name`. Unset targets are
    /// filled with this element's uid. Returns the number of listeners run.
    pub fn dispatch(&self, event: &DomEvent) -> usize {
        let mut event = event.clone();
        let own = self.uid.as_ref().map(|uid| uid.to_string());
        if event.target.is_none() {
            event.target = own.clone();
        }
        if event.current_target.is_none() {
            event.current_target = own;
        }

        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, name, _)| *name == event.name)
            .map(|(_, _, listener)| listener.clone())
            .collect();
        trace!(event = %event.name, uid = ?self.uid, listeners = listeners.len(), "Dispatching");
        for listener in &listeners {
            listener(&event);
        }
        listeners.len()
    }
}

impl HostElement for HeadlessElement {
    fn uid(&self) -> Option<Uid> {
        self.uid.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attrs.borrow().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.attrs.borrow_mut().insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&self, name: &str) {
        self.attrs.borrow_mut().shift_remove(name);
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attrs.borrow().keys().cloned().collect()
    }

    fn style(&self, property: &str) -> Option<String> {
        self.styles.borrow().get(property).cloned()
    }

    fn set_style(&self, property: &str, value: Option<&str>) {
        let mut styles = self.styles.borrow_mut();
        match value {
            Some(value) => {
                styles.insert(property.to_string(), value.to_string());
            }
            None => {
                styles.shift_remove(property);
            }
        }
    }

    fn set_inner_html(&self, html: &str) {
        *self.inner_html.borrow_mut() = Some(html.to_string());
    }

    fn set_text_content(&self, text: &str) {
        *self.text.borrow_mut() = Some(text.to_string());
    }

    fn focus(&self) {
        self.focused.set(true);
    }

    fn blur(&self) {
        self.focused.set(false);
    }

    fn contains(&self, uid: &str) -> bool {
        self.uid.as_ref().map_or(false, |own| own.as_str() == uid)
            || self.descendants.borrow().iter().any(|d| d == uid)
    }

    fn add_listener(&self, event: &str, listener: Listener) -> ListenerId {
        let id = next_listener_id();
        self.listeners
            .borrow_mut()
            .push((id, event.to_string(), listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(own, _, _)| *own != id);
        listeners.len() != before
    }

    fn scroll_metrics(&self) -> ScrollMetrics {
        self.scroll.get()
    }

    fn stash(&self, key: &str, value: Rc<dyn Any>) {
        self.stash.borrow_mut().insert(key.to_string(), value);
    }

    fn stashed(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.stash.borrow().get(key).cloned()
    }

    fn unstash(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.stash.borrow_mut().remove(key)
    }
}

impl std::fmt::Debug for HeadlessElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessElement")
            .field("tag", &self.tag)
            .field("uid", &self.uid)
            .field("attrs", &self.attrs.borrow())
            .finish()
    }
}

#[derive(Default)]
pub struct HeadlessHost {
    scheduler: Scheduler,
    components: RefCell<HashMap<String, ComponentRef>>,
    directives: RefCell<HashMap<String, Rc<dyn Directive>>>,
    permissions: RefCell<HashMap<String, PermissionFn>>,
    hooks: RefCell<HashMap<Uid, Vec<(Lifecycle, HookFn)>>>,
    elements: RefCell<HashMap<Uid, Rc<HeadlessElement>>>,
    document: RefCell<Vec<(ListenerId, String, Listener)>>,
    clipboard: RefCell<Option<String>>,
    updates: RefCell<Vec<Uid>>,
    errors: RefCell<Vec<CapturedError>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(&self, name: &str) {
        self.components
            .borrow_mut()
            .insert(name.to_string(), ComponentRef::new(name));
    }

    pub fn add_directive(&self, name: &str, directive: Rc<dyn Directive>) {
        self.directives.borrow_mut().insert(name.to_string(), directive);
    }

    pub fn add_permission(&self, name: &str, checker: PermissionFn) {
        self.permissions.borrow_mut().insert(name.to_string(), checker);
    }

    pub fn insert_element(&self, element: Rc<HeadlessElement>) {
        if let Some(uid) = element.uid.clone() {
            self.elements.borrow_mut().insert(uid, element);
        }
    }

    pub fn remove_element(&self, uid: &Uid) -> Option<Rc<HeadlessElement>> {
        self.elements.borrow_mut().remove(uid)
    }

    pub fn headless_element(&self, uid: &Uid) -> Option<Rc<HeadlessElement>> {
        self.elements.borrow().get(uid).cloned()
    }

    /// Run the hooks registered for `uid` at `stage`. Returns how many ran.
    pub fn run_hooks(&self, uid: &Uid, stage: Lifecycle, error: Option<&str>) -> usize {
        let hooks: Vec<HookFn> = self
            .hooks
            .borrow()
            .get(uid)
            .map(|hooks| {
                hooks
                    .iter()
                    .filter(|(own, _)| *own == stage)
                    .map(|(_, hook)| hook.clone())
                    .collect()
            })
            .unwrap_or_default();
        let args = HookArgs { uid, stage, error };
        for hook in &hooks {
            hook.call(&args);
        }
        hooks.len()
    }

    pub fn hook_count(&self, uid: &Uid, stage: Lifecycle) -> usize {
        self.hooks
            .borrow()
            .get(uid)
            .map_or(0, |hooks| hooks.iter().filter(|(own, _)| *own == stage).count())
    }

    /// Drop every hook of an unmounted instance
    pub fn forget(&self, uid: &Uid) {
        self.hooks.borrow_mut().remove(uid);
    }

    pub fn dispatch_document(&self, event: &DomEvent) -> usize {
        let listeners: Vec<Listener> = self
            .document
            .borrow()
            .iter()
            .filter(|(_, name, _)| *name == event.name)
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn clipboard(&self) -> Option<String> {
        self.clipboard.borrow().clone()
    }

    /// Uids that requested an update since the last call, in request order
    pub fn take_updates(&self) -> Vec<Uid> {
        std::mem::take(&mut *self.updates.borrow_mut())
    }

    pub fn errors(&self) -> Vec<CapturedError> {
        self.errors.borrow().clone()
    }
}

impl Host for HeadlessHost {
    fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    fn resolve_component(&self, name: &str) -> Option<ComponentRef> {
        self.components.borrow().get(name).cloned()
    }

    fn resolve_directive(&self, name: &str) -> Option<Rc<dyn Directive>> {
        self.directives.borrow().get(name).cloned()
    }

    fn register_hook(&self, uid: &Uid, stage: Lifecycle, hook: HookFn) {
        self.hooks
            .borrow_mut()
            .entry(uid.clone())
            .or_default()
            .push((stage, hook));
    }

    fn element(&self, uid: &Uid) -> Option<Rc<dyn HostElement>> {
        self.headless_element(uid)
            .map(|element| element as Rc<dyn HostElement>)
    }

    fn request_update(&self, uid: &Uid) {
        self.updates.borrow_mut().push(uid.clone());
    }

    fn listen_document(&self, event: &str, listener: Listener) -> ListenerId {
        let id = next_listener_id();
        self.document
            .borrow_mut()
            .push((id, event.to_string(), listener));
        id
    }

    fn unlisten_document(&self, id: ListenerId) -> bool {
        let mut document = self.document.borrow_mut();
        let before = document.len();
        document.retain(|(own, _, _)| *own != id);
        document.len() != before
    }

    fn write_clipboard(&self, text: &str) -> Result<(), HandlerError> {
        *self.clipboard.borrow_mut() = Some(text.to_string());
        Ok(())
    }

    fn permission_checker(&self, name: &str) -> Option<PermissionFn> {
        self.permissions.borrow().get(name).cloned()
    }

    fn capture_error(&self, uid: Option<&Uid>, error: &EvalError) {
        let message = error.to_string();
        debug!(uid = ?uid, error = %message, "Error captured");
        self.errors.borrow_mut().push(CapturedError {
            uid: uid.cloned(),
            message: message.clone(),
        });
        if let Some(uid) = uid {
            self.run_hooks(uid, Lifecycle::ErrorCaptured, Some(&message));
        }
    }
}

/// What the harness attached to one live element
struct Bound {
    listeners: Vec<ListenerId>,
    directives: Vec<DirectiveTuple>,
    descendants: Vec<Uid>,
}

/// Mounts composed trees on a [`HeadlessHost`] and keeps them patched
pub struct Harness {
    host: Rc<HeadlessHost>,
    composer: Rc<Composer>,
    bound: HashMap<Uid, Bound>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ComposerConfig::default())
    }

    pub fn with_config(config: ComposerConfig) -> Self {
        let host = Rc::new(HeadlessHost::new());
        let composer = Composer::isolated(host.clone(), config);
        Self {
            host,
            composer,
            bound: HashMap::new(),
        }
    }

    pub fn host(&self) -> &Rc<HeadlessHost> {
        &self.host
    }

    pub fn composer(&self) -> &Rc<Composer> {
        &self.composer
    }

    pub fn element(&self, uid: &Uid) -> Option<Rc<HeadlessElement>> {
        self.host.headless_element(uid)
    }

    pub fn is_mounted(&self, uid: &Uid) -> bool {
        self.bound.contains_key(uid)
    }

    /// Compose a descriptor and mount the result
    pub fn render(&mut self, descriptor: &Descriptor) -> EvalResult<RenderNode> {
        let node = self.composer.compose(descriptor)?;
        self.mount_node(&node);
        self.flush_updates();
        Ok(node)
    }

    /// Deliver an event to a live element, then apply requested updates.
    /// Returns false when there is no element for `uid`.
    pub fn dispatch(&mut self, uid: &Uid, event: &DomEvent) -> bool {
        let Some(element) = self.element(uid) else {
            return false;
        };
        element.dispatch(event);
        self.flush_updates();
        true
    }

    /// Move an element's scroll position and fire `scroll` on it
    pub fn scroll(&mut self, uid: &Uid, metrics: ScrollMetrics) -> bool {
        let Some(element) = self.element(uid) else {
            return false;
        };
        element.set_scroll_metrics(metrics);
        self.dispatch(uid, &DomEvent::new("scroll"))
    }

    /// Advance virtual time, then apply requested updates
    pub fn advance(&mut self, by: Duration) -> usize {
        let fired = self.host.scheduler().advance(by);
        self.flush_updates();
        fired
    }

    /// Patch every element whose instance requested an update. Returns the
    /// number of patched instances.
    pub fn flush_updates(&mut self) -> usize {
        self.host.scheduler().run_microtasks();
        let mut patched = 0;
        loop {
            let pending = self.host.take_updates();
            if pending.is_empty() {
                return patched;
            }
            let mut seen = HashSet::new();
            for uid in pending {
                if seen.insert(uid.clone()) && self.patch(&uid) {
                    patched += 1;
                }
            }
            self.host.scheduler().run_microtasks();
        }
    }

    /// Unmount an instance and everything below it. Returns false when
    /// nothing was left to unmount.
    pub fn unmount(&mut self, uid: &Uid) -> bool {
        let was_mounted = self.bound.contains_key(uid);
        let mut subtree = vec![uid.clone()];
        if let Some(bound) = self.bound.get(uid) {
            subtree.extend(bound.descendants.iter().cloned());
        }

        if was_mounted {
            for member in &subtree {
                self.host.run_hooks(member, Lifecycle::BeforeUnmount, None);
            }
            self.teardown(uid);
            for member in subtree.iter().rev() {
                self.host.run_hooks(member, Lifecycle::Unmounted, None);
                self.host.forget(member);
            }
        }

        let released = self.composer.unmount(uid);
        debug!(uid = %uid, was_mounted, released, "Harness unmount");
        was_mounted || released
    }

    fn mount_node(&mut self, node: &RenderNode) {
        let RenderNode::Element(element) = node else {
            for child in node.children() {
                self.mount_node(child);
            }
            return;
        };
        let Some(uid) = element.uid.clone() else {
            for child in node.children() {
                self.mount_node(child);
            }
            return;
        };
        if self.bound.contains_key(&uid) {
            return;
        }

        self.host.run_hooks(&uid, Lifecycle::BeforeMount, None);
        let el = Rc::new(HeadlessElement::new(element.ty.name(), Some(uid.clone())));
        self.host.insert_element(el.clone());
        sync_attributes(&el, &element.attrs);
        let listeners = self.attach_listeners(&el, &uid, &element.listeners);

        for child in node.children() {
            self.mount_node(child);
        }
        let descendants: Vec<Uid> = node.uids().into_iter().skip(1).collect();
        el.set_descendants(descendants.iter().map(Uid::to_string).collect());

        let dyn_el: Rc<dyn HostElement> = el;
        let dyn_host: Rc<dyn Host> = self.host.clone();
        for tuple in &element.directives {
            tuple.implementation.mounted(&dyn_el, &tuple.binding, &dyn_host);
        }

        self.bound.insert(
            uid.clone(),
            Bound {
                listeners,
                directives: element.directives.clone(),
                descendants,
            },
        );
        self.host.run_hooks(&uid, Lifecycle::Mounted, None);
        trace!(uid = %uid, "Mounted");
    }

    fn attach_listeners(
        &self,
        el: &Rc<HeadlessElement>,
        uid: &Uid,
        handlers: &IndexMap<String, NormalizedHandler>,
    ) -> Vec<ListenerId> {
        let mut ids = Vec::new();
        for handler in handlers.values() {
            if handler.is_detached() {
                continue;
            }
            let handler = handler.clone();
            let host = Rc::downgrade(&self.host);
            let owner = Rc::downgrade(el);
            let target = uid.clone();
            let slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
            let own_id = slot.clone();
            let event = handler.event().to_string();
            let id = el.add_listener(
                &event,
                Rc::new(move |event: &DomEvent| {
                    if let Err(err) = handler.invoke(event) {
                        if let Some(host) = host.upgrade() {
                            host.capture_error(Some(&target), &EvalError::Handler(err));
                        }
                    }
                    if handler.is_detached() {
                        if let (Some(el), Some(id)) = (owner.upgrade(), own_id.get()) {
                            el.remove_listener(id);
                        }
                    }
                }),
            );
            slot.set(Some(id));
            ids.push(id);
        }
        ids
    }

    fn patch(&mut self, uid: &Uid) -> bool {
        let Some(tree) = self.composer.tree() else {
            return false;
        };
        let Some(node) = tree.find(uid).cloned() else {
            return false;
        };
        let RenderNode::Element(element) = &node else {
            // gate closed: the instance lives on without an element
            self.teardown(uid);
            return true;
        };
        if !self.bound.contains_key(uid) {
            self.mount_node(&node);
            return true;
        }
        let Some(el) = self.element(uid) else {
            return false;
        };

        let dyn_el: Rc<dyn HostElement> = el.clone();
        let dyn_host: Rc<dyn Host> = self.host.clone();
        let allowed = self.bound.get(uid).map_or(true, |bound| {
            bound
                .directives
                .iter()
                .all(|tuple| tuple.implementation.before_update(&dyn_el, &tuple.binding, &dyn_host))
        });
        if !allowed {
            debug!(uid = %uid, "Update vetoed by a directive");
            return false;
        }
        self.host.run_hooks(uid, Lifecycle::BeforeUpdate, None);

        sync_attributes(&el, &element.attrs);
        let old = self.bound.remove(uid);
        if let Some(old) = &old {
            for id in &old.listeners {
                el.remove_listener(*id);
            }
        }
        let listeners = self.attach_listeners(&el, uid, &element.listeners);

        let old_directives = old.as_ref().map(|old| old.directives.clone()).unwrap_or_default();
        for tuple in &element.directives {
            let existed = old_directives.iter().any(|o| o.binding.name == tuple.binding.name);
            if existed {
                tuple.implementation.updated(&dyn_el, &tuple.binding, &dyn_host);
            } else {
                tuple.implementation.mounted(&dyn_el, &tuple.binding, &dyn_host);
            }
        }
        for tuple in &old_directives {
            if element.directive(&tuple.binding.name).is_none() {
                tuple.implementation.before_unmount(&dyn_el, &tuple.binding, &dyn_host);
            }
        }

        let descendants: Vec<Uid> = node.uids().into_iter().skip(1).collect();
        if let Some(old) = &old {
            for gone in old.descendants.iter().filter(|d| !descendants.contains(d)) {
                self.teardown(gone);
            }
        }
        for child in node.children() {
            self.mount_new(child);
        }
        el.set_descendants(descendants.iter().map(Uid::to_string).collect());

        self.bound.insert(
            uid.clone(),
            Bound {
                listeners,
                directives: element.directives.clone(),
                descendants,
            },
        );
        self.host.run_hooks(uid, Lifecycle::Updated, None);
        true
    }

    /// Mount wrapped nodes in a subtree that have no element yet
    fn mount_new(&mut self, node: &RenderNode) {
        match node.uid() {
            Some(uid) if !self.bound.contains_key(uid) && !node.is_empty() => self.mount_node(node),
            _ => {
                for child in node.children() {
                    self.mount_new(child);
                }
            }
        }
    }

    /// Remove the element of `uid` and of everything mounted below it
    fn teardown(&mut self, uid: &Uid) {
        let Some(bound) = self.bound.remove(uid) else {
            return;
        };
        for descendant in &bound.descendants {
            self.teardown(descendant);
        }
        if let Some(el) = self.host.remove_element(uid) {
            let dyn_el: Rc<dyn HostElement> = el.clone();
            let dyn_host: Rc<dyn Host> = self.host.clone();
            for tuple in &bound.directives {
                tuple.implementation.before_unmount(&dyn_el, &tuple.binding, &dyn_host);
            }
            for id in &bound.listeners {
                el.remove_listener(*id);
            }
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

fn attribute_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Mirror node attributes onto an element, removing ones that went away
fn sync_attributes(el: &HeadlessElement, attrs: &Map<String, Value>) {
    for name in el.attribute_names() {
        if !attrs.contains_key(&name) && !name.starts_with("data-dc-") {
            el.remove_attribute(&name);
        }
    }
    for (name, value) in attrs {
        if value.is_null() {
            el.remove_attribute(name);
        } else {
            el.set_attribute(name, &attribute_text(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBinding;
    use serde_json::json;

    #[test]
    fn test_element_dispatch_fills_targets() {
        let el = HeadlessElement::new("button", Some("dc-1".into()));
        let seen = Rc::new(RefCell::new(None));
        let probe = seen.clone();
        el.add_listener(
            "click",
            Rc::new(move |event: &DomEvent| *probe.borrow_mut() = event.current_target.clone()),
        );
        assert_eq!(el.dispatch(&DomEvent::new("click")), 1);
        assert_eq!(el.dispatch(&DomEvent::new("keyup")), 0);
        assert_eq!(seen.borrow().as_deref(), Some("dc-1"));
    }

    #[test]
    fn test_contains_self_and_descendants() {
        let el = HeadlessElement::new("div", Some("dc-1".into()));
        el.set_descendants(vec!["dc-2".into()]);
        assert!(el.contains("dc-1"));
        assert!(el.contains("dc-2"));
        assert!(!el.contains("dc-3"));
    }

    #[test]
    fn test_capture_error_runs_error_hooks() {
        let host = HeadlessHost::new();
        let uid = Uid::from("dc-9");
        let seen = Rc::new(RefCell::new(None));
        let probe = seen.clone();
        host.register_hook(
            &uid,
            Lifecycle::ErrorCaptured,
            HookFn::new(move |args| *probe.borrow_mut() = args.error.map(str::to_string)),
        );
        host.capture_error(Some(&uid), &EvalError::Handler(HandlerError::new("boom")));
        assert_eq!(host.errors().len(), 1);
        assert_eq!(seen.borrow().as_deref(), Some("Handler failed: boom"));
    }

    #[test]
    fn test_harness_mount_and_unmount_order() {
        let mut harness = Harness::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let hook = |log: &Rc<RefCell<Vec<String>>>, tag: &'static str| {
            let log = log.clone();
            move |args: &HookArgs<'_>| log.borrow_mut().push(format!("{tag}:{}", args.stage))
        };
        let tree = Descriptor::new("ul")
            .with_hook(Lifecycle::Mounted, hook(&log, "ul"))
            .with_hook(Lifecycle::Unmounted, hook(&log, "ul"))
            .with_child(
                Descriptor::new("li")
                    .with_hook(Lifecycle::Mounted, hook(&log, "li"))
                    .with_hook(Lifecycle::Unmounted, hook(&log, "li")),
            );

        let node = harness.render(&tree).unwrap();
        let root = node.uid().cloned().unwrap();
        let item = node.children()[0].uid().cloned().unwrap();
        assert!(harness.element(&root).unwrap().contains(item.as_str()));
        assert_eq!(harness.element(&item).unwrap().attribute("data-uid"), Some(item.to_string()));

        assert!(harness.unmount(&root));
        assert!(!harness.unmount(&root));
        assert!(harness.element(&item).is_none());
        assert_eq!(
            *log.borrow(),
            vec!["li:mounted", "ul:mounted", "li:unmounted", "ul:unmounted"]
        );
    }

    #[test]
    fn test_once_listener_is_removed_after_first_run() {
        let mut harness = Harness::new();
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        let node = harness
            .render(&Descriptor::new("button").on(
                "click.once",
                EventBinding::new(move |_| {
                    seen.set(seen.get() + 1);
                    Ok(())
                }),
            ))
            .unwrap();
        let uid = node.uid().cloned().unwrap();

        harness.dispatch(&uid, &DomEvent::new("click"));
        harness.dispatch(&uid, &DomEvent::new("click"));
        assert_eq!(count.get(), 1);
        assert_eq!(harness.element(&uid).unwrap().listener_count("click"), 0);
    }

    #[test]
    fn test_model_attribute_follows_updates() {
        let mut harness = Harness::new();
        let node = harness
            .render(
                &Descriptor::new("input")
                    .with_namespace("f")
                    .with_prop("modelValue", json!({ "path": "q", "value": "a" })),
            )
            .unwrap();
        let uid = node.uid().cloned().unwrap();

        harness.dispatch(
            &uid,
            &DomEvent::new("update:modelValue").with_detail(json!("b")),
        );
        let el = harness.element(&uid).unwrap();
        assert_eq!(el.attribute("modelValue").as_deref(), Some("b"));
    }
}
