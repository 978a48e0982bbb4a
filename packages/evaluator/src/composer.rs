//! # Composer
//!
//! Top-level entry point: turns a [`Descriptor`] into a [`RenderNode`] and
//! owns the instances created along the way.
//!
//! ## Pipeline
//!
//! For each wrapped descriptor:
//!
//! 1. find or create its instance (uid, setup hooks, model bindings)
//! 2. evaluate the conditional gate; a false gate yields an empty node and
//!    skips the cache
//! 3. render cache lookup
//! 4. namespace and provide scopes
//! 5. directive and event normalization
//! 6. type resolution
//! 7. children and slot resolution
//! 8. node production and caching
//!
//! Pure descriptors (`wrapper: false`) take the same route without an
//! instance, hooks, model or cache entry.
//!
//! ## Usage
//!
//! ```ignore
//! let composer = Composer::new(host);
//! let node = composer.compose(&descriptor)?;
//! composer.set_model(&uid, json!("Bob"))?;
//! composer.unmount(&uid);
//! ```

use crate::cache::{self, CacheKey, Position, RenderCache};
use crate::config::ComposerConfig;
use crate::context::{namespace_key, ResolveCtx, Scope};
use crate::descriptor::{Children, Descriptor, DescriptorId, DirectiveSpec};
use crate::directives::{
    evaluate_condition, normalize_directives, DirectiveTuple, CONDITIONAL_DIRECTIVE, LAZY_DIRECTIVE,
    SHOW_DIRECTIVE,
};
use crate::error::{Diagnostic, DiagnosticLevel, EvalError, EvalResult, HandlerError};
use crate::events::{cancel_all, normalize_events, DomEvent, EventContext, NormalizedHandler};
use crate::host::{Host, ScrollMetrics};
use crate::instance::{BoundModel, Instance};
use crate::lazy::LazyLoader;
use crate::lifecycle::{HookArgs, HookFn, Lifecycle};
use crate::model::{join_path, ModelSpec, MODEL_PROP, MODEL_UPDATE_EVENT};
use crate::registry::{self, ResolutionGuard};
use crate::resolver::{self, DEFAULT_SLOT};
use crate::type_resolver::resolve_type;
use crate::validator::validate_descriptor;
use crate::vdom::{ElementNode, RenderNode, ResolvedType, Uid, UID_ATTR};
use dcstruct_store::{global, PathStore};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, instrument, warn};

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

fn next_uid() -> Uid {
    Uid::new(format!("dc-{}", NEXT_UID.fetch_add(1, Ordering::Relaxed)))
}

/// Position of an instance in the tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InstanceKey {
    parent: Option<Uid>,
    descriptor: DescriptorId,
    slot: Option<String>,
}

/// Everything a produced node carries besides its type and children
struct NodeParts {
    key: Option<String>,
    uid: Option<Uid>,
    attrs: Map<String, Value>,
    listeners: IndexMap<String, NormalizedHandler>,
    directives: Vec<DirectiveTuple>,
}

pub struct Composer {
    weak: Weak<Composer>,
    host: Rc<dyn Host>,
    store: PathStore,
    cache: RenderCache,
    config: ComposerConfig,
    instances: RefCell<IndexMap<Uid, Rc<Instance>>>,
    positions: RefCell<HashMap<InstanceKey, Uid>>,
    diagnostics: RefCell<Vec<Diagnostic>>,
    /// Last composed root, kept current by `rerender`
    tree: RefCell<Option<RenderNode>>,
    /// Innermost instance whose subtree failed during the current compose
    failed_under: RefCell<Option<Uid>>,
}

impl Composer {
    /// Composer over this thread's shared store and render cache
    pub fn new(host: Rc<dyn Host>) -> Rc<Composer> {
        Self::with_parts(host, ComposerConfig::default(), global::store(), cache::shared())
    }

    /// Composer with its own store and cache
    pub fn isolated(host: Rc<dyn Host>, config: ComposerConfig) -> Rc<Composer> {
        let cache = RenderCache::new(config.cache_capacity);
        Self::with_parts(host, config, PathStore::new(), cache)
    }

    pub fn with_parts(
        host: Rc<dyn Host>,
        config: ComposerConfig,
        store: PathStore,
        cache: RenderCache,
    ) -> Rc<Composer> {
        Rc::new_cyclic(|weak| Composer {
            weak: weak.clone(),
            host,
            store,
            cache,
            config,
            instances: RefCell::new(IndexMap::new()),
            positions: RefCell::new(HashMap::new()),
            diagnostics: RefCell::new(Vec::new()),
            tree: RefCell::new(None),
            failed_under: RefCell::new(None),
        })
    }

    pub fn host(&self) -> &Rc<dyn Host> {
        &self.host
    }

    pub fn store(&self) -> &PathStore {
        &self.store
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Last composed tree
    pub fn tree(&self) -> Option<RenderNode> {
        self.tree.borrow().clone()
    }

    pub fn instance(&self, uid: &Uid) -> Option<Rc<Instance>> {
        self.instances.borrow().get(uid).cloned()
    }

    /// Uids of live instances in creation order
    pub fn instance_uids(&self) -> Vec<Uid> {
        self.instances.borrow().keys().cloned().collect()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }

    pub(crate) fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.level {
            DiagnosticLevel::Warning => warn!(uid = ?diagnostic.uid, "{}", diagnostic.message),
            DiagnosticLevel::Error => warn!(uid = ?diagnostic.uid, error = true, "{}", diagnostic.message),
        }
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    /// Compose a descriptor tree from the root scope
    #[instrument(skip_all, fields(descriptor = %descriptor.display_name()))]
    pub fn compose(&self, descriptor: &Descriptor) -> EvalResult<RenderNode> {
        self.compose_scoped(descriptor, Scope::root())
    }

    /// Compose under values already provided by the host
    pub fn compose_scoped(&self, descriptor: &Descriptor, scope: Scope) -> EvalResult<RenderNode> {
        let ctx = ResolveCtx {
            scope,
            parent: None,
            depth: 0,
        };
        let result = self.resolving(|| self.compose_node(descriptor, &ctx, None));
        match result {
            Ok(node) => {
                *self.tree.borrow_mut() = Some(node.clone());
                Ok(node)
            }
            Err(err) => Err(self.surface(err)),
        }
    }

    /// Resolve children outside of any descriptor
    pub fn resolve(&self, children: &Children) -> EvalResult<Vec<RenderNode>> {
        let ctx = ResolveCtx::default();
        self.resolving(|| resolver::resolve_children(self, children, &ctx))
            .map_err(|err| self.surface(err))
    }

    fn resolving<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = ResolutionGuard::enter();
        f()
    }

    /// Hand a fatal error to the host's error boundary
    fn surface(&self, err: EvalError) -> EvalError {
        let uid = self.failed_under.borrow_mut().take();
        warn!(error = %err, uid = ?uid, "Composition failed");
        self.host.capture_error(uid.as_ref(), &err);
        err
    }

    pub(crate) fn compose_node(
        &self,
        descriptor: &Descriptor,
        ctx: &ResolveCtx,
        slot: Option<String>,
    ) -> EvalResult<RenderNode> {
        let max = self.config.max_resolve_depth;
        if ctx.depth > max {
            return Err(EvalError::Depth {
                name: descriptor.display_name(),
                max,
            });
        }
        validate_descriptor(descriptor)?;

        if !descriptor.wrapper {
            return self.compose_pure(descriptor, ctx, slot);
        }

        let instance = self.instance_for(descriptor, ctx, slot.clone());
        *instance.ctx.borrow_mut() = ctx.clone();
        let uid = instance.uid().clone();

        if !self.condition_of(&instance) {
            debug!(uid = %uid, "Conditional gate closed");
            return Ok(RenderNode::Empty { uid: Some(uid) });
        }

        let cacheable = cache::is_cacheable(descriptor)
            && instance.show.get().is_none()
            && instance.lazy.borrow().is_none();
        let model_value = instance.model_path().and_then(|path| self.store.value(path));
        let key = CacheKey::for_descriptor(
            descriptor,
            &Position {
                parent: Some(uid.as_str()),
                slot: slot.as_deref(),
                base_path: instance.base_path(),
                model: model_value.as_ref(),
            },
        );
        if cacheable {
            if let Some(node) = self.cache.get(&key) {
                debug!(uid = %uid, "Render cache hit");
                return Ok(node);
            }
        }

        let node = match self.render_instance(&instance, ctx) {
            Ok(node) => node,
            Err(err) => {
                self.failed_under.borrow_mut().get_or_insert(uid);
                return Err(err);
            }
        };

        if cacheable {
            self.cache.set(key, node.clone());
            instance.cache_key.set(Some(key));
        }
        Ok(node)
    }

    fn compose_pure(
        &self,
        descriptor: &Descriptor,
        ctx: &ResolveCtx,
        slot: Option<String>,
    ) -> EvalResult<RenderNode> {
        if !evaluate_condition(descriptor.directives.get(CONDITIONAL_DIRECTIVE)) {
            return Ok(RenderNode::empty());
        }
        if descriptor.directives.contains_key(LAZY_DIRECTIVE) {
            debug!(descriptor = %descriptor.display_name(), "dcLazy needs a wrapped node; rendering every child");
        }

        let base_path = self.base_path_for(descriptor, ctx);
        let scope = self.scope_for(descriptor, ctx, base_path.as_deref(), false);
        let child_ctx = ctx.child(scope, None);

        let directives = self.normalize(&descriptor.directives, None);
        let listeners = normalize_events(&descriptor.events, &self.event_context(None))?;
        let ty = resolve_type(&descriptor.ty, &*self.host)?;

        let parts = NodeParts {
            key: descriptor.key.clone().or(slot),
            uid: None,
            attrs: descriptor.props.clone(),
            listeners,
            directives,
        };
        self.produce(descriptor, ty, parts, descriptor.children.as_ref(), &child_ctx)
    }

    fn render_instance(&self, instance: &Rc<Instance>, ctx: &ResolveCtx) -> EvalResult<RenderNode> {
        let descriptor = &instance.descriptor;
        let uid = instance.uid().clone();

        let provides_namespace = descriptor.namespace.is_some() || instance.model.is_some();
        let scope = self.scope_for(descriptor, ctx, instance.base_path(), provides_namespace);
        let child_ctx = ctx.child(scope, Some(uid.clone()));

        let mut attrs = descriptor.props.clone();
        attrs.insert(UID_ATTR.to_string(), Value::String(uid.to_string()));
        if let Some(model) = &instance.model {
            let current = self.store.value(&model.path).unwrap_or(Value::Null);
            attrs.insert(MODEL_PROP.to_string(), current);
        }

        let mut directive_map = descriptor.directives.clone();
        if let Some(show) = instance.show.get() {
            directive_map.insert(SHOW_DIRECTIVE.to_string(), DirectiveSpec::value(show));
        }
        let directives = self.normalize(&directive_map, Some(&uid));
        let listeners = self.handlers_for(instance)?;
        let ty = resolve_type(&descriptor.ty, &*self.host)?;

        let lazy_children = instance.lazy.borrow().as_ref().map(|lazy| {
            if lazy.needs_listener() {
                lazy.publish(&mut attrs);
            }
            Children::Many(lazy.loaded().to_vec())
        });
        let children = lazy_children.as_ref().or(descriptor.children.as_ref());

        let parts = NodeParts {
            key: descriptor.key.clone().or_else(|| instance.slot.clone()),
            uid: Some(uid),
            attrs,
            listeners,
            directives,
        };
        self.produce(descriptor, ty, parts, children, &child_ctx)
    }

    /// Resolve children and slots and build the node for a resolved type
    fn produce(
        &self,
        descriptor: &Descriptor,
        ty: ResolvedType,
        parts: NodeParts,
        children: Option<&Children>,
        child_ctx: &ResolveCtx,
    ) -> EvalResult<RenderNode> {
        let child_nodes = match children {
            Some(children) => resolver::resolve_children(self, children, child_ctx)?,
            None => Vec::new(),
        };
        let mut slots = match &descriptor.slots {
            Some(slots) => resolver::resolve_slots(self, slots, child_ctx)?,
            None => IndexMap::new(),
        };

        let mut element = match ty {
            ResolvedType::Function(component) => {
                let rendered = component.render(&parts.attrs, &child_nodes);
                let RenderNode::Element(mut element) = rendered else {
                    return Ok(rendered);
                };
                element.children.extend(slots.shift_remove(DEFAULT_SLOT).unwrap_or_default());
                element.slots.extend(slots);
                for (name, value) in parts.attrs {
                    element.attrs.entry(name).or_insert(value);
                }
                element.uid = parts.uid;
                element.key = parts.key.or(element.key);
                element.listeners.extend(parts.listeners);
                element.directives.extend(parts.directives);
                return Ok(RenderNode::Element(element));
            }
            ResolvedType::Inline(inner) => {
                let mut inner_descriptor = (*inner).clone();
                for (name, value) in &descriptor.props {
                    inner_descriptor.props.insert(name.clone(), value.clone());
                }
                let body = self.compose_node(&inner_descriptor, child_ctx, None)?;
                let mut element = ElementNode::new(ResolvedType::Inline(inner));
                element.children.push(body);
                if !child_nodes.is_empty() {
                    slots.insert(DEFAULT_SLOT.to_string(), child_nodes);
                }
                element
            }
            other => {
                let mut element = ElementNode::new(other);
                element.children = child_nodes;
                element
            }
        };

        element.key = parts.key;
        element.uid = parts.uid;
        element.attrs = parts.attrs;
        element.listeners = parts.listeners;
        element.directives = parts.directives;
        element.slots = slots;
        Ok(RenderNode::Element(element))
    }

    fn normalize(
        &self,
        directives: &IndexMap<String, DirectiveSpec>,
        uid: Option<&Uid>,
    ) -> Vec<DirectiveTuple> {
        let mut diagnostics = Vec::new();
        let tuples = normalize_directives(directives, &*self.host, uid, &mut diagnostics);
        for diagnostic in diagnostics {
            self.report(diagnostic);
        }
        tuples
    }

    fn event_context(&self, uid: Option<&Uid>) -> EventContext {
        let host = Rc::downgrade(&self.host);
        let uid = uid.cloned();
        let mut cx = EventContext::new(self.host.scheduler());
        cx.default_rate_limit_ms = self.config.default_rate_limit_ms;
        cx.on_deferred_error = Rc::new(move |err: HandlerError| match host.upgrade() {
            Some(host) => host.capture_error(uid.as_ref(), &EvalError::Handler(err)),
            None => warn!(error = %err, "Deferred handler failed after host was dropped"),
        });
        cx
    }

    /// Normalized handlers of an instance, built once and reused across renders
    fn handlers_for(&self, instance: &Instance) -> EvalResult<IndexMap<String, NormalizedHandler>> {
        if let Some(handlers) = instance.handlers.borrow().as_ref() {
            return Ok(handlers.clone());
        }

        let uid = instance.uid().clone();
        let mut handlers = normalize_events(&instance.descriptor.events, &self.event_context(Some(&uid)))?;
        if instance.model.is_some() {
            // a user listener on the update event hears the whole namespace
            // model after each accepted write
            let emit = handlers.shift_remove(MODEL_UPDATE_EVENT);
            let weak = self.weak.clone();
            let target = uid.clone();
            let listener = NormalizedHandler::from_fn(MODEL_UPDATE_EVENT, move |event| {
                let Some(composer) = weak.upgrade() else {
                    return Ok(());
                };
                let changed = composer
                    .set_model(&target, event.detail.clone())
                    .map_err(|err| HandlerError::new(err.to_string()))?;
                match &emit {
                    Some(emit) if changed => emit.invoke(&composer.namespace_event(&target, event)),
                    _ => Ok(()),
                }
            });
            handlers.insert(MODEL_UPDATE_EVENT.to_string(), listener);
        }

        *instance.handlers.borrow_mut() = Some(handlers.clone());
        Ok(handlers)
    }

    /// `event` carrying the raw model under the instance's base path
    fn namespace_event(&self, uid: &Uid, event: &DomEvent) -> DomEvent {
        let base = self.instance(uid).and_then(|instance| instance.base_path.clone());
        let mut emitted = event.clone();
        emitted.detail = self.raw_model(base.as_deref());
        emitted
    }

    /// Base path of a descriptor: the parent's, extended by its own namespace
    fn base_path_for(&self, descriptor: &Descriptor, ctx: &ResolveCtx) -> Option<String> {
        let own = descriptor.namespace.as_ref().map(|namespace| namespace.to_string());
        join_path(ctx.base_path().as_deref(), own.as_deref())
    }

    fn scope_for(
        &self,
        descriptor: &Descriptor,
        ctx: &ResolveCtx,
        base_path: Option<&str>,
        provides_namespace: bool,
    ) -> Scope {
        let mut scope = ctx.scope.clone();
        if provides_namespace || descriptor.namespace.is_some() {
            if let Some(path) = base_path {
                scope = scope.provide(namespace_key(), Value::String(path.to_string()));
            }
        }
        if let Some(provide) = &descriptor.provide {
            scope = scope.provide(provide.key.clone(), provide.value.clone());
        }
        scope
    }

    fn instance_for(&self, descriptor: &Descriptor, ctx: &ResolveCtx, slot: Option<String>) -> Rc<Instance> {
        let key = InstanceKey {
            parent: ctx.parent.clone(),
            descriptor: descriptor.id(),
            slot: slot.clone(),
        };
        let existing = self.positions.borrow().get(&key).cloned();
        if let Some(instance) = existing.and_then(|uid| self.instance(&uid)) {
            if !instance.is_unmounted() {
                return instance;
            }
        }

        let uid = next_uid();
        let base_path = self.base_path_for(descriptor, ctx);
        let mut instance = Instance::new(uid.clone(), descriptor.clone(), ctx.clone(), slot, base_path);
        self.bind_model(&mut instance);
        instance.injected = descriptor.inject.as_ref().and_then(|key| ctx.scope.inject(key));
        *instance.lazy.get_mut() = LazyLoader::activate(
            descriptor.directives.get(LAZY_DIRECTIVE),
            descriptor.children.as_ref(),
            self.config.lazy,
        );

        let instance = Rc::new(instance);
        self.instances.borrow_mut().insert(uid.clone(), instance.clone());
        self.positions.borrow_mut().insert(key, uid.clone());
        debug!(uid = %uid, descriptor = %descriptor.display_name(), base_path = ?instance.base_path(), "Instance created");

        self.run_setup_hooks(&instance);
        instance
    }

    /// Seed namespace roots and bind model cells
    fn bind_model(&self, instance: &mut Instance) {
        let Some(spec) = ModelSpec::from_props(&instance.descriptor.props) else {
            return;
        };
        match spec {
            ModelSpec::Defaults(defaults) => {
                let Some(base) = instance.base_path.clone() else {
                    debug!(uid = %instance.uid(), "Model defaults outside a namespace ignored");
                    return;
                };
                self.store.set(&base, Some(defaults));
                self.store.bind(&base);
                instance.root_path = Some(base);
            }
            ModelSpec::Binding(binding) => {
                let Some(path) = join_path(instance.base_path.as_deref(), Some(binding.path.as_str())) else {
                    return;
                };
                if !self.store.has(&path) {
                    self.store.set(&path, binding.value.clone());
                } else if binding.immediate {
                    self.overwrite(&path, binding.value.clone());
                }
                self.store.bind(&path);
                self.observe(instance, &path);
                debug!(path = %path, "Model bound");
                instance.model = Some(BoundModel { path, binding });
            }
        }
    }

    /// Write over an existing entry. Cells are written in place so their
    /// observers stay attached.
    fn overwrite(&self, path: &str, value: Option<Value>) {
        let updated = match &value {
            Some(value) if !value.is_object() => self.store.update(path, value.clone()),
            _ => false,
        };
        if !updated {
            self.store.set(path, value);
        }
    }

    /// Follow the cell at `path`: any write to it, from any owner, re-resolves
    /// the instance
    fn observe(&self, instance: &Instance, path: &str) {
        if let Some((cell, id)) = instance.subscription.borrow_mut().take() {
            cell.unsubscribe(id);
        }
        let Some(cell) = self.store.cell(path) else {
            return;
        };
        let weak = self.weak.clone();
        let uid = instance.uid().clone();
        let id = cell.subscribe(move |_| {
            if let Some(composer) = weak.upgrade() {
                composer.model_changed(&uid);
            }
        });
        *instance.subscription.borrow_mut() = Some((cell, id));
    }

    /// A bound cell changed. Stale cache entries go at once; the instance is
    /// re-resolved now, or on the next tick when a compose is under way.
    fn model_changed(&self, uid: &Uid) {
        let Some(instance) = self.instance(uid).filter(|instance| !instance.is_unmounted()) else {
            return;
        };
        self.invalidate_lineage(&instance);
        if !self.is_composing() {
            self.rerender_changed(uid);
            return;
        }
        if instance.rerender_queued.replace(true) {
            return;
        }
        let weak = self.weak.clone();
        let target = uid.clone();
        self.host.scheduler().next_tick(move || {
            let Some(composer) = weak.upgrade() else {
                return;
            };
            if let Some(instance) = composer.instance(&target) {
                instance.rerender_queued.set(false);
            }
            composer.rerender_changed(&target);
        });
    }

    fn rerender_changed(&self, uid: &Uid) {
        match self.rerender(uid) {
            Ok(_) => self.host.request_update(uid),
            Err(EvalError::UnknownInstance { .. }) => {
                debug!(uid = %uid, "Model changed after unmount");
            }
            // already handed to the host by `rerender`
            Err(err) => debug!(uid = %uid, error = %err, "Rerender after model change failed"),
        }
    }

    fn run_setup_hooks(&self, instance: &Rc<Instance>) {
        let uid = instance.uid();
        let hooks = instance.descriptor.merged_hooks();
        for stage in Lifecycle::ALL {
            let Some(hook) = hooks.get(&stage) else {
                continue;
            };
            if stage.runs_at_setup() {
                hook.call(&HookArgs {
                    uid,
                    stage,
                    error: None,
                });
            } else {
                self.host.register_hook(uid, stage, hook.clone());
            }
        }

        let weak = self.weak.clone();
        self.host.register_hook(
            uid,
            Lifecycle::Mounted,
            HookFn::new(move |args| {
                if let Some(composer) = weak.upgrade() {
                    if let Err(err) = composer.mount(args.uid) {
                        composer.host.capture_error(Some(args.uid), &err);
                    }
                }
            }),
        );
        let weak = self.weak.clone();
        self.host.register_hook(
            uid,
            Lifecycle::BeforeUnmount,
            HookFn::new(move |args| {
                if let Some(composer) = weak.upgrade() {
                    composer.unmount(args.uid);
                }
            }),
        );
    }

    fn condition_of(&self, instance: &Instance) -> bool {
        instance
            .condition
            .get()
            .unwrap_or_else(|| evaluate_condition(instance.descriptor.directives.get(CONDITIONAL_DIRECTIVE)))
    }

    fn show_of(&self, instance: &Instance) -> bool {
        instance.show.get().unwrap_or_else(|| {
            instance
                .descriptor
                .directives
                .get(SHOW_DIRECTIVE)
                .map_or(true, |spec| evaluate_condition(Some(spec)))
        })
    }

    fn live_instance(&self, uid: &Uid) -> EvalResult<Rc<Instance>> {
        self.instance(uid)
            .filter(|instance| !instance.is_unmounted())
            .ok_or_else(|| EvalError::UnknownInstance { uid: uid.clone() })
    }

    /// Drop cached nodes of an instance and every wrapped ancestor
    fn invalidate_lineage(&self, instance: &Instance) {
        self.cache.remove_descriptor(instance.descriptor.id());
        instance.cache_key.set(None);
        let mut parent = instance.parent();
        while let Some(uid) = parent {
            let Some(ancestor) = self.instance(&uid) else {
                break;
            };
            self.cache.remove_descriptor(ancestor.descriptor.id());
            ancestor.cache_key.set(None);
            parent = ancestor.parent();
        }
    }

    /// Re-resolve one instance in place
    pub fn rerender(&self, uid: &Uid) -> EvalResult<RenderNode> {
        let instance = self.live_instance(uid)?;
        self.invalidate_lineage(&instance);
        let ctx = instance.ctx.borrow().clone();
        let node = self
            .resolving(|| self.compose_node(&instance.descriptor, &ctx, instance.slot.clone()))
            .map_err(|err| self.surface(err))?;

        if let Some(tree) = self.tree.borrow_mut().as_mut() {
            if let Some(target) = tree.find_mut(uid) {
                *target = node.clone();
            }
        }
        debug!(uid = %uid, "Instance re-rendered");
        Ok(node)
    }

    /// Attach what needs a live element: the lazy scroll listener
    pub fn mount(&self, uid: &Uid) -> EvalResult<()> {
        let instance = self.live_instance(uid)?;
        instance.mounted.set(true);

        let needs_listener = instance
            .lazy
            .borrow()
            .as_ref()
            .map_or(false, LazyLoader::needs_listener);
        if !needs_listener || instance.scroll_listener.get().is_some() {
            return Ok(());
        }
        let Some(el) = self.host.element(uid) else {
            debug!(uid = %uid, "No element for lazy list; scroll listener not attached");
            return Ok(());
        };

        let weak = self.weak.clone();
        let target = uid.clone();
        let id = el.add_listener(
            "scroll",
            Rc::new(move |_event| {
                let Some(composer) = weak.upgrade() else {
                    return;
                };
                let Some(el) = composer.host.element(&target) else {
                    return;
                };
                if let Err(err) = composer.scroll(&target, el.scroll_metrics()) {
                    composer.host.capture_error(Some(&target), &err);
                }
            }),
        );
        instance.scroll_listener.set(Some(id));
        if let Some(lazy) = instance.lazy.borrow().as_ref() {
            lazy.publish_to(&*el);
        }
        debug!(uid = %uid, "Lazy scroll listener attached");
        Ok(())
    }

    /// Feed a scroll position to a lazy list. Returns true when it grew.
    pub fn scroll(&self, uid: &Uid, metrics: ScrollMetrics) -> EvalResult<bool> {
        let instance = self.live_instance(uid)?;
        let grew = instance
            .lazy
            .borrow_mut()
            .as_mut()
            .map_or(false, |lazy| lazy.on_scroll(&metrics));
        if !grew {
            return Ok(false);
        }

        if let (Some(el), Some(lazy)) = (self.host.element(uid), instance.lazy.borrow().as_ref()) {
            lazy.publish_to(&*el);
        }
        self.rerender(uid)?;
        self.host.request_update(uid);
        Ok(true)
    }

    /// Tear down an instance and its descendants. Returns false when there
    /// was nothing left to unmount.
    pub fn unmount(&self, uid: &Uid) -> bool {
        let Some(instance) = self.instance(uid) else {
            return false;
        };
        if instance.unmounted.replace(true) {
            return false;
        }

        let children: Vec<Uid> = self
            .instances
            .borrow()
            .values()
            .filter(|child| child.parent().as_ref() == Some(uid))
            .map(|child| child.uid().clone())
            .collect();
        for child in &children {
            self.unmount(child);
        }

        if let Some(handlers) = instance.handlers.borrow().as_ref() {
            cancel_all(handlers.values());
        }
        if let Some(id) = instance.scroll_listener.take() {
            if let Some(el) = self.host.element(uid) {
                el.remove_listener(id);
            }
        }
        let scheduler = self.host.scheduler();
        for timer in instance.timers.borrow_mut().drain(..) {
            scheduler.clear_timeout(timer);
        }
        if let Some((cell, id)) = instance.subscription.borrow_mut().take() {
            cell.unsubscribe(id);
        }
        for path in instance.bound_paths() {
            self.store.release(&path);
        }

        self.invalidate_lineage(&instance);
        self.instances.borrow_mut().shift_remove(uid);
        self.positions.borrow_mut().retain(|_, owner| *owner != *uid);
        debug!(uid = %uid, children = children.len(), "Instance unmounted");
        true
    }

    /// Flip the conditional gate, then flip it back on the next tick,
    /// optionally after a further delay
    pub fn refresh(&self, uid: &Uid, state: Option<bool>, delay: Option<Duration>) -> EvalResult<()> {
        let instance = self.live_instance(uid)?;
        let value = state.unwrap_or(!self.condition_of(&instance));
        self.set_condition(uid, value)?;

        let weak = self.weak.clone();
        let target = uid.clone();
        let scheduler = self.host.scheduler();
        self.host.scheduler().next_tick(move || {
            let Some(composer) = weak.upgrade() else {
                return;
            };
            let Some(delay) = delay else {
                composer.restore_condition(&target, !value);
                return;
            };
            let timer_owner = Rc::downgrade(&composer);
            let timer_target = target.clone();
            let id = scheduler.set_timeout(delay, move || {
                if let Some(composer) = timer_owner.upgrade() {
                    composer.restore_condition(&timer_target, !value);
                }
            });
            match composer.instance(&target) {
                Some(instance) => instance.timers.borrow_mut().push(id),
                None => {
                    scheduler.clear_timeout(id);
                }
            }
        });
        Ok(())
    }

    fn restore_condition(&self, uid: &Uid, value: bool) {
        match self.set_condition(uid, value) {
            Ok(()) => {}
            Err(EvalError::UnknownInstance { .. }) => {
                debug!(uid = %uid, "Refresh target gone before restore");
            }
            Err(err) => self.host.capture_error(Some(uid), &err),
        }
    }

    fn set_condition(&self, uid: &Uid, value: bool) -> EvalResult<()> {
        let instance = self.live_instance(uid)?;
        instance.condition.set(Some(value));
        self.rerender(uid)?;
        self.host.request_update(uid);
        Ok(())
    }

    /// Toggle (or set) visibility. Returns the new state.
    pub fn toggle_show(&self, uid: &Uid, state: Option<bool>) -> EvalResult<bool> {
        let instance = self.live_instance(uid)?;
        let value = state.unwrap_or(!self.show_of(&instance));
        instance.show.set(Some(value));
        self.rerender(uid)?;
        self.host.request_update(uid);
        Ok(value)
    }

    /// Write the instance's bound model value.
    ///
    /// Number bindings coerce, clamp and round; a value that cannot be
    /// coerced is rejected. Every instance bound to the same path is
    /// re-resolved. Returns true when the store changed.
    pub fn set_model(&self, uid: &Uid, value: Value) -> EvalResult<bool> {
        let instance = self.live_instance(uid)?;
        let Some(model) = instance.model.as_ref() else {
            debug!(uid = %uid, "set_model on an instance without a binding");
            return Ok(false);
        };
        let Some(value) = model.binding.coerce(value) else {
            debug!(uid = %uid, path = %model.path, "Model value rejected by number coercion");
            return Ok(false);
        };
        if self.store.value(&model.path).as_ref() == Some(&value) {
            return Ok(false);
        }
        debug!(uid = %uid, path = %model.path, "Model updated");
        if !self.store.update(&model.path, value.clone()) {
            // the entry was dropped from under the binding
            self.store.set(&model.path, Some(value));
            self.observe(&instance, &model.path);
            self.model_changed(uid);
        }
        Ok(true)
    }

    pub fn get_model(&self, uid: &Uid) -> Option<Value> {
        let instance = self.instance(uid)?;
        self.store.value(instance.model_path()?)
    }

    /// Nested object of stored values, optionally under a prefix
    pub fn raw_model(&self, prefix: Option<&str>) -> Value {
        self.store.to_raw_object(prefix)
    }

    pub fn call_method(&self, uid: &Uid, name: &str, args: &[Value]) -> EvalResult<Value> {
        let instance = self.live_instance(uid)?;
        let method = instance.descriptor.methods.get(name).ok_or_else(|| {
            EvalError::Handler(HandlerError::new(format!(
                "Method '{name}' is not defined on {uid}"
            )))
        })?;
        Ok(method.call(args))
    }

    /// Whether a compose or rerender is in progress on this thread
    pub fn is_composing(&self) -> bool {
        registry::is_resolving()
    }
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("instances", &self.instances.borrow().len())
            .field("config", &self.config)
            .finish()
    }
}
