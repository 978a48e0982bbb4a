//! Per-instance state of a wrapped descriptor

use crate::cache::CacheKey;
use crate::context::ResolveCtx;
use crate::descriptor::Descriptor;
use crate::events::NormalizedHandler;
use crate::host::ListenerId;
use crate::lazy::LazyLoader;
use crate::model::ModelBinding;
use crate::scheduler::TimerId;
use crate::vdom::Uid;
use dcstruct_store::{ModelCell, SubscriptionId};
use indexmap::IndexMap;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;

/// Model cell bound by an instance
#[derive(Debug, Clone)]
pub struct BoundModel {
    /// Full store path, base path included
    pub path: String,
    pub binding: ModelBinding,
}

pub struct Instance {
    uid: Uid,
    pub(crate) descriptor: Descriptor,
    /// Context the instance was last resolved in
    pub(crate) ctx: RefCell<ResolveCtx>,
    /// Sibling key when rendered from a list
    pub(crate) slot: Option<String>,
    pub(crate) base_path: Option<String>,
    pub(crate) model: Option<BoundModel>,
    /// Namespace root seeded by this instance
    pub(crate) root_path: Option<String>,
    pub(crate) injected: Option<Value>,
    /// Overrides for the `dcIf` and `dcShow` directives
    pub(crate) condition: Cell<Option<bool>>,
    pub(crate) show: Cell<Option<bool>>,
    pub(crate) lazy: RefCell<Option<LazyLoader>>,
    pub(crate) handlers: RefCell<Option<IndexMap<String, NormalizedHandler>>>,
    pub(crate) cache_key: Cell<Option<CacheKey>>,
    /// Observer on the bound cell, dropped at unmount
    pub(crate) subscription: RefCell<Option<(ModelCell, SubscriptionId)>>,
    /// A store write landed mid-compose; rerender on the next tick
    pub(crate) rerender_queued: Cell<bool>,
    pub(crate) scroll_listener: Cell<Option<ListenerId>>,
    pub(crate) timers: RefCell<Vec<TimerId>>,
    pub(crate) mounted: Cell<bool>,
    pub(crate) unmounted: Cell<bool>,
}

impl Instance {
    pub(crate) fn new(
        uid: Uid,
        descriptor: Descriptor,
        ctx: ResolveCtx,
        slot: Option<String>,
        base_path: Option<String>,
    ) -> Self {
        Self {
            uid,
            descriptor,
            ctx: RefCell::new(ctx),
            slot,
            base_path,
            model: None,
            root_path: None,
            injected: None,
            condition: Cell::new(None),
            show: Cell::new(None),
            lazy: RefCell::new(None),
            handlers: RefCell::new(None),
            cache_key: Cell::new(None),
            subscription: RefCell::new(None),
            rerender_queued: Cell::new(false),
            scroll_listener: Cell::new(None),
            timers: RefCell::new(Vec::new()),
            mounted: Cell::new(false),
            unmounted: Cell::new(false),
        }
    }

    pub fn uid(&self) -> &Uid {
        &self.uid
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    pub fn model_path(&self) -> Option<&str> {
        self.model.as_ref().map(|model| model.path.as_str())
    }

    pub fn parent(&self) -> Option<Uid> {
        self.ctx.borrow().parent.clone()
    }

    /// Value injected through the descriptor's `inject` key
    pub fn injected(&self) -> Option<&Value> {
        self.injected.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted.get()
    }

    /// `(loaded, total)` of a lazy list
    pub fn lazy_progress(&self) -> Option<(usize, usize)> {
        self.lazy
            .borrow()
            .as_ref()
            .map(|lazy| (lazy.loaded_len(), lazy.total_len()))
    }

    /// Store paths this instance holds a binding on
    pub(crate) fn bound_paths(&self) -> Vec<String> {
        self.root_path
            .iter()
            .chain(self.model.as_ref().map(|model| &model.path))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("uid", &self.uid)
            .field("descriptor", &self.descriptor.display_name())
            .field("base_path", &self.base_path)
            .field("model", &self.model_path())
            .field("mounted", &self.mounted.get())
            .field("unmounted", &self.unmounted.get())
            .finish()
    }
}
