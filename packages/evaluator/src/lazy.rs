//! # Lazy Loader
//!
//! Reveals a long child list incrementally as its container is scrolled to
//! the bottom.
//!
//! Activated by the `dcLazy` directive on a node whose children are a list.
//! The first `num` children render immediately. When there are more, the
//! composer listens for scroll events on the mounted element and every
//! scroll that reaches the bottom reveals `step` more, until the whole list
//! is shown. Growth is monotonic; scrolling after the list is complete does
//! nothing.
//!
//! Progress is published on the element as `data-dc-lazy`,
//! `data-dc-loaded` and `data-dc-remain`.

use crate::config::LazyOptions;
use crate::descriptor::{Children, Descriptor, DirectiveSpec, DirectiveValue};
use crate::host::{HostElement, ScrollMetrics};
use serde_json::{Map, Value};
use tracing::debug;

pub const LAZY_ATTR: &str = "data-dc-lazy";
pub const LOADED_ATTR: &str = "data-dc-loaded";
pub const REMAIN_ATTR: &str = "data-dc-remain";

#[derive(Debug, Clone)]
pub struct LazyLoader {
    total: Vec<Descriptor>,
    loaded: usize,
    options: LazyOptions,
}

impl LazyLoader {
    pub fn new(total: Vec<Descriptor>, options: LazyOptions) -> Self {
        let options = LazyOptions {
            num: options.num,
            step: options.step.max(1),
        };
        let loaded = options.num.min(total.len());
        Self {
            total,
            loaded,
            options,
        }
    }

    /// Loader for a node, if its `dcLazy` directive is enabled and its
    /// children are a list
    pub fn activate(
        spec: Option<&DirectiveSpec>,
        children: Option<&Children>,
        defaults: LazyOptions,
    ) -> Option<LazyLoader> {
        let options = lazy_options(spec?, defaults)?;
        match children {
            Some(Children::Many(list)) => Some(Self::new(list.clone(), options)),
            _ => {
                debug!("dcLazy ignored: children are not a list");
                None
            }
        }
    }

    pub fn options(&self) -> LazyOptions {
        self.options
    }

    /// Children revealed so far, always a prefix of the full list
    pub fn loaded(&self) -> &[Descriptor] {
        &self.total[..self.loaded]
    }

    pub fn loaded_len(&self) -> usize {
        self.loaded
    }

    pub fn total_len(&self) -> usize {
        self.total.len()
    }

    pub fn remaining(&self) -> usize {
        self.total.len() - self.loaded
    }

    pub fn is_complete(&self) -> bool {
        self.loaded == self.total.len()
    }

    /// A scroll listener is only needed when the list exceeds the first batch
    pub fn needs_listener(&self) -> bool {
        self.total.len() > self.options.num
    }

    /// Reveal up to `step` more children. Returns false when already complete.
    pub fn grow(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }
        self.loaded = (self.loaded + self.options.step).min(self.total.len());
        debug!(loaded = self.loaded, total = self.total.len(), "Lazy list grew");
        true
    }

    /// Grow if the scroll position is at the bottom
    pub fn on_scroll(&mut self, metrics: &ScrollMetrics) -> bool {
        metrics.at_bottom() && self.grow()
    }

    /// Write progress counters into a node's attributes
    pub fn publish(&self, attrs: &mut Map<String, Value>) {
        attrs.insert(LAZY_ATTR.to_string(), Value::from(true));
        attrs.insert(LOADED_ATTR.to_string(), Value::from(self.loaded));
        attrs.insert(REMAIN_ATTR.to_string(), Value::from(self.remaining()));
    }

    /// Write progress counters onto a mounted element
    pub fn publish_to(&self, el: &dyn HostElement) {
        el.set_attribute(LAZY_ATTR, "true");
        el.set_attribute(LOADED_ATTR, &self.loaded.to_string());
        el.set_attribute(REMAIN_ATTR, &self.remaining().to_string());
    }
}

/// `true` → defaults, `{num, step}` → overrides, falsy → disabled
fn lazy_options(spec: &DirectiveSpec, defaults: LazyOptions) -> Option<LazyOptions> {
    let value = match spec {
        DirectiveSpec::Plain(value) => value.clone(),
        DirectiveSpec::Object(object) => object.value.clone(),
        DirectiveSpec::Many(objects) => objects.first()?.value.clone(),
    };
    match value.resolve() {
        Value::Object(map) => {
            let mut options = defaults;
            if let Some(num) = map.get("num").and_then(Value::as_u64) {
                options.num = num as usize;
            }
            if let Some(step) = map.get("step").and_then(Value::as_u64) {
                options.step = step as usize;
            }
            Some(options)
        }
        other if DirectiveValue::Data(other.clone()).is_truthy() => Some(defaults),
        _ => None,
    }
}
