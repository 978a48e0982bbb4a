//! Calls the core makes into the host UI runtime.
//!
//! The host owns the live element tree, reactivity, and the lifecycle
//! scheduler. The core only needs the narrow surface below. The
//! [`crate::headless`] module provides an in-memory implementation.

use crate::directives::Directive;
use crate::error::{EvalError, HandlerError};
use crate::events::DomEvent;
use crate::lifecycle::{HookFn, Lifecycle};
use crate::scheduler::Scheduler;
use crate::vdom::{ComponentRef, Uid};
use serde_json::Value;
use std::any::Any;
use std::rc::Rc;

pub type Listener = Rc<dyn Fn(&DomEvent)>;

/// Checks a permission value, e.g. a permission code from `dcPermission`
pub type PermissionFn = Rc<dyn Fn(&Value) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, client_height: f64, scroll_height: f64) -> Self {
        Self {
            scroll_top,
            client_height,
            scroll_height,
        }
    }

    /// Within one pixel of the bottom
    pub fn at_bottom(&self) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height - 1.0
    }
}

/// Live element owned by the host
pub trait HostElement {
    fn uid(&self) -> Option<Uid>;

    fn attribute(&self, name: &str) -> Option<String>;
    fn set_attribute(&self, name: &str, value: &str);
    fn remove_attribute(&self, name: &str);
    fn attribute_names(&self) -> Vec<String>;

    fn style(&self, property: &str) -> Option<String>;
    /// `None` clears the property
    fn set_style(&self, property: &str, value: Option<&str>);

    fn set_inner_html(&self, html: &str);
    fn set_text_content(&self, text: &str);

    fn focus(&self);
    fn blur(&self);

    /// Whether the element with `uid` is this element or one of its descendants
    fn contains(&self, uid: &str) -> bool;

    fn add_listener(&self, event: &str, listener: Listener) -> ListenerId;
    fn remove_listener(&self, id: ListenerId) -> bool;

    fn scroll_metrics(&self) -> ScrollMetrics;

    /// Per-element storage for directive state
    fn stash(&self, key: &str, value: Rc<dyn Any>);
    fn stashed(&self, key: &str) -> Option<Rc<dyn Any>>;
    fn unstash(&self, key: &str) -> Option<Rc<dyn Any>>;
}

pub trait Host {
    /// Shared cooperative scheduler
    fn scheduler(&self) -> Scheduler;

    /// Dynamic component resolution
    fn resolve_component(&self, _name: &str) -> Option<ComponentRef> {
        None
    }

    /// Dynamic directive resolution
    fn resolve_directive(&self, _name: &str) -> Option<Rc<dyn Directive>> {
        None
    }

    /// Hooks from `beforeMount` on are run by the host
    fn register_hook(&self, uid: &Uid, stage: Lifecycle, hook: HookFn);

    /// Element carrying `data-uid = uid`, once mounted
    fn element(&self, uid: &Uid) -> Option<Rc<dyn HostElement>>;

    /// Ask the host to re-render an instance
    fn request_update(&self, uid: &Uid);

    fn listen_document(&self, event: &str, listener: Listener) -> ListenerId;
    fn unlisten_document(&self, id: ListenerId) -> bool;

    fn write_clipboard(&self, text: &str) -> Result<(), HandlerError>;

    fn permission_checker(&self, _name: &str) -> Option<PermissionFn> {
        None
    }

    /// Error boundary for failures with no caller to return to
    fn capture_error(&self, uid: Option<&Uid>, error: &EvalError);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_bottom_within_one_pixel() {
        assert!(ScrollMetrics::new(399.5, 100.0, 500.0).at_bottom());
        assert!(ScrollMetrics::new(400.0, 100.0, 500.0).at_bottom());
        assert!(!ScrollMetrics::new(398.0, 100.0, 500.0).at_bottom());
    }
}
