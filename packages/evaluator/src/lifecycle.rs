//! Lifecycle stages and hook callbacks

use crate::vdom::Uid;
use serde::Serialize;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
    BeforeCreate,
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
    ErrorCaptured,
    Activated,
    Deactivated,
}

impl Lifecycle {
    pub const ALL: [Lifecycle; 11] = [
        Lifecycle::BeforeCreate,
        Lifecycle::Created,
        Lifecycle::BeforeMount,
        Lifecycle::Mounted,
        Lifecycle::BeforeUpdate,
        Lifecycle::Updated,
        Lifecycle::BeforeUnmount,
        Lifecycle::Unmounted,
        Lifecycle::ErrorCaptured,
        Lifecycle::Activated,
        Lifecycle::Deactivated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::BeforeCreate => "beforeCreate",
            Lifecycle::Created => "created",
            Lifecycle::BeforeMount => "beforeMount",
            Lifecycle::Mounted => "mounted",
            Lifecycle::BeforeUpdate => "beforeUpdate",
            Lifecycle::Updated => "updated",
            Lifecycle::BeforeUnmount => "beforeUnmount",
            Lifecycle::Unmounted => "unmounted",
            Lifecycle::ErrorCaptured => "errorCaptured",
            Lifecycle::Activated => "activated",
            Lifecycle::Deactivated => "deactivated",
        }
    }

    pub fn parse(name: &str) -> Option<Lifecycle> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == name)
    }

    /// Stages that run while the instance is being set up, before the host
    /// ever sees it. These are invoked by the composer directly.
    pub fn runs_at_setup(self) -> bool {
        matches!(self, Lifecycle::BeforeCreate | Lifecycle::Created)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments handed to a hook
#[derive(Debug, Clone)]
pub struct HookArgs<'a> {
    pub uid: &'a Uid,
    pub stage: Lifecycle,
    /// Error message for `errorCaptured`
    pub error: Option<&'a str>,
}

#[derive(Clone)]
pub struct HookFn(Rc<dyn Fn(&HookArgs<'_>)>);

impl HookFn {
    pub fn new(f: impl Fn(&HookArgs<'_>) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &HookArgs<'_>) {
        (self.0)(args)
    }
}

impl fmt::Debug for HookFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HookFn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_names() {
        for stage in Lifecycle::ALL {
            assert_eq!(Lifecycle::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(Lifecycle::parse("mount"), None);
    }

    #[test]
    fn test_setup_stages() {
        assert!(Lifecycle::BeforeCreate.runs_at_setup());
        assert!(Lifecycle::Created.runs_at_setup());
        assert!(!Lifecycle::Mounted.runs_at_setup());
    }
}
