//! # dcstruct evaluator
//!
//! Interprets declarative UI descriptors into render nodes for a host UI
//! runtime.
//!
//! A [`Descriptor`] names a type, props, children, directives, events and
//! lifecycle hooks. The [`Composer`] resolves it against a [`Host`],
//! producing a [`RenderNode`] tree. Wrapped descriptors get an instance with
//! a stable uid, a two-way model binding in the path store, lazy list
//! loading and imperative operations (`refresh`, `toggle_show`,
//! `set_model`, `unmount`).
//!
//! ## Modules
//!
//! | module | role |
//! |--------|------|
//! | [`descriptor`], [`loader`] | descriptor model and JSON loading |
//! | [`validator`] | structural checks |
//! | [`directives`], [`builtins`] | directive normalization and built-ins |
//! | [`events`], [`modifiers`], [`rate_limit`] | event normalization |
//! | [`type_resolver`], [`registry`] | type resolution |
//! | [`lazy`] | incremental list loading |
//! | [`cache`] | render cache |
//! | [`composer`], [`resolver`] | tree composition |
//! | [`headless`] | in-memory host and test harness |

pub mod builtins;
pub mod cache;
pub mod composer;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod directives;
pub mod error;
pub mod events;
pub mod headless;
pub mod host;
pub mod instance;
pub mod lazy;
pub mod lifecycle;
pub mod loader;
pub mod model;
pub mod modifiers;
pub mod rate_limit;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod type_resolver;
pub mod validator;
pub mod vdom;

pub use cache::{CacheKey, RenderCache};
pub use composer::Composer;
pub use config::{ComposerConfig, LazyOptions};
pub use context::{Key, RenderContext, Scope, Symbol};
pub use descriptor::{
    Children, Compute, Descriptor, DirectiveObject, DirectiveSpec, DirectiveValue, FunctionComponent,
    Slots, TypeSpec,
};
pub use directives::{Directive, DirectiveBinding, DirectiveTuple};
pub use error::{Diagnostic, DiagnosticLevel, EvalError, EvalResult, HandlerError, ValidationError};
pub use events::{DomEvent, EventBinding, Handler, NormalizedHandler};
pub use headless::{Harness, HeadlessElement, HeadlessHost};
pub use host::{Host, HostElement, ScrollMetrics};
pub use instance::Instance;
pub use lifecycle::{HookArgs, HookFn, Lifecycle};
pub use scheduler::Scheduler;
pub use validator::{validate_descriptor, Validator};
pub use vdom::{ElementNode, RenderNode, ResolvedType, Uid};

pub use dcstruct_store::{LruCache, PathStore};
