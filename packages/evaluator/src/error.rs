//! Error types for descriptor evaluation

use crate::vdom::Uid;
use serde::Serialize;
use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

/// Structural problems found before a descriptor is rendered
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Descriptor type is missing or empty")]
    MissingType,

    #[error("Invalid descriptor field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Unknown event modifier '{modifier}' in '{event}'")]
    UnknownModifier { event: String, modifier: String },

    #[error("Field '{field}' holds callbacks and cannot be loaded from data")]
    RequiresCode { field: String },

    #[error("Provide key must be a non-empty name or a symbol")]
    InvalidProvideKey,
}

/// Failure raised by a user handler.
///
/// Handlers are plain callbacks, so the error only carries a message. It is
/// `Clone` so the same failure can be handed to an error callback and the
/// host's error sink.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Cannot register {kind} '{name}' while a tree is being resolved")]
    Busy { kind: &'static str, name: String },

    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },
}

#[derive(Error, Debug, Clone)]
pub enum EvalError {
    #[error("Invalid descriptor: {0}")]
    Validation(#[from] ValidationError),

    #[error("Component '{name}' could not be resolved")]
    UnresolvedType { name: String },

    #[error("Handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Maximum resolve depth of {max} exceeded at '{name}'")]
    Depth { name: String, max: usize },

    #[error("Unknown instance '{uid}'")]
    UnknownInstance { uid: Uid },
}

/// Severity of a [`Diagnostic`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

/// Non-fatal problem recorded while composing.
///
/// Diagnostics never abort rendering; the offending entry is skipped and the
/// rest of the tree is produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            uid: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: Option<&Uid>) -> Self {
        self.uid = uid.cloned();
        self
    }
}
