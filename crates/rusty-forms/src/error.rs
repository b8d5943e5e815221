//! Typed error hierarchy for the form engine.
//!
//! - `ConfigError`: malformed declarative input, fatal at tree construction
//! - `HandlerError`: a process/validate/phase handler rejected
//! - `FormError`: anything that stops `view`/`execute` from producing a result

use thiserror::Error;

/// Malformed configuration or an exhausted overload resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{element} has no configurable method '{method}'")]
    UnknownMethod { element: &'static str, method: String },

    #[error("{method}: missing required parameter '{param}'")]
    MissingParam { method: String, param: &'static str },

    #[error("{method}: parameter '{param}' expects {expected}")]
    InvalidParam {
        method: String,
        param: &'static str,
        expected: &'static str,
    },

    #[error("{method}: unexpected parameter '{param}'")]
    UnexpectedParam { method: String, param: String },

    #[error("{method}: expected a configuration object")]
    NotAnObject { method: String },

    #[error("element name '{0}' uses a reserved prefix")]
    ReservedName(String),

    #[error("input '{0}' cannot be both secure and keep")]
    SecureKeep(String),

    #[error("duplicate element name '{name}' in {container}")]
    DuplicateName { container: String, name: String },

    #[error("invalid pipe target '{0}'")]
    InvalidPipe(String),

    #[error("{0} must have a name")]
    Unnamed(&'static str),
}

/// Failure raised by an element handler.
///
/// `Invalid` is the recognized validation failure and may carry its own
/// message template; anything else travels as `Internal` and is reported
/// with the generic `invalid` message.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{}", .0.as_deref().unwrap_or("invalid value"))]
    Invalid(Option<String>),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    /// Validation failure with a message template (`{name}`/`{label}` are substituted)
    pub fn invalid(message: impl Into<String>) -> Self {
        HandlerError::Invalid(Some(message.into()))
    }

    /// Validation failure that falls back to the handler's configured error
    pub fn rejected() -> Self {
        HandlerError::Invalid(None)
    }
}

/// Errors that abort a `view` or `execute` call.
#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown component type '{kind}'")]
    UnknownComponent { kind: String },

    #[error("compose failed for component '{component}': {source}")]
    Compose {
        component: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("component '{component}' nests deeper than {limit} components")]
    ComposeDepth { component: String, limit: usize },

    #[error("session storage failed: {0}")]
    Session(#[source] anyhow::Error),
}

pub type Result<T, E = FormError> = std::result::Result<T, E>;
