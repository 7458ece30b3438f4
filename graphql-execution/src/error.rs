//! Execution errors.
use std::fmt;

use displaydoc::Display;
use serde_json_bytes::Value;
use thiserror::Error;

use crate::graphql;
use crate::graphql::ErrorExtension;
use crate::json_ext::Object;
use crate::json_ext::Path;

pub(crate) const FIELD_RESOLUTION_ERROR: &str = "FIELD_RESOLUTION_ERROR";
pub(crate) const DEFERRED_RESOLUTION_ERROR: &str = "DEFERRED_RESOLUTION_ERROR";
pub(crate) const MISSING_CAPABILITY: &str = "MISSING_CAPABILITY";
pub(crate) const NULL_VALUE: &str = "NULL_VALUE";
pub(crate) const INVALID_VALUE: &str = "INVALID_VALUE";

/// Error while building an [`ExecutableSchema`](crate::ExecutableSchema) or loading a
/// [`Configuration`](crate::Configuration).
///
/// These are programming errors: they surface when the schema is assembled, never
/// while a query executes.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// field '{current}' is already named and cannot be renamed to '{requested}'
    FieldRenamed { current: String, requested: String },

    /// return type is already bound to '{bound}' and cannot be rebound to '{requested}'
    TypeRebound { bound: String, requested: String },

    /// unknown type '{0}'
    UnknownType(String),

    /// type '{type_name}' has no field '{field}'
    UnknownField { type_name: String, field: String },

    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
}

/// Error raised by a resolution strategy.
///
/// Any [`std::error::Error`] converts into a `FieldError` so resolvers can use `?`. The
/// execution engine records it against the field's path and keeps resolving sibling fields.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldError {
    message: String,
    extensions: Object,
}

impl FieldError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            extensions: Object::new(),
        }
    }

    /// The entity `target` does not support `operation`, and has nothing to delegate it to.
    pub fn missing_capability(target: &str, operation: &str) -> Self {
        Self::new(format!("'{target}' does not support '{operation}'")).with_code(MISSING_CAPABILITY)
    }

    /// Adds an extension entry, overwriting a previous entry with the same key.
    pub fn with_extension(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extensions.insert(key, value.into());
        self
    }

    /// Sets `extensions.code` unless one is already present.
    pub fn with_code(mut self, code: &str) -> Self {
        self.extensions
            .entry("code")
            .or_insert(Value::String(code.into()));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn extensions(&self) -> &Object {
        &self.extensions
    }

    pub fn is_missing_capability(&self) -> bool {
        self.extensions.get("code").and_then(|code| code.as_str()) == Some(MISSING_CAPABILITY)
    }

    pub(crate) fn into_graphql_error(self, path: Path, default_code: &str) -> graphql::Error {
        let FieldError {
            message,
            extensions,
        } = self.with_code(default_code);
        graphql::Error::builder()
            .message(message)
            .path(path)
            .extensions(extensions)
            .build()
    }
}

impl<E> From<E> for FieldError
where
    E: std::error::Error,
{
    fn from(error: E) -> Self {
        FieldError::new(error)
    }
}

/// Error that stops the whole execution. The partial data built so far is still returned.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecutionError {
    /// execution was cancelled before every deferred value was resolved
    Cancelled,

    /// execution exceeded the limit of {0} drain steps
    DrainLimitExceeded(usize),
}

impl ErrorExtension for ExecutionError {
    fn extension_code(&self) -> String {
        match self {
            ExecutionError::Cancelled => "EXECUTION_CANCELLED",
            ExecutionError::DrainLimitExceeded(_) => "DRAIN_LIMIT_EXCEEDED",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        match self {
            ExecutionError::DrainLimitExceeded(limit) => {
                let mut details = Object::new();
                details.insert("limit", Value::from(*limit as u64));
                Some(details)
            }
            ExecutionError::Cancelled => None,
        }
    }
}

impl ExecutionError {
    pub(crate) fn to_graphql_error(&self) -> graphql::Error {
        ErrorExtension::to_graphql_error(self, None)
    }
}
