//! Error types for the reconfigure server

use reconf_property::WalkError;
use reconf_schema::{SchemaError, ValueError};

/// Result alias for server operations
pub type ReconfigureResult<T> = Result<T, ReconfigureError>;

/// Errors from a reconfiguration request
///
/// Every variant except [`ReconfigureError::NotifyFailed`] aborts the request
/// with the live property tree untouched.
#[derive(Debug, thiserror::Error)]
pub enum ReconfigureError {
    /// Request names a parameter the schema does not declare
    #[error("unknown parameter: {name}")]
    UnknownParameter { name: String },

    /// Value fails the declared type or range, or does not fit the live property
    #[error("invalid value for '{name}': {source}")]
    InvalidValue {
        name: String,
        #[source]
        source: ValueError,
    },

    /// Target cannot be resolved or created in the live property tree
    #[error("structure error at '{name}': {source}")]
    StructureError {
        name: String,
        #[source]
        source: WalkError,
    },

    /// Update hook vetoed the change
    #[error("update rejected: {reason}")]
    UpdateRejected { reason: String },

    /// Notify hook failed after the update was committed
    #[error("notify failed: {reason}")]
    NotifyFailed { reason: String },

    /// Schema could not be (re)built
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl ReconfigureError {
    /// Create invalid value error
    pub fn invalid_value(name: impl Into<String>, source: impl Into<ValueError>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Create structure error
    pub fn structure(name: impl Into<String>, source: WalkError) -> Self {
        Self::StructureError {
            name: name.into(),
            source,
        }
    }

    /// Parameter the error is about, if any
    #[must_use]
    pub fn offending_name(&self) -> Option<&str> {
        match self {
            Self::UnknownParameter { name }
            | Self::InvalidValue { name, .. }
            | Self::StructureError { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether the request was aborted without any live mutation
    #[must_use]
    pub fn aborts_request(&self) -> bool {
        !matches!(self, Self::NotifyFailed { .. })
    }
}
