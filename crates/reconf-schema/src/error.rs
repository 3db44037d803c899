//! Error types for schema construction and value checking

use reconf_property::{PathError, WalkError};
use reconf_protocol::{CodecError, FieldType};

/// Errors while building or querying a schema
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Parameter name is not a valid dotted path
    #[error("invalid parameter name '{name}': {source}")]
    InvalidName {
        name: String,
        #[source]
        source: PathError,
    },

    /// Two parameters share a name
    #[error("duplicate parameter: {0}")]
    DuplicateName(String),

    /// One parameter would sit inside another (`a` and `a.b`)
    #[error("parameter {leaf} cannot also be a container of {nested}")]
    OverlappingNames { leaf: String, nested: String },

    /// Lookup of an undeclared parameter
    #[error("unknown parameter: {0}")]
    NotFound(String),

    /// Default does not satisfy the declared type or range
    #[error("invalid default for '{name}': {source}")]
    InvalidDefault {
        name: String,
        #[source]
        source: ValueError,
    },

    /// Min or max does not satisfy the declared type
    #[error("invalid bound for '{name}': {source}")]
    InvalidBound {
        name: String,
        #[source]
        source: ValueError,
    },

    /// `min > max`
    #[error("invalid range for '{name}': min {min} > max {max}")]
    InvalidRange { name: String, min: String, max: String },

    /// Literal in a schema document does not parse as the declared type
    #[error("'{name}': cannot read {literal} as {ty}")]
    InvalidLiteral {
        name: String,
        ty: FieldType,
        literal: String,
    },

    /// Parameter refers to an undeclared group
    #[error("parameter '{name}' refers to unknown group {group}")]
    UnknownGroup { name: String, group: u32 },

    /// Two groups share an id
    #[error("duplicate group id: {0}")]
    DuplicateGroup(u32),

    /// Group refers to an undeclared parent
    #[error("group {group} refers to unknown parent {parent}")]
    UnknownParentGroup { group: u32, parent: u32 },

    /// Live property cannot be described by the protocol
    #[error("property '{name}' cannot be encoded: {source}")]
    Codec {
        name: String,
        #[source]
        source: CodecError,
    },

    /// Walking the live property tree failed
    #[error("walk error: {0}")]
    Walk(#[from] WalkError),

    /// Schema document is not valid YAML
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Schema document is not valid JSON
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors while checking a value against a parameter descriptor
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    /// Field type differs from the declared type (after widening)
    #[error("expected {expected}, got {found}")]
    TypeMismatch { expected: FieldType, found: FieldType },

    /// Numeric value below the declared minimum
    #[error("{value} is below the minimum {min}")]
    BelowMinimum { value: String, min: String },

    /// Numeric value above the declared maximum
    #[error("{value} is above the maximum {max}")]
    AboveMaximum { value: String, max: String },

    /// NaN or infinite value for a bounded parameter
    #[error("{value} cannot be compared with the declared bounds")]
    NotFinite { value: String },

    /// Value does not fit the live property
    #[error(transparent)]
    Codec(#[from] CodecError),
}
