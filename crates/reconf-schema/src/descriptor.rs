//! Parameter and group descriptors
//!
//! Descriptors serialize with plain literals (`default: 3`, `min: -1.5`); the
//! declared `type` decides how a literal is read.

use crate::error::{SchemaError, ValueError};
use reconf_protocol::{FieldType, FieldValue};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Id of the implicit root group
pub const ROOT_GROUP: u32 = 0;

/// How out-of-range numeric values are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Fail the request
    #[default]
    Reject,
    /// Replace with the nearest bound
    Clamp,
}

/// Description of one reconfigurable parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor", into = "RawDescriptor")]
pub struct ParamDescriptor {
    /// Dotted property path
    pub name: String,
    /// Declared protocol type
    pub ty: FieldType,
    /// Default value
    pub default: FieldValue,
    /// Inclusive lower bound
    pub min: Option<FieldValue>,
    /// Inclusive upper bound
    pub max: Option<FieldValue>,
    /// Level bits contributed when this parameter changes
    pub level: u32,
    /// Human-readable description
    pub description: String,
    /// Owning group id
    pub group: u32,
}

impl ParamDescriptor {
    /// Descriptor with no bounds, level 0, in the root group
    pub fn new(name: impl Into<String>, default: impl Into<FieldValue>) -> Self {
        let default = default.into();
        Self {
            name: name.into(),
            ty: default.field_type(),
            default,
            min: None,
            max: None,
            level: 0,
            description: String::new(),
            group: ROOT_GROUP,
        }
    }

    /// Set both bounds
    #[must_use]
    pub fn with_range(mut self, min: impl Into<FieldValue>, max: impl Into<FieldValue>) -> Self {
        self.min = Some(min.into());
        self.max = Some(max.into());
        self
    }

    /// Set the level bits
    #[must_use]
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the owning group
    #[must_use]
    pub fn in_group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }

    /// Override the declared type (e.g. a `double` parameter with an int literal default)
    #[must_use]
    pub fn with_type(mut self, ty: FieldType) -> Self {
        self.ty = ty;
        self
    }

    /// Check the value's type against the declared type
    ///
    /// `int` values are widened when the declared type is `double`.
    ///
    /// # Errors
    /// [`ValueError::TypeMismatch`] for any other type difference.
    pub fn coerce(&self, value: &FieldValue) -> Result<FieldValue, ValueError> {
        coerce(self.ty, value)
    }

    /// Check type and range
    ///
    /// Under [`RangePolicy::Clamp`] an out-of-range number is replaced by
    /// the violated bound instead of failing.
    ///
    /// # Errors
    /// [`ValueError`] on type mismatch, or range violation under
    /// [`RangePolicy::Reject`]. NaN and infinities are rejected under either
    /// policy once a bound is declared.
    pub fn check(&self, value: &FieldValue, policy: RangePolicy) -> Result<FieldValue, ValueError> {
        let value = self.coerce(value)?;
        let Some(n) = value.as_f64() else {
            return Ok(value);
        };
        if !n.is_finite() && (self.min.is_some() || self.max.is_some()) {
            return Err(ValueError::NotFinite {
                value: value.to_string(),
            });
        }

        if let Some(min) = &self.min {
            if min.as_f64().is_some_and(|m| n < m) {
                return match policy {
                    RangePolicy::Reject => Err(ValueError::BelowMinimum {
                        value: value.to_string(),
                        min: min.to_string(),
                    }),
                    RangePolicy::Clamp => Ok(min.clone()),
                };
            }
        }
        if let Some(max) = &self.max {
            if max.as_f64().is_some_and(|m| n > m) {
                return match policy {
                    RangePolicy::Reject => Err(ValueError::AboveMaximum {
                        value: value.to_string(),
                        max: max.to_string(),
                    }),
                    RangePolicy::Clamp => Ok(max.clone()),
                };
            }
        }
        Ok(value)
    }

    /// Validate the descriptor itself, normalizing literals to the declared type
    pub(crate) fn normalize(&mut self) -> Result<(), SchemaError> {
        let name = self.name.clone();
        self.default = coerce(self.ty, &self.default).map_err(|source| SchemaError::InvalidDefault {
            name: name.clone(),
            source,
        })?;
        for bound in [&mut self.min, &mut self.max].into_iter().flatten() {
            *bound = coerce(self.ty, bound).map_err(|source| SchemaError::InvalidBound {
                name: name.clone(),
                source,
            })?;
        }

        if let (Some(min), Some(max)) = (&self.min, &self.max) {
            if let (Some(lo), Some(hi)) = (min.as_f64(), max.as_f64()) {
                if lo > hi {
                    return Err(SchemaError::InvalidRange {
                        name,
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
            }
        }

        self.check(&self.default, RangePolicy::Reject)
            .map_err(|source| SchemaError::InvalidDefault { name, source })?;
        Ok(())
    }
}

pub(crate) fn coerce(ty: FieldType, value: &FieldValue) -> Result<FieldValue, ValueError> {
    match (ty, value) {
        (FieldType::Double, FieldValue::Int(v)) => Ok(FieldValue::Double(f64::from(*v))),
        (ty, value) if value.field_type() == ty => Ok(value.clone()),
        (ty, value) => Err(ValueError::TypeMismatch {
            expected: ty,
            found: value.field_type(),
        }),
    }
}

/// A parameter group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescriptor {
    /// Unique id; `0` is the root
    pub id: u32,
    /// Parent group id (the root is its own parent)
    #[serde(default)]
    pub parent: u32,
    /// Display name
    pub name: String,
    /// Free-form group kind (e.g. `tab`, `collapse`)
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Initial expanded/enabled state
    #[serde(default = "default_state")]
    pub state: bool,
}

fn default_state() -> bool {
    true
}

impl GroupDescriptor {
    /// Group under `parent`
    pub fn new(id: u32, parent: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            parent,
            name: name.into(),
            kind: String::new(),
            state: true,
        }
    }

    /// The implicit root group
    #[must_use]
    pub fn root() -> Self {
        Self::new(ROOT_GROUP, ROOT_GROUP, "Default")
    }
}

/// On-disk form of [`ParamDescriptor`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDescriptor {
    name: String,
    #[serde(rename = "type")]
    ty: FieldType,
    default: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<Json>,
    #[serde(default)]
    level: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(default)]
    group: u32,
}

impl TryFrom<RawDescriptor> for ParamDescriptor {
    type Error = SchemaError;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        let read = |json: &Json| literal(&raw.name, raw.ty, json);
        let default = read(&raw.default)?;
        let min = raw.min.as_ref().map(read).transpose()?;
        let max = raw.max.as_ref().map(read).transpose()?;
        Ok(Self {
            default,
            min,
            max,
            name: raw.name,
            ty: raw.ty,
            level: raw.level,
            description: raw.description,
            group: raw.group,
        })
    }
}

impl From<ParamDescriptor> for RawDescriptor {
    fn from(param: ParamDescriptor) -> Self {
        Self {
            name: param.name,
            ty: param.ty,
            default: to_json(&param.default),
            min: param.min.as_ref().map(to_json),
            max: param.max.as_ref().map(to_json),
            level: param.level,
            description: param.description,
            group: param.group,
        }
    }
}

/// Read a plain literal as the declared type
fn literal(name: &str, ty: FieldType, json: &Json) -> Result<FieldValue, SchemaError> {
    let invalid = || SchemaError::InvalidLiteral {
        name: name.to_string(),
        ty,
        literal: json.to_string(),
    };
    let int = |j: &Json| j.as_i64().and_then(|v| i32::try_from(v).ok());
    let array = |j: &Json| j.as_array().cloned();

    let value = match ty {
        FieldType::Int => FieldValue::Int(int(json).ok_or_else(invalid)?),
        FieldType::Double => FieldValue::Double(json.as_f64().ok_or_else(invalid)?),
        FieldType::Bool => FieldValue::Bool(json.as_bool().ok_or_else(invalid)?),
        FieldType::Str => FieldValue::Str(json.as_str().ok_or_else(invalid)?.to_string()),
        FieldType::IntArray => FieldValue::IntArray(
            array(json)
                .ok_or_else(invalid)?
                .iter()
                .map(|j| int(j).ok_or_else(invalid))
                .collect::<Result<_, _>>()?,
        ),
        FieldType::DoubleArray => FieldValue::DoubleArray(
            array(json)
                .ok_or_else(invalid)?
                .iter()
                .map(|j| j.as_f64().ok_or_else(invalid))
                .collect::<Result<_, _>>()?,
        ),
        FieldType::BoolArray => FieldValue::BoolArray(
            array(json)
                .ok_or_else(invalid)?
                .iter()
                .map(|j| j.as_bool().ok_or_else(invalid))
                .collect::<Result<_, _>>()?,
        ),
        FieldType::StrArray => FieldValue::StrArray(
            array(json)
                .ok_or_else(invalid)?
                .iter()
                .map(|j| j.as_str().map(str::to_string).ok_or_else(invalid))
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(value)
}

fn to_json(value: &FieldValue) -> Json {
    match value {
        FieldValue::Int(v) => Json::from(*v),
        FieldValue::Double(v) => Json::from(*v),
        FieldValue::Bool(v) => Json::from(*v),
        FieldValue::Str(v) => Json::from(v.as_str()),
        FieldValue::IntArray(v) => Json::from(v.clone()),
        FieldValue::DoubleArray(v) => Json::from(v.clone()),
        FieldValue::BoolArray(v) => Json::from(v.clone()),
        FieldValue::StrArray(v) => Json::from(v.clone()),
    }
}
