//! Protocol fields and flat configuration messages
//!
//! A [`ConfigMessage`] is the wire-neutral shape of both requests and
//! responses: an ordered list of `(name, value)` pairs, names unique.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Typed value carried by a protocol field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// 32-bit signed integer
    Int(i32),
    /// Double precision float
    Double(f64),
    /// Boolean
    Bool(bool),
    /// String
    Str(String),
    /// Integer sequence
    IntArray(Vec<i32>),
    /// Double sequence
    DoubleArray(Vec<f64>),
    /// Boolean sequence
    BoolArray(Vec<bool>),
    /// String sequence
    StrArray(Vec<String>),
}

impl FieldValue {
    /// Type tag of this value
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Int(_) => FieldType::Int,
            Self::Double(_) => FieldType::Double,
            Self::Bool(_) => FieldType::Bool,
            Self::Str(_) => FieldType::Str,
            Self::IntArray(_) => FieldType::IntArray,
            Self::DoubleArray(_) => FieldType::DoubleArray,
            Self::BoolArray(_) => FieldType::BoolArray,
            Self::StrArray(_) => FieldType::StrArray,
        }
    }

    /// Numeric view for range checks (`None` for non-numeric fields)
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::IntArray(v) => write!(f, "{v:?}"),
            Self::DoubleArray(v) => write!(f, "{v:?}"),
            Self::BoolArray(v) => write!(f, "{v:?}"),
            Self::StrArray(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Protocol type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// `int`
    Int,
    /// `double`
    Double,
    /// `bool`
    Bool,
    /// `str`
    Str,
    /// `int[]`
    IntArray,
    /// `double[]`
    DoubleArray,
    /// `bool[]`
    BoolArray,
    /// `str[]`
    StrArray,
}

impl FieldType {
    /// Stable lowercase name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::Str => "str",
            Self::IntArray => "int_array",
            Self::DoubleArray => "double_array",
            Self::BoolArray => "bool_array",
            Self::StrArray => "str_array",
        }
    }

    /// Whether values of this type are ordered numbers
    #[inline]
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Double)
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named protocol field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Dotted parameter name
    pub name: String,
    /// Typed value
    pub value: FieldValue,
}

impl Field {
    /// New field
    pub fn new(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Flat, ordered set of protocol fields
///
/// Used for requests, responses, published snapshots and the
/// default/min/max descriptions. Inserting an existing name replaces the value
/// in place, keeping the original position. Deserialized messages follow the
/// same rule, so a repeated name carries its last value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireMessage")]
pub struct ConfigMessage {
    fields: Vec<Field>,
}

#[derive(Deserialize)]
struct WireMessage {
    fields: Vec<Field>,
}

impl From<WireMessage> for ConfigMessage {
    fn from(wire: WireMessage) -> Self {
        wire.fields.into_iter().collect()
    }
}

impl ConfigMessage {
    /// Empty message
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Self::insert`]
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field, returning the previous value
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => Some(std::mem::replace(&mut existing.value, value)),
            None => {
                self.fields.push(Field { name, value });
                None
            }
        }
    }

    /// Value by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Whether a field with this name exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Overwrite this message's fields with `other`'s, appending new names
    pub fn merge_from(&mut self, other: &ConfigMessage) {
        for field in &other.fields {
            self.insert(field.name.clone(), field.value.clone());
        }
    }

    /// Ordered fields
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    /// Ordered names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the message carries no fields
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse from JSON
    ///
    /// # Errors
    /// Returns error if JSON is invalid or not message-shaped
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    /// Returns error if serialization fails (non-finite doubles)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl FromIterator<Field> for ConfigMessage {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut message = Self::new();
        for field in iter {
            message.insert(field.name, field.value);
        }
        message
    }
}

impl<'a> IntoIterator for &'a ConfigMessage {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
