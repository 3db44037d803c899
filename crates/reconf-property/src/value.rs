//! Property values and bags
//!
//! A property is either a [`Scalar`], a fixed-layout [`Composite`], or a nested
//! [`PropertyBag`]. Bags preserve insertion order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Leaf value held by a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    /// Boolean flag
    Bool(bool),
    /// Signed 32-bit integer
    Int(i32),
    /// Unsigned 32-bit integer
    #[serde(rename = "uint")]
    UInt(u32),
    /// Single precision float
    Float(f32),
    /// Double precision float
    Double(f64),
    /// UTF-8 string
    Str(String),
    /// Sequence of signed integers
    IntArray(Vec<i32>),
    /// Sequence of doubles
    DoubleArray(Vec<f64>),
    /// Sequence of booleans
    BoolArray(Vec<bool>),
    /// Sequence of strings
    StrArray(Vec<String>),
}

impl Scalar {
    /// Kind tag of this value
    #[must_use]
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::Int(_) => ScalarKind::Int,
            Self::UInt(_) => ScalarKind::UInt,
            Self::Float(_) => ScalarKind::Float,
            Self::Double(_) => ScalarKind::Double,
            Self::Str(_) => ScalarKind::Str,
            Self::IntArray(_) => ScalarKind::IntArray,
            Self::DoubleArray(_) => ScalarKind::DoubleArray,
            Self::BoolArray(_) => ScalarKind::BoolArray,
            Self::StrArray(_) => ScalarKind::StrArray,
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Self::UInt(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Kind tag of a [`Scalar`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    /// `bool`
    Bool,
    /// `i32`
    Int,
    /// `u32`
    #[serde(rename = "uint")]
    UInt,
    /// `f32`
    Float,
    /// `f64`
    Double,
    /// `String`
    Str,
    /// `Vec<i32>`
    IntArray,
    /// `Vec<f64>`
    DoubleArray,
    /// `Vec<bool>`
    BoolArray,
    /// `Vec<String>`
    StrArray,
}

impl ScalarKind {
    /// Stable lowercase name, used in fingerprints and diagnostics
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Double => "double",
            Self::Str => "str",
            Self::IntArray => "int_array",
            Self::DoubleArray => "double_array",
            Self::BoolArray => "bool_array",
            Self::StrArray => "str_array",
        }
    }
}

impl Display for ScalarKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Struct-like property with a fixed, named field layout
///
/// Fields can be read and overwritten but never added or removed once the
/// composite is built. Writes must keep each field's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    type_name: String,
    fields: IndexMap<String, Scalar>,
}

impl Composite {
    /// Build a composite from its type name and ordered fields
    pub fn new<I, K>(type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Scalar)>,
        K: Into<String>,
    {
        Self {
            type_name: type_name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Three-component double vector with fields `x`, `y`, `z`
    #[must_use]
    pub fn vector3(x: f64, y: f64, z: f64) -> Self {
        Self::new(
            "Vector3",
            [
                ("x", Scalar::Double(x)),
                ("y", Scalar::Double(y)),
                ("z", Scalar::Double(z)),
            ],
        )
    }

    /// Name of the composite type
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Field by name
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Scalar> {
        self.fields.get(name)
    }

    /// Mutable field by name
    #[inline]
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Scalar> {
        self.fields.get_mut(name)
    }

    /// Ordered fields
    #[inline]
    pub fn fields(&self) -> indexmap::map::Iter<'_, String, Scalar> {
        self.fields.iter()
    }

    pub(crate) fn fields_mut(&mut self) -> indexmap::map::IterMut<'_, String, Scalar> {
        self.fields.iter_mut()
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the layout has no fields
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Value of a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    /// Leaf value
    Scalar(Scalar),
    /// Fixed-layout struct, decomposed into `name.field` leaves
    Composite(Composite),
    /// Nested property set
    Bag(PropertyBag),
}

impl PropertyValue {
    /// Whether this value holds nested properties or fields
    #[inline]
    #[must_use]
    pub fn is_container(&self) -> bool {
        !matches!(self, Self::Scalar(_))
    }
}

impl From<Scalar> for PropertyValue {
    fn from(v: Scalar) -> Self {
        Self::Scalar(v)
    }
}

impl From<Composite> for PropertyValue {
    fn from(v: Composite) -> Self {
        Self::Composite(v)
    }
}

impl From<PropertyBag> for PropertyValue {
    fn from(v: PropertyBag) -> Self {
        Self::Bag(v)
    }
}

/// A named entry in a [`PropertyBag`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Human readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Current value
    #[serde(flatten)]
    pub value: PropertyValue,
}

impl Property {
    /// Property without description
    pub fn new(value: impl Into<PropertyValue>) -> Self {
        Self {
            description: String::new(),
            value: value.into(),
        }
    }

    /// Attach a description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Ordered set of named properties
///
/// This is the host-facing container: components add their properties here
/// and the reconfiguration bridge walks it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag {
    properties: IndexMap<String, Property>,
}

impl PropertyBag {
    /// Empty bag
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a property, returning the previous one
    pub fn add_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<Property> {
        self.add(name, Property::new(value))
    }

    /// Add or replace a fully built property, returning the previous one
    pub fn add(&mut self, name: impl Into<String>, property: Property) -> Option<Property> {
        self.properties.insert(name.into(), property)
    }

    /// Builder-style [`Self::add_property`]
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.add_property(name, value);
        self
    }

    /// Remove a property, keeping the order of the remaining ones
    pub fn remove(&mut self, name: &str) -> Option<Property> {
        self.properties.shift_remove(name)
    }

    /// Property by name (this level only)
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Mutable property by name (this level only)
    #[inline]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.get_mut(name)
    }

    /// Whether a property with this name exists at this level
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Ordered iteration over this level
    #[inline]
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Property> {
        self.properties.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, String, Property> {
        self.properties.iter_mut()
    }

    /// Names at this level
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Number of properties at this level
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether this level is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl<'a> IntoIterator for &'a PropertyBag {
    type Item = (&'a String, &'a Property);
    type IntoIter = indexmap::map::Iter<'a, String, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_kind_matches_variant() {
        assert_eq!(Scalar::from(3_u32).kind(), ScalarKind::UInt);
        assert_eq!(Scalar::from(1.5_f32).kind(), ScalarKind::Float);
        assert_eq!(Scalar::from("x").kind(), ScalarKind::Str);
        assert_eq!(Scalar::DoubleArray(vec![]).kind(), ScalarKind::DoubleArray);
    }

    #[test]
    fn composite_fixed_layout() {
        let mut v = Composite::vector3(1.0, 2.0, 3.0);
        assert_eq!(v.type_name(), "Vector3");
        assert_eq!(v.len(), 3);
        assert_eq!(v.field("y"), Some(&Scalar::Double(2.0)));
        assert!(v.field("w").is_none());

        *v.field_mut("z").unwrap() = Scalar::Double(9.0);
        assert_eq!(v.field("z"), Some(&Scalar::Double(9.0)));
    }

    #[test]
    fn bag_preserves_insertion_order() {
        let bag = PropertyBag::new()
            .with("zeta", Scalar::Int(1))
            .with("alpha", Scalar::Int(2))
            .with("mid", Scalar::Int(3));
        let names: Vec<_> = bag.names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn bag_add_property_replaces() {
        let mut bag = PropertyBag::new();
        assert!(bag.add_property("a", Scalar::Int(1)).is_none());
        let previous = bag.add_property("a", Scalar::Int(2)).unwrap();
        assert_eq!(previous.value, PropertyValue::Scalar(Scalar::Int(1)));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn bag_remove_keeps_order() {
        let mut bag = PropertyBag::new()
            .with("a", Scalar::Int(1))
            .with("b", Scalar::Int(2))
            .with("c", Scalar::Int(3));
        bag.remove("b");
        let names: Vec<_> = bag.names().collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn bag_yaml_shape() {
        let yaml = r"
int_param:
  description: an integer
  scalar: { type: int, value: 4 }
bag_param:
  bag:
    str_param:
      scalar: { type: str, value: hello }
vector3_param:
  composite:
    type_name: Vector3
    fields:
      x: { type: double, value: 1.0 }
      y: { type: double, value: 2.0 }
      z: { type: double, value: 3.0 }
";
        let bag: PropertyBag = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(bag.len(), 3);
        assert_eq!(bag.get("int_param").unwrap().description, "an integer");
        assert_eq!(
            bag.get("vector3_param").unwrap().value,
            PropertyValue::Composite(Composite::vector3(1.0, 2.0, 3.0))
        );
    }
}
