//! Value codec between property scalars and protocol fields
//!
//! | Property kind | Protocol field | Notes |
//! |---|---|---|
//! | `bool`, `str`, arrays | same | exact |
//! | `int` (`i32`) | `int` | exact |
//! | `uint` (`u32`) | `int` | `Range` above `i32::MAX` / below 0 |
//! | `double` (`f64`) | `double` | exact; also accepts `int` fields |
//! | `float` (`f32`) | `double` | `Range` for finite values beyond `f32::MAX`; accepts `int` fields exactly representable in `f32` |
//!
//! Composite properties never reach the codec; the walker splits them into
//! per-field leaves first.

use crate::message::{FieldType, FieldValue};
use reconf_property::{Scalar, ScalarKind};

/// Encode a property scalar as a protocol field
///
/// # Errors
/// [`CodecError::Range`] if the value has no faithful protocol representation.
pub fn encode(value: &Scalar) -> Result<FieldValue, CodecError> {
    Ok(match value {
        Scalar::Bool(v) => FieldValue::Bool(*v),
        Scalar::Int(v) => FieldValue::Int(*v),
        Scalar::UInt(v) => FieldValue::Int(i32::try_from(*v).map_err(|_| CodecError::Range {
            kind: ScalarKind::UInt,
            value: v.to_string(),
        })?),
        Scalar::Float(v) => FieldValue::Double(f64::from(*v)),
        Scalar::Double(v) => FieldValue::Double(*v),
        Scalar::Str(v) => FieldValue::Str(v.clone()),
        Scalar::IntArray(v) => FieldValue::IntArray(v.clone()),
        Scalar::DoubleArray(v) => FieldValue::DoubleArray(v.clone()),
        Scalar::BoolArray(v) => FieldValue::BoolArray(v.clone()),
        Scalar::StrArray(v) => FieldValue::StrArray(v.clone()),
    })
}

/// Decode a protocol field into a scalar of the requested kind
///
/// # Errors
/// - [`CodecError::TypeMismatch`] if the field type cannot feed `kind`
/// - [`CodecError::Range`] if the value does not fit `kind`
pub fn decode(field: &FieldValue, kind: ScalarKind) -> Result<Scalar, CodecError> {
    let mismatch = || CodecError::TypeMismatch {
        expected: kind,
        found: field.field_type(),
    };

    Ok(match (kind, field) {
        (ScalarKind::Bool, FieldValue::Bool(v)) => Scalar::Bool(*v),
        (ScalarKind::Int, FieldValue::Int(v)) => Scalar::Int(*v),
        (ScalarKind::UInt, FieldValue::Int(v)) => {
            Scalar::UInt(u32::try_from(*v).map_err(|_| CodecError::Range {
                kind,
                value: v.to_string(),
            })?)
        }
        (ScalarKind::Double, FieldValue::Double(v)) => Scalar::Double(*v),
        (ScalarKind::Double, FieldValue::Int(v)) => Scalar::Double(f64::from(*v)),
        (ScalarKind::Float, FieldValue::Double(v)) => Scalar::Float(narrow_f64(*v)?),
        (ScalarKind::Float, FieldValue::Int(v)) => Scalar::Float(narrow_i32(*v)?),
        (ScalarKind::Str, FieldValue::Str(v)) => Scalar::Str(v.clone()),
        (ScalarKind::IntArray, FieldValue::IntArray(v)) => Scalar::IntArray(v.clone()),
        (ScalarKind::DoubleArray, FieldValue::DoubleArray(v)) => Scalar::DoubleArray(v.clone()),
        (ScalarKind::BoolArray, FieldValue::BoolArray(v)) => Scalar::BoolArray(v.clone()),
        (ScalarKind::StrArray, FieldValue::StrArray(v)) => Scalar::StrArray(v.clone()),
        _ => return Err(mismatch()),
    })
}

/// Scalar kind a field decodes to when no live property dictates one
#[must_use]
pub const fn natural_kind(field_type: FieldType) -> ScalarKind {
    match field_type {
        FieldType::Int => ScalarKind::Int,
        FieldType::Double => ScalarKind::Double,
        FieldType::Bool => ScalarKind::Bool,
        FieldType::Str => ScalarKind::Str,
        FieldType::IntArray => ScalarKind::IntArray,
        FieldType::DoubleArray => ScalarKind::DoubleArray,
        FieldType::BoolArray => ScalarKind::BoolArray,
        FieldType::StrArray => ScalarKind::StrArray,
    }
}

/// Protocol field type a scalar kind encodes to
#[must_use]
pub const fn field_type_of(kind: ScalarKind) -> FieldType {
    match kind {
        ScalarKind::Bool => FieldType::Bool,
        ScalarKind::Int | ScalarKind::UInt => FieldType::Int,
        ScalarKind::Float | ScalarKind::Double => FieldType::Double,
        ScalarKind::Str => FieldType::Str,
        ScalarKind::IntArray => FieldType::IntArray,
        ScalarKind::DoubleArray => FieldType::DoubleArray,
        ScalarKind::BoolArray => FieldType::BoolArray,
        ScalarKind::StrArray => FieldType::StrArray,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn narrow_f64(v: f64) -> Result<f32, CodecError> {
    if v.is_finite() && v.abs() > f64::from(f32::MAX) {
        return Err(CodecError::Range {
            kind: ScalarKind::Float,
            value: v.to_string(),
        });
    }
    Ok(v as f32)
}

#[allow(clippy::cast_precision_loss)]
fn narrow_i32(v: i32) -> Result<f32, CodecError> {
    let narrowed = v as f32;
    if f64::from(narrowed) != f64::from(v) {
        return Err(CodecError::Range {
            kind: ScalarKind::Float,
            value: v.to_string(),
        });
    }
    Ok(narrowed)
}

/// Codec failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Field type cannot be converted to the property kind
    #[error("type mismatch: {expected} property cannot take a {found} field")]
    TypeMismatch {
        /// Property kind
        expected: ScalarKind,
        /// Field type received
        found: FieldType,
    },

    /// Value outside the representable range
    #[error("value {value} out of range for {kind}")]
    Range {
        /// Target kind
        kind: ScalarKind,
        /// Offending value, rendered
        value: String,
    },
}
