//! Reconf Protocol
//!
//! The dynamically typed side of the bridge: flat `(name, value)` messages and
//! the codec that converts them to and from typed property scalars.
//!
//! # Core Concepts
//!
//! - [`FieldValue`] / [`FieldType`]: `int`, `double`, `bool`, `str` and arrays of each
//! - [`ConfigMessage`]: Ordered request/response/snapshot payload
//! - [`codec`]: Range-checked conversion between [`FieldValue`] and
//!   [`reconf_property::Scalar`]
//!
//! # Example
//!
//! ```rust
//! use reconf_property::{Scalar, ScalarKind};
//! use reconf_protocol::{codec, FieldValue};
//!
//! let scalar = codec::decode(&FieldValue::Int(7), ScalarKind::UInt).unwrap();
//! assert_eq!(scalar, Scalar::UInt(7));
//! assert!(codec::decode(&FieldValue::Int(-7), ScalarKind::UInt).is_err());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod codec;
mod message;

pub use codec::CodecError;
pub use message::{ConfigMessage, Field, FieldType, FieldValue};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
