//! Reconf Property Model
//!
//! Typed, ordered property trees as owned by a host component, plus the walker
//! that addresses them by dotted name.
//!
//! # Core Concepts
//!
//! - [`PropertyBag`]: Ordered set of named properties (the host-facing API)
//! - [`PropertyValue`]: `Scalar`, fixed-layout `Composite`, or nested `Bag`
//! - [`Walker`]: Depth-bounded leaf iteration, resolution and materialization
//! - [`PropertyPath`]: Dotted addressing (`bag_param.str_param`, `vector3_param.x`)
//! - [`Fingerprint`]: Blake3 digest of a tree's shape
//!
//! # Example
//!
//! ```rust
//! use reconf_property::{Composite, PropertyBag, Scalar, Walker};
//!
//! let props = PropertyBag::new()
//!     .with("int_param", Scalar::Int(3))
//!     .with("vector3_param", Composite::vector3(1.0, 2.0, 3.0));
//!
//! let walker = Walker::default();
//! let x = walker.resolve(&props, &"vector3_param.x".parse().unwrap()).unwrap();
//! assert_eq!(x, &Scalar::Double(1.0));
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod fingerprint;
mod path;
mod value;
mod walker;

pub use fingerprint::{Fingerprint, FingerprintBuilder, FingerprintError};
pub use path::{PathError, PropertyPath};
pub use value::{Composite, Property, PropertyBag, PropertyValue, Scalar, ScalarKind};
pub use walker::{Leaf, Leaves, Presence, WalkError, Walker, DEFAULT_MAX_DEPTH};

/// Host-owned property tree shared with the reconfiguration bridge
pub type SharedProperties = std::sync::Arc<parking_lot::RwLock<PropertyBag>>;

/// Wrap a bag for sharing between the host component and the bridge
#[must_use]
pub fn share(bag: PropertyBag) -> SharedProperties {
    std::sync::Arc::new(parking_lot::RwLock::new(bag))
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
