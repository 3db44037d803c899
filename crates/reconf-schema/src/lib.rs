//! Reconf Schema
//!
//! Declarative description of the reconfigurable parameters of a component:
//! type, default, bounds, description, group and level bits.
//!
//! # Core Concepts
//!
//! - [`ParamDescriptor`] / [`GroupDescriptor`]: One parameter / one group
//! - [`Schema`]: Validated, indexed set of descriptors with a shape fingerprint
//! - [`Schema::from_properties`]: Derive a schema from a live property tree
//! - [`compute_level`]: OR of the level bits of changed parameters
//!
//! # Example
//!
//! ```rust
//! use reconf_schema::{compute_level, ParamDescriptor, Schema};
//!
//! let schema = Schema::new(vec![
//!     ParamDescriptor::new("int_param", 0).with_range(-10, 10).with_level(1),
//!     ParamDescriptor::new("vector3_param.x", 1.0).with_level(2),
//! ])
//! .unwrap();
//!
//! assert_eq!(compute_level(["int_param", "vector3_param.x"], &schema), 3);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod auto;
mod descriptor;
mod error;
mod level;
mod schema;

pub use auto::AutoSchemaOptions;
pub use descriptor::{GroupDescriptor, ParamDescriptor, RangePolicy, ROOT_GROUP};
pub use error::{SchemaError, ValueError};
pub use level::compute_level;
pub use schema::{Schema, SchemaDefinition};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
