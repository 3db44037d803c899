//! Reconf Server
//!
//! Keeps a component's live property tree and an external, dynamically typed
//! configuration in sync: describes the properties as a schema, applies
//! `set_config` requests transactionally, runs update/notify hooks and
//! publishes snapshots.
//!
//! # Architecture
//!
//! ```text
//! ConfigMessage ──▶ ReconfigureServer::set_config
//!                     ├─ Schema (names, types, ranges, levels)
//!                     ├─ Walker (resolve / materialize leaves)
//!                     ├─ codec (field ⇄ scalar)
//!                     ├─ update hook ─▶ write ─▶ notify hook
//!                     └─ SnapshotStore ─▶ ServerEvent::Update
//! ```
//!
//! # Example
//!
//! ```rust
//! use reconf_property::{share, Composite, PropertyBag, Scalar};
//! use reconf_protocol::{ConfigMessage, FieldValue};
//! use reconf_server::ReconfigureServer;
//!
//! let props = share(
//!     PropertyBag::new()
//!         .with("int_param", Scalar::Int(0))
//!         .with("vector3_param", Composite::vector3(1.0, 2.0, 3.0)),
//! );
//! let server = ReconfigureServer::builder(props).build().unwrap();
//!
//! let outcome = server
//!     .set_config(&ConfigMessage::new().with("vector3_param.x", 5.0))
//!     .unwrap();
//! assert_eq!(
//!     outcome.response().get("vector3_param.x"),
//!     Some(&FieldValue::Double(5.0))
//! );
//! assert_eq!(server.get_config().version, 2);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod error;
mod events;
pub mod hooks;
mod server;
mod snapshot;

pub use config::{ConfigError, ServerConfig};
pub use error::{ReconfigureError, ReconfigureResult};
pub use events::ServerEvent;
pub use hooks::{Change, ChangeSet, HookError, Hooks, ProposalError, UpdateHook};
pub use server::{
    ReconfigureServer, SchemaSource, ServerBuilder, ServerState, SetConfigOutcome,
};
pub use snapshot::ConfigSnapshot;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
