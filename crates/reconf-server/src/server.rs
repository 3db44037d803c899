//! Reconfigure server
//!
//! Serves `set_config` / `get_config` / `describe` over a host-owned property
//! tree. A request is validated completely before anything is written:
//!
//! 1. every name must be declared by the schema
//! 2. every value must satisfy the declared type and range
//! 3. every target leaf must exist or be creatable, and the value must fit it
//! 4. the update hook sees the change set and level, and may veto
//! 5. values are written; a failure restores the previous tree
//! 6. the notify hook runs; its failure is only a warning
//! 7. a new snapshot is published and broadcast

use crate::config::ServerConfig;
use crate::error::{ReconfigureError, ReconfigureResult};
use crate::events::{EventBus, ServerEvent};
use crate::hooks::{ChangeSet, HookError, Hooks, UpdateHook};
use crate::snapshot::{ConfigSnapshot, SnapshotStore};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use reconf_property::{
    Fingerprint, Presence, PropertyBag, PropertyPath, SharedProperties, WalkError, Walker,
};
use reconf_protocol::{codec, ConfigMessage, FieldValue};
use reconf_schema::{compute_level, AutoSchemaOptions, RangePolicy, Schema, SchemaError};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Where the schema comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSource {
    /// Derived from the live tree; re-derived when its shape changes
    Auto,
    /// Supplied by the host
    Provided,
}

/// Transaction phase, observable through [`ReconfigureServer::state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No request in flight
    Idle,
    /// Checking names, values and structure
    Validating,
    /// Writing to the live tree
    Applying,
    /// Running the notify hook and publishing
    Notifying,
}

/// Result of a successful `set_config`
#[derive(Debug)]
pub struct SetConfigOutcome {
    /// Snapshot published by this request
    pub snapshot: Arc<ConfigSnapshot>,
    /// OR of the levels of the changed parameters
    pub level: u32,
    /// What changed, with pre-images
    pub changes: ChangeSet,
    /// Non-fatal problems (notify hook failures)
    pub warnings: Vec<ReconfigureError>,
}

impl SetConfigOutcome {
    /// The response message: the full resulting configuration
    #[inline]
    #[must_use]
    pub fn response(&self) -> &ConfigMessage {
        &self.snapshot.values
    }
}

#[derive(Debug)]
struct TxnState {
    source: SchemaSource,
    shape: Fingerprint,
}

/// Builder for [`ReconfigureServer`]
#[derive(Debug)]
pub struct ServerBuilder {
    properties: SharedProperties,
    schema: Option<Schema>,
    config: ServerConfig,
    hooks: Hooks,
}

impl ServerBuilder {
    /// Use a host-supplied schema instead of deriving one
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Use a configuration
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Install an update hook
    #[must_use]
    pub fn update_hook(self, hook: UpdateHook) -> Self {
        self.hooks.set_update_hook(hook);
        self
    }

    /// Install the notify hook
    #[must_use]
    pub fn notify_hook<F>(self, f: F) -> Self
    where
        F: Fn(u32) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.set_notify_hook(f);
        self
    }

    /// Build the server and publish the initial snapshot (version 1)
    ///
    /// # Errors
    /// - [`ReconfigureError::Schema`] if the schema cannot be derived
    /// - [`ReconfigureError::StructureError`] if a declared name resolves to
    ///   a live value of an incompatible kind
    pub fn build(self) -> ReconfigureResult<ReconfigureServer> {
        let walker = Walker::new(self.config.max_depth);
        let bag = self.properties.read();

        let (schema, source) = match self.schema {
            Some(schema) => (schema, SchemaSource::Provided),
            None => (
                Schema::from_properties(&bag, &auto_options(&self.config, walker))?,
                SchemaSource::Auto,
            ),
        };
        let (values, shape) = observe(&bag, &schema, walker)?;
        drop(bag);

        tracing::info!(
            service = %self.config.service_name,
            parameters = schema.len(),
            ?source,
            "reconfigure server ready"
        );

        Ok(ReconfigureServer {
            snapshots: SnapshotStore::new(schema.fingerprint(), values),
            schema: ArcSwap::from_pointee(schema),
            events: EventBus::new(self.config.event_capacity),
            transaction: Mutex::new(TxnState { source, shape }),
            state: Mutex::new(ServerState::Idle),
            properties: self.properties,
            hooks: self.hooks,
            config: self.config,
            walker,
        })
    }
}

/// Bridge between a live property tree and the reconfiguration protocol
///
/// Requests are serialized by an internal transaction lock; snapshot and
/// schema reads are wait-free.
#[derive(Debug)]
pub struct ReconfigureServer {
    config: ServerConfig,
    walker: Walker,
    properties: SharedProperties,
    schema: ArcSwap<Schema>,
    snapshots: SnapshotStore,
    hooks: Hooks,
    events: EventBus,
    transaction: Mutex<TxnState>,
    state: Mutex<ServerState>,
}

impl ReconfigureServer {
    /// Start building a server over `properties`
    #[must_use]
    pub fn builder(properties: SharedProperties) -> ServerBuilder {
        ServerBuilder {
            properties,
            schema: None,
            config: ServerConfig::default(),
            hooks: Hooks::default(),
        }
    }

    /// Service name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.service_name
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The live property tree
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &SharedProperties {
        &self.properties
    }

    /// Hook registry
    #[inline]
    #[must_use]
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Current transaction phase
    #[must_use]
    pub fn state(&self) -> ServerState {
        *self.state.lock()
    }

    /// Where the current schema comes from (waits for an in-flight request)
    #[must_use]
    pub fn schema_source(&self) -> SchemaSource {
        self.transaction.lock().source
    }

    /// Last published snapshot
    #[must_use]
    pub fn get_config(&self) -> Arc<ConfigSnapshot> {
        self.snapshots.load()
    }

    /// Current schema
    #[must_use]
    pub fn describe(&self) -> Arc<Schema> {
        self.schema.load_full()
    }

    /// Receive update and description events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Apply a configuration request
    ///
    /// # Arguments
    /// * `request` - Flat `(name, value)` pairs; omitted names keep their values
    ///
    /// # Returns
    /// The published snapshot, level bits, change set and any warnings
    ///
    /// # Errors
    /// - [`ReconfigureError::UnknownParameter`] for an undeclared name
    /// - [`ReconfigureError::InvalidValue`] for a type, range or codec failure
    /// - [`ReconfigureError::StructureError`] if a target cannot be resolved or created
    /// - [`ReconfigureError::UpdateRejected`] if the update hook vetoes
    ///
    /// The first error found aborts the request; the live tree is then
    /// exactly as before the call. The snapshot is built from the written
    /// tree before the write lock is released, so a tree that cannot be
    /// described is rolled back too.
    ///
    /// Pre-images are read before the update hook runs and the tree is only
    /// write-locked afterwards. The host is assumed to be the single writer
    /// while a request is in flight; edits it makes from inside a hook are
    /// not reflected in the change set the hook saw.
    pub fn set_config(&self, request: &ConfigMessage) -> ReconfigureResult<SetConfigOutcome> {
        let mut txn = self.transaction.lock();
        self.sync_with_live(&mut txn, false)?;
        let schema = self.schema.load_full();
        let state = StateGuard::enter(&self.state, ServerState::Validating);

        for field in request {
            if !schema.contains(&field.name) {
                tracing::debug!(name = %field.name, "rejecting unknown parameter");
                return Err(ReconfigureError::UnknownParameter {
                    name: field.name.clone(),
                });
            }
        }

        let mut checked = Vec::with_capacity(request.len());
        for field in request {
            let value = schema
                .check_value(&field.name, &field.value, self.config.range_policy)
                .map_err(|e| ReconfigureError::invalid_value(&field.name, e))?
                .ok_or_else(|| ReconfigureError::UnknownParameter {
                    name: field.name.clone(),
                })?;
            checked.push((field.name.as_str(), value));
        }

        let mut changes = self.plan(&checked)?;
        let mut level = compute_level(changes.names(), &schema);

        if let Some(hook) = self.hooks.update_hook() {
            hook.invoke(&mut changes, level).map_err(|e| {
                tracing::info!(reason = %e, "update rejected by hook");
                ReconfigureError::UpdateRejected { reason: e.0 }
            })?;
            if hook.is_mutable() {
                changes.prune_unchanged();
                self.recheck(&changes, &schema)?;
                level = compute_level(changes.names(), &schema);
            }
        }

        state.advance(ServerState::Applying);
        let (values, shape) = {
            let mut bag = self.properties.write();
            let backup = (!changes.is_empty()).then(|| bag.clone());
            let applied = self
                .write(&mut bag, &changes)
                .and_then(|()| observe(&bag, &schema, self.walker));
            match applied {
                Ok(observed) => observed,
                Err(err) => {
                    if let Some(backup) = backup {
                        *bag = backup;
                        tracing::warn!(error = %err, "apply failed, live properties restored");
                    }
                    return Err(err);
                }
            }
        };
        txn.shape = shape;

        state.advance(ServerState::Notifying);
        let mut warnings = Vec::new();
        if let Some(notify) = self.hooks.notify_hook() {
            if let Err(e) = notify(level) {
                tracing::warn!(reason = %e, level, "notify hook failed");
                warnings.push(ReconfigureError::NotifyFailed { reason: e.0 });
            }
        }

        let snapshot = self.snapshots.publish(schema.fingerprint(), values);
        self.events.emit(ServerEvent::Update {
            snapshot: Arc::clone(&snapshot),
            level,
        });
        tracing::info!(
            service = %self.name(),
            version = snapshot.version,
            level,
            changed = changes.len(),
            "configuration updated"
        );

        Ok(SetConfigOutcome {
            snapshot,
            level,
            changes,
            warnings,
        })
    }

    /// Re-read the live tree after local host changes and publish a snapshot
    ///
    /// No hooks run. An auto-derived schema is re-derived if the tree's shape
    /// changed.
    ///
    /// # Errors
    /// [`ReconfigureError::Schema`] / [`ReconfigureError::StructureError`] if
    /// the tree can no longer be described.
    pub fn refresh(&self) -> ReconfigureResult<Arc<ConfigSnapshot>> {
        let mut txn = self.transaction.lock();
        let published = self.sync_with_live(&mut txn, true)?;
        Ok(published.unwrap_or_else(|| self.snapshots.load()))
    }

    /// Install a new host-supplied schema
    ///
    /// # Errors
    /// [`ReconfigureError::StructureError`] if the schema declares a name whose
    /// live value has an incompatible kind; the old schema stays active.
    pub fn replace_schema(&self, schema: Schema) -> ReconfigureResult<Arc<ConfigSnapshot>> {
        let mut txn = self.transaction.lock();
        let (values, shape) = observe(&self.properties.read(), &schema, self.walker)?;

        let schema = Arc::new(schema);
        self.schema.store(Arc::clone(&schema));
        txn.source = SchemaSource::Provided;
        txn.shape = shape;
        tracing::info!(parameters = schema.len(), fingerprint = %schema.fingerprint().short(), "schema replaced");

        let snapshot = self.snapshots.publish(schema.fingerprint(), values);
        self.events.emit(ServerEvent::Description { schema });
        self.events.emit(ServerEvent::Update {
            snapshot: Arc::clone(&snapshot),
            level: 0,
        });
        Ok(snapshot)
    }

    /// Apply every parameter's default through the full request sequence
    ///
    /// # Errors
    /// As [`Self::set_config`].
    pub fn reset_to_defaults(&self) -> ReconfigureResult<SetConfigOutcome> {
        let defaults = self.describe().defaults();
        self.set_config(&defaults)
    }

    /// Capture pre-images and decode values into the target leaves' kinds
    fn plan(&self, checked: &[(&str, FieldValue)]) -> ReconfigureResult<ChangeSet> {
        let bag = self.properties.read();
        let mut changes = ChangeSet::new();

        for (name, value) in checked {
            let path = parse_path(name)?;
            let presence = self
                .walker
                .can_materialize(&bag, &path)
                .map_err(|e| ReconfigureError::structure(*name, e))?;
            let (old, kind) = match presence {
                Presence::Existing => {
                    let current = self
                        .walker
                        .resolve(&bag, &path)
                        .map_err(|e| ReconfigureError::structure(*name, e))?;
                    (Some(current.clone()), current.kind())
                }
                Presence::Missing => (None, codec::natural_kind(value.field_type())),
            };
            let new = codec::decode(value, kind)
                .map_err(|e| ReconfigureError::invalid_value(*name, e))?;
            if old.as_ref() != Some(&new) {
                changes.record(*name, old, new);
            }
        }
        Ok(changes)
    }

    /// Validate values adjusted by a mutable update hook
    fn recheck(&self, changes: &ChangeSet, schema: &Schema) -> ReconfigureResult<()> {
        for (name, change) in changes {
            let field = codec::encode(&change.new)
                .map_err(|e| ReconfigureError::invalid_value(name, e))?;
            schema
                .check_value(name, &field, RangePolicy::Reject)
                .map_err(|e| ReconfigureError::invalid_value(name, e))?;
        }
        Ok(())
    }

    fn write(&self, bag: &mut PropertyBag, changes: &ChangeSet) -> ReconfigureResult<()> {
        for (name, change) in changes {
            let path = parse_path(name)?;
            let slot = self
                .walker
                .materialize(bag, &path, change.new.clone())
                .map_err(|e| ReconfigureError::structure(name, e))?;
            if slot.kind() != change.new.kind() {
                return Err(ReconfigureError::structure(
                    name,
                    WalkError::KindMismatch {
                        path: name.clone(),
                        expected: change.new.kind().to_string(),
                        found: slot.kind().to_string(),
                    },
                ));
            }
            slot.clone_from(&change.new);
        }
        Ok(())
    }

    /// Rebuild schema (when derived) and snapshot if the live shape moved
    ///
    /// With `force`, the snapshot is republished even when the shape is
    /// unchanged.
    fn sync_with_live(
        &self,
        txn: &mut TxnState,
        force: bool,
    ) -> ReconfigureResult<Option<Arc<ConfigSnapshot>>> {
        let bag = self.properties.read();
        let shape = self
            .walker
            .shape_fingerprint(&bag)
            .map_err(SchemaError::from)?;
        let reshaped = shape != txn.shape;
        if !reshaped && !force {
            return Ok(None);
        }

        let mut described = None;
        if reshaped {
            tracing::warn!(service = %self.name(), ?txn.source, "live property shape changed");
            if txn.source == SchemaSource::Auto {
                let schema = Arc::new(Schema::from_properties(
                    &bag,
                    &auto_options(&self.config, self.walker),
                )?);
                self.schema.store(Arc::clone(&schema));
                described = Some(schema);
            }
        }

        let schema = self.schema.load_full();
        let values = snapshot_values(&bag, &schema, self.walker)?;
        drop(bag);
        txn.shape = shape;

        if let Some(schema) = described {
            self.events.emit(ServerEvent::Description { schema });
        }
        let snapshot = self.snapshots.publish(schema.fingerprint(), values);
        self.events.emit(ServerEvent::Update {
            snapshot: Arc::clone(&snapshot),
            level: 0,
        });
        tracing::debug!(version = snapshot.version, "snapshot republished from live properties");
        Ok(Some(snapshot))
    }
}

fn auto_options(config: &ServerConfig, walker: Walker) -> AutoSchemaOptions {
    AutoSchemaOptions::default()
        .with_level(config.auto_schema_level)
        .with_walker(walker)
}

fn parse_path(name: &str) -> ReconfigureResult<PropertyPath> {
    name.parse()
        .map_err(|e| ReconfigureError::structure(name, WalkError::from(e)))
}

/// Snapshot values and shape of the tree as it stands
fn observe(
    bag: &PropertyBag,
    schema: &Schema,
    walker: Walker,
) -> ReconfigureResult<(ConfigMessage, Fingerprint)> {
    let values = snapshot_values(bag, schema, walker)?;
    let shape = walker
        .shape_fingerprint(bag)
        .map_err(SchemaError::from)?;
    Ok((values, shape))
}

/// Values for every declared parameter, in schema order
///
/// Names missing from the live tree report their default.
fn snapshot_values(
    bag: &PropertyBag,
    schema: &Schema,
    walker: Walker,
) -> ReconfigureResult<ConfigMessage> {
    let mut message = ConfigMessage::new();
    for param in schema.params() {
        let path = parse_path(&param.name)?;
        let value = match walker.resolve(bag, &path) {
            Ok(scalar) => {
                let field = codec::encode(scalar)
                    .map_err(|e| ReconfigureError::invalid_value(&param.name, e))?;
                if field.field_type() != param.ty {
                    return Err(ReconfigureError::structure(
                        &param.name,
                        WalkError::KindMismatch {
                            path: param.name.clone(),
                            expected: param.ty.to_string(),
                            found: scalar.kind().to_string(),
                        },
                    ));
                }
                field
            }
            Err(WalkError::NotFound { .. }) => param.default.clone(),
            Err(e) => return Err(ReconfigureError::structure(&param.name, e)),
        };
        message.insert(param.name.clone(), value);
    }
    Ok(message)
}

/// Holds the server in a non-idle state; back to `Idle` on drop
struct StateGuard<'a> {
    state: &'a Mutex<ServerState>,
}

impl<'a> StateGuard<'a> {
    fn enter(state: &'a Mutex<ServerState>, phase: ServerState) -> Self {
        let guard = Self { state };
        guard.advance(phase);
        guard
    }

    fn advance(&self, phase: ServerState) {
        *self.state.lock() = phase;
        tracing::debug!(state = ?phase, "transaction phase");
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = ServerState::Idle;
    }
}
