//! Testing utilities for the reconf workspace
//!
//! A reference host component with the usual parameter mix, hook call flags
//! and a by-name service registry.

#![allow(missing_docs)]

use parking_lot::RwLock;
use reconf_property::{share, Composite, PropertyBag, Scalar, SharedProperties, Walker};
use reconf_protocol::ConfigMessage;
use reconf_schema::{GroupDescriptor, ParamDescriptor, Schema};
use reconf_server::{HookError, ReconfigureServer, ServerConfig, UpdateHook};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Level bits of `int_param`
pub const INT_LEVEL: u32 = 1;
/// Level bits of the `vector3_param` fields
pub const VECTOR3_LEVEL: u32 = 2;

/// Properties of the reference component, at their initial values
pub fn fixture_properties() -> PropertyBag {
    PropertyBag::new()
        .with("int_param", Scalar::Int(0))
        .with("double_param", Scalar::Double(0.0))
        .with("str_param", Scalar::from(""))
        .with("bool_param", Scalar::Bool(false))
        .with("float_param", Scalar::Float(0.0))
        .with("uint_param", Scalar::UInt(0))
        .with("bag_param", PropertyBag::new().with("str_param", Scalar::from("")))
        .with("vector3_param", Composite::vector3(1.0, 2.0, 3.0))
}

/// Hand-written schema for [`fixture_properties`]
pub fn fixture_schema() -> Schema {
    Schema::with_groups(
        vec![
            GroupDescriptor::new(1, 0, "bag_param"),
            GroupDescriptor::new(2, 0, "vector3_param"),
        ],
        vec![
            ParamDescriptor::new("int_param", 0)
                .with_range(-100, 100)
                .with_level(INT_LEVEL)
                .with_description("integer parameter"),
            ParamDescriptor::new("double_param", 0.0).with_range(-1.0, 1.0),
            ParamDescriptor::new("str_param", ""),
            ParamDescriptor::new("bool_param", false),
            ParamDescriptor::new("float_param", 0.0),
            ParamDescriptor::new("uint_param", 0).with_range(0, 1000),
            ParamDescriptor::new("bag_param.str_param", "").in_group(1),
            ParamDescriptor::new("vector3_param.x", 1.0)
                .with_level(VECTOR3_LEVEL)
                .in_group(2),
            ParamDescriptor::new("vector3_param.y", 2.0)
                .with_level(VECTOR3_LEVEL)
                .in_group(2),
            ParamDescriptor::new("vector3_param.z", 3.0)
                .with_level(VECTOR3_LEVEL)
                .in_group(2),
        ],
    )
    .unwrap()
}

/// Which update hooks a service gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookMode {
    None,
    Mutable,
    ReadOnly,
    /// Both registered; the mutable one wins
    Both,
}

/// Records which hooks ran
#[derive(Debug, Default)]
pub struct HookFlags {
    update: AtomicBool,
    update_const: AtomicBool,
    notify: AtomicBool,
}

impl HookFlags {
    pub fn update_called(&self) -> bool {
        self.update.load(Ordering::SeqCst)
    }

    pub fn update_const_called(&self) -> bool {
        self.update_const.load(Ordering::SeqCst)
    }

    pub fn notify_called(&self) -> bool {
        self.notify.load(Ordering::SeqCst)
    }

    pub fn any_called(&self) -> bool {
        self.update_called() || self.update_const_called() || self.notify_called()
    }

    pub fn reset(&self) {
        self.update.store(false, Ordering::SeqCst);
        self.update_const.store(false, Ordering::SeqCst);
        self.notify.store(false, Ordering::SeqCst);
    }
}

/// Reference host component
#[derive(Debug)]
pub struct TestComponent {
    name: String,
    properties: SharedProperties,
    flags: Arc<HookFlags>,
    services: RwLock<HashMap<String, Arc<ReconfigureServer>>>,
}

impl TestComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: share(fixture_properties()),
            flags: Arc::new(HookFlags::default()),
            services: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &SharedProperties {
        &self.properties
    }

    pub fn flags(&self) -> &HookFlags {
        &self.flags
    }

    /// Register a reconfigure service over this component's properties
    ///
    /// `schema: None` derives the schema from the live properties.
    pub fn add_service(
        &self,
        service_name: &str,
        schema: Option<Schema>,
        mode: HookMode,
    ) -> Arc<ReconfigureServer> {
        let mut builder = ReconfigureServer::builder(Arc::clone(&self.properties))
            .config(ServerConfig::new().with_service_name(service_name));
        if let Some(schema) = schema {
            builder = builder.schema(schema);
        }
        if matches!(mode, HookMode::Mutable | HookMode::Both) {
            let flags = Arc::clone(&self.flags);
            builder = builder.update_hook(UpdateHook::mutable(move |_, _| {
                tracing::info!("mutable update hook called");
                flags.update.store(true, Ordering::SeqCst);
                Ok(())
            }));
        }
        if matches!(mode, HookMode::ReadOnly | HookMode::Both) {
            let flags = Arc::clone(&self.flags);
            builder = builder.update_hook(UpdateHook::read_only(move |_, _| {
                tracing::info!("read-only update hook called");
                flags.update_const.store(true, Ordering::SeqCst);
                Ok(())
            }));
        }
        let flags = Arc::clone(&self.flags);
        builder = builder.notify_hook(move |_| -> Result<(), HookError> {
            flags.notify.store(true, Ordering::SeqCst);
            Ok(())
        });

        let server = Arc::new(builder.build().unwrap());
        self.services
            .write()
            .insert(service_name.to_string(), Arc::clone(&server));
        server
    }

    /// Service registered under `service_name`
    pub fn provides(&self, service_name: &str) -> Option<Arc<ReconfigureServer>> {
        self.services.read().get(service_name).cloned()
    }

    /// Dispatch a request the way a transport would
    ///
    /// Returns `false` for an unknown service or a rejected request.
    pub fn set_config_callback(
        &self,
        service_name: &str,
        request: &ConfigMessage,
        response: &mut ConfigMessage,
    ) -> bool {
        let Some(service) = self.provides(service_name) else {
            return false;
        };
        match service.set_config(request) {
            Ok(outcome) => {
                *response = outcome.response().clone();
                true
            }
            Err(err) => {
                tracing::info!(error = %err, "set_config rejected");
                false
            }
        }
    }

    /// Current live value at a dotted name
    pub fn value(&self, name: &str) -> Scalar {
        let bag = self.properties.read();
        Walker::default()
            .resolve(&bag, &name.parse().unwrap())
            .unwrap()
            .clone()
    }

    /// Copy of the live tree
    pub fn snapshot_properties(&self) -> PropertyBag {
        self.properties.read().clone()
    }
}

impl Default for TestComponent {
    fn default() -> Self {
        Self::new("component")
    }
}
