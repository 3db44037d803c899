//! End-to-end request handling against the reference component

use pretty_assertions::assert_eq;
use reconf_property::{share, PropertyBag, Scalar, WalkError};
use reconf_protocol::{ConfigMessage, FieldValue};
use reconf_schema::{ParamDescriptor, Schema, SchemaError};
use reconf_server::{
    HookError, ReconfigureError, ReconfigureServer, ServerConfig, ServerState, UpdateHook,
};
use reconf_test_utils::{fixture_schema, HookMode, TestComponent, VECTOR3_LEVEL};
use std::sync::{mpsc, Arc, Mutex};

fn component() -> TestComponent {
    TestComponent::new("component")
}

#[test]
fn set_then_get_merges_over_previous_snapshot() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);
    let before = server.get_config();

    let request = ConfigMessage::new()
        .with("int_param", 7)
        .with("str_param", "hello")
        .with("bag_param.str_param", "nested");
    let outcome = server.set_config(&request).unwrap();

    let mut expected = before.values.clone();
    expected.merge_from(&request);
    assert_eq!(server.get_config().values, expected);
    assert_eq!(outcome.response(), &expected);
    assert_eq!(outcome.changes.len(), 3);
    assert_eq!(c.value("bag_param.str_param"), Scalar::from("nested"));
}

#[test]
fn reapplying_is_idempotent() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);
    let request = ConfigMessage::new().with("double_param", 0.5).with("bool_param", true);

    let first = server.set_config(&request).unwrap();
    let second = server.set_config(&request).unwrap();

    assert!(second.changes.is_empty());
    assert_eq!(second.level, 0);
    assert_eq!(first.snapshot.values, second.snapshot.values);
    assert!(second.snapshot.version > first.snapshot.version);
}

#[test]
fn vector3_field_update() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);

    let seen = Arc::new(Mutex::new(None));
    let seen_in_hook = Arc::clone(&seen);
    server.hooks().set_update_hook(UpdateHook::read_only(move |changes, level| {
        *seen_in_hook.lock().unwrap() = Some((changes.old("vector3_param.x").cloned(), level));
        Ok(())
    }));

    let outcome = server
        .set_config(&ConfigMessage::new().with("vector3_param.x", 5.0))
        .unwrap();

    assert_eq!(outcome.level, VECTOR3_LEVEL);
    assert_eq!(
        outcome.response().get("vector3_param.x"),
        Some(&FieldValue::Double(5.0))
    );
    assert_eq!(
        outcome.response().get("vector3_param.y"),
        Some(&FieldValue::Double(2.0))
    );
    assert_eq!(
        *seen.lock().unwrap(),
        Some((Some(Scalar::Double(1.0)), VECTOR3_LEVEL))
    );
    assert_eq!(c.value("vector3_param.x"), Scalar::Double(5.0));
}

#[test]
fn unknown_field_changes_nothing() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::Both);
    let before = c.snapshot_properties();

    let err = server
        .set_config(&ConfigMessage::new().with("int_param", 3).with("unknown_field", 3))
        .unwrap_err();

    assert!(matches!(err, ReconfigureError::UnknownParameter { ref name } if name == "unknown_field"));
    assert_eq!(c.snapshot_properties(), before);
    assert_eq!(server.get_config().version, 1);
    assert!(!c.flags().any_called());
    assert_eq!(server.state(), ServerState::Idle);
}

#[test]
fn out_of_range_rejected() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);
    let err = server
        .set_config(&ConfigMessage::new().with("int_param", 1000))
        .unwrap_err();
    assert!(matches!(err, ReconfigureError::InvalidValue { ref name, .. } if name == "int_param"));
    assert_eq!(c.value("int_param"), Scalar::Int(0));
}

#[test]
fn type_mismatch_rejected() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);
    let err = server
        .set_config(&ConfigMessage::new().with("bool_param", "yes"))
        .unwrap_err();
    assert!(matches!(err, ReconfigureError::InvalidValue { .. }));
}

#[test]
fn rejecting_hook_leaves_everything_unchanged() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);
    server
        .hooks()
        .set_update_hook(UpdateHook::read_only(|_, _| Err(HookError::new("not now"))));
    let before_props = c.snapshot_properties();
    let before = server.get_config();

    let err = server
        .set_config(&ConfigMessage::new().with("int_param", 5))
        .unwrap_err();

    assert!(matches!(err, ReconfigureError::UpdateRejected { ref reason } if reason == "not now"));
    assert_eq!(c.snapshot_properties(), before_props);
    assert_eq!(server.get_config(), before);
}

#[test]
fn hooks_fire_for_empty_request() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::ReadOnly);
    let outcome = server.set_config(&ConfigMessage::new()).unwrap();
    assert_eq!(outcome.level, 0);
    assert!(outcome.changes.is_empty());
    assert!(c.flags().update_const_called());
    assert!(c.flags().notify_called());
}

#[test]
fn mutable_hook_takes_precedence() {
    let c = component();
    let server = c.add_service("reconfigure", None, HookMode::Both);
    server
        .set_config(&ConfigMessage::new().with("int_param", 1))
        .unwrap();
    assert!(c.flags().update_called());
    assert!(!c.flags().update_const_called());
}

#[test]
fn notify_failure_is_a_warning() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);
    server
        .hooks()
        .set_notify_hook(|_| Err(HookError::new("listener gone")));

    let outcome = server
        .set_config(&ConfigMessage::new().with("int_param", 2))
        .unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    assert!(matches!(
        outcome.warnings[0],
        ReconfigureError::NotifyFailed { .. }
    ));
    assert_eq!(c.value("int_param"), Scalar::Int(2));
}

#[test]
fn failed_write_restores_live_properties() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);
    let props = Arc::clone(c.properties());
    // host swaps int_param's type between validation and write
    server.hooks().set_update_hook(UpdateHook::read_only(move |_, _| {
        props
            .write()
            .add_property("int_param", Scalar::from("not an int"));
        Ok(())
    }));

    let err = server
        .set_config(&ConfigMessage::new().with("double_param", 0.5).with("int_param", 3))
        .unwrap_err();

    assert!(matches!(err, ReconfigureError::StructureError { ref name, .. } if name == "int_param"));
    assert_eq!(c.value("double_param"), Scalar::Double(0.0));
    assert_eq!(c.value("int_param"), Scalar::from("not an int"));
}

#[test]
fn undescribable_tree_after_write_rolls_back() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);
    let props = Arc::clone(c.properties());
    // bag_param.str_param can no longer be resolved once bag_param is a scalar
    server.hooks().set_update_hook(UpdateHook::read_only(move |_, _| {
        props.write().add_property("bag_param", Scalar::Int(1));
        Ok(())
    }));

    let err = server
        .set_config(&ConfigMessage::new().with("int_param", 3))
        .unwrap_err();

    assert!(matches!(
        err,
        ReconfigureError::StructureError { ref name, source: WalkError::NotAContainer { .. } }
            if name == "bag_param.str_param"
    ));
    assert_eq!(c.value("int_param"), Scalar::Int(0));
    assert_eq!(server.get_config().version, 1);
    assert_eq!(server.state(), ServerState::Idle);
}

#[test]
fn fixed_layout_target_changes_nothing() {
    let c = component();
    let fixture = fixture_schema();
    let mut params = fixture.params().to_vec();
    params.push(ParamDescriptor::new("vector3_param.w", 0.0));
    let schema = Schema::with_groups(fixture.groups().to_vec(), params).unwrap();
    let server = c.add_service("reconfigure", Some(schema), HookMode::Both);
    assert_eq!(
        server.get_config().get("vector3_param.w"),
        Some(&FieldValue::Double(0.0))
    );
    let before = c.snapshot_properties();

    let err = server
        .set_config(&ConfigMessage::new().with("int_param", 3).with("vector3_param.w", 1.0))
        .unwrap_err();

    assert!(matches!(
        err,
        ReconfigureError::StructureError { ref name, source: WalkError::FixedLayout { .. } }
            if name == "vector3_param.w"
    ));
    assert_eq!(c.snapshot_properties(), before);
    assert_eq!(server.get_config().version, 1);
    assert!(!c.flags().any_called());
}

#[test]
fn depth_bound_limits_declared_and_live_trees() {
    let props = share(PropertyBag::new().with("int_param", Scalar::Int(0)));
    let config = ServerConfig::new().with_max_depth(1);

    let deep = Schema::new(vec![
        ParamDescriptor::new("int_param", 0),
        ParamDescriptor::new("deep.gain", 0.5),
    ])
    .unwrap();
    let err = ReconfigureServer::builder(Arc::clone(&props))
        .schema(deep)
        .config(config.clone())
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ReconfigureError::StructureError { ref name, source: WalkError::DepthExceeded { max_depth: 1, .. } }
            if name == "deep.gain"
    ));

    let server = ReconfigureServer::builder(Arc::clone(&props))
        .config(config)
        .build()
        .unwrap();
    props
        .write()
        .add_property("deep", PropertyBag::new().with("gain", Scalar::Double(0.5)));

    let err = server
        .set_config(&ConfigMessage::new().with("int_param", 3))
        .unwrap_err();
    assert!(matches!(
        err,
        ReconfigureError::Schema(SchemaError::Walk(WalkError::DepthExceeded { .. }))
    ));
    assert_eq!(server.get_config().version, 1);
    let bag = props.read();
    assert_eq!(
        bag.get("int_param").map(|p| &p.value),
        Some(&Scalar::Int(0).into())
    );
}

#[test]
fn repeated_request_name_applies_last_value() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);

    for (first, last) in [(5, 0), (5, 7)] {
        let json = format!(
            r#"{{"fields":[
                {{"name":"int_param","value":{{"type":"int","value":{first}}}}},
                {{"name":"int_param","value":{{"type":"int","value":{last}}}}}
            ]}}"#
        );
        let request = ConfigMessage::from_json(&json).unwrap();
        assert_eq!(request.len(), 1);
        server.set_config(&request).unwrap();
        assert_eq!(c.value("int_param"), Scalar::Int(last));
    }
}

#[test]
fn get_config_does_not_wait_for_transaction() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);

    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);
    server.hooks().set_update_hook(UpdateHook::read_only(move |_, _| {
        entered_tx.lock().unwrap().send(()).unwrap();
        release_rx.lock().unwrap().recv().unwrap();
        Ok(())
    }));

    std::thread::scope(|scope| {
        let worker = scope.spawn(|| server.set_config(&ConfigMessage::new().with("int_param", 9)));

        entered_rx.recv().unwrap();
        assert_eq!(server.state(), ServerState::Validating);
        assert_eq!(server.get_config().version, 1);
        assert_eq!(server.describe().len(), fixture_schema().len());

        release_tx.send(()).unwrap();
        let outcome = worker.join().unwrap().unwrap();
        assert_eq!(outcome.snapshot.version, 2);
    });
    assert_eq!(server.get_config().version, 2);
    assert_eq!(server.state(), ServerState::Idle);
}

#[test]
fn service_callback_dispatch() {
    let c = component();
    c.add_service("reconfigure", None, HookMode::Mutable);

    let mut response = ConfigMessage::new();
    assert!(c.set_config_callback(
        "reconfigure",
        &ConfigMessage::new().with("uint_param", 4),
        &mut response
    ));
    assert_eq!(response.get("uint_param"), Some(&FieldValue::Int(4)));

    let mut untouched = ConfigMessage::new();
    assert!(!c.set_config_callback("missing", &ConfigMessage::new(), &mut untouched));
    assert!(untouched.is_empty());
    assert!(!c.set_config_callback(
        "reconfigure",
        &ConfigMessage::new().with("uint_param", -4),
        &mut untouched
    ));
}

#[test]
fn reset_to_defaults_runs_full_sequence() {
    let c = component();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::Mutable);
    server
        .set_config(&ConfigMessage::new().with("int_param", 5).with("vector3_param.z", 9.0))
        .unwrap();
    c.flags().reset();

    let outcome = server.reset_to_defaults().unwrap();
    assert!(c.flags().update_called());
    assert_eq!(outcome.changes.len(), 2);
    assert_eq!(outcome.response(), &fixture_schema().defaults());
}

#[test]
fn schema_documents_drive_the_server() {
    let yaml = r"
parameters:
  - name: int_param
    type: int
    default: 0
    level: 4
  - name: float_param
    type: double
    default: 0
    min: -1
    max: 1
";
    let c = component();
    let server = c.add_service("reconfigure", Some(Schema::from_yaml(yaml).unwrap()), HookMode::None);
    let outcome = server
        .set_config(&ConfigMessage::new().with("float_param", 0.75).with("int_param", 1))
        .unwrap();
    assert_eq!(outcome.level, 4);
    assert_eq!(c.value("float_param"), Scalar::Float(0.75));
    assert_eq!(outcome.response().len(), 2);
}
