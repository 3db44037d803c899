//! Event broadcast and schema lifecycle

use pretty_assertions::assert_eq;
use reconf_property::Scalar;
use reconf_protocol::{ConfigMessage, FieldValue};
use reconf_schema::{ParamDescriptor, Schema};
use reconf_server::{ReconfigureError, SchemaSource, ServerEvent};
use reconf_test_utils::{fixture_schema, HookMode, TestComponent, INT_LEVEL};

#[tokio::test]
async fn update_event_follows_publish() {
    let c = TestComponent::default();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);
    let mut rx = server.subscribe();

    let outcome = server
        .set_config(&ConfigMessage::new().with("int_param", 11))
        .unwrap();

    match rx.recv().await.unwrap() {
        ServerEvent::Update { snapshot, level } => {
            assert_eq!(level, INT_LEVEL);
            assert_eq!(snapshot, outcome.snapshot);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn rejected_request_emits_nothing() {
    let c = TestComponent::default();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);
    let mut rx = server.subscribe();

    assert!(server
        .set_config(&ConfigMessage::new().with("nope", 1))
        .is_err());
    assert!(matches!(
        rx.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn shape_change_rederives_auto_schema() {
    let c = TestComponent::default();
    let server = c.add_service("reconfigure", None, HookMode::None);
    assert_eq!(server.schema_source(), SchemaSource::Auto);
    let before = server.describe().fingerprint();
    let mut rx = server.subscribe();

    c.properties()
        .write()
        .add_property("gain", Scalar::Double(0.1));

    let outcome = server
        .set_config(&ConfigMessage::new().with("gain", 0.2))
        .unwrap();
    assert_eq!(outcome.response().get("gain"), Some(&FieldValue::Double(0.2)));
    assert_ne!(server.describe().fingerprint(), before);

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event {
            ServerEvent::Description { .. } => "description",
            ServerEvent::Update { .. } => "update",
        });
    }
    assert_eq!(kinds, vec!["description", "update", "update"]);
}

#[tokio::test]
async fn replace_schema_broadcasts_description() {
    let c = TestComponent::default();
    let server = c.add_service("reconfigure", None, HookMode::None);
    let mut rx = server.subscribe();

    let narrow = Schema::new(vec![ParamDescriptor::new("int_param", 0).with_level(16)]).unwrap();
    let snapshot = server.replace_schema(narrow.clone()).unwrap();

    assert_eq!(server.schema_source(), SchemaSource::Provided);
    assert_eq!(snapshot.values.len(), 1);
    assert_eq!(snapshot.schema_fingerprint, narrow.fingerprint());

    match rx.recv().await.unwrap() {
        ServerEvent::Description { schema } => assert_eq!(*schema, narrow),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(
        rx.recv().await.unwrap(),
        ServerEvent::Update { level: 0, .. }
    ));

    let err = server
        .set_config(&ConfigMessage::new().with("double_param", 1.0))
        .unwrap_err();
    assert!(matches!(err, ReconfigureError::UnknownParameter { .. }));
}

#[tokio::test]
async fn incompatible_schema_keeps_old_one() {
    let c = TestComponent::default();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::None);
    let bad = Schema::new(vec![ParamDescriptor::new("bool_param", 1)]).unwrap();
    assert!(server.replace_schema(bad).is_err());
    assert_eq!(*server.describe(), fixture_schema());
}

#[tokio::test]
async fn refresh_republishes_local_edits() {
    let c = TestComponent::default();
    let server = c.add_service("reconfigure", Some(fixture_schema()), HookMode::ReadOnly);
    let mut rx = server.subscribe();

    if let Some(p) = c.properties().write().get_mut("str_param") {
        p.value = Scalar::from("local").into();
    }
    let snapshot = server.refresh().unwrap();

    assert_eq!(snapshot.get("str_param"), Some(&FieldValue::from("local")));
    assert!(!c.flags().any_called());
    assert!(matches!(
        rx.recv().await.unwrap(),
        ServerEvent::Update { level: 0, .. }
    ));
}
