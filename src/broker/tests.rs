use super::topic::{SubscriptionTable, Topic};
use super::{Broker, Connection, Delivery, Hub, Role};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

fn channel() -> (
    mpsc::UnboundedSender<WsMessage>,
    mpsc::UnboundedReceiver<WsMessage>,
) {
    mpsc::unbounded_channel::<WsMessage>()
}

fn recv_delivery(rx: &mut mpsc::UnboundedReceiver<WsMessage>) -> Delivery {
    match rx.try_recv().expect("expected a delivery") {
        WsMessage::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected a text message, got {other:?}"),
    }
}

#[test]
fn test_topic_subscribe_is_idempotent() {
    let mut topic = Topic::new("location");
    topic.subscribe("conn-1".to_string());
    topic.subscribe("conn-1".to_string());
    assert_eq!(topic.subscribers.len(), 1);
    assert!(topic.unsubscribe("conn-1"));
    assert!(!topic.unsubscribe("conn-1"));
}

#[test]
fn test_subscription_table_remove_everywhere() {
    let mut table = SubscriptionTable::default();
    table.subscribe("location", "a".to_string());
    table.subscribe("resolution", "a".to_string());
    table.subscribe("resolution", "b".to_string());

    let mut removed = table.remove_everywhere("a");
    removed.sort();
    assert_eq!(removed, vec!["location", "resolution"]);
    assert_eq!(table.subscriber_count("location"), 0);
    assert_eq!(table.subscribers("resolution"), vec!["b".to_string()]);
}

#[test]
fn test_connection_register_overwrites_identity() {
    let (tx, _rx) = channel();
    let mut connection = Connection::new(tx);
    assert_eq!(connection.role, Role::Unregistered);
    assert_eq!(connection.unit_id(), None);

    connection.register(Role::Unit, "ERT-001".to_string());
    assert_eq!(connection.unit_id(), Some("ERT-001"));

    connection.register(Role::Control, "control-room".to_string());
    assert_eq!(connection.unit_id(), None);
    assert_eq!(connection.client_id.as_deref(), Some("control-room"));
}

#[test]
fn test_broker_subscribe_requires_live_connection() {
    let mut broker = Broker::new();
    assert!(!broker.subscribe("location", "ghost"));
    assert_eq!(broker.subscriber_count("location"), 0);

    let (tx, _rx) = channel();
    let id = broker.add_connection(Connection::new(tx));
    assert!(broker.subscribe("location", &id));
    assert!(broker.is_subscribed("location", &id));
}

#[test]
fn test_publish_reaches_every_subscriber_once() {
    let mut broker = Broker::new();
    let (tx_a, mut rx_a) = channel();
    let (tx_b, mut rx_b) = channel();
    let (tx_c, mut rx_c) = channel();
    let a = broker.add_connection(Connection::new(tx_a));
    let b = broker.add_connection(Connection::new(tx_b));
    broker.add_connection(Connection::new(tx_c));
    broker.subscribe("location", &a);
    broker.subscribe("location", &b);
    broker.subscribe("location", &b);

    let outcome = broker.publish(&Delivery::new("location", json!({"ert_id": "U1"})));
    assert_eq!(outcome.delivered, 2);
    assert!(outcome.evicted.is_empty());

    for rx in [&mut rx_a, &mut rx_b] {
        let delivery = recv_delivery(rx);
        assert_eq!(delivery.topic, "location");
        assert_eq!(delivery.payload, json!({"ert_id": "U1"}));
        assert!(rx.try_recv().is_err());
    }
    assert!(rx_c.try_recv().is_err());
}

#[test]
fn test_publisher_receives_its_own_message_when_subscribed() {
    let hub = Hub::new();
    let (tx, mut rx) = channel();
    let id = hub.connect(tx);
    hub.subscribe(&id, "new_incident");

    assert_eq!(hub.publish("new_incident", json!({"id": "I1"})), 1);
    assert_eq!(recv_delivery(&mut rx).payload["id"], "I1");
}

#[test]
fn test_publish_preserves_sender_order() {
    let hub = Hub::new();
    let (tx, mut rx) = channel();
    let id = hub.connect(tx);
    hub.subscribe(&id, "location");

    for i in 0..20 {
        hub.publish("location", json!({ "seq": i }));
    }
    for i in 0..20 {
        assert_eq!(recv_delivery(&mut rx).payload["seq"], i);
    }
}

#[test]
fn test_publish_to_topic_without_subscribers_is_silent() {
    let hub = Hub::new();
    assert_eq!(hub.publish("nobody", json!("hello")), 0);

    // no replay for late subscribers
    let (tx, mut rx) = channel();
    let id = hub.connect(tx);
    hub.subscribe(&id, "nobody");
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_disconnect_removes_from_every_topic() {
    let hub = Hub::new();
    let (tx, mut rx) = channel();
    let id = hub.connect(tx);
    hub.subscribe(&id, "location");
    hub.subscribe(&id, "resolution");

    assert!(hub.disconnect(&id));
    assert!(!hub.disconnect(&id));
    assert_eq!(hub.connection_count(), 0);
    assert!(!hub.is_subscribed(&id, "location"));
    assert_eq!(hub.publish("resolution", json!({})), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_closed_subscriber_is_evicted_without_aborting_fan_out() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let hub = {
        let seen = seen.clone();
        Hub::with_disconnect_hook(move |unit| seen.lock().unwrap().push(unit))
    };

    let (tx_dead, rx_dead) = channel();
    let (tx_live, mut rx_live) = channel();
    let dead = hub.connect(tx_dead);
    let live = hub.connect(tx_live);
    hub.register(&dead, Role::Unit, "ERT-9".to_string());
    hub.subscribe(&dead, "new_incident");
    hub.subscribe(&dead, "location");
    hub.subscribe(&live, "new_incident");

    // Drop the receiver to close the channel
    drop(rx_dead);

    assert_eq!(hub.publish("new_incident", json!({"id": "I1"})), 1);
    assert_eq!(recv_delivery(&mut rx_live).payload["id"], "I1");
    assert!(hub.identity(&dead).is_none());
    assert!(!hub.is_subscribed(&dead, "location"));
    assert_eq!(*seen.lock().unwrap(), vec!["ERT-9".to_string()]);

    // a later close of the same socket does not fire the hook twice
    assert!(!hub.disconnect(&dead));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_disconnect_hook_only_fires_for_units() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let hub = {
        let seen = seen.clone();
        Hub::with_disconnect_hook(move |unit| seen.lock().unwrap().push(unit))
    };

    let (tx_anon, _rx_anon) = channel();
    let (tx_cr, _rx_cr) = channel();
    let (tx_unit, _rx_unit) = channel();
    let anon = hub.connect(tx_anon);
    let cr = hub.connect(tx_cr);
    let unit = hub.connect(tx_unit);
    hub.register(&cr, Role::Control, "control-room".to_string());
    hub.register(&unit, Role::Control, "was-control".to_string());
    hub.register(&unit, Role::Unit, "ERT-001".to_string());

    hub.disconnect(&anon);
    hub.disconnect(&cr);
    hub.disconnect(&unit);

    assert_eq!(*seen.lock().unwrap(), vec!["ERT-001".to_string()]);
}

#[test]
fn test_register_unknown_connection_is_rejected() {
    let hub = Hub::new();
    assert!(!hub.register("ghost", Role::Unit, "ERT-1".to_string()));
}
