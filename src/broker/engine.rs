//! Broker engine
//!
//! The in-memory state behind the hub: the connection registry and the topic
//! subscription table, with the register / subscribe / publish / disconnect
//! operations over them.
//!
//! Concurrency and usage notes:
//! - The API is synchronous and meant to be held behind one table-wide lock
//!   (`Hub` owns it as `Arc<Mutex<Broker>>`). Every operation is bounded by
//!   the subscribers of a single topic.
//! - Fan-out only enqueues onto each subscriber's unbounded channel; socket
//!   writes happen in the per-connection send task, never under the lock.
//!   Because a connection's inbound frames are handled one at a time and each
//!   publish enqueues to every subscriber before returning, successive
//!   publishes from one sender reach each subscriber in sender order.

use tracing::{debug, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::message::Delivery;
use crate::broker::registry::{Connection, ConnectionId, ConnectionRegistry, Role};
use crate::broker::topic::SubscriptionTable;
use crate::utils::DispatchError;

/// Result of one fan-out.
#[derive(Debug, Default)]
pub struct PublishOutcome {
    /// Subscribers the envelope was enqueued for.
    pub delivered: usize,
    /// Subscribers whose channel was closed; already removed from the
    /// registry and every topic.
    pub evicted: Vec<Connection>,
}

#[derive(Debug, Default)]
pub struct Broker {
    registry: ConnectionRegistry,
    subscriptions: SubscriptionTable,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(&mut self, connection: Connection) -> ConnectionId {
        let id = connection.id.clone();
        self.registry.insert(connection);
        debug!(connection = %id, "connection added");
        id
    }

    /// Bind `role`/`client_id` to a live connection. Returns `false` when the
    /// connection is unknown.
    pub fn register(&mut self, id: &str, role: Role, client_id: String) -> bool {
        match self.registry.get_mut(id) {
            Some(connection) => {
                debug!(connection = %id, %role, client = %client_id, "registered");
                connection.register(role, client_id);
                true
            }
            None => false,
        }
    }

    /// Add a live connection to `topic`. Returns `false` when the connection
    /// is unknown.
    pub fn subscribe(&mut self, topic: &str, id: &str) -> bool {
        if !self.registry.contains(id) {
            return false;
        }
        self.subscriptions.subscribe(topic, id.to_string());
        debug!(connection = %id, topic, "subscribed");
        true
    }

    pub fn unsubscribe(&mut self, topic: &str, id: &str) -> bool {
        self.subscriptions.unsubscribe(topic, id)
    }

    /// Enqueue `delivery` for every current subscriber of its topic,
    /// including the publisher itself when subscribed. A topic without
    /// subscribers is a silent no-op; nothing is retained for later
    /// subscribers.
    pub fn publish(&mut self, delivery: &Delivery) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();
        let subscribers = self.subscriptions.subscribers(&delivery.topic);
        if subscribers.is_empty() {
            debug!(topic = %delivery.topic, "publish with no subscribers");
            return outcome;
        }

        let text = match serde_json::to_string(delivery) {
            Ok(json) => json,
            Err(e) => {
                warn!(topic = %delivery.topic, "failed to serialize delivery: {e}");
                return outcome;
            }
        };
        let frame = WsMessage::text(text);

        let mut failed = Vec::new();
        for sub_id in subscribers {
            match self.registry.get(&sub_id) {
                Some(connection) => {
                    if connection.sender.deliver(frame.clone()) {
                        outcome.delivered += 1;
                    } else {
                        warn!(error = %DispatchError::DeliveryFailure(sub_id.clone()), "evicting subscriber");
                        failed.push(sub_id);
                    }
                }
                None => {
                    // registry and table drifted apart; drop the stale entry
                    self.subscriptions.remove_everywhere(&sub_id);
                }
            }
        }

        outcome.evicted = failed
            .iter()
            .filter_map(|id| self.remove_connection(id))
            .collect();
        outcome
    }

    /// Remove a connection from the registry and from every topic. Returns
    /// the removed record, or `None` if it was already gone.
    pub fn remove_connection(&mut self, id: &str) -> Option<Connection> {
        let topics = self.subscriptions.remove_everywhere(id);
        let removed = self.registry.remove(id);
        if removed.is_some() {
            debug!(connection = %id, ?topics, "connection removed");
        }
        removed
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.registry.get(id)
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_subscribed(&self, topic: &str, id: &str) -> bool {
        self.subscriptions.is_subscribed(topic, id)
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscriptions.subscriber_count(topic)
    }
}
