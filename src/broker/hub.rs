//! Dispatch hub
//!
//! `Hub` is the shared, cloneable handle every connection task holds. It owns
//! the broker state behind a single table-wide mutex and the disconnect hook
//! supplied at construction.
//!
//! The hook is only ever called after the lock has been released, and only
//! for connections that had registered as field units. It must not block:
//! the server wires it to an unbounded channel send, so teardown of the
//! closing connection never waits on the correlator.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::info;

use crate::broker::engine::Broker;
use crate::broker::message::Delivery;
use crate::broker::registry::{Connection, ConnectionId, Outbound, Role};

/// Called with the unit id of every registered field unit whose connection
/// closes or is evicted.
pub type DisconnectHook = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hub {
    broker: Arc<Mutex<Broker>>,
    on_unit_disconnect: Option<DisconnectHook>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("connections", &self.connection_count())
            .field("disconnect_hook", &self.on_unit_disconnect.is_some())
            .finish()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disconnect_hook<F>(hook: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        Self {
            broker: Arc::default(),
            on_unit_disconnect: Some(Arc::new(hook)),
        }
    }

    // Critical sections never leave the tables half-updated, so a poisoned
    // lock still guards consistent state.
    fn state(&self) -> MutexGuard<'_, Broker> {
        self.broker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a new, unregistered connection whose frames go to `sender`.
    pub fn connect(&self, sender: impl Outbound + 'static) -> ConnectionId {
        self.state().add_connection(Connection::new(sender))
    }

    pub fn register(&self, id: &str, role: Role, client_id: String) -> bool {
        self.state().register(id, role, client_id)
    }

    pub fn subscribe(&self, id: &str, topic: &str) -> bool {
        self.state().subscribe(topic, id)
    }

    pub fn unsubscribe(&self, id: &str, topic: &str) -> bool {
        self.state().unsubscribe(topic, id)
    }

    /// Fan `payload` out to the current subscribers of `topic` as
    /// `{topic, payload}`. Returns how many subscribers it was enqueued for.
    /// Subscribers whose channel is closed are evicted as if they had
    /// disconnected.
    pub fn publish(&self, topic: &str, payload: Value) -> usize {
        let outcome = self.state().publish(&Delivery::new(topic, payload));
        self.notify_disconnected(outcome.evicted);
        outcome.delivered
    }

    /// Tear down a connection. Idempotent: returns `false` when it was
    /// already removed (for instance evicted during a fan-out).
    pub fn disconnect(&self, id: &str) -> bool {
        let removed = self.state().remove_connection(id);
        match removed {
            Some(connection) => {
                info!(connection = %id, role = %connection.role, "disconnected");
                self.notify_disconnected(vec![connection]);
                true
            }
            None => false,
        }
    }

    fn notify_disconnected(&self, connections: Vec<Connection>) {
        let Some(hook) = &self.on_unit_disconnect else {
            return;
        };
        for connection in connections {
            if let Some(unit_id) = connection.unit_id() {
                hook(unit_id.to_string());
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.state().connection_count()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state().subscriber_count(topic)
    }

    pub fn is_subscribed(&self, id: &str, topic: &str) -> bool {
        self.state().is_subscribed(topic, id)
    }

    /// Declared identity of a live connection.
    pub fn identity(&self, id: &str) -> Option<(Role, Option<String>)> {
        self.state()
            .connection(id)
            .map(|c| (c.role, c.client_id.clone()))
    }
}
