//! Connection registry
//!
//! Tracks every live connection, the channel used to push frames to it, and
//! the identity it declared with `register`.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

/// Opaque per-connection handle, unique for the lifetime of the process.
pub type ConnectionId = String;

/// Identity class a connection declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Unregistered,
    Control,
    Unit,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Unregistered => f.write_str("unregistered"),
            Role::Control => f.write_str("control"),
            Role::Unit => f.write_str("unit"),
        }
    }
}

/// Where the hub pushes a connection's outbound frames.
pub trait Outbound: Send + Sync + fmt::Debug {
    /// Enqueue one frame. Returns `false` once the receiving side is gone.
    fn deliver(&self, frame: WsMessage) -> bool;
}

impl Outbound for UnboundedSender<WsMessage> {
    fn deliver(&self, frame: WsMessage) -> bool {
        self.send(frame).is_ok()
    }
}

#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub sender: Box<dyn Outbound>,
    pub role: Role,
    /// Unit id or control-point id; `None` until the first `register`.
    pub client_id: Option<String>,
}

impl Connection {
    /// Create an unregistered connection around its outbound channel.
    pub fn new(sender: impl Outbound + 'static) -> Self {
        Self {
            id: format!("conn-{}", Uuid::new_v4()),
            sender: Box::new(sender),
            role: Role::Unregistered,
            client_id: None,
        }
    }

    /// Bind an identity. A second call overwrites the first.
    pub fn register(&mut self, role: Role, client_id: String) {
        self.role = role;
        self.client_id = Some(client_id);
    }

    /// The unit id to reconcile when this connection goes away, if it is a
    /// registered field unit.
    pub fn unit_id(&self) -> Option<&str> {
        match self.role {
            Role::Unit => self.client_id.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn insert(&mut self, connection: Connection) {
        self.connections.insert(connection.id.clone(), connection);
    }

    pub fn remove(&mut self, id: &str) -> Option<Connection> {
        self.connections.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
