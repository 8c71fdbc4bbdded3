//! Error taxonomy for the hub and the correlator.
//!
//! `NotFound`, `AlreadyExists` and `InvalidTransition` surface to
//! control-point callers.
//! `MalformedMessage` and `DeliveryFailure` are recovered locally: the first by
//! dropping a single message, the second by evicting the failing subscriber.

use std::fmt;

use thiserror::Error;

use crate::broker::registry::ConnectionId;
use crate::dispatch::model::IncidentStatus;

/// The kind of aggregate an id failed to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Incident,
    Unit,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Incident => f.write_str("incident"),
            EntityKind::Unit => f.write_str("unit"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: EntityKind, id: String },

    #[error("incident {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: IncidentStatus,
        to: IncidentStatus,
    },

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("delivery to connection {0} failed")]
    DeliveryFailure(ConnectionId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

impl DispatchError {
    pub fn incident_not_found(id: impl Into<String>) -> Self {
        DispatchError::NotFound {
            kind: EntityKind::Incident,
            id: id.into(),
        }
    }

    pub fn unit_not_found(id: impl Into<String>) -> Self {
        DispatchError::NotFound {
            kind: EntityKind::Unit,
            id: id.into(),
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::MalformedMessage(err.to_string())
    }
}

pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
