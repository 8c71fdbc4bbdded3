use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::Role;

/// What a connection declares itself to be in `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ClientType {
    /// Control point.
    #[serde(rename = "cr")]
    Control,
    /// Field unit.
    #[serde(rename = "ert")]
    Unit,
}

impl From<ClientType> for Role {
    fn from(client_type: ClientType) -> Self {
        match client_type {
            ClientType::Control => Role::Control,
            ClientType::Unit => Role::Unit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Register {
        client_type: ClientType,
        client_id: String,
    },
    Subscribe {
        topic: String,
    },
    Unsubscribe {
        topic: String,
    },
    Publish {
        topic: String,
        #[serde(default)]
        payload: Value,
    },
}
