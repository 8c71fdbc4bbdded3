//! Outbound envelope
//!
//! Every delivery is `{"topic": ..., "payload": ...}`, where `payload` is the
//! publisher's JSON value passed through untouched. No ids, sequence numbers
//! or timestamps are added.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub topic: String,
    pub payload: Value,
}

impl Delivery {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}
