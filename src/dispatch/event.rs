//! Inbound event decoding
//!
//! Hub deliveries are `(topic, payload)` pairs; the correlator only
//! understands a closed set of topics. Everything else decodes to
//! `DispatchEvent::Unknown` and is ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::Delivery;
use crate::utils::{DispatchError, Result};

pub const LOCATION_TOPIC: &str = "location";
pub const ACKNOWLEDGMENT_TOPIC: &str = "acknowledgment";
pub const RESOLUTION_TOPIC: &str = "resolution";
/// Control-point broadcast of a dispatched incident.
pub const NEW_INCIDENT_TOPIC: &str = "new_incident";
/// Accepted as a synonym of `new_incident` when decoding.
pub const INCIDENT_TOPIC: &str = "incident";
/// Derived status changes published by the correlator.
pub const INCIDENT_STATUS_TOPIC: &str = "incident_status";

/// Topics the correlator subscribes to.
pub const CORRELATOR_TOPICS: [&str; 5] = [
    LOCATION_TOPIC,
    ACKNOWLEDGMENT_TOPIC,
    RESOLUTION_TOPIC,
    NEW_INCIDENT_TOPIC,
    INCIDENT_TOPIC,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    pub ert_id: String,
    #[serde(alias = "lat")]
    pub x: f64,
    #[serde(alias = "lng")]
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub ert_id: String,
    pub incident_id: String,
    #[serde(default, alias = "lat")]
    pub x: Option<f64>,
    #[serde(default, alias = "lng")]
    pub y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub ert_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Location(LocationReport),
    Acknowledgment(Acknowledgment),
    Resolution(ResolutionReport),
    /// An incident broadcast seen on the wire; informational only.
    IncidentBroadcast(Value),
    Unknown { topic: String },
}

impl DispatchEvent {
    /// Decode a payload by topic. A known topic with a payload of the wrong
    /// shape is `MalformedMessage`.
    pub fn decode(topic: &str, payload: Value) -> Result<Self> {
        Ok(match topic {
            LOCATION_TOPIC => DispatchEvent::Location(parse(topic, payload)?),
            ACKNOWLEDGMENT_TOPIC => DispatchEvent::Acknowledgment(parse(topic, payload)?),
            RESOLUTION_TOPIC => DispatchEvent::Resolution(parse(topic, payload)?),
            NEW_INCIDENT_TOPIC | INCIDENT_TOPIC => DispatchEvent::IncidentBroadcast(payload),
            other => DispatchEvent::Unknown {
                topic: other.to_string(),
            },
        })
    }

    /// Decode a raw outbound frame as produced by the hub.
    pub fn from_frame(text: &str) -> Result<Self> {
        let delivery: Delivery = serde_json::from_str(text)?;
        Self::decode(&delivery.topic, delivery.payload)
    }
}

fn parse<T: DeserializeOwned>(topic: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| DispatchError::MalformedMessage(format!("{topic} payload: {e}")))
}
