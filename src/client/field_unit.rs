//! Field-unit simulator
//!
//! Connects to a hub, registers as `ert`, listens for dispatched incidents
//! and acknowledges each one with its position. A location report is sent
//! every `interval`. With `resolve_after` set, a resolution follows the most
//! recent acknowledgment after that delay.

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::{Instant, sleep};
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Delivery;
use crate::dispatch::event::{
    ACKNOWLEDGMENT_TOPIC, LOCATION_TOPIC, NEW_INCIDENT_TOPIC, RESOLUTION_TOPIC,
};
use crate::transport::message::{ClientMessage, ClientType};
use crate::utils::Result;

#[derive(Debug, Clone)]
pub struct FieldUnitOptions {
    pub url: String,
    pub unit_id: String,
    pub x: f64,
    pub y: f64,
    pub interval: Duration,
    pub resolve_after: Option<Duration>,
}

impl Default for FieldUnitOptions {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8765".to_string(),
            unit_id: "ERT-001".to_string(),
            x: 100.0,
            y: 200.0,
            interval: Duration::from_secs(5),
            resolve_after: None,
        }
    }
}

pub fn register_message(unit_id: &str) -> ClientMessage {
    ClientMessage::Register {
        client_type: ClientType::Unit,
        client_id: unit_id.to_string(),
    }
}

pub fn location_report(unit_id: &str, x: f64, y: f64) -> Value {
    json!({ "ert_id": unit_id, "x": x, "y": y })
}

/// The acknowledgment a unit at `(x, y)` sends for an incident broadcast,
/// or `None` when the broadcast carries no incident id.
pub fn acknowledgment_for(unit_id: &str, incident: &Value, x: f64, y: f64) -> Option<Value> {
    let incident_id = incident.get("id")?.as_str()?;
    Some(json!({
        "ert_id": unit_id,
        "incident_id": incident_id,
        "x": x,
        "y": y,
    }))
}

pub fn resolution_report(unit_id: &str) -> Value {
    json!({ "ert_id": unit_id })
}

fn publish(topic: &str, payload: Value) -> ClientMessage {
    ClientMessage::Publish {
        topic: topic.to_string(),
        payload,
    }
}

async fn send<S>(sink: &mut S, message: &ClientMessage) -> Result<()>
where
    S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(message)?;
    sink.send(WsMessage::text(text)).await?;
    Ok(())
}

/// Run the simulator until the hub closes the connection.
pub async fn run(options: FieldUnitOptions) -> Result<()> {
    let unit_id = options.unit_id.as_str();
    let (ws_stream, _response) = connect_async(options.url.as_str()).await?;
    let (mut sink, mut stream) = ws_stream.split();
    info!(unit = %unit_id, url = %options.url, "connected to hub");

    send(&mut sink, &register_message(unit_id)).await?;
    send(
        &mut sink,
        &ClientMessage::Subscribe {
            topic: NEW_INCIDENT_TOPIC.to_string(),
        },
    )
    .await?;

    let mut ticker = tokio::time::interval(options.interval);
    let resolve_timer = sleep(Duration::ZERO);
    tokio::pin!(resolve_timer);
    let mut resolve_pending = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = location_report(unit_id, options.x, options.y);
                send(&mut sink, &publish(LOCATION_TOPIC, report)).await?;
                debug!(unit = %unit_id, "location sent");
            }
            _ = &mut resolve_timer, if resolve_pending => {
                resolve_pending = false;
                send(&mut sink, &publish(RESOLUTION_TOPIC, resolution_report(unit_id))).await?;
                info!(unit = %unit_id, "resolution sent");
            }
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!(unit = %unit_id, "hub closed the connection");
                        return Ok(());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                };
                let delivery: Delivery = match serde_json::from_str(text.as_str()) {
                    Ok(delivery) => delivery,
                    Err(e) => {
                        warn!(unit = %unit_id, "ignoring unreadable delivery: {e}");
                        continue;
                    }
                };
                if delivery.topic != NEW_INCIDENT_TOPIC {
                    continue;
                }
                let Some(ack) = acknowledgment_for(unit_id, &delivery.payload, options.x, options.y) else {
                    warn!(unit = %unit_id, "incident broadcast without an id");
                    continue;
                };
                info!(unit = %unit_id, incident = %ack["incident_id"], "incident received, acknowledging");
                send(&mut sink, &publish(ACKNOWLEDGMENT_TOPIC, ack)).await?;

                if let Some(delay) = options.resolve_after {
                    resolve_timer.as_mut().reset(Instant::now() + delay);
                    resolve_pending = true;
                }
            }
        }
    }
}
