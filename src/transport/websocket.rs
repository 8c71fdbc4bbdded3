//! WebSocket transport
//!
//! Translates protocol JSON frames into hub operations. Each accepted
//! connection gets:
//! - a hub connection id and an unbounded outbound channel
//! - a send task draining that channel into the socket
//! - a read loop applying inbound frames in arrival order
//!
//! Whichever side ends first tears the connection down; `Hub::disconnect` is
//! idempotent, so cleanup runs exactly once.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Hub;
use crate::config::Settings;
use crate::transport::message::ClientMessage;
use crate::utils::{DispatchError, Result};

const LOGGED_FRAME_CHARS: usize = 100;

/// Bind the configured address and serve connections until the listener
/// fails.
pub async fn start_websocket_server(settings: &Settings, hub: Hub) -> Result<()> {
    let addr = settings.server.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket server listening on ws://{addr}");
    serve(listener, hub, settings.hub.max_connections).await
}

/// Accept loop over an already bound listener.
pub async fn serve(listener: TcpListener, hub: Hub, max_connections: usize) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "tcp connection accepted");
        let hub = hub.clone();
        tokio::spawn(async move {
            handle_connection(stream, hub, max_connections).await;
        });
    }
}

async fn handle_connection(stream: TcpStream, hub: Hub, max_connections: usize) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    if hub.connection_count() >= max_connections {
        warn!(max_connections, "connection limit reached, closing new connection");
        let _ = ws_sender.send(WsMessage::Close(None)).await;
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let connection_id = hub.connect(tx);
    debug!(connection = %connection_id, "connection opened");

    {
        let hub = hub.clone();
        let connection_id = connection_id.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!(connection = %connection_id, "failed to send frame: {e}");
                    break;
                }
            }
            hub.disconnect(&connection_id);
            debug!(connection = %connection_id, "send loop closed");
        });
    }

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                if let Err(e) = handle_frame(&hub, &connection_id, text.as_str()) {
                    warn!(
                        connection = %connection_id,
                        frame = %truncate(text.as_str()),
                        "dropping frame: {e}"
                    );
                }
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection = %connection_id, "read error: {e}");
                break;
            }
        }
    }

    hub.disconnect(&connection_id);
}

/// Apply one inbound text frame on behalf of `connection_id`.
///
/// A frame that does not parse as a `ClientMessage` fails with
/// `MalformedMessage` and leaves the hub untouched.
pub fn handle_frame(hub: &Hub, connection_id: &str, text: &str) -> Result<()> {
    match serde_json::from_str::<ClientMessage>(text)? {
        ClientMessage::Register {
            client_type,
            client_id,
        } => {
            if !hub.register(connection_id, client_type.into(), client_id) {
                return Err(DispatchError::MalformedMessage(format!(
                    "register on unknown connection {connection_id}"
                )));
            }
        }
        ClientMessage::Subscribe { topic } => {
            hub.subscribe(connection_id, &topic);
        }
        ClientMessage::Unsubscribe { topic } => {
            hub.unsubscribe(connection_id, &topic);
            debug!(connection = %connection_id, %topic, "unsubscribed");
        }
        ClientMessage::Publish { topic, payload } => {
            let delivered = hub.publish(&topic, payload);
            debug!(connection = %connection_id, %topic, delivered, "published");
        }
    }
    Ok(())
}

fn truncate(text: &str) -> String {
    text.chars().take(LOGGED_FRAME_CHARS).collect()
}
