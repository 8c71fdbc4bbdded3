//! Correlator wiring
//!
//! The correlator joins the hub as an ordinary in-process subscriber: it gets
//! a connection, registers as a control client and subscribes to the unit
//! topics. Its connection and the hub's unit-disconnect hook feed one work
//! queue, consumed by a single task, so deliveries and disconnects reach the
//! correlator in the order they happened. The hook fires after the hub lock
//! is released, which is after every earlier publish was enqueued.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{Hub, Outbound, Role};
use crate::dispatch::correlator::Correlator;
use crate::dispatch::event::{CORRELATOR_TOPICS, DispatchEvent};
use crate::dispatch::model::DisconnectPolicy;
use crate::utils::DispatchError;

/// Client id the correlator registers under.
pub const CORRELATOR_CLIENT_ID: &str = "correlator";

/// A running hub with the correlator attached.
#[derive(Debug)]
pub struct DispatchSystem {
    pub hub: Hub,
    pub correlator: Arc<Correlator>,
    pub worker: JoinHandle<()>,
}

#[derive(Debug)]
pub enum WorkItem {
    /// A hub delivery addressed to the correlator's connection.
    Frame(WsMessage),
    /// A registered field unit whose connection went away.
    Disconnect(String),
}

/// Sending half of the correlator's work queue.
#[derive(Debug, Clone)]
pub struct WorkQueue(UnboundedSender<WorkItem>);

impl WorkQueue {
    pub fn new() -> (Self, UnboundedReceiver<WorkItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    /// A non-blocking disconnect hook that enqueues onto this queue.
    pub fn disconnect_hook(&self) -> impl Fn(String) + Send + Sync + 'static {
        let tx = self.0.clone();
        move |unit_id: String| {
            if tx.send(WorkItem::Disconnect(unit_id.clone())).is_err() {
                warn!(unit = %unit_id, "correlator stopped, disconnect not reconciled");
            }
        }
    }
}

impl Outbound for WorkQueue {
    fn deliver(&self, frame: WsMessage) -> bool {
        self.0.send(WorkItem::Frame(frame)).is_ok()
    }
}

/// Build a hub whose unit-disconnect hook feeds the correlator, attach an
/// in-memory correlator and start its worker. Must run inside a tokio
/// runtime.
pub fn start(policy: DisconnectPolicy) -> DispatchSystem {
    let (queue, work) = WorkQueue::new();
    let hub = Hub::with_disconnect_hook(queue.disconnect_hook());
    let correlator = Arc::new(Correlator::in_memory(hub.clone(), policy));
    let worker = attach(&hub, correlator.clone(), queue, work);
    DispatchSystem {
        hub,
        correlator,
        worker,
    }
}

/// Subscribe `correlator` to the hub through `queue` and spawn the task that
/// drains `work`.
pub fn attach(
    hub: &Hub,
    correlator: Arc<Correlator>,
    queue: WorkQueue,
    work: UnboundedReceiver<WorkItem>,
) -> JoinHandle<()> {
    let connection_id = hub.connect(queue);
    hub.register(&connection_id, Role::Control, CORRELATOR_CLIENT_ID.to_string());
    for topic in CORRELATOR_TOPICS {
        hub.subscribe(&connection_id, topic);
    }
    info!(connection = %connection_id, topics = ?CORRELATOR_TOPICS, "correlator attached");

    tokio::spawn(run(correlator, work))
}

async fn run(correlator: Arc<Correlator>, mut work: UnboundedReceiver<WorkItem>) {
    while let Some(item) = work.recv().await {
        match item {
            WorkItem::Frame(frame) => handle_frame(&correlator, frame),
            WorkItem::Disconnect(unit_id) => {
                if let Err(e) = correlator.handle_disconnection(&unit_id) {
                    warn!(unit = %unit_id, "disconnect reconciliation failed: {e}");
                }
            }
        }
    }
    error!("correlator work queue closed, stopping");
}

/// Decode and apply one delivery. Failures are logged and absorbed so one
/// bad event never stops the stream.
fn handle_frame(correlator: &Correlator, frame: WsMessage) {
    let WsMessage::Text(text) = frame else {
        return;
    };
    let outcome = DispatchEvent::from_frame(text.as_str()).and_then(|event| correlator.apply(event));
    match outcome {
        Ok(()) => {}
        Err(e @ DispatchError::NotFound { .. }) => debug!("event dropped: {e}"),
        Err(e) => warn!("event dropped: {e}"),
    }
}
