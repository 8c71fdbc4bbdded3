//! The dispatch hub: a topic-based relay between the control point, the
//! field units and the in-process correlator.
//!
//! - `registry`: live connections and their declared identity
//! - `topic`: topic name to subscriber set
//! - `engine`: the lock-protected state machine over both tables
//! - `hub`: the shared handle, including the unit disconnect hook

pub mod engine;
pub mod hub;
pub mod message;
pub mod registry;
pub mod topic;

pub use engine::{Broker, PublishOutcome};
pub use hub::{DisconnectHook, Hub};
pub use message::Delivery;
pub use registry::{Connection, ConnectionId, Outbound, Role};

#[cfg(test)]
mod tests;
