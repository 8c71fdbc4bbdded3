//! # dispatchhub
//!
//! A real-time dispatch hub for a control point and its field units. Clients
//! speak a small JSON publish/subscribe protocol over WebSockets; an
//! in-process correlator listens to the unit topics and keeps the incident and
//! unit records consistent.
//!
//! ## Core Modules
//!
//! - `broker`: connections, topic subscriptions and fan-out delivery.
//! - `dispatch`: incident and unit aggregates, the correlator and its wiring.
//! - `transport`: the WebSocket server and the client protocol.
//! - `client`: a field-unit simulator speaking that protocol.
//! - `config`: layered settings.
//! - `utils`: error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod transport;
pub mod utils;
