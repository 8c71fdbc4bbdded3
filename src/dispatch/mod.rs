//! Incident lifecycle on top of the hub.
//!
//! - `model`: incident and unit aggregates with their status machines
//! - `store`: CRUD seams and in-memory stores
//! - `event`: closed set of events decoded from hub deliveries
//! - `correlator`: event handlers, disconnect reconciliation, dispatch
//! - `worker`: attaches the correlator to the hub as a subscriber

pub mod correlator;
pub mod event;
pub mod model;
pub mod store;
pub mod worker;

pub use correlator::Correlator;
pub use event::DispatchEvent;
pub use model::{DisconnectPolicy, Incident, IncidentStatus, NewIncident, Unit, UnitStatus};
pub use store::{IncidentStore, MemoryStore, UnitStore};
pub use worker::{DispatchSystem, WorkItem, WorkQueue, start};
