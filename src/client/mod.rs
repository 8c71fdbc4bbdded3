//! The `client` module holds the field-unit simulator: a WebSocket client
//! that speaks the hub protocol the way a deployed unit would.

pub mod field_unit;
pub use field_unit::{FieldUnitOptions, run};
