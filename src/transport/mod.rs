//! The `transport` module carries hub traffic over WebSockets.
//!
//! It defines the JSON protocol clients speak and the server that maps each
//! connection onto a hub connection.

pub mod message;
pub mod websocket;

pub use message::{ClientMessage, ClientType};
pub use websocket::{handle_frame, serve, start_websocket_server};
