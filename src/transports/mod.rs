//! Transport implementations

pub mod websocket;

pub use websocket::{WebSocketConnector, WebSocketTransport};
