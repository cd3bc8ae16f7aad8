//! Network module.
//!
//! Contains the Gateway (WebSocket listener and handshake) and the
//! per-connection worker.

mod connection;
mod gateway;

pub use gateway::Gateway;
