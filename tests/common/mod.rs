//! Integration test common infrastructure.
//!
//! Provides utilities for spawning test hubs, creating WebSocket test
//! clients, and asserting on event flows.

#![allow(dead_code)]

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestServer;
