//! Hub state.
//!
//! Contains the connection handle, the domain managers, and the [`Hub`]
//! that ties them together.

mod handle;
mod hub;
pub mod managers;

pub use handle::{ConnId, ConnIdGenerator, ConnectionHandle, SendOutcome};
pub use hub::{DeliveryReport, Hub, HubParams, RegisterError};

#[cfg(test)]
pub(crate) use hub::tests as test_support;
