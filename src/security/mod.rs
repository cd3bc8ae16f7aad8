//! Flood and abuse protection.

pub mod rate_limit;

pub use rate_limit::{EventLimiter, FloodVerdict, RateLimitManager};
