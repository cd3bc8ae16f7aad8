//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, IdleTimeoutsConfig)
//! - [`listen`]: WebSocket listener configuration (ListenConfig)
//! - [`limits`]: Frame, queue and deadline limits (LimitsConfig)
//! - [`security`]: Rate limiting (SecurityConfig, RateLimitConfig)
//! - [`directory`]: Seed data for the in-memory collaborators (AuthConfig, DirectoryConfig)
//! - [`validation`]: Startup checks

mod directory;
mod limits;
mod listen;
mod security;
mod types;
pub mod validation;

pub use directory::{AuthConfig, ConversationEntry, DirectoryConfig, TokenEntry};
pub use limits::LimitsConfig;
pub use listen::ListenConfig;
pub use security::{RateLimitConfig, SecurityConfig};
pub use types::{Config, ConfigError, IdleTimeoutsConfig, ServerConfig};
