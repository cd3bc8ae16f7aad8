//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use hub_proto::validate_identifier;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.idle_timeouts.ping ({ping}s) must be less than timeout ({timeout}s)")]
    KeepaliveNotBelowTimeout { ping: u64, timeout: u64 },
    #[error("server.idle_timeouts.ping must be non-zero")]
    ZeroPingInterval,
    #[error("limits.{0} must be non-zero")]
    ZeroLimit(&'static str),
    #[error("security.rate_limits.{0} must be non-zero")]
    ZeroRate(&'static str),
    #[error("auth.tokens entry has an invalid user_id: {0:?}")]
    InvalidTokenUser(String),
    #[error("directory.conversations entry has an invalid id: {0:?}")]
    InvalidConversationId(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let idle = &config.server.idle_timeouts;
    if idle.ping == 0 {
        errors.push(ValidationError::ZeroPingInterval);
    } else if idle.ping >= idle.timeout {
        errors.push(ValidationError::KeepaliveNotBelowTimeout {
            ping: idle.ping,
            timeout: idle.timeout,
        });
    }

    let limits = &config.limits;
    for (name, value) in [
        ("max_frame_size", limits.max_frame_size as u64),
        ("outbound_queue", limits.outbound_queue as u64),
        ("write_timeout", limits.write_timeout),
        ("max_message_length", limits.max_message_length as u64),
        ("collaborator_timeout_ms", limits.collaborator_timeout_ms),
        ("removal_queue", limits.removal_queue as u64),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroLimit(name));
        }
    }

    let rates = &config.security.rate_limits;
    for (name, value) in [
        ("event_rate_per_second", rates.event_rate_per_second),
        ("event_burst", rates.event_burst),
        ("connection_rate_per_second", rates.connection_rate_per_second),
        ("connection_burst_per_ip", rates.connection_burst_per_ip),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroRate(name));
        }
    }

    for entry in &config.auth.tokens {
        if validate_identifier("user_id", &entry.user_id).is_err() {
            errors.push(ValidationError::InvalidTokenUser(entry.user_id.clone()));
        }
    }

    for conversation in &config.directory.conversations {
        if validate_identifier("conversation_id", &conversation.id).is_err() {
            errors.push(ValidationError::InvalidConversationId(conversation.id.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
