//! Rate limiting for flood protection.
//!
//! Provides governor-based rate limiting for:
//! - Inbound events per connection ([`EventLimiter`], owned by the worker)
//! - New connections per IP ([`RateLimitManager::check_connection_rate`])

use crate::config::RateLimitConfig;
use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovRateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use tracing::debug;

/// Type alias for governor's direct rate limiter.
type DirectRateLimiter = governor::DefaultDirectRateLimiter;

/// Consecutive rejected events before a connection is dropped.
pub const MAX_FLOOD_VIOLATIONS: u32 = 3;

fn nonzero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

/// Verdict for one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodVerdict {
    Allowed,
    /// Rejected; the connection stays open.
    Limited,
    /// Rejected too many times in a row; close the connection.
    Exceeded,
}

/// Per-connection inbound event limiter.
#[derive(Debug)]
pub struct EventLimiter {
    limiter: DirectRateLimiter,
    violations: u32,
}

impl EventLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let quota = Quota::per_second(nonzero(config.event_rate_per_second))
            .allow_burst(nonzero(config.event_burst));
        Self {
            limiter: GovRateLimiter::direct(quota),
            violations: 0,
        }
    }

    pub fn check(&mut self) -> FloodVerdict {
        if self.limiter.check().is_ok() {
            self.violations = 0;
            return FloodVerdict::Allowed;
        }

        self.violations += 1;
        crate::metrics::record_rate_limited();
        if self.violations >= MAX_FLOOD_VIOLATIONS {
            FloodVerdict::Exceeded
        } else {
            FloodVerdict::Limited
        }
    }
}

/// Thread-safe per-IP connection rate limiting.
#[derive(Debug)]
pub struct RateLimitManager {
    connection_limiters: DashMap<IpAddr, DirectRateLimiter>,
    config: RateLimitConfig,
}

impl RateLimitManager {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            connection_limiters: DashMap::new(),
            config,
        }
    }

    /// Limiter for a new connection's inbound events.
    pub fn event_limiter(&self) -> EventLimiter {
        EventLimiter::new(&self.config)
    }

    /// Check if an IP can open a new connection.
    ///
    /// Returns `true` if allowed, `false` if rate limited.
    pub fn check_connection_rate(&self, ip: IpAddr) -> bool {
        let limiter = self.connection_limiters.entry(ip).or_insert_with(|| {
            GovRateLimiter::direct(
                Quota::per_second(nonzero(self.config.connection_rate_per_second))
                    .allow_burst(nonzero(self.config.connection_burst_per_ip)),
            )
        });

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(ip = %ip, "connection rate limit exceeded");
        }
        allowed
    }

    /// Cleanup old entries to prevent memory growth.
    ///
    /// Called periodically from a maintenance task.
    pub fn cleanup(&self) {
        const MAX_ENTRIES: usize = 10_000;

        if self.connection_limiters.len() > MAX_ENTRIES {
            self.connection_limiters.clear();
            debug!(max = MAX_ENTRIES, "cleared connection rate limiters");
        }
    }

    pub fn tracked_ips(&self) -> usize {
        self.connection_limiters.len()
    }
}
