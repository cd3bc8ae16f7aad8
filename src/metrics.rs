//! Prometheus metrics collection for hubd.
//!
//! Exposed on `/metrics` by [`crate::http`]. Every recording helper is a
//! no-op until [`init`] has run, so tests and metrics-disabled deployments
//! pay nothing.
//!
//! - `hub_events_total{type}` - Inbound events processed by type
//! - `hub_event_duration_seconds{type}` - Event handling latency
//! - `hub_event_errors_total{type,error}` - Events answered with an error
//! - `hub_fanout` - Connections reached per broadcast

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Payloads dropped because an outbound queue was full.
pub static PAYLOADS_DROPPED: OnceLock<IntCounter> = OnceLock::new();

/// Connections torn down as slow consumers.
pub static SLOW_CONSUMER_DISCONNECTS: OnceLock<IntCounter> = OnceLock::new();

/// Inbound events rejected by flood control.
pub static RATE_LIMITED: OnceLock<IntCounter> = OnceLock::new();

/// Connections refused by the per-IP connection limiter or authentication.
pub static CONNECTIONS_REJECTED: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Currently registered connections.
pub static CONNECTIONS: OnceLock<IntGauge> = OnceLock::new();

/// Users with at least one live connection.
pub static ONLINE_USERS: OnceLock<IntGauge> = OnceLock::new();

/// Rooms with at least one member.
pub static ROOMS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Event pipeline
// ========================================================================

/// Events processed by type.
pub static EVENT_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Event handling latency by type.
pub static EVENT_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Event errors by type and error code.
pub static EVENT_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Connections reached per broadcast.
pub static FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before metrics are scraped.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(PAYLOADS_DROPPED, IntCounter::new("hub_payloads_dropped_total", "Payloads dropped on full outbound queues"));
    register!(SLOW_CONSUMER_DISCONNECTS, IntCounter::new("hub_slow_consumer_disconnects_total", "Connections removed as slow consumers"));
    register!(RATE_LIMITED, IntCounter::new("hub_rate_limited_total", "Inbound events rejected by flood control"));
    register!(CONNECTIONS_REJECTED, IntCounterVec::new(Opts::new("hub_connections_rejected_total", "Connections refused before registration"), &["reason"]));
    register!(CONNECTIONS, IntGauge::new("hub_connections", "Registered connections"));
    register!(ONLINE_USERS, IntGauge::new("hub_online_users", "Users with at least one connection"));
    register!(ROOMS, IntGauge::new("hub_rooms", "Rooms with at least one member"));

    register!(EVENT_COUNTER, IntCounterVec::new(Opts::new("hub_events_total", "Inbound events processed by type"), &["type"]));
    register!(EVENT_LATENCY, HistogramVec::new(
        HistogramOpts::new("hub_event_duration_seconds", "Inbound event latency by type")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["type"]));
    register!(EVENT_ERRORS, IntCounterVec::new(Opts::new("hub_event_errors_total", "Inbound event errors by type"), &["type", "error"]));
    register!(FANOUT, Histogram::with_opts(
        HistogramOpts::new("hub_fanout", "Connections reached per broadcast")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Record an event execution with latency.
#[inline]
pub fn record_event(kind: &str, duration_secs: f64) {
    if let Some(c) = EVENT_COUNTER.get() {
        c.with_label_values(&[kind]).inc();
    }
    if let Some(h) = EVENT_LATENCY.get() {
        h.with_label_values(&[kind]).observe(duration_secs);
    }
}

/// Record an event error.
#[inline]
pub fn record_event_error(kind: &str, error: &str) {
    if let Some(c) = EVENT_ERRORS.get() {
        c.with_label_values(&[kind, error]).inc();
    }
}

/// Record how many connections a broadcast reached.
#[inline]
pub fn record_fanout(recipients: usize) {
    if let Some(h) = FANOUT.get() {
        h.observe(recipients as f64);
    }
}

#[inline]
pub fn record_payload_dropped() {
    if let Some(c) = PAYLOADS_DROPPED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_slow_consumer() {
    if let Some(c) = SLOW_CONSUMER_DISCONNECTS.get() {
        c.inc();
    }
}

#[inline]
pub fn record_rate_limited() {
    if let Some(c) = RATE_LIMITED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_connection_rejected(reason: &str) {
    if let Some(c) = CONNECTIONS_REJECTED.get() {
        c.with_label_values(&[reason]).inc();
    }
}

#[inline]
pub fn set_connections(count: usize) {
    if let Some(g) = CONNECTIONS.get() {
        g.set(count as i64);
    }
}

#[inline]
pub fn set_online_users(count: usize) {
    if let Some(g) = ONLINE_USERS.get() {
        g.set(count as i64);
    }
}

#[inline]
pub fn set_rooms(count: usize) {
    if let Some(g) = ROOMS.get() {
        g.set(count as i64);
    }
}
