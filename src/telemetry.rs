//! Telemetry utilities for event timing and connection spans.

use std::time::Instant;

/// Guard for timing event handling.
///
/// Records the event latency when dropped.
pub struct EventTimer {
    kind: &'static str,
    start: Instant,
}

impl EventTimer {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            start: Instant::now(),
        }
    }
}

impl Drop for EventTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_event(self.kind, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for one client connection.
    pub fn connection(conn_id: u64, user_id: &str, ip: &str) -> Span {
        info_span!("connection", conn = conn_id, user = %user_id, ip = %ip)
    }
}
