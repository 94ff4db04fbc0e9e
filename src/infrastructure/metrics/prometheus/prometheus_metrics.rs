//! Prometheus metrics implementation.
//!
//! Delegates to the sibling `counters.rs` and `recorder.rs` modules, which
//! talk to the global `metrics` crate registry. Metrics register themselves
//! on first use and a single global handle renders them in Prometheus text
//! format.

use crate::domain::Metrics;
use std::time::Instant;

/// Prometheus-based metrics implementation.
///
/// Holds no state of its own: all series live in the global registry
/// behind the handle stored in `recorder.rs`.
pub struct PrometheusMetrics {
    // Empty - uses global metrics registry pattern
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        tracing::info!("Creating Prometheus metrics");
        PrometheusMetrics {}
    }
}

impl Metrics for PrometheusMetrics {
    fn render(&self) -> String {
        super::render_metrics()
    }

    fn record_registration(&self) {
        super::increment_registrations();
    }

    fn record_login(&self) {
        super::increment_logins();
    }

    fn record_code_issued(&self) {
        super::increment_codes_issued();
    }

    fn record_code_exchanged(&self, success: bool) {
        tracing::debug!("Recording code exchange (success: {})", success);
        super::increment_codes_exchanged(success);
    }

    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16) {
        super::track_http_request(start, path, method, status);
    }
}
