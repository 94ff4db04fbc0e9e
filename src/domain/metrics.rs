use std::sync::Arc;
use std::time::Instant;

/// Abstraction for application metrics (counters, histograms).
pub trait Metrics: Send + Sync + 'static {
    // ---
    /// Render current metrics in Prometheus text format.
    fn render(&self) -> String;

    /// Record a completed credential registration.
    fn record_registration(&self);

    /// Record a completed login (a new authenticated session).
    fn record_login(&self);

    /// Record an authorization code being issued.
    fn record_code_issued(&self);

    /// Record an exchange attempt and whether it succeeded.
    fn record_code_exchanged(&self, success: bool);

    /// Record HTTP request duration and labels.
    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16);
}

/// Type alias for any backend that implements Metrics.
pub type MetricsPtr = Arc<dyn Metrics>;
