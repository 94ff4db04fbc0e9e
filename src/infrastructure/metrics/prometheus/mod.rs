mod counters;
mod prometheus_metrics;
mod recorder;

pub use prometheus_metrics::PrometheusMetrics;
use std::sync::Arc;

// Re-export utilities for internal use within this module
pub(crate) use counters::{
    increment_codes_exchanged, increment_codes_issued, increment_logins,
    increment_registrations, track_http_request,
};
pub(crate) use recorder::{init_metrics, render_metrics};

/// Creates a new Prometheus metrics implementation.
///
/// Installs the global recorder on first use; the collected metrics are
/// served by `GET /metrics`.
pub fn create() -> anyhow::Result<crate::domain::MetricsPtr> {
    tracing::info!("Initializing Prometheus metrics");
    init_metrics()?;

    Ok(Arc::new(PrometheusMetrics::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_returns_valid_metrics() {
        let result = create();
        assert!(result.is_ok());
    }

    #[test]
    fn recorded_counters_show_up_in_render() {
        let metrics = create().unwrap();
        metrics.record_registration();
        metrics.record_code_exchanged(false);

        let body = metrics.render();
        assert!(body.contains("passkey_registrations_total"));
        assert!(body.contains("oauth_code_exchanges_total"));
    }
}
