use crate::domain::Metrics;
use std::time::Instant;

/// Metrics sink that drops everything.
#[derive(Default)]
pub struct NoopMetrics;

impl NoopMetrics {
    pub fn new() -> Self {
        NoopMetrics
    }
}

impl Metrics for NoopMetrics {
    // ---
    fn render(&self) -> String {
        String::new()
    }
    fn record_registration(&self) {}
    fn record_login(&self) {}
    fn record_code_issued(&self) {}
    fn record_code_exchanged(&self, _: bool) {}
    fn record_http_request(&self, _: Instant, _: &str, _: &str, _: u16) {}
}
