use metrics::{counter, histogram};
use std::time::Instant;

pub fn increment_registrations() {
    counter!("passkey_registrations_total").increment(1);
}

pub fn increment_logins() {
    counter!("passkey_logins_total").increment(1);
}

pub fn increment_codes_issued() {
    counter!("oauth_codes_issued_total").increment(1);
}

/// Count exchange attempts, labelled by outcome.
pub fn increment_codes_exchanged(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("oauth_code_exchanges_total", "outcome" => outcome).increment(1);
}

/// Track HTTP request latency using a histogram.
pub fn track_http_request(start: Instant, path: &str, method: &str, status: u16) {
    let elapsed = start.elapsed();
    histogram!(
        "http_request_duration_seconds",
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(elapsed);
}
