//! Metrics definitions for the sign service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `sign_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: the fixed route table, everything else is `/other`
//! - `status` / `result` / `outcome`: small fixed sets chosen in code

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("sign_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Full("sign_resolved_clips".to_string()),
            &[0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 200.0],
        )
        .map_err(|e| format!("Failed to set resolved clip buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `sign_http_requests_total`, `sign_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("sign_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("sign_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed route table.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        "/api/v1/text-to-sign" => "/api/v1/text-to-sign",
        "/api/v1/sign-to-text" => "/api/v1/sign-to-text",
        _ => "/other",
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record a key-set refresh attempt
///
/// Metric: `sign_jwks_refresh_total`
/// Labels: `status` (success, error, timeout)
pub fn record_jwks_refresh(status: &'static str) {
    counter!("sign_jwks_refresh_total", "status" => status).increment(1);
}

/// Record a token verification outcome
///
/// Metric: `sign_token_verifications_total`
/// Labels: `result` (`verified` or the rejection code)
pub fn record_token_verification(result: &'static str) {
    counter!("sign_token_verifications_total", "result" => result).increment(1);
}

// ============================================================================
// Content Metrics
// ============================================================================

/// Record an existence cache lookup
///
/// Metric: `sign_existence_cache_total`
/// Labels: `result` (hit, miss)
pub fn record_existence_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("sign_existence_cache_total", "result" => result).increment(1);
}

/// Record a remote content-store check
///
/// Metric: `sign_store_checks_total`
/// Labels: `outcome` (exists, not_exists, error, timeout)
pub fn record_store_check(outcome: &'static str) {
    counter!("sign_store_checks_total", "outcome" => outcome).increment(1);
}

/// Record the number of clips one resolution produced
///
/// Metric: `sign_resolved_clips`
#[allow(clippy::cast_precision_loss)]
pub fn record_resolved_clips(count: usize) {
    histogram!("sign_resolved_clips").record(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These run against the global no-op recorder; they exercise the label
    // construction without inspecting values.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request(
            "POST",
            "/api/v1/text-to-sign",
            200,
            Duration::from_millis(120),
        );
        record_http_request("GET", "/api/v1/me", 401, Duration::from_millis(3));
        record_http_request(
            "POST",
            "/api/v1/sign-to-text",
            504,
            Duration::from_secs(30),
        );
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(503), "error");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(
            normalize_endpoint("/api/v1/text-to-sign"),
            "/api/v1/text-to-sign"
        );
        assert_eq!(normalize_endpoint("/api/v1/unknown/123"), "/other");
        assert_eq!(normalize_endpoint("/"), "/other");
    }

    #[test]
    fn test_record_domain_metrics() {
        record_jwks_refresh("success");
        record_jwks_refresh("error");
        record_token_verification("verified");
        record_token_verification("expired");
        record_existence_cache(true);
        record_existence_cache(false);
        record_store_check("exists");
        record_store_check("timeout");
        record_resolved_clips(0);
        record_resolved_clips(200);
    }
}
