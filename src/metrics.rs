//! Prometheus metrics for query latency and request accounting.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// BigQuery query latency metric name.
pub const METRIC_QUERY_LATENCY: &str = "bigquery_query_latency_ms";
/// Queries completed counter metric name.
pub const METRIC_QUERIES_TOTAL: &str = "bigquery_queries_total";
/// Queries failed counter metric name.
pub const METRIC_QUERIES_FAILED: &str = "bigquery_queries_failed_total";
/// Token refresh counter metric name.
pub const METRIC_TOKEN_REFRESHES: &str = "gcp_token_refreshes_total";
/// Cost endpoint request counter metric name.
pub const METRIC_COST_REQUESTS: &str = "cost_requests_total";
/// Rejected (unauthorized) request counter metric name.
pub const METRIC_UNAUTHORIZED_REQUESTS: &str = "unauthorized_requests_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_QUERY_LATENCY,
        "BigQuery query round-trip latency in milliseconds"
    );

    describe_counter!(METRIC_QUERIES_TOTAL, "Total number of queries completed");
    describe_counter!(METRIC_QUERIES_FAILED, "Total number of queries that failed");
    describe_counter!(
        METRIC_TOKEN_REFRESHES,
        "Total number of OAuth access tokens minted"
    );
    describe_counter!(METRIC_COST_REQUESTS, "Total requests to the cost endpoint");
    describe_counter!(
        METRIC_UNAUTHORIZED_REQUESTS,
        "Total requests rejected by the bearer-token check"
    );

    debug!("Metrics initialized");
}

/// Record query round-trip latency.
pub fn record_query_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_QUERY_LATENCY).record(latency_ms);
}

/// Increment the completed-queries counter.
pub fn inc_queries_total() {
    counter!(METRIC_QUERIES_TOTAL).increment(1);
}

/// Increment the failed-queries counter.
pub fn inc_queries_failed() {
    counter!(METRIC_QUERIES_FAILED).increment(1);
}

/// Increment the token-refresh counter.
pub fn inc_token_refreshes() {
    counter!(METRIC_TOKEN_REFRESHES).increment(1);
}

/// Increment the cost-request counter.
pub fn inc_cost_requests() {
    counter!(METRIC_COST_REQUESTS).increment(1);
}

/// Increment the unauthorized-request counter.
pub fn inc_unauthorized_requests() {
    counter!(METRIC_UNAUTHORIZED_REQUESTS).increment(1);
}
