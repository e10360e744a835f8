//! Prometheus metrics
//!
//! - `gateway_requests_total` (counter): labels `route`, `status`
//! - `gateway_request_duration_seconds` (histogram): label `route`
//! - `gateway_upstream_errors_total` (counter): label `error_type`
//! - `gateway_credentials_cleared_total` (counter): label `reason`
//!
//! Rendered by the admin listener's `/metrics` endpoint. When no recorder is
//! installed every call here is a no-op.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "gateway_request_duration_seconds";

/// Bucket boundaries from 5ms to 30s. The slowest request makes two provider
/// calls, each bounded by the upstream timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0,
];

/// Counters surfaced in the `/health` payload.
#[derive(Clone)]
pub struct GatewayMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

fn builder() -> anyhow::Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
        .context("failed to set histogram buckets")
}

/// Install the global Prometheus recorder and return a handle for rendering.
///
/// Explicit buckets make the duration metric render as a histogram with
/// `_bucket` lines instead of the exporter's default summary.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Record a completed request against one of the four routes, or
/// `not_found`.
pub fn record_request(route: &'static str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(DURATION_METRIC, "route" => route).record(duration_secs);
}

/// Record a failed or timed-out provider call.
pub fn record_upstream_error(error_type: &'static str) {
    metrics::counter!("gateway_upstream_errors_total", "error_type" => error_type).increment(1);
}

/// Record a credential cookie deletion; `reason` is `logout` or the error
/// kind that forced it.
pub fn record_credential_cleared(reason: &'static str) {
    metrics::counter!("gateway_credentials_cleared_total", "reason" => reason).increment(1);
}
