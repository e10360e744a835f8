//! Admin listener
//!
//! Optional second port carrying operational endpoints, kept off the public
//! router so browsers never see them.
//!
//! - GET /health  : JSON status, uptime, request and error counts
//! - GET /metrics : Prometheus text exposition

use std::sync::atomic::Ordering;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::metrics::GatewayMetrics;

#[derive(Clone)]
pub struct AdminState {
    pub metrics: GatewayMetrics,
    pub prometheus: PrometheusHandle,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<AdminState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
        "errors_total": state.metrics.errors_total.load(Ordering::Relaxed),
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

async fn metrics_handler(State(state): State<AdminState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}
