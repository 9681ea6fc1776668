//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_requests_total` (counter): requests by route, status
//! - `wallet_request_duration_seconds` (histogram): latency by route
//! - `wallet_broadcasts_total` (counter): broadcasts by outcome
//! - `wallet_signer_requests_total` (counter): signing activities by outcome
//! - `wallet_monitor_outcomes_total` (counter): terminal monitor states
//! - `wallet_tracked_transactions` (gauge): transactions in the registry
//!
//! Recording is a no-op until a recorder is installed.

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    counter!(
        "wallet_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("wallet_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_broadcast(outcome: &'static str) {
    counter!("wallet_broadcasts_total", "outcome" => outcome).increment(1);
}

pub fn record_signer_request(outcome: &'static str) {
    counter!("wallet_signer_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_monitor_outcome(status: &'static str) {
    counter!("wallet_monitor_outcomes_total", "status" => status).increment(1);
}

pub fn set_tracked_transactions(count: usize) {
    gauge!("wallet_tracked_transactions").set(count as f64);
}

/// Router middleware recording per-route request counts and latency.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    record_request(&route, response.status().as_u16(), start);
    response
}
