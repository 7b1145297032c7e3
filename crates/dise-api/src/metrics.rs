//! Prometheus metrics for the API server.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use uuid::Uuid;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "dise_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "dise_http_request_duration_seconds";

    // Pipeline metrics
    pub const UPLOAD_BYTES_TOTAL: &str = "dise_upload_bytes_total";
    pub const ANALYSES_STARTED_TOTAL: &str = "dise_analyses_started_total";
    pub const ANALYSES_COMPLETED_TOTAL: &str = "dise_analyses_completed_total";
    pub const ANALYSES_FAILED_TOTAL: &str = "dise_analyses_failed_total";
    pub const ANALYSIS_DURATION_SECONDS: &str = "dise_analysis_duration_seconds";
    pub const POLL_ATTEMPTS_TOTAL: &str = "dise_readiness_poll_attempts_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record intake of an uploaded video.
pub fn record_upload(bytes: u64) {
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
}

pub fn record_analysis_started() {
    counter!(names::ANALYSES_STARTED_TOTAL).increment(1);
}

pub fn record_analysis_completed(duration: Duration) {
    counter!(names::ANALYSES_COMPLETED_TOTAL).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS).record(duration.as_secs_f64());
}

pub fn record_analysis_failed() {
    counter!(names::ANALYSES_FAILED_TOTAL).increment(1);
}

pub fn record_poll_attempt() {
    counter!(names::POLL_ATTEMPTS_TOTAL).increment(1);
}

/// Replace volatile path segments so metric cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if Uuid::parse_str(segment).is_ok() {
                ":upload_id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Axum middleware recording request count and latency.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
