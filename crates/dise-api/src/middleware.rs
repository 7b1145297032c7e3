//! API middleware.

use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;
use uuid::Uuid;

/// Attach a request id to every request and response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    match HeaderValue::from_str(&id) {
        Ok(value) => {
            req.headers_mut().insert("x-request-id", value.clone());
            let mut response = next.run(req).await;
            response.headers_mut().insert("x-request-id", value);
            response
        }
        Err(_) => next.run(req).await,
    }
}

/// Log method, path, status, and latency for every request.
pub async fn request_logging(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request"
    );

    response
}

/// Baseline security headers on every response.
pub async fn security_headers(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;

    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));

    response
}
