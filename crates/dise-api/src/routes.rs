//! API routes.

use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::analyses::{get_progress, get_report, get_report_html, start_analysis};
use crate::handlers::health::{health, ready};
use crate::handlers::settings::get_config;
use crate::handlers::uploads::{create_upload, stream_video};
use crate::metrics::metrics_middleware;
use crate::middleware::{request_id, request_logging, security_headers};
use crate::state::AppState;
use crate::ui;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let upload_routes = Router::new()
        // Intake
        .route("/uploads", post(create_upload))
        // Preview player
        .route("/uploads/:upload_id/video", get(stream_video))
        // Pipeline
        .route("/uploads/:upload_id/analyze", post(start_analysis))
        .route("/uploads/:upload_id/progress", get(get_progress))
        // Report
        .route("/uploads/:upload_id/report", get(get_report))
        .route("/uploads/:upload_id/report.html", get(get_report_html));

    let config_routes = Router::new().route("/config", get(get_config));

    let api_routes = Router::new().merge(upload_routes).merge(config_routes);

    let ui_routes = Router::new()
        .route("/", get(ui::serve_index))
        .route("/static/app.js", get(ui::serve_app_js));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(ui_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Bound upload bodies
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(security_headers))
        .layer(from_fn(request_id))
        .layer(from_fn(request_logging))
        .with_state(state)
}
