//! Axum HTTP server for the DISE analyzer.
//!
//! This crate provides:
//! - Upload intake and preview endpoints
//! - The sequential upload → readiness poll → analyze pipeline
//! - Server-side report rendering (SVG gauge + cards)
//! - The embedded single-page UI
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod render;
pub mod routes;
pub mod state;
pub mod ui;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, UploadSession};
