//! Axum HTTP gateway for chunked video analysis.
//!
//! This crate provides:
//! - `POST /processVideo` and the chunk control endpoints
//! - Video status queries
//! - Rate limiting, request IDs and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
