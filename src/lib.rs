//! Upload/download gateway in front of S3-compatible object storage.
//!
//! Callers hand files over as multipart parts, remote URLs or base64 text;
//! the gateway stores them under generated keys and serves them back whole,
//! by range, as metadata, as presigned links or as a listing.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;

use axum::{Router, extract::DefaultBodyLimit};
use state::AppState;

/// The full application router with state and body limit applied.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    routes::routes::routes()
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
