//! Defines routes for the upload and download gateway.
//!
//! ## Structure
//! - **Upload endpoints** (`/api/v1/upload`)
//!   - `POST /{bucket}` — multipart `file`
//!   - `POST /{bucket}/to-path` — multipart `file` + `destinationPath`
//!   - `POST /multiple/{bucket}[/to-path]` — many `file` parts
//!   - `POST /from-url/{bucket}[/to-path]` — fetch one remote URL
//!   - `POST /from-urls/{bucket}[/to-path]` — fetch many remote URLs
//!   - `POST /from-base64/{bucket}` — one base64 payload
//!   - `POST /from-multi-base64/{bucket}` — many base64 payloads
//!
//! - **Download endpoints** (`/api/v1/download`)
//!   - `GET /{bucket}/list?prefix=` — recursive key listing
//!   - `GET /{bucket}/{path}` — object as attachment
//!   - `GET /{bucket}/{path}/byteArray|stream|partial|metadata|presignedUrl`
//!
//! `{path}` is a single segment; nested keys are sent percent-encoded
//! (`photos%2F2025%2Fimg.jpg`).

use crate::{
    handlers::{
        download_handlers::{
            get_file, get_file_as_byte_array, get_file_as_stream, get_file_metadata,
            get_file_partial, get_presigned_url, list_files,
        },
        health_handlers::{healthz, readyz},
        upload_handlers::{
            upload_file, upload_file_to_path, upload_files, upload_files_to_path,
            upload_from_base64, upload_from_multi_base64, upload_from_url,
            upload_from_url_to_path, upload_from_urls, upload_from_urls_to_path,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router for every gateway endpoint.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/api/v1/upload", upload_routes())
        .nest("/api/v1/download", download_routes())
}

fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/{bucket}", post(upload_file))
        .route("/{bucket}/to-path", post(upload_file_to_path))
        .route("/multiple/{bucket}", post(upload_files))
        .route("/multiple/{bucket}/to-path", post(upload_files_to_path))
        .route("/from-url/{bucket}", post(upload_from_url))
        .route("/from-url/{bucket}/to-path", post(upload_from_url_to_path))
        .route("/from-urls/{bucket}", post(upload_from_urls))
        .route("/from-urls/{bucket}/to-path", post(upload_from_urls_to_path))
        .route("/from-base64/{bucket}", post(upload_from_base64))
        .route("/from-multi-base64/{bucket}", post(upload_from_multi_base64))
}

fn download_routes() -> Router<AppState> {
    Router::new()
        .route("/{bucket}/list", get(list_files))
        .route("/{bucket}/{path}", get(get_file))
        .route("/{bucket}/{path}/byteArray", get(get_file_as_byte_array))
        .route("/{bucket}/{path}/stream", get(get_file_as_stream))
        .route("/{bucket}/{path}/partial", get(get_file_partial))
        .route("/{bucket}/{path}/metadata", get(get_file_metadata))
        .route("/{bucket}/{path}/presignedUrl", get(get_presigned_url))
}
