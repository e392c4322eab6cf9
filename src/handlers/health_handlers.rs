//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that round-trips to the object store

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// Bucket name used only to prove the backend answers.
const PROBE_BUCKET: &str = "readyz-probe";

/// `GET /healthz`
///
/// Never touches the backend.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Asks the backend whether a probe bucket exists. Either answer counts as
/// ready; only a failed call does not. HTTP 503 on failure.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let backend_check = match state.backend.bucket_exists(PROBE_BUCKET).await {
        Ok(_) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(err) => {
            warn!(error = %err, "readiness probe failed");
            CheckStatus {
                ok: false,
                error: Some(err.fault.to_string()),
            }
        }
    };

    let ok = backend_check.ok;
    let mut checks = HashMap::new();
    checks.insert("object_store", backend_check);

    let body = ReadyResponse {
        status: if ok { "ok".into() } else { "error".into() },
        checks,
    };
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
