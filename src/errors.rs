use crate::services::error_classifier::{ErrorKind, GatewayError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A pipeline failure rendered for HTTP: status, user-safe message and the
/// classification it came from.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub kind: &'static str,
}

impl AppError {
    pub fn new(status: StatusCode, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            kind: kind.as_str(),
        }
    }

    /// Shortcut for 400 Bad Request on input rejected before any backend call.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorKind::Validation, msg)
    }
}

/// HTTP status for each error classification.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation
        | ErrorKind::InvalidBucketName
        | ErrorKind::InvalidObjectName
        | ErrorKind::InvalidEncoding => StatusCode::BAD_REQUEST,
        ErrorKind::AuthorizationFailure => StatusCode::UNAUTHORIZED,
        ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound | ErrorKind::BucketMissing | ErrorKind::NoMetadata => {
            StatusCode::NOT_FOUND
        }
        ErrorKind::StreamFault => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::RemoteFetch => StatusCode::BAD_GATEWAY,
        ErrorKind::Listing | ErrorKind::Metadata | ErrorKind::Presign | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "kind": self.kind,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let kind = err.kind();
        AppError::new(status_for(kind), kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_internal_get_distinct_statuses() {
        let not_found = AppError::from(GatewayError::NotFound {
            bucket: "media".into(),
            key: "a.png".into(),
        });
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.kind, "not_found");

        let internal = AppError::from(GatewayError::Internal);
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.message, "Internal server error.");
    }

    #[test]
    fn bad_input_is_400() {
        assert_eq!(
            AppError::from(GatewayError::InvalidEncoding).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::bad_request("No file uploaded.").kind, "validation");
    }
}
