//! JSON request and response bodies of the HTTP surface.

use super::{extension::FileExtension, object::StoredObjectReference};
use crate::services::error_classifier::GatewayError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlPathUploadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub destination_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlsPathUploadRequest {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub destination_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base64FileUploadRequest {
    #[serde(default)]
    pub file_base64_as_string: String,
    #[serde(default)]
    pub file_extension: FileExtension,
}

#[derive(Debug, Deserialize)]
pub struct MultiBase64FileUploadRequest {
    #[serde(default)]
    pub files: Vec<Base64FileUploadRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlQuery {
    pub expires_in_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub prefix: String,
}

/// Per-item result of a batch upload.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UploadOutcome {
    Stored {
        url: StoredObjectReference,
    },
    Failed {
        error: String,
        kind: &'static str,
        status: u16,
    },
}

impl From<Result<StoredObjectReference, GatewayError>> for UploadOutcome {
    fn from(result: Result<StoredObjectReference, GatewayError>) -> Self {
        match result {
            Ok(url) => Self::Stored { url },
            Err(err) => {
                let app = crate::errors::AppError::from(err);
                Self::Failed {
                    error: app.message,
                    kind: app.kind,
                    status: app.status.as_u16(),
                }
            }
        }
    }
}

/// Body of the `byteArray` download endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteArrayFileContent {
    /// Standard base64 of the object bytes.
    pub content: String,
    pub content_type: String,
    pub file_name: String,
}
