//! Turns the three kinds of upload input into one uniform payload.

use super::{error_classifier::GatewayError, object_key};
use crate::{models::extension::FileExtension, storage::ByteStream};
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use reqwest::{Url, header::CONTENT_TYPE};
use std::{fmt, time::Duration};
use tracing::{debug, warn};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Where the bytes of an upload come from.
pub enum UploadSource {
    /// A file sent in the request itself.
    Direct {
        file_name: String,
        content_type: String,
        length: u64,
        body: ByteStream,
    },
    /// A URL the gateway fetches on the caller's behalf.
    Remote { url: String },
    /// Standard-alphabet base64 text.
    Base64 {
        data: String,
        extension: FileExtension,
    },
}

impl UploadSource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::Remote { .. } => "remote",
            Self::Base64 { .. } => "base64",
        }
    }
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct {
                file_name,
                content_type,
                length,
                ..
            } => f
                .debug_struct("Direct")
                .field("file_name", file_name)
                .field("content_type", content_type)
                .field("length", length)
                .finish_non_exhaustive(),
            Self::Remote { url } => f.debug_struct("Remote").field("url", url).finish(),
            Self::Base64 { data, extension } => f
                .debug_struct("Base64")
                .field("chars", &data.len())
                .field("extension", extension)
                .finish(),
        }
    }
}

/// Shared resources the adapters need; cheap to clone.
#[derive(Debug, Clone)]
pub struct SourceContext {
    http: reqwest::Client,
}

impl SourceContext {
    pub fn new(fetch_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(fetch_timeout).build()?;
        Ok(Self { http })
    }
}

/// An opened source: a stream of exactly `length` bytes plus what the
/// pipeline needs to name and label the object.
pub struct SourcePayload {
    pub body: ByteStream,
    pub length: u64,
    pub content_type: String,
    /// With leading dot, or empty.
    pub extension: String,
}

impl SourcePayload {
    fn buffered(bytes: Bytes, content_type: String, extension: String) -> Self {
        Self {
            length: bytes.len() as u64,
            body: Box::pin(futures::stream::once(async move { Ok(bytes) })),
            content_type,
            extension,
        }
    }
}

impl UploadSource {
    /// Resolve the source into a readable payload.
    ///
    /// Remote and base64 sources are buffered fully in memory.
    pub async fn open(self, ctx: &SourceContext) -> Result<SourcePayload, GatewayError> {
        match self {
            Self::Direct {
                file_name,
                content_type,
                length,
                body,
            } => Ok(SourcePayload {
                body,
                length,
                content_type: if content_type.trim().is_empty() {
                    DEFAULT_CONTENT_TYPE.to_string()
                } else {
                    content_type
                },
                extension: object_key::extension_of(&file_name),
            }),
            Self::Remote { url } => fetch_remote(ctx, url).await,
            Self::Base64 { data, extension } => {
                let data = data.trim();
                if data.is_empty() {
                    return Err(GatewayError::validation("No Base64 string provided."));
                }
                let bytes = STANDARD.decode(data).map_err(|err| {
                    warn!(error = %err, "rejected malformed base64 payload");
                    GatewayError::InvalidEncoding
                })?;
                Ok(SourcePayload::buffered(
                    Bytes::from(bytes),
                    DEFAULT_CONTENT_TYPE.to_string(),
                    extension.as_extension().to_string(),
                ))
            }
        }
    }
}

async fn fetch_remote(ctx: &SourceContext, url: String) -> Result<SourcePayload, GatewayError> {
    let url = url.trim().to_string();
    if url.is_empty() {
        return Err(GatewayError::validation("No URL provided."));
    }

    let response = match ctx.http.get(&url).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(%url, error = %err, "remote fetch failed");
            return Err(GatewayError::RemoteFetch { url });
        }
    };
    let status = response.status();
    if !status.is_success() {
        warn!(%url, %status, "remote fetch returned non-success status");
        return Err(GatewayError::RemoteFetch { url });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%url, error = %err, "reading remote body failed");
            return Err(GatewayError::RemoteFetch { url });
        }
    };
    debug!(%url, size = bytes.len(), %content_type, "fetched remote source");

    let extension = url_extension(&url);
    Ok(SourcePayload::buffered(bytes, content_type, extension))
}

/// Extension of the last path segment of `url`, query and fragment ignored.
fn url_extension(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(object_key::decode_key))
        })
        .map(|segment| object_key::extension_of(&segment))
        .unwrap_or_default()
}
