//! Translates backend faults into the gateway's error taxonomy.
//!
//! Every backend failure funnels through [`classify`], which picks a
//! [`GatewayError`] variant per operation, logs the internal detail, and
//! leaves only a user-safe message in the returned value.

use crate::storage::{BackendError, BackendFault};
use thiserror::Error;
use tracing::{error, warn};

/// Pipeline operation a backend call was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Download,
    Metadata,
    Presign,
    List,
}

/// Coarse classification the HTTP layer turns into a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    BucketMissing,
    AuthorizationFailure,
    InvalidBucketName,
    InvalidObjectName,
    StreamFault,
    AccessDenied,
    Listing,
    InvalidEncoding,
    RemoteFetch,
    NoMetadata,
    Metadata,
    Presign,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::BucketMissing => "bucket_missing",
            Self::AuthorizationFailure => "authorization_failure",
            Self::InvalidBucketName => "invalid_bucket_name",
            Self::InvalidObjectName => "invalid_object_name",
            Self::StreamFault => "stream_fault",
            Self::AccessDenied => "access_denied",
            Self::Listing => "listing",
            Self::InvalidEncoding => "invalid_encoding",
            Self::RemoteFetch => "remote_fetch",
            Self::NoMetadata => "no_metadata",
            Self::Metadata => "metadata",
            Self::Presign => "presign",
            Self::Internal => "internal",
        }
    }
}

/// Which way a source stream broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFault {
    SourceMissing,
    Disposed,
    Unreadable,
    Busy,
}

/// Failures returned by the upload and download pipelines.
///
/// `Display` is the message shown to callers; it never contains backend text.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("The specified path '{key}' in bucket '{bucket}' was not found.")]
    NotFound { bucket: String, key: String },

    #[error("Bucket '{0}' does not exist.")]
    BucketMissing(String),

    #[error("Invalid access or secret key.")]
    AuthorizationFailure,

    #[error("Invalid bucket name: '{0}'.")]
    InvalidBucketName(String),

    #[error("Invalid object name: '{0}'.")]
    InvalidObjectName(String),

    #[error("{}", stream_fault_message(.0))]
    StreamFault(StreamFault),

    #[error("Access is denied for the encrypted PUT operation due to an incorrect key.")]
    AccessDenied,

    #[error("Error listing files in {bucket}.")]
    Listing { bucket: String },

    #[error("Invalid Base64 string provided.")]
    InvalidEncoding,

    #[error("Failed to download file from url {url}.")]
    RemoteFetch { url: String },

    #[error("No metadata found for the object {key}.")]
    NoMetadata { key: String },

    #[error("Error occurred while retrieving metadata for {key} in {bucket}.")]
    Metadata { bucket: String, key: String },

    #[error("Error occurred while generating presigned URL for {key} in {bucket}.")]
    Presign { bucket: String, key: String },

    #[error("Internal server error.")]
    Internal,
}

fn stream_fault_message(fault: &StreamFault) -> &'static str {
    match fault {
        StreamFault::SourceMissing => "The file to upload was not found.",
        StreamFault::Disposed => "The file stream has been disposed.",
        StreamFault::Unreadable => "The file stream cannot be read from.",
        StreamFault::Busy => "The file stream is currently in a read operation.",
    }
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::BucketMissing(_) => ErrorKind::BucketMissing,
            Self::AuthorizationFailure => ErrorKind::AuthorizationFailure,
            Self::InvalidBucketName(_) => ErrorKind::InvalidBucketName,
            Self::InvalidObjectName(_) => ErrorKind::InvalidObjectName,
            Self::StreamFault(_) => ErrorKind::StreamFault,
            Self::AccessDenied => ErrorKind::AccessDenied,
            Self::Listing { .. } => ErrorKind::Listing,
            Self::InvalidEncoding => ErrorKind::InvalidEncoding,
            Self::RemoteFetch { .. } => ErrorKind::RemoteFetch,
            Self::NoMetadata { .. } => ErrorKind::NoMetadata,
            Self::Metadata { .. } => ErrorKind::Metadata,
            Self::Presign { .. } => ErrorKind::Presign,
            Self::Internal => ErrorKind::Internal,
        }
    }
}

/// Map a backend failure raised during `op` on `bucket`/`key`.
///
/// Faults the caller can act on are logged at `warn`; everything else is an
/// internal error, logged at `error` with the backend's own description.
pub fn classify(op: Operation, bucket: &str, key: &str, err: BackendError) -> GatewayError {
    let mapped = match (op, err.fault) {
        (Operation::List, _) => GatewayError::Listing {
            bucket: bucket.to_string(),
        },
        (Operation::Presign, _) => GatewayError::Presign {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        (Operation::Metadata, _) => GatewayError::Metadata {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        (Operation::Download, BackendFault::NoSuchKey | BackendFault::NoSuchBucket) => {
            GatewayError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }
        }
        (Operation::Download, _) => GatewayError::Internal,
        (Operation::Upload, fault) => match fault {
            BackendFault::NoSuchBucket => GatewayError::BucketMissing(bucket.to_string()),
            BackendFault::InvalidBucketName => GatewayError::InvalidBucketName(bucket.to_string()),
            BackendFault::InvalidObjectName => GatewayError::InvalidObjectName(key.to_string()),
            BackendFault::Authorization => GatewayError::AuthorizationFailure,
            BackendFault::AccessDenied => GatewayError::AccessDenied,
            BackendFault::SourceMissing => GatewayError::StreamFault(StreamFault::SourceMissing),
            BackendFault::StreamDisposed => GatewayError::StreamFault(StreamFault::Disposed),
            BackendFault::StreamUnreadable => GatewayError::StreamFault(StreamFault::Unreadable),
            BackendFault::StreamBusy => GatewayError::StreamFault(StreamFault::Busy),
            BackendFault::NoSuchKey | BackendFault::Other => GatewayError::Internal,
        },
    };

    match mapped.kind() {
        ErrorKind::Internal | ErrorKind::Listing | ErrorKind::Metadata | ErrorKind::Presign => {
            error!(?op, bucket, key, cause = %err, "backend operation failed")
        }
        _ => warn!(?op, bucket, key, cause = %err, "{}", mapped),
    }

    mapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault(f: BackendFault) -> BackendError {
        BackendError::new(f, "raw backend text: s3://secret")
    }

    #[test]
    fn upload_faults_map_to_specific_variants() {
        let cases = [
            (BackendFault::NoSuchBucket, ErrorKind::BucketMissing),
            (BackendFault::InvalidBucketName, ErrorKind::InvalidBucketName),
            (BackendFault::InvalidObjectName, ErrorKind::InvalidObjectName),
            (BackendFault::Authorization, ErrorKind::AuthorizationFailure),
            (BackendFault::AccessDenied, ErrorKind::AccessDenied),
            (BackendFault::StreamDisposed, ErrorKind::StreamFault),
            (BackendFault::StreamBusy, ErrorKind::StreamFault),
            (BackendFault::Other, ErrorKind::Internal),
        ];
        for (f, expected) in cases {
            let err = classify(Operation::Upload, "media", "a/b.png", fault(f));
            assert_eq!(err.kind(), expected, "{f:?}");
        }
    }

    #[test]
    fn missing_objects_are_not_found_on_download() {
        let err = classify(Operation::Download, "media", "a/b.png", fault(BackendFault::NoSuchKey));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            err.to_string(),
            "The specified path 'a/b.png' in bucket 'media' was not found."
        );

        let err = classify(Operation::Download, "media", "a/b.png", fault(BackendFault::Authorization));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn operation_specific_errors_swallow_the_fault_kind() {
        for f in [BackendFault::NoSuchKey, BackendFault::Other] {
            assert_eq!(classify(Operation::Metadata, "b", "k", fault(f)).kind(), ErrorKind::Metadata);
            assert_eq!(classify(Operation::Presign, "b", "k", fault(f)).kind(), ErrorKind::Presign);
            assert_eq!(classify(Operation::List, "b", "", fault(f)).kind(), ErrorKind::Listing);
        }
    }

    #[test]
    fn user_message_never_leaks_backend_text() {
        let ops = [
            Operation::Upload,
            Operation::Download,
            Operation::Metadata,
            Operation::Presign,
            Operation::List,
        ];
        for op in ops {
            let msg = classify(op, "media", "k", fault(BackendFault::Other)).to_string();
            assert!(!msg.contains("secret"), "{op:?}: {msg}");
        }
    }
}
