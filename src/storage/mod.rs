//! The object-store capability the pipelines are written against.
//!
//! `ObjectBackend` is the only way the gateway touches stored bytes. Two
//! implementations ship with the crate:
//! - [`s3::S3Backend`] talks to any S3-compatible endpoint (MinIO, RustFS, AWS).
//! - [`memory::MemoryBackend`] keeps everything in process, for local runs and tests.
//!
//! Listing is push-based: the backend hands every key to a [`ListObserver`]
//! and finishes with exactly one terminal signal.

pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::{collections::HashMap, error::Error as StdError, fmt, io, pin::Pin};
use thiserror::Error;

/// Body of an object travelling into or out of the backend.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

pub type BackendResult<T> = Result<T, BackendError>;

/// Backend-neutral cause of a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendFault {
    NoSuchKey,
    NoSuchBucket,
    InvalidBucketName,
    InvalidObjectName,
    /// Credentials rejected (bad access or secret key).
    Authorization,
    /// Server refused the operation, e.g. an SSE key mismatch.
    AccessDenied,
    /// The source payload vanished before it could be read.
    SourceMissing,
    StreamDisposed,
    StreamUnreadable,
    /// The source stream was already being read elsewhere.
    StreamBusy,
    Other,
}

impl fmt::Display for BackendFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoSuchKey => "no such key",
            Self::NoSuchBucket => "no such bucket",
            Self::InvalidBucketName => "invalid bucket name",
            Self::InvalidObjectName => "invalid object name",
            Self::Authorization => "authorization failure",
            Self::AccessDenied => "access denied",
            Self::SourceMissing => "source missing",
            Self::StreamDisposed => "stream disposed",
            Self::StreamUnreadable => "stream unreadable",
            Self::StreamBusy => "stream busy",
            Self::Other => "backend failure",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{fault}: {message}")]
pub struct BackendError {
    pub fault: BackendFault,
    pub message: String,
}

impl BackendError {
    pub fn new(fault: BackendFault, message: impl Into<String>) -> Self {
        Self {
            fault,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(BackendFault::Other, message)
    }

    /// Classify an I/O failure raised while reading a source stream.
    pub fn from_io(err: &io::Error) -> Self {
        let fault = match err.kind() {
            io::ErrorKind::NotFound => BackendFault::SourceMissing,
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionAborted => BackendFault::StreamDisposed,
            io::ErrorKind::Unsupported | io::ErrorKind::InvalidData => {
                BackendFault::StreamUnreadable
            }
            io::ErrorKind::WouldBlock | io::ErrorKind::ResourceBusy => BackendFault::StreamBusy,
            _ => BackendFault::Other,
        };
        Self::new(fault, err.to_string())
    }

    /// Walk an error's source chain looking for a stream I/O failure.
    ///
    /// Clients wrap body read errors several layers deep; the innermost
    /// `io::Error` carries the cause worth classifying.
    pub fn from_source_chain(err: &(dyn StdError + 'static)) -> Option<Self> {
        let mut current: Option<&(dyn StdError + 'static)> = Some(err);
        while let Some(e) = current {
            if let Some(io_err) = e.downcast_ref::<io::Error>() {
                let classified = Self::from_io(io_err);
                if classified.fault != BackendFault::Other {
                    return Some(classified);
                }
            }
            current = e.source();
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct PutObjectOutput {
    pub key: String,
}

pub struct GetObjectOutput {
    pub content_type: Option<String>,
    pub body: ByteStream,
}

/// Everything a stat call reports about one object.
#[derive(Debug, Clone)]
pub struct ObjectStat {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Receiver side of a push-based listing.
///
/// `on_object` may fire any number of times; afterwards exactly one of
/// `on_error` or `on_completed` fires, consuming the observer.
pub trait ListObserver: Send {
    fn on_object(&mut self, key: String);

    fn on_error(self: Box<Self>, err: BackendError);

    fn on_completed(self: Box<Self>);

    /// True once nobody is waiting for the outcome any more.
    fn is_closed(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait ObjectBackend: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool>;

    /// Store `length` bytes from `body` under `key`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        length: u64,
        content_type: &str,
    ) -> BackendResult<PutObjectOutput>;

    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<GetObjectOutput>;

    /// `Ok(None)` when the backend reports no metadata entries for the object.
    async fn stat_object(&self, bucket: &str, key: &str) -> BackendResult<Option<ObjectStat>>;

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: u64,
    ) -> BackendResult<String>;

    /// Start a recursive listing under `prefix`, delivering keys to `observer`.
    ///
    /// Returns as soon as the enumeration is under way; the outcome arrives
    /// through the observer.
    fn list_objects_recursive(&self, bucket: &str, prefix: &str, observer: Box<dyn ListObserver>);
}
