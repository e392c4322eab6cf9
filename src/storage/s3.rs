//! S3-compatible backend built on the AWS SDK.
//!
//! Works against MinIO, RustFS and AWS alike: static credentials, a custom
//! endpoint and path-style addressing.

use super::{
    BackendError, BackendFault, BackendResult, ByteStream, GetObjectOutput, ListObserver,
    ObjectBackend, ObjectStat, PutObjectOutput,
};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client,
    config::http::HttpResponse,
    error::{ProvideErrorMetadata, SdkError},
    operation::head_bucket::HeadBucketError,
    presigning::PresigningConfig,
    primitives::ByteStream as AwsByteStream,
};
use chrono::DateTime;
use futures::TryStreamExt;
use http_body::Frame;
use http_body_util::StreamBody;
use std::{collections::HashMap, time::Duration};
use tracing::{debug, instrument};

/// Metadata keys reported by stat calls carry the same prefix S3 uses on the wire.
const USER_METADATA_PREFIX: &str = "x-amz-meta-";

#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    endpoint: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    pub async fn connect(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "file-gateway",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint.clone())
            .load()
            .await;

        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build(),
        );

        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }
}

/// Translate an SDK failure into a backend-neutral fault.
fn map_sdk_error<E, R>(err: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + 'static,
{
    let fault = match err.code() {
        Some("NoSuchKey") | Some("NotFound") => BackendFault::NoSuchKey,
        Some("NoSuchBucket") => BackendFault::NoSuchBucket,
        Some("InvalidBucketName") => BackendFault::InvalidBucketName,
        Some("KeyTooLongError") | Some("InvalidObjectName") | Some("XMinioInvalidObjectName") => {
            BackendFault::InvalidObjectName
        }
        Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch") | Some("ExpiredToken") => {
            BackendFault::Authorization
        }
        Some("AccessDenied") => BackendFault::AccessDenied,
        _ => {
            if let Some(stream_fault) = BackendError::from_source_chain(&err) {
                return stream_fault;
            }
            BackendFault::Other
        }
    };
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());
    BackendError::new(fault, message)
}

/// A 404 from `HeadBucket` means the bucket is absent, not that the call failed.
fn head_bucket_failure(err: SdkError<HeadBucketError, HttpResponse>) -> BackendResult<bool> {
    if err
        .as_service_error()
        .map(|e| e.is_not_found())
        .unwrap_or(false)
    {
        return Ok(false);
    }
    if let Some(raw) = err.raw_response() {
        if raw.status().as_u16() == 404 {
            return Ok(false);
        }
    }
    Err(map_sdk_error(err))
}

#[async_trait]
impl ObjectBackend for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => head_bucket_failure(err),
        }
    }

    #[instrument(skip(self, body), fields(backend = "s3"))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        length: u64,
        content_type: &str,
    ) -> BackendResult<PutObjectOutput> {
        let body = AwsByteStream::from_body_1_x(StreamBody::new(body.map_ok(Frame::data)));
        let content_length = i64::try_from(length)
            .map_err(|_| BackendError::other(format!("object too large: {length} bytes")))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_length(content_length)
            .content_type(content_type)
            .send()
            .await
            .map_err(map_sdk_error)?;

        debug!(bucket, key, length, "object written");
        Ok(PutObjectOutput {
            key: key.to_string(),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<GetObjectOutput> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let content_type = output.content_type().map(str::to_string);
        let data = output
            .body
            .collect()
            .await
            .map_err(|err| BackendError::other(err.to_string()))?
            .into_bytes();

        Ok(GetObjectOutput {
            content_type,
            body: Box::pin(futures::stream::once(async move { Ok(data) })),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn stat_object(&self, bucket: &str, key: &str) -> BackendResult<Option<ObjectStat>> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let mut metadata: HashMap<String, String> = output
            .metadata()
            .map(|user| {
                user.iter()
                    .map(|(k, v)| (format!("{USER_METADATA_PREFIX}{k}"), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(content_type) = output.content_type() {
            metadata.insert("content-type".to_string(), content_type.to_string());
        }
        if metadata.is_empty() {
            return Ok(None);
        }

        let last_modified = output
            .last_modified()
            .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()));

        Ok(Some(ObjectStat {
            size: output.content_length().unwrap_or(0).max(0) as u64,
            last_modified,
            content_type: output.content_type().map(str::to_string),
            etag: output.e_tag().map(|tag| tag.trim_matches('"').to_string()),
            metadata,
        }))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: u64,
    ) -> BackendResult<String> {
        let config = PresigningConfig::expires_in(Duration::from_secs(expiry_secs))
            .map_err(|err| BackendError::other(format!("invalid presign config: {err}")))?;
        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(map_sdk_error)?;
        Ok(presigned.uri().to_string())
    }

    fn list_objects_recursive(
        &self,
        bucket: &str,
        prefix: &str,
        mut observer: Box<dyn ListObserver>,
    ) {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();

        tokio::spawn(async move {
            let mut continuation_token: Option<String> = None;
            loop {
                if observer.is_closed() {
                    debug!(%bucket, %prefix, "listing abandoned by caller");
                    return;
                }

                let mut request = client.list_objects_v2().bucket(&bucket).prefix(&prefix);
                if let Some(token) = continuation_token.take() {
                    request = request.continuation_token(token);
                }

                let output = match request.send().await {
                    Ok(output) => output,
                    Err(err) => {
                        observer.on_error(map_sdk_error(err));
                        return;
                    }
                };

                for object in output.contents() {
                    if let Some(key) = object.key() {
                        observer.on_object(key.to_string());
                    }
                }

                if output.is_truncated() == Some(true) {
                    continuation_token = output.next_continuation_token().map(str::to_string);
                    if continuation_token.is_none() {
                        observer.on_error(BackendError::other(
                            "truncated listing without continuation token",
                        ));
                        return;
                    }
                } else {
                    observer.on_completed();
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::error_classifier::{ErrorKind, Operation, classify};
    use aws_sdk_s3::{
        error::ErrorMetadata,
        operation::get_object::GetObjectError,
        primitives::SdkBody,
        types::error::{NoSuchKey, NotFound},
    };

    fn raw(status: u16) -> HttpResponse {
        HttpResponse::new(status.try_into().unwrap(), SdkBody::empty())
    }

    fn meta(code: &str) -> ErrorMetadata {
        ErrorMetadata::builder()
            .code(code)
            .message("raw server text")
            .build()
    }

    fn get_failure(code: &str, status: u16) -> SdkError<GetObjectError, HttpResponse> {
        SdkError::service_error(GetObjectError::generic(meta(code)), raw(status))
    }

    #[test]
    fn missing_key_maps_to_no_such_key_and_downloads_as_not_found() {
        let err = SdkError::service_error(
            GetObjectError::NoSuchKey(
                NoSuchKey::builder()
                    .message("The specified key does not exist.")
                    .meta(meta("NoSuchKey"))
                    .build(),
            ),
            raw(404),
        );
        let mapped = map_sdk_error(err);
        assert_eq!(mapped.fault, BackendFault::NoSuchKey);

        let gateway = classify(Operation::Download, "media", "a/b.png", mapped);
        assert_eq!(gateway.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn error_codes_map_to_faults() {
        let cases = [
            ("NoSuchBucket", 404, BackendFault::NoSuchBucket),
            ("InvalidBucketName", 400, BackendFault::InvalidBucketName),
            ("KeyTooLongError", 400, BackendFault::InvalidObjectName),
            ("XMinioInvalidObjectName", 400, BackendFault::InvalidObjectName),
            ("InvalidAccessKeyId", 403, BackendFault::Authorization),
            ("SignatureDoesNotMatch", 403, BackendFault::Authorization),
            ("AccessDenied", 403, BackendFault::AccessDenied),
            ("SlowDown", 503, BackendFault::Other),
        ];
        for (code, status, expected) in cases {
            let mapped = map_sdk_error(get_failure(code, status));
            assert_eq!(mapped.fault, expected, "{code}");
            assert_eq!(mapped.message, "raw server text");
        }
    }

    #[test]
    fn head_bucket_not_found_means_absent() {
        let typed = SdkError::service_error(
            HeadBucketError::NotFound(NotFound::builder().build()),
            raw(404),
        );
        assert!(!head_bucket_failure(typed).unwrap());

        let untyped = SdkError::service_error(HeadBucketError::generic(meta("")), raw(404));
        assert!(!head_bucket_failure(untyped).unwrap());
    }

    #[test]
    fn head_bucket_auth_failure_is_an_error() {
        let err = SdkError::service_error(
            HeadBucketError::generic(meta("InvalidAccessKeyId")),
            raw(403),
        );
        assert_eq!(
            head_bucket_failure(err).unwrap_err().fault,
            BackendFault::Authorization
        );
    }
}
