use super::{
    error_classifier::{GatewayError, Operation, classify},
    listing::ObjectLister,
    object_key::decode_key,
    sources::DEFAULT_CONTENT_TYPE,
};
use crate::{
    models::object::{FileContent, FileMetadata, RangedContent},
    storage::{BackendError, ObjectBackend},
};
use bytes::BytesMut;
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Read side of the gateway: whole files, ranges, metadata, presigned links
/// and listings. Keys arrive percent-encoded and are decoded here.
#[derive(Clone)]
pub struct DownloadService {
    backend: Arc<dyn ObjectBackend>,
    lister: ObjectLister,
}

impl DownloadService {
    pub fn new(backend: Arc<dyn ObjectBackend>) -> Self {
        Self {
            lister: ObjectLister::new(backend.clone()),
            backend,
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch_file(&self, bucket: &str, key: &str) -> Result<FileContent, GatewayError> {
        let key = decoded(key)?;
        let object = self
            .backend
            .get_object(bucket, &key)
            .await
            .map_err(|err| classify(Operation::Download, bucket, &key, err))?;

        let content = object
            .body
            .try_fold(BytesMut::new(), |mut buf, chunk| async move {
                buf.extend_from_slice(&chunk);
                Ok(buf)
            })
            .await
            .map_err(|err| {
                classify(
                    Operation::Download,
                    bucket,
                    &key,
                    BackendError::from_io(&err),
                )
            })?
            .freeze();

        let content_type = object
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        debug!(size = content.len(), %content_type, "fetched object");

        Ok(FileContent {
            content,
            content_type,
            file_name: file_name_of(&key).to_string(),
        })
    }

    /// Same retrieval as [`fetch_file`](Self::fetch_file), wrapped for range serving.
    pub async fn fetch_ranged(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<RangedContent, GatewayError> {
        self.fetch_file(bucket, key).await.map(RangedContent::new)
    }

    #[instrument(skip(self))]
    pub async fn fetch_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<FileMetadata, GatewayError> {
        let key = decoded(key)?;
        let stat = self
            .backend
            .stat_object(bucket, &key)
            .await
            .map_err(|err| classify(Operation::Metadata, bucket, &key, err))?
            .ok_or_else(|| GatewayError::NoMetadata { key: key.clone() })?;

        Ok(FileMetadata {
            object_name: key,
            bucket_name: bucket.to_string(),
            size: stat.size,
            last_modified: stat.last_modified,
            content_type: stat.content_type,
            e_tag: stat.etag,
            custom_metadata: stat.metadata,
        })
    }

    /// Time-limited GET link, valid for `expires_in_minutes * 60` seconds.
    #[instrument(skip(self))]
    pub async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in_minutes: u32,
    ) -> Result<String, GatewayError> {
        if expires_in_minutes == 0 {
            return Err(GatewayError::validation(
                "expiresInMinutes must be at least 1.",
            ));
        }
        let key = decoded(key)?;
        let expiry_secs = u64::from(expires_in_minutes) * 60;
        self.backend
            .presigned_get_url(bucket, &key, expiry_secs)
            .await
            .map_err(|err| classify(Operation::Presign, bucket, &key, err))
    }

    /// `prefix` is taken as given; query-string decoding has already happened.
    pub async fn list_files(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, GatewayError> {
        self.lister.list(bucket, prefix).await
    }
}

fn decoded(key: &str) -> Result<String, GatewayError> {
    let key = decode_key(key);
    if key.trim().is_empty() {
        return Err(GatewayError::validation("File path must be provided."));
    }
    Ok(key)
}

fn file_name_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        BackendFault,
        memory::{FaultPoint, MemoryBackend},
    };
    use std::collections::HashMap;

    async fn service() -> (DownloadService, MemoryBackend) {
        let backend = MemoryBackend::new();
        backend.create_bucket("media").await.unwrap();
        backend
            .seed_object(
                "media",
                "docs/q3 report.pdf",
                &b"%PDF-1.7"[..],
                Some("application/pdf"),
                HashMap::from([("x-amz-meta-owner".to_string(), "ops".to_string())]),
            )
            .await;
        (DownloadService::new(Arc::new(backend.clone())), backend)
    }

    #[tokio::test]
    async fn fetch_decodes_key_and_names_file_after_last_segment() {
        let (svc, _) = service().await;
        let file = svc
            .fetch_file("media", "docs%2Fq3%20report.pdf")
            .await
            .unwrap();
        assert_eq!(&file.content[..], b"%PDF-1.7");
        assert_eq!(file.content_type, "application/pdf");
        assert_eq!(file.file_name, "q3 report.pdf");
    }

    #[tokio::test]
    async fn keys_are_decoded_exactly_once() {
        let (svc, backend) = service().await;
        backend
            .seed_object("media", "growth 100%41.txt", &b"up"[..], None, HashMap::new())
            .await;
        let file = svc
            .fetch_file("media", "growth%20100%2541.txt")
            .await
            .unwrap();
        assert_eq!(file.file_name, "growth 100%41.txt");
    }

    #[tokio::test]
    async fn missing_key_is_not_found_never_internal() {
        let (svc, _) = service().await;
        let err = svc.fetch_file("media", "docs/nope.pdf").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));

        let err = svc.fetch_ranged("media", "docs/nope.pdf").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
    }

    #[tokio::test]
    async fn other_read_faults_are_internal() {
        let (svc, backend) = service().await;
        backend.inject_fault(FaultPoint::GetObject, BackendFault::Authorization);
        let err = svc
            .fetch_file("media", "docs/q3 report.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Internal));
    }

    #[tokio::test]
    async fn untyped_objects_default_to_octet_stream() {
        let (svc, backend) = service().await;
        backend
            .seed_object("media", "raw", &b"1"[..], None, HashMap::new())
            .await;
        let file = svc.fetch_file("media", "raw").await.unwrap();
        assert_eq!(file.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(file.file_name, "raw");
    }

    #[tokio::test]
    async fn metadata_reports_size_etag_and_custom_entries() {
        let (svc, _) = service().await;
        let meta = svc
            .fetch_metadata("media", "docs/q3%20report.pdf")
            .await
            .unwrap();
        assert_eq!(meta.object_name, "docs/q3 report.pdf");
        assert_eq!(meta.size, 8);
        assert_eq!(meta.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(meta.custom_metadata["x-amz-meta-owner"], "ops");
        assert!(meta.e_tag.is_some());
    }

    #[tokio::test]
    async fn object_without_metadata_entries_is_no_metadata() {
        let (svc, backend) = service().await;
        backend
            .seed_object("media", "bare", &b"1"[..], None, HashMap::new())
            .await;
        let err = svc.fetch_metadata("media", "bare").await.unwrap_err();
        assert_eq!(err.to_string(), "No metadata found for the object bare.");
    }

    #[tokio::test]
    async fn metadata_faults_are_metadata_errors() {
        let (svc, _) = service().await;
        let err = svc.fetch_metadata("media", "gone.txt").await.unwrap_err();
        assert!(matches!(err, GatewayError::Metadata { .. }));
    }

    #[tokio::test]
    async fn presign_converts_minutes_to_seconds() {
        let (svc, _) = service().await;
        let url = svc
            .presigned_url("media", "docs/q3 report.pdf", 5)
            .await
            .unwrap();
        assert!(url.contains("X-Amz-Expires=300"), "{url}");

        let err = svc.presigned_url("media", "docs/a.pdf", 0).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn presign_faults_are_presign_errors() {
        let (svc, backend) = service().await;
        backend.inject_fault(FaultPoint::Presign, BackendFault::Other);
        let err = svc.presigned_url("media", "a.pdf", 10).await.unwrap_err();
        assert!(matches!(err, GatewayError::Presign { .. }));
    }

    #[tokio::test]
    async fn list_files_delegates_to_lister() {
        let (svc, _) = service().await;
        assert_eq!(
            svc.list_files("media", "docs").await.unwrap(),
            vec!["docs/q3 report.pdf".to_string()]
        );
    }
}
