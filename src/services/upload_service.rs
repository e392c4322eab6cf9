use super::{
    error_classifier::{GatewayError, Operation, classify},
    object_key::ObjectKey,
    sources::{SourceContext, UploadSource},
};
use crate::{models::object::StoredObjectReference, storage::ObjectBackend};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Writes new objects: open source, confirm bucket, generate key, store.
#[derive(Clone)]
pub struct UploadService {
    backend: Arc<dyn ObjectBackend>,
    base_url: Arc<str>,
    sources: SourceContext,
}

impl UploadService {
    pub fn new(
        backend: Arc<dyn ObjectBackend>,
        base_url: impl Into<String>,
        sources: SourceContext,
    ) -> Self {
        Self {
            backend,
            base_url: Arc::from(base_url.into()),
            sources,
        }
    }

    /// Store `source` in `bucket` under a fresh key inside `destination_path`.
    ///
    /// Nothing is written unless the bucket is confirmed to exist. A failed
    /// write leaves no cleanup behind and is not retried.
    #[instrument(skip(self, source), fields(source = source.kind()))]
    pub async fn upload(
        &self,
        bucket: &str,
        destination_path: &str,
        source: UploadSource,
    ) -> Result<StoredObjectReference, GatewayError> {
        let payload = source.open(&self.sources).await?;
        if payload.length == 0 {
            return Err(GatewayError::validation("The file to upload is empty."));
        }

        let exists = self
            .backend
            .bucket_exists(bucket)
            .await
            .map_err(|err| classify(Operation::Upload, bucket, "", err))?;
        if !exists {
            warn!(bucket, "upload rejected, bucket missing");
            return Err(GatewayError::BucketMissing(bucket.to_string()));
        }

        let key = ObjectKey::generate(destination_path, &payload.extension);
        let stored = self
            .backend
            .put_object(
                bucket,
                key.as_str(),
                payload.body,
                payload.length,
                &payload.content_type,
            )
            .await
            .map_err(|err| classify(Operation::Upload, bucket, key.as_str(), err))?;

        info!(
            bucket,
            key = %stored.key,
            size = payload.length,
            content_type = %payload.content_type,
            "uploaded object"
        );
        Ok(StoredObjectReference::new(&self.base_url, &stored.key))
    }

    /// Upload each source in turn. One failure never stops the rest.
    pub async fn upload_all(
        &self,
        bucket: &str,
        destination_path: &str,
        sources: Vec<UploadSource>,
    ) -> Vec<Result<StoredObjectReference, GatewayError>> {
        let mut results = Vec::with_capacity(sources.len());
        for source in sources {
            results.push(self.upload(bucket, destination_path, source).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::extension::FileExtension,
        storage::{
            BackendFault, ByteStream,
            memory::{FaultPoint, MemoryBackend},
        },
    };
    use bytes::Bytes;
    use futures::StreamExt;
    use std::time::Duration;

    const BASE: &str = "https://files.example.com/";

    async fn service() -> (UploadService, MemoryBackend) {
        let backend = MemoryBackend::new();
        backend.create_bucket("media").await.unwrap();
        let sources = SourceContext::new(Duration::from_secs(5)).unwrap();
        (
            UploadService::new(Arc::new(backend.clone()), BASE, sources),
            backend,
        )
    }

    fn direct(name: &str, data: &'static [u8]) -> UploadSource {
        let body: ByteStream = Box::pin(futures::stream::once(async move {
            Ok(Bytes::from_static(data))
        }));
        UploadSource::Direct {
            file_name: name.into(),
            content_type: "image/png".into(),
            length: data.len() as u64,
            body,
        }
    }

    #[tokio::test]
    async fn stored_bytes_come_back_unchanged() {
        let (svc, backend) = service().await;
        let reference = svc
            .upload("media", "A/B", direct("Photo.PNG", b"\x89PNG data"))
            .await
            .unwrap();

        let key = reference
            .as_str()
            .strip_prefix("https://files.example.com/")
            .unwrap()
            .to_string();
        assert!(key.starts_with("a/b/"), "{key}");
        assert!(key.ends_with(".png"), "{key}");

        let got = backend.get_object("media", &key).await.unwrap();
        let bytes: Vec<Bytes> = got.body.map(|c| c.unwrap()).collect().await;
        assert_eq!(bytes.concat(), b"\x89PNG data");
        assert_eq!(got.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn reference_names_the_stored_key_for_escaped_input() {
        let (svc, backend) = service().await;
        let reference = svc
            .upload("media", "Dir%41", direct("photo.%41BC", b"data"))
            .await
            .unwrap();

        let stored = backend.object_keys("media").await;
        assert_eq!(stored.len(), 1);
        assert!(stored[0].starts_with("dira/"), "{}", stored[0]);
        assert!(stored[0].ends_with(".abc"), "{}", stored[0]);
        assert_eq!(
            reference.as_str(),
            format!("https://files.example.com/{}", stored[0])
        );
    }

    #[tokio::test]
    async fn missing_bucket_writes_nothing() {
        let (svc, backend) = service().await;
        let err = svc
            .upload("archive", "", direct("a.png", b"data"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::BucketMissing(ref b) if b == "archive"));
        assert_eq!(backend.put_count(), 0);
    }

    #[tokio::test]
    async fn invalid_base64_writes_nothing() {
        let (svc, backend) = service().await;
        let source = UploadSource::Base64 {
            data: "not-base64!".into(),
            extension: FileExtension::Png,
        };
        let err = svc.upload("media", "", source).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidEncoding));
        assert_eq!(backend.put_count(), 0);
    }

    #[tokio::test]
    async fn empty_payload_is_rejected_before_the_backend() {
        let (svc, backend) = service().await;
        let err = svc
            .upload("media", "", direct("a.png", b""))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert_eq!(backend.put_count(), 0);
    }

    #[tokio::test]
    async fn write_faults_are_classified() {
        let (svc, backend) = service().await;
        backend.inject_fault(FaultPoint::PutObject, BackendFault::AccessDenied);
        let err = svc
            .upload("media", "x", direct("a.png", b"data"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AccessDenied));

        backend.inject_fault(FaultPoint::PutObject, BackendFault::StreamDisposed);
        let err = svc
            .upload("media", "x", direct("a.png", b"data"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "The file stream has been disposed.");
    }

    #[tokio::test]
    async fn batch_keeps_going_after_a_failure() {
        let (svc, _) = service().await;
        let sources = vec![
            UploadSource::Base64 {
                data: "aGk=".into(),
                extension: FileExtension::Txt,
            },
            UploadSource::Base64 {
                data: "%%%".into(),
                extension: FileExtension::Txt,
            },
            UploadSource::Base64 {
                data: "aGk=".into(),
                extension: FileExtension::Txt,
            },
        ];
        let results = svc.upload_all("media", "notes", sources).await;
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }
}
