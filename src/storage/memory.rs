//! In-process object store.
//!
//! Buckets must be created up front with [`MemoryBackend::create_bucket`];
//! objects are kept whole in memory. Bucket and key names go through the same
//! S3 naming rules a real server enforces, so invalid-name paths behave the
//! way they would against MinIO. Faults can be injected per operation to
//! exercise the error paths of the pipelines.

use super::{
    BackendError, BackendFault, BackendResult, ByteStream, GetObjectOutput, ListObserver,
    ObjectBackend, ObjectStat, PutObjectOutput,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use md5::Context;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::RwLock;
use tracing::debug;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Operation a fault can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    BucketExists,
    PutObject,
    GetObject,
    StatObject,
    Presign,
    /// Fires after the configured number of keys has been delivered.
    List { after: usize },
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    etag: String,
    last_modified: DateTime<Utc>,
    metadata: HashMap<String, String>,
}

type Buckets = HashMap<String, BTreeMap<String, StoredObject>>;

#[derive(Clone, Default)]
pub struct MemoryBackend {
    buckets: Arc<RwLock<Buckets>>,
    faults: Arc<Mutex<Vec<(FaultPoint, BackendFault)>>>,
    puts: Arc<AtomicUsize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_bucket(&self, name: &str) -> BackendResult<()> {
        ensure_bucket_name_safe(name)?;
        self.buckets
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    /// Store an object directly, bypassing `put_object` and its counters.
    pub async fn seed_object(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
        metadata: HashMap<String, String>,
    ) {
        let data = data.into();
        let object = StoredObject {
            etag: format!("{:x}", md5::compute(&data)),
            data,
            content_type: content_type.map(str::to_string),
            last_modified: Utc::now(),
            metadata,
        };
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
    }

    /// Make every subsequent call at `point` fail with `fault`.
    pub fn inject_fault(&self, point: FaultPoint, fault: BackendFault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.retain(|(p, _)| !same_point(p, &point));
            faults.push((point, fault));
        }
    }

    /// Number of `put_object` calls that reached the store.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub async fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn fault_at(&self, point: FaultPoint) -> Option<(FaultPoint, BackendFault)> {
        self.faults
            .lock()
            .ok()?
            .iter()
            .find(|(p, _)| same_point(p, &point))
            .copied()
    }

    fn check_fault(&self, point: FaultPoint) -> BackendResult<()> {
        match self.fault_at(point) {
            Some((_, fault)) => Err(BackendError::new(fault, format!("injected at {point:?}"))),
            None => Ok(()),
        }
    }
}

fn same_point(a: &FaultPoint, b: &FaultPoint) -> bool {
    matches!(
        (a, b),
        (FaultPoint::List { .. }, FaultPoint::List { .. })
    ) || a == b
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool> {
        self.check_fault(FaultPoint::BucketExists)?;
        ensure_bucket_name_safe(bucket)?;
        Ok(self.buckets.read().await.contains_key(bucket))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: ByteStream,
        length: u64,
        content_type: &str,
    ) -> BackendResult<PutObjectOutput> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check_fault(FaultPoint::PutObject)?;
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;
        if !self.buckets.read().await.contains_key(bucket) {
            return Err(BackendError::new(BackendFault::NoSuchBucket, bucket));
        }

        let mut buf = BytesMut::new();
        let mut digest = Context::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| BackendError::from_io(&err))?;
            digest.consume(&chunk);
            buf.extend_from_slice(&chunk);
        }
        if buf.len() as u64 != length {
            return Err(BackendError::other(format!(
                "declared length {} but received {} bytes",
                length,
                buf.len()
            )));
        }

        let object = StoredObject {
            data: buf.freeze(),
            content_type: Some(content_type.to_string()),
            etag: format!("{:x}", digest.compute()),
            last_modified: Utc::now(),
            metadata: HashMap::new(),
        };
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| BackendError::new(BackendFault::NoSuchBucket, bucket))?;
        objects.insert(key.to_string(), object);
        debug!(bucket, key, length, "stored object in memory");

        Ok(PutObjectOutput {
            key: key.to_string(),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<GetObjectOutput> {
        self.check_fault(FaultPoint::GetObject)?;
        let object = self.lookup(bucket, key).await?;
        let data = object.data;
        Ok(GetObjectOutput {
            content_type: object.content_type,
            body: Box::pin(futures::stream::once(async move { Ok(data) })),
        })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> BackendResult<Option<ObjectStat>> {
        self.check_fault(FaultPoint::StatObject)?;
        let object = self.lookup(bucket, key).await?;

        let mut metadata = object.metadata.clone();
        if let Some(content_type) = &object.content_type {
            metadata.insert("content-type".to_string(), content_type.clone());
        }
        if metadata.is_empty() {
            return Ok(None);
        }

        Ok(Some(ObjectStat {
            size: object.data.len() as u64,
            last_modified: Some(object.last_modified),
            content_type: object.content_type,
            etag: Some(object.etag),
            metadata,
        }))
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: u64,
    ) -> BackendResult<String> {
        self.check_fault(FaultPoint::Presign)?;
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;
        let signature = md5::compute(format!("{bucket}/{key}/{expiry_secs}"));
        Ok(format!(
            "http://memory.local/{}/{}?X-Amz-Expires={}&X-Amz-Signature={:x}",
            bucket,
            urlencoding::encode(key),
            expiry_secs,
            signature
        ))
    }

    fn list_objects_recursive(
        &self,
        bucket: &str,
        prefix: &str,
        mut observer: Box<dyn ListObserver>,
    ) {
        let buckets = self.buckets.clone();
        let fault = self.fault_at(FaultPoint::List { after: 0 });
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();

        tokio::spawn(async move {
            let keys: Vec<String> = {
                let guard = buckets.read().await;
                let Some(objects) = guard.get(&bucket) else {
                    observer.on_error(BackendError::new(BackendFault::NoSuchBucket, bucket));
                    return;
                };
                objects
                    .keys()
                    .filter(|key| key.starts_with(&prefix))
                    .cloned()
                    .collect()
            };

            for (delivered, key) in keys.into_iter().enumerate() {
                if let Some((FaultPoint::List { after }, fault)) = fault {
                    if delivered == after {
                        observer.on_error(BackendError::new(fault, "injected during listing"));
                        return;
                    }
                }
                observer.on_object(key);
            }

            match fault {
                Some((FaultPoint::List { .. }, fault)) => {
                    observer.on_error(BackendError::new(fault, "injected at end of listing"))
                }
                _ => observer.on_completed(),
            }
        });
    }
}

impl MemoryBackend {
    async fn lookup(&self, bucket: &str, key: &str) -> BackendResult<StoredObject> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| BackendError::new(BackendFault::NoSuchBucket, bucket))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| BackendError::new(BackendFault::NoSuchKey, key))
    }
}

/// Reject keys an S3 server would refuse or that could escape a bucket.
fn ensure_key_safe(key: &str) -> BackendResult<()> {
    let invalid = key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.contains("..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
    if invalid {
        return Err(BackendError::new(BackendFault::InvalidObjectName, key));
    }
    Ok(())
}

/// S3 bucket naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - must start and end with a letter or digit
/// - no consecutive dots or dot-hyphen pairs
/// - must not look like an IPv4 address
fn ensure_bucket_name_safe(name: &str) -> BackendResult<()> {
    let len = name.len();
    let valid = (BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len)
        && name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        && !name.starts_with(['.', '-'])
        && !name.ends_with(['.', '-'])
        && !name.contains("..")
        && !name.contains("-.")
        && !name.contains(".-")
        && !is_ipv4_like(name);
    if !valid {
        return Err(BackendError::new(BackendFault::InvalidBucketName, name));
    }
    Ok(())
}

fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
