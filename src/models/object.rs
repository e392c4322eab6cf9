//! Results handed back by the upload and download pipelines.

use super::range::ResolvedRange;
use crate::storage::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::HashMap, fmt};

/// Public URL of a stored object: `<base url>/<object key>`, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StoredObjectReference(String);

impl StoredObjectReference {
    pub fn new(base_url: &str, object_key: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self(format!("{base}/{object_key}").to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoredObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A downloaded object held fully in memory.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub content: Bytes,
    pub content_type: String,
    pub file_name: String,
}

/// A downloaded object that can be served whole or by byte range.
#[derive(Debug, Clone)]
pub struct RangedContent {
    file: FileContent,
}

/// Chunk size used when a ranged body is streamed out.
const STREAM_CHUNK: usize = 64 * 1024;

impl RangedContent {
    pub fn new(file: FileContent) -> Self {
        Self { file }
    }

    pub fn len(&self) -> u64 {
        self.file.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.file.content.is_empty()
    }

    pub fn content_type(&self) -> &str {
        &self.file.content_type
    }

    pub fn file_name(&self) -> &str {
        &self.file.file_name
    }

    /// Bytes covered by `range`; cheap, shares the underlying buffer.
    pub fn slice(&self, range: &ResolvedRange) -> Bytes {
        self.file
            .content
            .slice(range.start as usize..=range.end as usize)
    }

    /// Stream `bytes` out in fixed-size chunks.
    pub fn chunked(bytes: Bytes) -> ByteStream {
        let chunks: Vec<std::io::Result<Bytes>> = (0..bytes.len())
            .step_by(STREAM_CHUNK)
            .map(|start| Ok(bytes.slice(start..(start + STREAM_CHUNK).min(bytes.len()))))
            .collect();
        Box::pin(futures::stream::iter(chunks))
    }

    pub fn into_stream(self) -> ByteStream {
        Self::chunked(self.file.content)
    }
}

/// What a metadata query reports about one object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub object_name: String,
    pub bucket_name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub e_tag: Option<String>,
    pub custom_metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn ranged(data: &'static [u8]) -> RangedContent {
        RangedContent::new(FileContent {
            content: Bytes::from_static(data),
            content_type: "text/plain".into(),
            file_name: "a.txt".into(),
        })
    }

    #[test]
    fn reference_is_lowercased_and_joined_once() {
        let r = StoredObjectReference::new("https://CDN.example.com/", "Media/ABC.png");
        assert_eq!(r.as_str(), "https://cdn.example.com/media/abc.png");
    }

    #[test]
    fn slice_is_inclusive() {
        let content = ranged(b"0123456789");
        let range = ResolvedRange {
            start: 2,
            end: 4,
            total_size: 10,
        };
        assert_eq!(&content.slice(&range)[..], b"234");
    }

    #[tokio::test]
    async fn stream_yields_all_bytes_in_order() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let bytes = Bytes::from(data.clone());
        let chunks: Vec<Bytes> = RangedContent::chunked(bytes)
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.concat(), data);
    }

    #[test]
    fn metadata_serializes_camel_case() {
        let meta = FileMetadata {
            object_name: "a/b.png".into(),
            bucket_name: "media".into(),
            size: 3,
            last_modified: None,
            content_type: Some("image/png".into()),
            e_tag: Some("abc".into()),
            custom_metadata: HashMap::new(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["objectName"], "a/b.png");
        assert_eq!(json["eTag"], "abc");
        assert!(json["customMetadata"].is_object());
    }
}
