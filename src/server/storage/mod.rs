pub mod config;
pub mod object;

use std::io;
use std::ops::Range;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use thiserror::Error;

/// Errors reported by a bucket backend. Every failure other than the two
/// typed ones is rendered as an internal error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found")]
    NotFound,

    /// The requested range starts past the end of the object, which is
    /// `size` bytes long.
    #[error("range not satisfiable for object of {0} bytes")]
    RangeNotSatisfiable(u64),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Object content, streamed from the backend. Dropping the stream aborts the
/// backend read.
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// One item of a folder listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Name relative to the listed prefix, folders end with `/`.
    pub name: String,
    /// Full key in the bucket.
    pub key: String,
    pub is_dir: bool,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// An object fetched from the bucket, with the content headers reported by
/// the backend.
pub struct ObjectOutput {
    pub body: BodyStream,
    pub content_length: u64,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Set when a range was requested, for example `bytes 0-99/1000`.
    pub content_range: Option<String>,
}

pub struct PutInput {
    pub key: String,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub size: u64,
}

/// A single byte range taken from a `Range` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-end`, `end` inclusive.
    Bounded(u64, u64),
    /// `bytes=start-`
    From(u64),
    /// `bytes=-length`
    Suffix(u64),
}

impl ByteRange {
    /// Parse a `Range` header value. Multiple ranges and malformed values
    /// return `None`, the whole object is served in that case.
    pub fn parse(header: &str) -> Option<Self> {
        let ranges = header.trim().strip_prefix("bytes=")?;
        if ranges.contains(',') {
            return None;
        }
        let (start, end) = ranges.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());

        match (start.is_empty(), end.is_empty()) {
            (true, true) => None,
            (true, false) => {
                let length: u64 = end.parse().ok()?;
                if length == 0 {
                    return None;
                }
                Some(Self::Suffix(length))
            }
            (false, true) => Some(Self::From(start.parse().ok()?)),
            (false, false) => {
                let start: u64 = start.parse().ok()?;
                let end: u64 = end.parse().ok()?;
                if start > end {
                    return None;
                }
                Some(Self::Bounded(start, end))
            }
        }
    }

    /// The byte offsets served for an object of `size` bytes, end exclusive.
    /// The end is clamped to the object, `None` when nothing can be served.
    pub fn resolve(&self, size: u64) -> Option<Range<u64>> {
        let range = match *self {
            Self::Bounded(start, end) => start..end.saturating_add(1).min(size),
            Self::From(start) => start..size,
            Self::Suffix(length) => size.saturating_sub(length)..size,
        };
        if range.start >= range.end {
            return None;
        }
        Some(range)
    }

    /// Render the `Content-Range` value for the range actually served.
    pub fn content_range(served: &Range<u64>, total: u64) -> String {
        format!(
            "bytes {}-{}/{}",
            served.start,
            served.end.saturating_sub(1),
            total
        )
    }
}

/// The object storage collaborator. Implementations must be safe to share
/// between concurrent requests.
#[async_trait]
pub trait Storage: Send + Sync {
    /// List folders and files directly under `prefix` (`""` or ending with
    /// `/`). Folders come first.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<Entry>>;

    async fn get(&self, key: &str, range: Option<ByteRange>) -> StorageResult<ObjectOutput>;

    async fn put(&self, input: PutInput) -> StorageResult<()>;

    async fn delete(&self, key: &str) -> StorageResult<()>;
}
