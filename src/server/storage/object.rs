use std::fs;
use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use log::debug;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    Attribute, Attributes, GetOptions, GetRange, ObjectStore, PutOptions, PutPayload,
};

use super::config::{BucketConfig, StorageProvider};
use super::{
    ByteRange, Entry, ObjectOutput, PutInput, Storage, StorageError, StorageResult,
};

/// [`Storage`] backed by the `object_store` crate.
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,

    /// Whether the backend keeps object attributes (content type...). The
    /// local filesystem provider rejects puts that carry attributes.
    attributes: bool,
}

impl ObjectStoreClient {
    pub fn new(store: Arc<dyn ObjectStore>, attributes: bool) -> Self {
        Self { store, attributes }
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(InMemory::new()), true)
    }

    pub fn from_config(cfg: &BucketConfig) -> Result<Self> {
        let client = match cfg.provider {
            StorageProvider::S3 => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&cfg.name)
                    .with_region(&cfg.region);
                if let Some(endpoint) = cfg.endpoint.as_ref() {
                    builder = builder.with_endpoint(endpoint).with_allow_http(true);
                }
                if let Some(creds) = cfg.credentials.as_ref() {
                    builder = builder
                        .with_access_key_id(&creds.access_key)
                        .with_secret_access_key(&creds.secret_key);
                }
                let store = builder
                    .build()
                    .with_context(|| format!("build s3 client for bucket '{}'", cfg.name))?;
                Self::new(Arc::new(store), true)
            }
            StorageProvider::Local => {
                fs::create_dir_all(&cfg.root)
                    .with_context(|| format!("ensure bucket root: {}", cfg.root))?;
                let store = LocalFileSystem::new_with_prefix(&cfg.root)
                    .with_context(|| format!("open local bucket: {}", cfg.root))?;
                Self::new(Arc::new(store), false)
            }
            StorageProvider::Memory => Self::memory(),
        };
        Ok(client)
    }

    fn location(key: &str) -> Path {
        Path::from(key)
    }

    fn attribute(attrs: &Attributes, key: &Attribute) -> Option<String> {
        attrs.get(key).map(|value| {
            let value: &str = value.as_ref();
            value.to_string()
        })
    }
}

fn map_error(err: object_store::Error) -> StorageError {
    match err {
        object_store::Error::NotFound { .. } => StorageError::NotFound,
        err => StorageError::Other(err.into()),
    }
}

#[async_trait]
impl Storage for ObjectStoreClient {
    async fn list(&self, prefix: &str) -> StorageResult<Vec<Entry>> {
        let trimmed = prefix.trim_end_matches('/');
        let location = if trimmed.is_empty() {
            None
        } else {
            Some(Self::location(trimmed))
        };
        debug!("List bucket prefix '{prefix}'");

        let result = self
            .store
            .list_with_delimiter(location.as_ref())
            .await
            .map_err(map_error)?;

        let mut entries = Vec::with_capacity(result.common_prefixes.len() + result.objects.len());
        for folder in result.common_prefixes {
            let key = format!("{}/", folder.as_ref());
            let name = key.strip_prefix(prefix).unwrap_or(&key).to_string();
            entries.push(Entry {
                name,
                key,
                is_dir: true,
                size: None,
                last_modified: None,
                etag: None,
            });
        }
        for object in result.objects {
            let key = object.location.as_ref().to_string();
            let name = key.strip_prefix(prefix).unwrap_or(&key).to_string();
            if name.is_empty() {
                continue;
            }
            entries.push(Entry {
                name,
                key,
                is_dir: false,
                size: Some(object.size as u64),
                last_modified: Some(object.last_modified),
                etag: object.e_tag,
            });
        }

        Ok(entries)
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> StorageResult<ObjectOutput> {
        let location = Self::location(key);
        let mut options = GetOptions::default();
        if let Some(range) = range {
            // Resolved against the current size, backends disagree on ranges
            // reaching past the end.
            let meta = self.store.head(&location).await.map_err(map_error)?;
            let size = meta.size as u64;
            let Some(served) = range.resolve(size) else {
                return Err(StorageError::RangeNotSatisfiable(size));
            };
            options.range = Some(GetRange::Bounded(
                served.start as usize..served.end as usize,
            ));
        }
        let result = self
            .store
            .get_opts(&location, options)
            .await
            .map_err(map_error)?;

        let total_size = result.meta.size as u64;
        let served = result.range.start as u64..result.range.end as u64;
        let content_range = range.map(|_| ByteRange::content_range(&served, total_size));
        let attrs = result.attributes.clone();
        let etag = result.meta.e_tag.clone();
        let last_modified = result.meta.last_modified;

        let body = result.into_stream().map_err(io::Error::other).boxed();

        Ok(ObjectOutput {
            body,
            content_length: served.end - served.start,
            content_type: Self::attribute(&attrs, &Attribute::ContentType),
            content_encoding: Self::attribute(&attrs, &Attribute::ContentEncoding),
            content_language: Self::attribute(&attrs, &Attribute::ContentLanguage),
            content_disposition: Self::attribute(&attrs, &Attribute::ContentDisposition),
            cache_control: Self::attribute(&attrs, &Attribute::CacheControl),
            etag,
            last_modified: Some(last_modified),
            content_range,
        })
    }

    async fn put(&self, input: PutInput) -> StorageResult<()> {
        let location = Self::location(&input.key);
        let mut attributes = Attributes::new();
        if self.attributes {
            if let Some(content_type) = input.content_type.filter(|ct| !ct.is_empty()) {
                attributes.insert(Attribute::ContentType, content_type.into());
            }
        }
        debug!("Put object '{}' ({} bytes)", input.key, input.size);

        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        self.store
            .put_opts(&location, PutPayload::from(input.body), options)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let location = Self::location(key);
        match self.store.delete(&location).await {
            Ok(()) => Ok(()),
            // Deleting a missing key succeeds, as it does on S3.
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(map_error(err)),
        }
    }
}
