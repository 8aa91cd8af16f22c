use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error};

use crate::humanize::human_bytes;

use super::error::ProxyError;
use super::render::{Cascade, EntryView, PageData, TemplateKind, Templates};
use super::response::Response;
use super::storage::{ByteRange, Entry, PutInput, StorageError};
use super::target::Target;

/// A file extracted from a PUT multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Per-request view of a target: the storage operations and the error pages
/// of one request, rendered with the target templates first and the global
/// ones next.
pub struct BucketContext {
    target: Arc<Target>,
    templates: Arc<Templates>,

    /// Mount path of the request, empty for the root mount.
    mount: String,
    /// Path inside the mount, without leading slash.
    request_path: String,
    /// Full request path, shown on the pages.
    request_uri: String,
}

impl BucketContext {
    pub fn new(
        target: Arc<Target>,
        templates: Arc<Templates>,
        mount: &str,
        request_path: &str,
        request_uri: &str,
    ) -> Self {
        Self {
            target,
            templates,
            mount: mount.to_string(),
            request_path: request_path.to_string(),
            request_uri: request_uri.to_string(),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    fn key(&self) -> String {
        format!("{}{}", self.target.prefix, self.request_path)
    }

    fn is_folder(&self) -> bool {
        self.request_path.is_empty() || self.request_path.ends_with('/')
    }

    fn cascade(&self) -> Cascade<'_> {
        Cascade::new(vec![&self.target.templates, self.templates.as_ref()])
    }

    fn page_data(&self) -> PageData {
        PageData {
            path: self.request_uri.clone(),
            name: Some(self.target.name.clone()),
            bucket_name: Some(self.target.bucket_name.clone()),
            ..Default::default()
        }
    }

    /// Fetch the object, or list the folder when the path is empty or ends
    /// with a slash.
    pub async fn get(&self, range: Option<ByteRange>) -> Response {
        if self.is_folder() {
            return self.list().await;
        }

        let key = self.key();
        debug!("Get object '{key}' from target '{}'", self.target.name);
        match self.target.storage.get(&key, range).await {
            Ok(output) => Response::object(output),
            Err(StorageError::RangeNotSatisfiable(size)) => {
                debug!("Range {range:?} not satisfiable for '{key}' of {size} bytes");
                Response::range_not_satisfiable(size)
            }
            Err(err) => self.handle_error(err.into()),
        }
    }

    async fn list(&self) -> Response {
        let prefix = self.key();
        debug!("List folder '{prefix}' from target '{}'", self.target.name);
        let entries = match self.target.storage.list(&prefix).await {
            Ok(entries) => entries,
            Err(err) => return self.handle_error(err.into()),
        };
        // Folders only exist through their objects, an empty sub folder is a
        // missing one.
        if entries.is_empty() && !self.request_path.is_empty() {
            return self.handle_not_found();
        }

        let mut data = self.page_data();
        data.entries = entries.iter().map(|entry| self.entry_view(entry)).collect();
        match self.cascade().render_page(TemplateKind::FolderList, &data) {
            Ok(page) => Response::page(page),
            Err(err) => self.handle_error(ProxyError::Internal(err)),
        }
    }

    fn entry_view(&self, entry: &Entry) -> EntryView {
        EntryView {
            name: entry.name.clone(),
            key: entry.key.clone(),
            path: format!("{}/{}{}", self.mount, self.request_path, entry.name),
            is_dir: entry.is_dir,
            size: entry.size,
            human_size: entry.size.map(human_bytes),
            last_modified: entry
                .last_modified
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            etag: entry.etag.clone(),
        }
    }

    /// Store the uploaded file under the request folder.
    pub async fn put(&self, upload: Upload) -> Response {
        let filename = upload
            .filename
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or_default();
        if filename.is_empty() || filename == "." || filename == ".." {
            let err = anyhow::anyhow!("invalid upload filename '{}'", upload.filename);
            return self.handle_error(ProxyError::Internal(err));
        }

        let folder = self.request_path.trim_matches('/');
        let key = if folder.is_empty() {
            format!("{}{filename}", self.target.prefix)
        } else {
            format!("{}{folder}/{filename}", self.target.prefix)
        };
        debug!("Put object '{key}' to target '{}'", self.target.name);

        let input = PutInput {
            key,
            size: upload.body.len() as u64,
            body: upload.body,
            content_type: upload.content_type,
        };
        match self.target.storage.put(input).await {
            Ok(()) => Response::no_content(),
            Err(err) => self.handle_error(err.into()),
        }
    }

    pub async fn delete(&self) -> Response {
        let key = self.key();
        debug!("Delete object '{key}' from target '{}'", self.target.name);
        match self.target.storage.delete(&key).await {
            Ok(()) => Response::no_content(),
            Err(err) => self.handle_error(err.into()),
        }
    }

    pub fn handle_not_found(&self) -> Response {
        self.handle_error(ProxyError::NotFound)
    }

    pub fn handle_internal_error(&self, err: anyhow::Error) -> Response {
        self.handle_error(ProxyError::Internal(err))
    }

    pub fn handle_error(&self, err: ProxyError) -> Response {
        if let ProxyError::Internal(_) | ProxyError::UnsupportedConfiguration(_) = err {
            error!(
                "Request '{}' on target '{}' failed: {err:#}",
                self.request_uri, self.target.name
            );
        }
        Response::error(&self.cascade(), &err, self.page_data())
    }
}
