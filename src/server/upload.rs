use std::io;

use actix_web::web;
use anyhow::{anyhow, bail, Context, Result};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use multer::{parse_boundary, Multipart};

use super::bucket::Upload;

/// Name of the form field carrying the file.
const FILE_FIELD: &str = "file";

/// Collect the request body, failing once it grows past `limit` bytes.
pub async fn read_payload(mut payload: web::Payload, limit: usize) -> Result<Bytes> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| anyhow!("read request body: {e}"))?;
        if body.len() + chunk.len() > limit {
            bail!("request body exceeds the limit of {limit} bytes");
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// Extract the `file` field of a `multipart/form-data` body. The part's own
/// `Content-Type` is kept for the stored object.
pub async fn parse_upload(content_type: &str, body: Bytes) -> Result<Upload> {
    let boundary = parse_boundary(content_type).context("parse multipart boundary")?;

    let stream = futures_util::stream::once(async { Ok::<_, io::Error>(body) });
    let mut multipart = Multipart::new(stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .context("read multipart field")?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => bail!("multipart field '{FILE_FIELD}' has no filename"),
        };
        let content_type = field.content_type().map(|mime| mime.to_string());
        let body = field.bytes().await.context("read multipart file")?;
        return Ok(Upload {
            filename,
            content_type,
            body,
        });
    }

    bail!("multipart field '{FILE_FIELD}' not found")
}
