use actix_web::http::header::{self, HeaderValue};
use actix_web::http::{Method, StatusCode};
use actix_web::{HttpResponse, HttpResponseBuilder};

use super::error::ProxyError;
use super::render::{Cascade, Page, PageData};
use super::storage::ObjectOutput;

const MIME_HTML: &str = "text/html; charset=utf-8";
const MIME_TEXT: &str = "text/plain; charset=utf-8";

/// A wrapper struct for HTTP responses that provides convenient methods
/// for creating the responses of the proxy
pub struct Response {
    http_response: HttpResponse,
}

impl Response {
    pub fn page(page: Page) -> Self {
        let content_type = if page.html { MIME_HTML } else { MIME_TEXT };
        let http_response = HttpResponseBuilder::new(page.status)
            .insert_header((header::CONTENT_TYPE, content_type))
            .body(page.body);
        Self { http_response }
    }

    /// Render the error page of `err` through `cascade`.
    pub fn error(cascade: &Cascade, err: &ProxyError, mut data: PageData) -> Self {
        data.error = err.message();
        let page = cascade.render_error(err.template_kind(), &data);
        Self::page(page)
    }

    pub fn redirect(location: &str) -> Self {
        let http_response = HttpResponse::Found()
            .insert_header((header::LOCATION, location))
            .finish();
        Self { http_response }
    }

    pub fn no_content() -> Self {
        Self {
            http_response: HttpResponse::NoContent().finish(),
        }
    }

    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let allow = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let http_response = HttpResponse::MethodNotAllowed()
            .insert_header((header::ALLOW, allow))
            .insert_header((header::CONTENT_TYPE, MIME_TEXT))
            .body("405 method not allowed");
        Self { http_response }
    }

    pub fn range_not_satisfiable(size: u64) -> Self {
        let http_response = HttpResponse::RangeNotSatisfiable()
            .insert_header((header::CONTENT_RANGE, format!("bytes */{size}")))
            .insert_header((header::CONTENT_TYPE, MIME_TEXT))
            .body("416 range not satisfiable");
        Self { http_response }
    }

    /// Stream an object, forwarding the content headers reported by the
    /// storage.
    pub fn object(output: ObjectOutput) -> Self {
        let status = if output.content_range.is_some() {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        };
        let mut builder = HttpResponseBuilder::new(status);
        builder.insert_header((header::ACCEPT_RANGES, "bytes"));

        for (name, value) in [
            (header::CONTENT_TYPE, output.content_type),
            (header::CONTENT_ENCODING, output.content_encoding),
            (header::CONTENT_LANGUAGE, output.content_language),
            (header::CONTENT_DISPOSITION, output.content_disposition),
            (header::CACHE_CONTROL, output.cache_control),
            (header::ETAG, output.etag),
            (header::CONTENT_RANGE, output.content_range),
        ] {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            // Values the storage returned but HTTP cannot carry are dropped.
            if let Ok(value) = HeaderValue::from_str(&value) {
                builder.insert_header((name, value));
            }
        }
        if let Some(last_modified) = output.last_modified {
            let value = last_modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
            builder.insert_header((header::LAST_MODIFIED, value));
        }

        builder.no_chunking(output.content_length);
        Self {
            http_response: builder.streaming(output.body),
        }
    }

    pub fn with_header(mut self, name: header::HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.http_response.headers_mut().insert(name, value);
        }
        self
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        val.http_response
    }
}
