use std::ops::ControlFlow;

use actix_web::http::header::{CONTENT_TYPE, RANGE, WWW_AUTHENTICATE};
use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse};
use log::error;
use percent_encoding::percent_decode_str;

use super::authn::{AuthnResponse, Identity};
use super::authz::{authorize_request, AuthzRequest, AuthzResponse};
use super::bucket::BucketContext;
use super::error::ProxyError;
use super::render::{Cascade, PageData, TemplateKind};
use super::resource::{find_resource, Resource};
use super::response::Response;
use super::storage::ByteRange;
use super::table::{Route, RouterTable};
use super::upload::{parse_upload, read_payload};

/// State shared by the stages of one request.
struct RequestContext<'a> {
    req: &'a HttpRequest,
    table: &'a RouterTable,
    path: &'a str,

    /// Set for target routes, absent for the target list.
    bucket: Option<&'a BucketContext>,
    resource: Option<&'a Resource>,
    identity: Option<Identity>,
}

impl RequestContext<'_> {
    /// Target scoped pages when a bucket is known, global ones otherwise.
    fn handle_error(&self, err: ProxyError) -> Response {
        if let Some(bucket) = self.bucket {
            return bucket.handle_error(err);
        }
        if let ProxyError::Internal(_) | ProxyError::UnsupportedConfiguration(_) = err {
            error!("Request '{}' failed: {err:#}", self.path);
        }
        let cascade = Cascade::new(vec![self.table.templates.as_ref()]);
        Response::error(&cascade, &err, PageData::with_path(self.path))
    }

    fn authenticate(&mut self) -> ControlFlow<Response> {
        let resp = match self.table.authn.authenticate(self.req, self.resource) {
            Ok(resp) => resp,
            Err(err) => return ControlFlow::Break(self.handle_error(err)),
        };
        match resp {
            None => ControlFlow::Continue(()),
            Some(AuthnResponse::Ok(identity)) => {
                self.identity = Some(identity);
                ControlFlow::Continue(())
            }
            Some(AuthnResponse::Unauthenticated(challenge)) => {
                let resp = self.handle_error(ProxyError::Unauthorized);
                match challenge {
                    Some(challenge) => {
                        ControlFlow::Break(resp.with_header(WWW_AUTHENTICATE, &challenge))
                    }
                    None => ControlFlow::Break(resp),
                }
            }
            Some(AuthnResponse::Redirect(location)) => {
                ControlFlow::Break(Response::redirect(&location))
            }
        }
    }

    fn authorize(&self) -> ControlFlow<Response> {
        let req = AuthzRequest {
            resource: self.resource,
            identity: self.identity.as_ref(),
        };
        match authorize_request(&req) {
            Ok(AuthzResponse::Ok) => ControlFlow::Continue(()),
            Ok(AuthzResponse::Forbidden) => {
                ControlFlow::Break(self.handle_error(ProxyError::Forbidden))
            }
            Err(err) => ControlFlow::Break(self.handle_error(ProxyError::Internal(err))),
        }
    }

    fn run_gates(&mut self) -> ControlFlow<Response> {
        self.authenticate()?;
        self.authorize()
    }
}

/// Serve one request against a routing table snapshot: host and path routing,
/// authentication, authorization, then the bucket operation.
pub async fn handle(
    req: HttpRequest,
    payload: web::Payload,
    table: &RouterTable,
    payload_limit: usize,
) -> HttpResponse {
    let Some(path) = normalize_path(req.path()) else {
        return not_found(&req, table, &decode_path(req.path()));
    };
    let host = req.connection_info().host().to_string();
    let method = req.method().clone();

    let Some(found) = table.route(&host, &path) else {
        return not_found(&req, table, &path);
    };

    match found.route {
        Route::Target(target) => {
            if !target.allows(&method) {
                return Response::method_not_allowed(&target.allowed_methods()).into();
            }
            let bucket = BucketContext::new(
                target.clone(),
                table.templates.clone(),
                found.mount,
                found.rest,
                &path,
            );
            let mut ctx = RequestContext {
                req: &req,
                table,
                path: &path,
                bucket: Some(&bucket),
                resource: find_resource(&target.resources, &path, &method),
                identity: None,
            };
            if let ControlFlow::Break(resp) = ctx.run_gates() {
                return resp.into();
            }
            dispatch(&req, payload, &bucket, payload_limit).await.into()
        }
        Route::TargetList(list) => {
            if method != Method::GET {
                return Response::method_not_allowed(&[Method::GET]).into();
            }
            let mut ctx = RequestContext {
                req: &req,
                table,
                path: &path,
                bucket: None,
                resource: find_resource(&list.resources, &path, &method),
                identity: None,
            };
            if !found.rest.is_empty() {
                return ctx.handle_error(ProxyError::NotFound).into();
            }
            if let ControlFlow::Break(resp) = ctx.run_gates() {
                return resp.into();
            }
            list_targets(&ctx).into()
        }
    }
}

fn not_found(req: &HttpRequest, table: &RouterTable, path: &str) -> HttpResponse {
    let ctx = RequestContext {
        req,
        table,
        path,
        bucket: None,
        resource: None,
        identity: None,
    };
    ctx.handle_error(ProxyError::NotFound).into()
}

async fn dispatch(
    req: &HttpRequest,
    payload: web::Payload,
    bucket: &BucketContext,
    payload_limit: usize,
) -> Response {
    match *req.method() {
        Method::GET => {
            let range = req
                .headers()
                .get(RANGE)
                .and_then(|value| value.to_str().ok())
                .and_then(ByteRange::parse);
            bucket.get(range).await
        }
        Method::PUT => {
            let content_type = req
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let body = match read_payload(payload, payload_limit).await {
                Ok(body) => body,
                Err(err) => return bucket.handle_internal_error(err),
            };
            match parse_upload(&content_type, body).await {
                Ok(upload) => bucket.put(upload).await,
                Err(err) => bucket.handle_internal_error(err),
            }
        }
        Method::DELETE => bucket.delete().await,
        _ => Response::method_not_allowed(&bucket.target().allowed_methods()),
    }
}

fn list_targets(ctx: &RequestContext) -> Response {
    let data = PageData {
        path: ctx.path.to_string(),
        targets: ctx.table.targets.iter().map(|target| target.view()).collect(),
        ..Default::default()
    };
    let cascade = Cascade::new(vec![ctx.table.templates.as_ref()]);
    match cascade.render_page(TemplateKind::TargetList, &data) {
        Ok(page) => Response::page(page),
        Err(err) => ctx.handle_error(ProxyError::Internal(err)),
    }
}

/// Percent-decode the request path. Paths that do not decode to UTF-8 are
/// used as received.
fn decode_path(path: &str) -> String {
    match percent_decode_str(path).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path.to_string(),
    }
}

/// Decode the request path and collapse repeated slashes, so that routing,
/// resource matching and the storage key all see the same path. Paths with
/// `.` or `..` segments return `None`.
fn normalize_path(path: &str) -> Option<String> {
    let decoded = decode_path(path);
    let mut normalized = String::with_capacity(decoded.len());
    for segment in decoded.split('/').filter(|segment| !segment.is_empty()) {
        if segment == "." || segment == ".." {
            return None;
        }
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() || decoded.ends_with('/') {
        normalized.push('/');
    }
    Some(normalized)
}
