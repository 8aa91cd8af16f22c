use std::sync::Arc;

use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::web::{self, Bytes, Data};
use actix_web::App;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bucketsite::config::{CommonConfig, PathSet};
use bucketsite::server::config::Config;
use bucketsite::server::factory::ServerFactory;
use bucketsite::server::restful::{serve, ServerState};
use bucketsite::server::table::RouterTable;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;

const BOUNDARY: &str = "X-BUCKETSITE-BOUNDARY";
const OIDC_SECRET: &str = "pipeline-test-secret";
const OIDC_ISSUER: &str = "https://sso.example.com";

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(Data::from($state.clone()))
                .default_service(web::to(serve)),
        )
        .await
    };
}

fn load_config(s: &str) -> Config {
    let mut cfg: Config = toml::from_str(s).unwrap();
    cfg.complete(&PathSet::new("config.toml")).unwrap();
    cfg
}

fn build_table(s: &str) -> RouterTable {
    let cfg = load_config(s);
    ServerFactory::new(&cfg).build_table().unwrap()
}

fn build_state(s: &str) -> Arc<ServerState> {
    Arc::new(ServerState::new(build_table(s), 1024 * 1024))
}

fn get(host: &str, uri: &str) -> TestRequest {
    TestRequest::get()
        .uri(uri)
        .insert_header((header::HOST, host))
}

fn put_file(host: &str, uri: &str, filename: &str, content_type: &str, data: &str) -> TestRequest {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: {content_type}\r\n\
         \r\n\
         {data}\r\n\
         --{BOUNDARY}--\r\n"
    );
    TestRequest::put()
        .uri(uri)
        .insert_header((header::HOST, host))
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(Bytes::from(body))
}

fn oidc_token(groups: &[&str]) -> String {
    let claims = json!({
        "iss": OIDC_ISSUER,
        "exp": Utc::now().timestamp() + 3600,
        "email": "bob@example.com",
        "groups": groups,
    });
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(OIDC_SECRET.as_bytes()),
    )
    .unwrap()
}

fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

#[actix_web::test]
async fn test_whitelisted_get() {
    let state = build_state(
        r#"
        [[targets]]
        name = "site"
        bucket = { provider = "memory" }
        actions = { put = true }

        [[targets.resources]]
        path = "/*"
        whitelist = true
        "#,
    );
    let app = init_app!(state);

    let req = put_file("a.com", "/", "index.html", "text/html", "<h1>hello</h1>").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = test::call_service(&app, get("a.com", "/index.html").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE),
        Some(&HeaderValue::from_static("text/html"))
    );
    let body = test::read_body(resp).await;
    assert_eq!(body, "<h1>hello</h1>");
}

#[actix_web::test]
async fn test_multipart_put() {
    let state = build_state(
        r#"
        [[targets]]
        name = "files"
        bucket = { provider = "memory", prefix = "data" }
        mount = { paths = ["/files"] }
        actions = { put = true }
        "#,
    );
    let app = init_app!(state);

    let req = put_file("a.com", "/files/docs/", "a.txt", "text/plain", "hello").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = test::call_service(&app, get("a.com", "/files/docs/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert_eq!(body.matches(">a.txt</a>").count(), 1);

    let resp = test::call_service(&app, get("a.com", "/files/docs/a.txt").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::read_body(resp).await, "hello");

    // Not a multipart body.
    let req = TestRequest::put()
        .uri("/files/docs/")
        .insert_header((header::CONTENT_TYPE, "application/octet-stream"))
        .set_payload("hello")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn test_disabled_verb() {
    let state = build_state(
        r#"
        [[targets]]
        name = "site"
        bucket = { provider = "memory" }
        actions = { put = true }
        "#,
    );
    let app = init_app!(state);

    let req = put_file("a.com", "/", "a.txt", "text/plain", "keep").to_request();
    test::call_service(&app, req).await;

    let req = TestRequest::delete()
        .uri("/a.txt")
        .insert_header((header::HOST, "a.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        resp.headers().get(header::ALLOW),
        Some(&HeaderValue::from_static("GET, PUT"))
    );

    let resp = test::call_service(&app, get("a.com", "/a.txt").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::read_body(resp).await, "keep");

    let req = TestRequest::post()
        .uri("/a.txt")
        .insert_header((header::HOST, "a.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[actix_web::test]
async fn test_target_not_found_template() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("404.html");
    std::fs::write(&template, "target 404 of {{ name }}").unwrap();

    let state = build_state(&format!(
        r#"
        [[targets]]
        name = "site"
        bucket = {{ provider = "memory" }}
        mount = {{ host = "a.com" }}
        templates = {{ not_found = "{}" }}
        "#,
        template.display()
    ));
    let app = init_app!(state);

    let resp = test::call_service(&app, get("a.com", "/missing.txt").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(test::read_body(resp).await, "target 404 of site");

    // No route: the global page is used.
    let resp = test::call_service(&app, get("b.com", "/missing.txt").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(!body.contains("target 404"));
}

#[actix_web::test]
async fn test_host_routing() {
    let state = build_state(
        r#"
        [[targets]]
        name = "exact"
        bucket = { provider = "memory" }
        mount = { host = "a.example.com" }
        actions = { put = true }

        [[targets]]
        name = "suffix"
        bucket = { provider = "memory" }
        mount = { host = "*.example.com" }
        actions = { put = true }

        [[targets]]
        name = "any"
        bucket = { provider = "memory" }
        actions = { put = true }
        "#,
    );
    let app = init_app!(state);

    for (host, data) in [
        ("A.Example.com:8080", "exact"),
        ("x.example.com", "suffix"),
        ("other.com", "any"),
    ] {
        let req = put_file(host, "/", "who.txt", "text/plain", data).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    for (host, expect) in [
        ("a.example.com", "exact"),
        ("y.example.com", "suffix"),
        ("example.com", "any"),
        ("localhost:8080", "any"),
    ] {
        let resp = test::call_service(&app, get(host, "/who.txt").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{host}");
        assert_eq!(test::read_body(resp).await, expect, "{host}");
    }
}

#[actix_web::test]
async fn test_reload_swap() {
    let state = build_state(
        r#"
        [[targets]]
        name = "old"
        bucket = { provider = "memory" }
        mount = { paths = ["/old"] }
        "#,
    );
    let app = init_app!(state);

    let resp = test::call_service(&app, get("a.com", "/old/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let before = state.snapshot();
    state.publish(build_table(
        r#"
        [[targets]]
        name = "new"
        bucket = { provider = "memory" }
        mount = { paths = ["/new"] }
        "#,
    ));

    // A request holding the previous snapshot keeps it.
    assert!(before.target("old").is_some());
    assert!(before.target("new").is_none());

    let resp = test::call_service(&app, get("a.com", "/old/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = test::call_service(&app, get("a.com", "/new/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_basic_auth() {
    let state = build_state(
        r#"
        [auth_providers.basic.local]
        realm = "files"

        [[targets]]
        name = "site"
        bucket = { provider = "memory" }

        [[targets.resources]]
        path = "/private/*"
        provider = "local"
        basic = { credentials = [{ user = "alice", password = "secret" }] }
        "#,
    );
    let app = init_app!(state);

    let resp = test::call_service(&app, get("a.com", "/private/a.txt").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get(header::WWW_AUTHENTICATE),
        Some(&HeaderValue::from_static("Basic realm=\"files\""))
    );

    let req = get("a.com", "/private/a.txt")
        .insert_header((header::AUTHORIZATION, basic_auth("alice", "wrong")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Authorized, the object just does not exist.
    let req = get("a.com", "/private/a.txt")
        .insert_header((header::AUTHORIZATION, basic_auth("alice", "secret")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Outside of the resource, no credentials needed.
    let resp = test::call_service(&app, get("a.com", "/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

fn oidc_config(login_url: Option<&str>) -> String {
    let login_url = login_url
        .map(|url| format!("login_url = \"{url}\""))
        .unwrap_or_default();
    format!(
        r#"
        [auth_providers.oidc.sso]
        issuer_url = "{OIDC_ISSUER}"
        algorithm = "HS256"
        secret = "{OIDC_SECRET}"
        {login_url}

        [[targets]]
        name = "site"
        bucket = {{ provider = "memory" }}

        [[targets.resources]]
        path = "/admin/*"
        provider = "sso"
        oidc = {{ authorization_accesses = [{{ group = "admins" }}] }}
        "#
    )
}

#[actix_web::test]
async fn test_oidc_forbidden() {
    let state = build_state(&oidc_config(None));
    let app = init_app!(state);

    let req = get("a.com", "/admin/a.txt")
        .insert_header((
            header::AUTHORIZATION,
            format!("Bearer {}", oidc_token(&["users"])),
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = get("a.com", "/admin/a.txt")
        .insert_header((
            header::AUTHORIZATION,
            format!("Bearer {}", oidc_token(&["users", "admins"])),
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(&app, get("a.com", "/admin/a.txt").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get(header::WWW_AUTHENTICATE),
        Some(&HeaderValue::from_static("Bearer"))
    );
}

#[actix_web::test]
async fn test_oidc_redirect() {
    let state = build_state(&oidc_config(Some("https://sso.example.com/login")));
    let app = init_app!(state);

    let resp = test::call_service(&app, get("a.com", "/admin/a.txt").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(header::LOCATION),
        Some(&HeaderValue::from_static("https://sso.example.com/login"))
    );

    let req = get("a.com", "/admin/a.txt")
        .cookie(actix_web::cookie::Cookie::new(
            "oidc",
            oidc_token(&["admins"]),
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_target_list() {
    let state = build_state(
        r#"
        [list_targets]
        enabled = true
        mount = { host = "index.com" }

        [[targets]]
        name = "site"
        bucket = { provider = "memory", name = "site-bucket" }
        mount = { host = "a.com" }

        [[targets]]
        name = "files"
        bucket = { provider = "memory" }
        mount = { paths = ["/files"] }
        "#,
    );
    let app = init_app!(state);

    let resp = test::call_service(&app, get("index.com", "/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains("site (site-bucket)"));
    assert!(body.contains("files (memory)"));

    let resp = test::call_service(&app, get("index.com", "/other").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = TestRequest::delete()
        .uri("/")
        .insert_header((header::HOST, "index.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[actix_web::test]
async fn test_empty_access_entry() {
    let state = build_state(&format!(
        r#"
        [auth_providers.oidc.sso]
        issuer_url = "{OIDC_ISSUER}"
        algorithm = "HS256"
        secret = "{OIDC_SECRET}"

        [[targets]]
        name = "site"
        bucket = {{ provider = "memory" }}

        [[targets.resources]]
        path = "/members/*"
        provider = "sso"
        oidc = {{ authorization_accesses = [{{}}] }}
        "#
    ));
    let app = init_app!(state);

    // Any authenticated user, whatever the groups.
    for groups in [&[][..], &["users"][..]] {
        let req = get("a.com", "/members/a.txt")
            .insert_header((
                header::AUTHORIZATION,
                format!("Bearer {}", oidc_token(groups)),
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{groups:?}");
    }

    let resp = test::call_service(&app, get("a.com", "/members/a.txt").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_path_normalization() {
    let state = build_state(
        r#"
        [auth_providers.basic.local]

        [[targets]]
        name = "files"
        bucket = { provider = "memory" }
        mount = { paths = ["/files"] }
        actions = { put = true }

        [[targets.resources]]
        path = "/files/private/*"
        provider = "local"
        basic = { credentials = [{ user = "alice", password = "secret" }] }
        "#,
    );
    let app = init_app!(state);

    let req = put_file("a.com", "/files/private/", "a.txt", "text/plain", "TOPSECRET")
        .insert_header((header::AUTHORIZATION, basic_auth("alice", "secret")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    for uri in [
        "/files/private/a.txt",
        "/files//private/a.txt",
        "/files/private//a.txt",
        "/files/private%2Fa.txt",
        "/files/%2Fprivate/a.txt",
    ] {
        let resp = test::call_service(&app, get("a.com", uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");

        let req = get("a.com", uri)
            .insert_header((header::AUTHORIZATION, basic_auth("alice", "secret")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        assert_eq!(test::read_body(resp).await, "TOPSECRET", "{uri}");
    }

    for uri in [
        "/files/public/../private/a.txt",
        "/files/%2E%2E/private/a.txt",
        "/files/./private/a.txt",
    ] {
        let req = get("a.com", uri)
            .insert_header((header::AUTHORIZATION, basic_auth("alice", "secret")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[actix_web::test]
async fn test_range() {
    let state = build_state(
        r#"
        [[targets]]
        name = "site"
        bucket = { provider = "memory" }
        actions = { put = true }
        "#,
    );
    let app = init_app!(state);

    let req = put_file("a.com", "/", "a.txt", "text/plain", "hello world").to_request();
    test::call_service(&app, req).await;

    let req = get("a.com", "/a.txt")
        .insert_header((header::RANGE, "bytes=6-"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        resp.headers().get(header::CONTENT_RANGE),
        Some(&HeaderValue::from_static("bytes 6-10/11"))
    );
    assert_eq!(test::read_body(resp).await, "world");

    // The end is clamped to the object.
    let req = get("a.com", "/a.txt")
        .insert_header((header::RANGE, "bytes=0-18446744073709551615"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        resp.headers().get(header::CONTENT_RANGE),
        Some(&HeaderValue::from_static("bytes 0-10/11"))
    );
    assert_eq!(test::read_body(resp).await, "hello world");

    let req = get("a.com", "/a.txt")
        .insert_header((header::RANGE, "bytes=100-"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        resp.headers().get(header::CONTENT_RANGE),
        Some(&HeaderValue::from_static("bytes */11"))
    );
}
