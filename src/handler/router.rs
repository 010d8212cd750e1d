//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: size checks, the task API,
//! uploads, the health probe and the frontend fallback.

use crate::api;
use crate::config::AppState;
use crate::handler::static_files;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::upload;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Liveness probe path
pub const HEALTH_PATH: &str = "/healthz";

/// Request details needed by the static file handlers
pub struct RequestContext {
    pub path: String,
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let entry = state
        .access_log_enabled()
        .then(|| access_entry(&req, remote_addr));
    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let mut response = route_request(req, &state).await;
    http::apply_common_headers(
        &mut response,
        &state.config.http.server_name,
        state.config.http.enable_cors,
    );

    if let Some(mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on method and path
async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let raw_path = req.uri().path();
    let path = percent_decode_str(raw_path)
        .decode_utf8()
        .map_or_else(|_| raw_path.to_string(), |p| p.into_owned());

    if method == Method::OPTIONS {
        return http::build_options_response(state.config.http.enable_cors);
    }

    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return resp;
    }

    if path == HEALTH_PATH {
        return http::build_health_response("ok");
    }

    if path == "/api" || path.starts_with(api::API_PREFIX) {
        return api::handle_api(req, state).await;
    }

    if method != Method::GET && method != Method::HEAD {
        logger::log_warning(&format!("Method not allowed: {method} {path}"));
        return http::build_405_response("GET, HEAD, OPTIONS");
    }

    let ctx = RequestContext {
        is_head: method == Method::HEAD,
        if_none_match: req
            .headers()
            .get("if-none-match")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
        path,
    };

    let storage = &state.config.storage;
    match ctx
        .path
        .strip_prefix(upload::PUBLIC_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        Some(name) => static_files::serve_directory(&ctx, &storage.upload_dir, name).await,
        None => static_files::serve_directory(&ctx, &storage.public_dir, &ctx.path).await,
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: Option<u64>) -> Option<Response<Full<Bytes>>> {
    let max_body_size = max_body_size?;
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

fn access_entry<B>(req: &Request<B>, remote_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        remote_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.referer = header("referer");
    entry.user_agent = header("user-agent");
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{multipart_body, FILE_FIELD};
    use crate::config::{test_config, Config};
    use crate::store::Task;
    use http_body_util::BodyExt;
    use hyper::header::HeaderMap;
    use hyper::StatusCode;

    const BOUNDARY: &str = "XyZtaskboardBoundary";

    struct TestServer {
        _dir: tempfile::TempDir,
        config: Config,
        state: Arc<AppState>,
    }

    impl TestServer {
        async fn start() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = test_config(dir.path());
            std::fs::create_dir_all(&config.storage.public_dir).unwrap();
            std::fs::write(
                std::path::Path::new(&config.storage.public_dir).join("index.html"),
                "<!DOCTYPE html><title>Tugas</title>",
            )
            .unwrap();
            let state = Arc::new(AppState::open(&config).await.unwrap());
            Self {
                _dir: dir,
                config,
                state,
            }
        }

        async fn restart(&mut self) {
            self.state = Arc::new(AppState::open(&self.config).await.unwrap());
        }

        async fn send(&self, req: Request<Full<Bytes>>) -> (StatusCode, HeaderMap, Bytes) {
            let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
            let resp = handle_request(req, Arc::clone(&self.state), peer).await.unwrap();
            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp.into_body().collect().await.unwrap().to_bytes();
            (status, headers, body)
        }

        async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
            let req = Request::builder()
                .uri(uri)
                .body(Full::new(Bytes::new()))
                .unwrap();
            self.send(req).await
        }

        async fn list(&self) -> Vec<Task> {
            let (status, _, body) = self.get("/api/tasks").await;
            assert_eq!(status, StatusCode::OK);
            serde_json::from_slice(&body).unwrap()
        }

        async fn post_form(&self, body: &str) -> (StatusCode, Bytes) {
            let req = Request::builder()
                .method("POST")
                .uri("/api/tasks")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Full::new(Bytes::from(body.to_string())))
                .unwrap();
            let (status, _, body) = self.send(req).await;
            (status, body)
        }

        async fn post_multipart(
            &self,
            fields: &[(&str, &str)],
            file: Option<(&str, &str, &[u8])>,
        ) -> (StatusCode, Bytes) {
            let req = Request::builder()
                .method("POST")
                .uri("/api/tasks")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Full::new(Bytes::from(multipart_body(BOUNDARY, fields, file))))
                .unwrap();
            let (status, _, body) = self.send(req).await;
            (status, body)
        }

        fn upload_count(&self) -> usize {
            std::fs::read_dir(&self.config.storage.upload_dir).unwrap().count()
        }
    }

    const FIELDS: &[(&str, &str)] = &[
        ("title", "Aplikasi Kasir"),
        ("tech", "Rust"),
        ("year", "2024"),
        ("tags", " web, pos "),
        ("demo_url", "https://kasir.example"),
    ];

    #[tokio::test]
    async fn test_empty_list() {
        let server = TestServer::start().await;
        let (status, headers, body) = server.get("/api/tasks").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"[]");
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert!(headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/json"));
    }

    #[tokio::test]
    async fn test_create_then_list_round_trip() {
        let server = TestServer::start().await;
        let before = chrono::Utc::now() - chrono::Duration::milliseconds(1);

        let (status, body) = server
            .post_form("title=Aplikasi+Kasir&tech=Rust&year=2024&tags=+web+&demo_url=")
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: Task = serde_json::from_slice(&body).unwrap();

        assert!(created.id > 0);
        assert_eq!(created.title, "Aplikasi Kasir");
        assert_eq!(created.tags, "web");
        assert_eq!(created.demo_url, "");
        assert_eq!(created.file_path, "");
        assert!(created.created_at_time().unwrap() >= before);

        assert_eq!(server.list().await, vec![created]);
    }

    #[tokio::test]
    async fn test_missing_required_field_is_rejected() {
        let server = TestServer::start().await;

        for missing in ["title", "tech", "year"] {
            let fields: Vec<_> = FIELDS.iter().copied().filter(|(n, _)| *n != missing).collect();
            let (status, body) = server
                .post_multipart(&fields, Some((FILE_FIELD, "tugas.txt", b"isi")))
                .await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["error"], "Judul, teknologi, dan tahun wajib.");
        }

        assert!(server.list().await.is_empty());
        assert_eq!(server.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_uploaded_file_is_served_verbatim() {
        let server = TestServer::start().await;
        let content: &[u8] = b"PK\x03\x04 zipped project \x00\xff";

        let (status, body) = server
            .post_multipart(FIELDS, Some((FILE_FIELD, "Proyek Akhir.zip", content)))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: Task = serde_json::from_slice(&body).unwrap();
        assert!(created.file_path.starts_with("/uploads/proyek_akhir_"));
        assert!(created.file_path.ends_with(".zip"));
        assert_eq!(created.tags, "web, pos");

        let (status, headers, served) = server.get(&created.file_path).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&served[..], content);
        assert_eq!(headers["content-type"], "application/zip");
    }

    #[tokio::test]
    async fn test_reserved_characters_in_filename_stay_fetchable() {
        let server = TestServer::start().await;

        let (status, body) = server
            .post_multipart(FIELDS, Some((FILE_FIELD, "nilai%41 #1?.txt", b"nilai")))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: Task = serde_json::from_slice(&body).unwrap();
        assert!(created.file_path.starts_with("/uploads/nilai%2541_%231%3F_"));

        let (status, _, served) = server.get(&created.file_path).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&served[..], b"nilai");
    }

    #[tokio::test]
    async fn test_same_filename_twice_gives_two_files() {
        let server = TestServer::start().await;

        let (_, first) = server
            .post_multipart(FIELDS, Some((FILE_FIELD, "laporan.pdf", b"first")))
            .await;
        let (_, second) = server
            .post_multipart(FIELDS, Some((FILE_FIELD, "laporan.pdf", b"second")))
            .await;
        let first: Task = serde_json::from_slice(&first).unwrap();
        let second: Task = serde_json::from_slice(&second).unwrap();

        assert_ne!(first.file_path, second.file_path);
        assert_eq!(&server.get(&first.file_path).await.2[..], b"first");
        assert_eq!(&server.get(&second.file_path).await.2[..], b"second");
    }

    #[tokio::test]
    async fn test_list_is_sorted_newest_first() {
        let server = TestServer::start().await;
        for i in 0..5 {
            let (status, _) = server
                .post_form(&format!("title=t{i}&tech=Rust&year=202{i}"))
                .await;
            assert_eq!(status, StatusCode::CREATED);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let tasks = server.list().await;
        assert_eq!(tasks.len(), 5);
        assert!(tasks
            .windows(2)
            .all(|w| w[0].created_at_time() >= w[1].created_at_time()));
        assert_eq!(tasks[0].title, "t4");
    }

    #[tokio::test]
    async fn test_restart_reproduces_list() {
        let mut server = TestServer::start().await;
        server.post_form("title=a&tech=Go&year=2021").await;
        server
            .post_multipart(FIELDS, Some((FILE_FIELD, "a.txt", b"a")))
            .await;
        let before = server.list().await;

        server.restart().await;
        assert_eq!(server.list().await, before);
    }

    #[tokio::test]
    async fn test_storage_failure_returns_500_and_discards_upload() {
        let server = TestServer::start().await;
        let data_file = &server.config.storage.data_file;
        std::fs::remove_file(data_file).unwrap();
        std::fs::create_dir(data_file).unwrap();

        let (status, body) = server
            .post_multipart(FIELDS, Some((FILE_FIELD, "a.txt", b"a")))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Gagal menyimpan tugas.");
        assert_eq!(server.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_frontend_fallback() {
        let server = TestServer::start().await;

        let (status, headers, body) = server.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with(b"<!DOCTYPE html>"));
        assert_eq!(headers["server"], "taskboard");

        let (status, _, _) = server.get("/missing.css").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = server.get("/uploads/../data/tasks.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_method_and_path_errors() {
        let server = TestServer::start().await;

        let req = Request::builder()
            .method("DELETE")
            .uri("/api/tasks")
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert_eq!(server.send(req).await.0, StatusCode::METHOD_NOT_ALLOWED);

        let req = Request::builder()
            .method("POST")
            .uri("/index.html")
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert_eq!(server.send(req).await.0, StatusCode::METHOD_NOT_ALLOWED);

        assert_eq!(server.get("/api/projects").await.0, StatusCode::NOT_FOUND);

        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/tasks")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let (status, headers, _) = server.send(req).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(headers["access-control-allow-origin"], "*");

        assert_eq!(server.get(HEALTH_PATH).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_body_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.http.max_body_size = Some(8);
        let state = Arc::new(AppState::open(&config).await.unwrap());

        let body = "title=long+enough&tech=Rust&year=2024";
        let req = Request::builder()
            .method("POST")
            .uri("/api/tasks")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("content-length", body.len())
            .body(Full::new(Bytes::from(body)))
            .unwrap();
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let resp = handle_request(req, Arc::clone(&state), peer).await.unwrap();

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(state.store.is_empty().await);

        // Same body streamed without a Content-Length header
        let req = Request::builder()
            .method("POST")
            .uri("/api/tasks")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from(body)))
            .unwrap();
        let resp = handle_request(req, Arc::clone(&state), peer).await.unwrap();

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Ukuran data terlalu besar.");
        assert!(state.store.is_empty().await);
    }
}
