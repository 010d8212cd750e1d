//! Static file serving module
//!
//! Serves the frontend bundle and the upload directory, with `ETag`
//! revalidation and path traversal protection.

use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::Path;
use tokio::fs;

/// Files tried when a directory is requested
const INDEX_FILES: &[&str] = &["index.html", "index.htm"];

/// Serve `relative_path` from `dir`
pub async fn serve_directory(
    ctx: &RequestContext,
    dir: &str,
    relative_path: &str,
) -> Response<Full<Bytes>> {
    match load_from_directory(dir, relative_path).await {
        Some((content, content_type)) => build_static_file_response(
            content,
            content_type,
            ctx.if_none_match.as_deref(),
            ctx.is_head,
        ),
        None => http::build_404_response(),
    }
}

/// Load a file below `static_dir`, falling back to index files for directories
pub async fn load_from_directory(
    static_dir: &str,
    relative_path: &str,
) -> Option<(Vec<u8>, &'static str)> {
    let relative_path = relative_path.trim_start_matches('/');
    let mut file_path = Path::new(static_dir).join(relative_path);

    let static_dir_canonical = match Path::new(static_dir).canonicalize() {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{static_dir}': {e}"
            ));
            return None;
        }
    };

    if relative_path.is_empty() || relative_path.ends_with('/') || file_path.is_dir() {
        let index = INDEX_FILES
            .iter()
            .map(|name| file_path.join(name))
            .find(|candidate| candidate.is_file())?;
        file_path = index;
    }

    // File not found is common (404), no need to log at warning level
    let Ok(file_path_canonical) = file_path.canonicalize() else {
        return None;
    };
    if !file_path_canonical.starts_with(&static_dir_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            relative_path,
            file_path_canonical.display()
        ));
        return None;
    }

    let content = match fs::read(&file_path_canonical).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {}",
                file_path.display(),
                e
            ));
            return None;
        }
    };

    let content_type = mime::get_content_type(file_path.extension().and_then(|e| e.to_str()));
    Some((content, content_type))
}

/// Build static file response with `ETag` revalidation
fn build_static_file_response(
    data: Vec<u8>,
    content_type: &str,
    if_none_match: Option<&str>,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(&data);

    if cache::check_etag_match(if_none_match, &etag) {
        return http::build_304_response(&etag);
    }

    http::response::build_cached_response(Bytes::from(data), content_type, &etag, is_head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_index_file_for_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>Tugas</h1>").unwrap();
        let root = dir.path().to_str().unwrap();

        let (content, content_type) = load_from_directory(root, "/").await.unwrap();
        assert_eq!(content, b"<h1>Tugas</h1>");
        assert_eq!(content_type, "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn test_nested_asset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets").join("app.js"), "console.log(1)").unwrap();
        let root = dir.path().to_str().unwrap();

        let (_, content_type) = load_from_directory(root, "assets/app.js").await.unwrap();
        assert_eq!(content_type, "application/javascript; charset=utf-8");
        assert!(load_from_directory(root, "assets/missing.js").await.is_none());
    }

    #[tokio::test]
    async fn test_traversal_is_blocked() {
        let outer = tempfile::tempdir().unwrap();
        std::fs::write(outer.path().join("secret.txt"), "nope").unwrap();
        let public = outer.path().join("public");
        std::fs::create_dir(&public).unwrap();

        let loaded = load_from_directory(public.to_str().unwrap(), "../secret.txt").await;
        assert!(loaded.is_none());
    }

    #[test]
    fn test_etag_revalidation() {
        let data = b"body".to_vec();
        let etag = cache::generate_etag(&data);

        let full = build_static_file_response(data.clone(), "text/plain", None, false);
        assert_eq!(full.status(), 200);
        assert_eq!(full.headers()["ETag"], etag.as_str());

        let cached = build_static_file_response(data, "text/plain", Some(&etag), false);
        assert_eq!(cached.status(), 304);
    }
}
