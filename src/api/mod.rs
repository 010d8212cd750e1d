// API module entry
// JSON task API mounted at /api

mod error;
mod form;
mod handlers;
mod response;

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};

use crate::config::AppState;
use crate::http;

#[cfg(test)]
pub(crate) use form::{multipart_body, FILE_FIELD};

/// Path of the task collection
pub const TASKS_PATH: &str = "/api/tasks";

/// Prefix reserved for the JSON API
pub const API_PREFIX: &str = "/api/";

/// Dispatch a request under `/api/`
pub async fn handle_api<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = req.uri().path().trim_end_matches('/');
    if path != TASKS_PATH {
        return response::not_found();
    }

    let method = req.method().clone();
    match method {
        Method::GET | Method::HEAD => handlers::list_tasks(state).await,
        Method::POST => handlers::create_task(req, state).await,
        _ => http::build_405_response("GET, HEAD, POST, OPTIONS"),
    }
}
