// Task API handlers

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response, StatusCode};

use super::error::ApiError;
use super::form::TaskForm;
use super::response::{error_response, json_response};
use crate::config::AppState;
use crate::logger;
use crate::store::Task;

/// `GET /api/tasks`: every task, newest first
pub async fn list_tasks(state: &AppState) -> Response<Full<Bytes>> {
    let tasks = state.store.list().await;
    json_response(StatusCode::OK, &tasks)
}

/// `POST /api/tasks`: validate, store the attachment, append the task
pub async fn create_task<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match try_create_task(req, state).await {
        Ok(task) => {
            logger::log_task_created(&task);
            json_response(StatusCode::CREATED, &task)
        }
        Err(e) => {
            if e.status().is_server_error() {
                logger::log_error(&format!("Failed to create task: {e}"));
            } else {
                logger::log_warning(&format!("Rejected task: {e}"));
            }
            error_response(&e)
        }
    }
}

async fn try_create_task<B>(req: Request<B>, state: &AppState) -> Result<Task, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    // Bodies without Content-Length are bounded while they stream in
    let limit = state
        .config
        .http
        .max_body_size
        .map_or(usize::MAX, |max| usize::try_from(max).unwrap_or(usize::MAX));
    let body = Limited::new(req.into_body(), limit)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge(limit)
            } else {
                ApiError::MalformedBody(format!("Failed to read request body: {e}"))
            }
        })?
        .to_bytes();

    let form = TaskForm::parse(content_type.as_deref(), body).await?;
    // Validation comes first so a rejected request leaves no file behind
    let (draft, file) = form.into_draft()?;

    let stored = match file {
        Some(file) => {
            let stored = state.uploads.save(&file.original_name, &file.content).await?;
            logger::log_upload_saved(&stored, file.content.len());
            Some(stored)
        }
        None => None,
    };
    let file_path = stored
        .as_ref()
        .map(|s| s.public_path.clone())
        .unwrap_or_default();

    match state.store.create(draft, file_path).await {
        Ok(task) => Ok(task),
        Err(e) => {
            if let Some(stored) = &stored {
                state.uploads.discard(stored).await;
            }
            Err(e.into())
        }
    }
}
