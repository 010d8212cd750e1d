// Create-request body parsing
// Accepts multipart/form-data, urlencoded forms and JSON objects

use hyper::body::Bytes;
use std::convert::Infallible;

use super::error::ApiError;
use crate::store::TaskDraft;

/// Multipart field carrying the optional attachment
pub const FILE_FIELD: &str = "task_file";

/// File part of a multipart request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub original_name: String,
    pub content: Bytes,
}

/// Raw create-request fields, before validation
#[derive(Debug, Default)]
pub struct TaskForm {
    pub title: Option<String>,
    pub tech: Option<String>,
    pub year: Option<String>,
    pub tags: Option<String>,
    pub demo_url: Option<String>,
    pub file: Option<UploadedFile>,
}

impl TaskForm {
    /// Parse a request body according to its `Content-Type`.
    ///
    /// Unrecognised content types yield an empty form, which then fails
    /// validation like any request without the required fields.
    pub async fn parse(content_type: Option<&str>, body: Bytes) -> Result<Self, ApiError> {
        let essence = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());

        match essence.as_deref() {
            Some("multipart/form-data") => {
                let boundary = multer::parse_boundary(content_type.unwrap_or_default())
                    .map_err(|e| ApiError::MalformedBody(e.to_string()))?;
                Self::from_multipart(body, boundary).await
            }
            Some("application/json") => Self::from_json(&body),
            Some("application/x-www-form-urlencoded") => Ok(Self::from_urlencoded(&body)),
            _ => Ok(Self::default()),
        }
    }

    fn from_urlencoded(body: &[u8]) -> Self {
        let mut form = Self::default();
        for (name, value) in url::form_urlencoded::parse(body) {
            form.set_field(&name, value.into_owned());
        }
        form
    }

    fn from_json(body: &[u8]) -> Result<Self, ApiError> {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| ApiError::MalformedBody(e.to_string()))?;
        let serde_json::Value::Object(fields) = value else {
            return Err(ApiError::MalformedBody("expected a JSON object".to_string()));
        };

        let mut form = Self::default();
        for (name, value) in fields {
            let text = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(ApiError::MalformedBody(format!(
                        "field '{name}' must be a string or number"
                    )))
                }
            };
            form.set_field(&name, text);
        }
        Ok(form)
    }

    async fn from_multipart(body: Bytes, boundary: String) -> Result<Self, ApiError> {
        let malformed = |e: multer::Error| ApiError::MalformedBody(e.to_string());
        let stream = futures_util::stream::once(async move { Ok::<Bytes, Infallible>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();

            if let Some(file_name) = field.file_name().map(ToString::to_string) {
                let content = field.bytes().await.map_err(malformed)?;
                // Browsers send an empty, unnamed part for an untouched file input
                if file_name.is_empty() && content.is_empty() {
                    continue;
                }
                if name != FILE_FIELD || form.file.is_some() {
                    return Err(ApiError::UnexpectedFile(name));
                }
                form.file = Some(UploadedFile {
                    original_name: file_name,
                    content,
                });
            } else {
                let value = field.text().await.map_err(malformed)?;
                form.set_field(&name, value);
            }
        }
        Ok(form)
    }

    /// Last value wins for repeated fields; unknown fields are ignored
    fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "title" => &mut self.title,
            "tech" => &mut self.tech,
            "year" => &mut self.year,
            "tags" => &mut self.tags,
            "demo_url" => &mut self.demo_url,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Validate required fields and split off the attachment
    pub fn into_draft(self) -> Result<(TaskDraft, Option<UploadedFile>), ApiError> {
        let (Some(title), Some(tech), Some(year)) = (
            required(self.title),
            required(self.tech),
            required(self.year),
        ) else {
            return Err(ApiError::MissingFields);
        };
        let year = parse_year(&year)?;

        let draft = TaskDraft {
            title,
            tech,
            year,
            tags: self.tags.map(|t| t.trim().to_string()).unwrap_or_default(),
            demo_url: self
                .demo_url
                .map(|u| u.trim().to_string())
                .unwrap_or_default(),
        };
        Ok((draft, self.file))
    }
}

/// Trimmed value, `None` when absent or blank
fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Leading-integer parse: optional sign then digits, trailing text ignored.
/// Digits that do not fit an `i32` are reported separately from non-numbers.
fn parse_year(raw: &str) -> Result<i32, ApiError> {
    let s = raw.trim();
    let sign_len = usize::from(s.starts_with(['-', '+']));
    let end = s[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |idx| idx + sign_len);
    if end == sign_len {
        return Err(ApiError::InvalidYear);
    }
    s[..end].parse().map_err(|_| ApiError::YearOutOfRange)
}

/// Encode a multipart body; `file` is `(field, filename, content)`
#[cfg(test)]
pub(crate) fn multipart_body(
    boundary: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((field, filename, content)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
