//! Task record and its validated input

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A submitted task, exactly as persisted in the task file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub tech: String,
    pub year: i32,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub demo_url: String,
    /// Public path of the uploaded file, empty when none was sent
    #[serde(default)]
    pub file_path: String,
    pub created_at: String,
}

impl Task {
    /// Parsed `created_at`, `None` when the stored value is not RFC 3339
    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Validated fields of a create request, before id and timestamp exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub tech: String,
    pub year: i32,
    pub tags: String,
    pub demo_url: String,
}

impl TaskDraft {
    pub(crate) fn into_task(self, id: u64, file_path: String, now: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title,
            tech: self.tech,
            year: self.year,
            tags: self.tags,
            demo_url: self.demo_url,
            file_path,
            created_at: format_timestamp(now),
        }
    }
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-05-01T10:20:30.123Z`
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(format_timestamp(t), "2024-05-01T10:20:30.123Z");
    }

    #[test]
    fn test_field_order_on_the_wire() {
        let draft = TaskDraft {
            title: "Kasir".to_string(),
            tech: "Rust".to_string(),
            year: 2024,
            tags: String::new(),
            demo_url: String::new(),
        };
        let task = draft.into_task(7, String::new(), Utc.timestamp_millis_opt(0).unwrap());
        let json = serde_json::to_string(&task).unwrap();
        assert_eq!(
            json,
            r#"{"id":7,"title":"Kasir","tech":"Rust","year":2024,"tags":"","demo_url":"","file_path":"","created_at":"1970-01-01T00:00:00.000Z"}"#
        );
    }

    #[test]
    fn test_optional_fields_default_when_loading() {
        let task: Task = serde_json::from_str(
            r#"{"id":1,"title":"a","tech":"b","year":2020,"created_at":"2020-01-01T00:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(task.tags, "");
        assert_eq!(task.file_path, "");
        assert!(task.created_at_time().is_some());
    }

    #[test]
    fn test_unparseable_created_at() {
        let task = Task {
            id: 1,
            title: "a".into(),
            tech: "b".into(),
            year: 2020,
            tags: String::new(),
            demo_url: String::new(),
            file_path: String::new(),
            created_at: "yesterday".into(),
        };
        assert!(task.created_at_time().is_none());
    }
}
