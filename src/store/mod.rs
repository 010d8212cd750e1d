//! Task store
//!
//! Keeps every task in memory and mirrors the collection to a single
//! pretty-printed JSON file, rewritten in full after each mutation.
//! All mutations go through one mutex, so a create never loses a
//! concurrent create's write.

mod task;

pub use task::{Task, TaskDraft};

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access task file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("task file {} is not a valid task list: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize tasks: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Task collection with its on-disk mirror
pub struct TaskStore {
    path: PathBuf,
    tasks: Mutex<Vec<Task>>,
}

impl TaskStore {
    /// Open the task file, creating it (and its directory) as `[]` if absent
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        if !fs::try_exists(&path).await.map_err(io_err)? {
            fs::write(&path, "[]").await.map_err(io_err)?;
        }

        let content = fs::read_to_string(&path).await.map_err(io_err)?;
        let tasks: Vec<Task> =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            tasks: Mutex::new(tasks),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Snapshot of all tasks, newest `created_at` first
    pub async fn list(&self) -> Vec<Task> {
        let mut tasks = self.tasks.lock().await.clone();
        sort_newest_first(&mut tasks);
        tasks
    }

    /// Add a task and rewrite the task file.
    ///
    /// When the write fails the task is dropped from memory again, so the
    /// collection never gets ahead of the file.
    pub async fn append(&self, task: Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock().await;
        self.push_and_persist(&mut tasks, task).await
    }

    /// Stamp a draft with a fresh id and `created_at`, then append it
    pub async fn create(&self, draft: TaskDraft, file_path: String) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.lock().await;
        let now = Utc::now();
        let task = draft.into_task(next_id(&tasks, now), file_path, now);
        self.push_and_persist(&mut tasks, task.clone()).await?;
        Ok(task)
    }

    async fn push_and_persist(&self, tasks: &mut Vec<Task>, task: Task) -> Result<(), StoreError> {
        tasks.push(task);
        if let Err(e) = self.persist(tasks).await {
            tasks.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn persist(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(tasks).map_err(StoreError::Serialize)?;
        fs::write(&self.path, content)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Stable sort; unparseable timestamps go last
fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by_cached_key(|t| Reverse(t.created_at_time()));
}

/// Unix milliseconds, bumped past the largest existing id if the clock lags
fn next_id(tasks: &[Task], now: DateTime<Utc>) -> u64 {
    let clock = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    match tasks.iter().map(|t| t.id).max() {
        Some(last) if last >= clock => last + 1,
        _ => clock,
    }
}
