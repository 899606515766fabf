//! Durable task store.
//!
//! Design:
//! - `create` appends one line; `update` rewrites the whole file.
//! - The exclusive advisory lock is held across update's entire
//!   load-replace-rewrite sequence, so two processes updating different
//!   tasks can not overwrite each other's unseen changes.
//! - Reads are lock-free scans and skip corrupt lines.

use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::lock::{self, FileLock};
use super::paths::StorePaths;
use super::{DEFAULT_LOCK_TIMEOUT, jsonl, tail};
use crate::domain::{Task, TaskId, TaskStatus, TaskType};
use crate::error::ForemanError;

/// Conjunctive filter for [`TaskStore::filtered`]. Unset fields match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub tag: Option<String>,
    pub limit: Option<usize>,
}

pub struct TaskStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl TaskStore {
    pub fn new(paths: &StorePaths) -> Self {
        Self {
            path: paths.tasks_file(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Allocate an id, persist a pending task, return the record.
    pub fn create(
        &self,
        task_type: TaskType,
        payload: serde_json::Value,
        title: Option<String>,
        tags: Vec<String>,
    ) -> Result<Task, ForemanError> {
        if task_type.as_str().is_empty() {
            return Err(ForemanError::Validation(
                "task type must not be empty".into(),
            ));
        }

        let task = Task::new(task_type, payload, title, tags);
        jsonl::append_record(&self.path, self.lock_timeout, &task)?;
        debug!(task_id = %task.id, task_type = %task.task_type, "created task");
        Ok(task)
    }

    /// Exact-id lookup.
    pub fn get(&self, id: TaskId) -> Result<Option<Task>, ForemanError> {
        Ok(self.all()?.into_iter().find(|t| t.id == id))
    }

    /// Every task in creation order. Corrupt lines are skipped.
    pub fn all(&self) -> Result<Vec<Task>, ForemanError> {
        jsonl::read_records(&self.path)
    }

    /// Persist the full current state of `task` by id.
    ///
    /// Load-all, replace the matching record, rewrite the entire store.
    /// The lock is held for the whole sequence; the rewrite lands via an
    /// atomic rename. Updating an id that is not stored rewrites the file
    /// unchanged.
    pub fn update(&self, task: &Task) -> Result<(), ForemanError> {
        let _guard = FileLock::acquire(&lock::lock_path_for(&self.path), self.lock_timeout)?;

        let mut tasks: Vec<Task> = jsonl::read_records(&self.path)?;
        for stored in &mut tasks {
            if stored.id == task.id {
                *stored = task.clone();
            }
        }
        jsonl::rewrite_records(&self.path, &tasks)?;
        debug!(task_id = %task.id, status = %task.status, "updated task");
        Ok(())
    }

    /// Earliest-created task still pending. FIFO, no priority.
    pub fn next_pending(&self) -> Result<Option<Task>, ForemanError> {
        Ok(self
            .all()?
            .into_iter()
            .find(|t| t.status == TaskStatus::Pending))
    }

    /// The last `limit` tasks, in creation order.
    pub fn recent(&self, limit: usize) -> Result<Vec<Task>, ForemanError> {
        Ok(tail(self.all()?, limit))
    }

    /// Conjunctive filter, newest-created first, then the limit.
    pub fn filtered(&self, filter: &TaskFilter) -> Result<Vec<Task>, ForemanError> {
        let mut tasks = self.all()?;
        tasks.retain(|t| {
            filter.status.is_none_or(|s| t.status == s)
                && filter.task_type.as_ref().is_none_or(|ty| t.task_type == *ty)
                && filter.tag.as_deref().is_none_or(|tag| t.has_tag(tag))
        });
        tasks.reverse();
        if let Some(limit) = filter.limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    /// Tasks carrying `tag`, in creation order.
    pub fn by_tag(&self, tag: &str) -> Result<Vec<Task>, ForemanError> {
        let mut tasks = self.all()?;
        tasks.retain(|t| t.has_tag(tag));
        Ok(tasks)
    }
}
