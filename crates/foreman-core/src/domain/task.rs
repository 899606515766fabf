//! Task record and lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ids::TaskId;

/// Kind tag used to route a task to a handler.
///
/// The store treats this as an opaque string; the closed set of concrete
/// kinds belongs to the handler layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a task.
///
/// State transitions:
/// - Pending -> Running -> Done
/// - Pending -> Running -> Failed
///
/// Done and Failed are terminal. Every other edge is rejected by
/// [`Task::transition`]; in particular a terminal task can not be pushed
/// back to Running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be picked up by the worker.
    Pending,

    /// Currently being executed.
    Running,

    /// Completed successfully; `result` is set.
    Done,

    /// Failed permanently; `error` is set.
    Failed,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("transition to done requires a result")]
    MissingResult,

    #[error("transition to failed requires an error")]
    MissingError,

    #[error("transition to {to} does not accept a result or error")]
    UnexpectedOutcome { to: TaskStatus },
}

/// A unit of work with a lifecycle status, opaque payload, and optional
/// result or error.
///
/// Wire form is one JSON line in `tasks.jsonl`; `tags` defaults to empty on
/// read so records written before the field existed still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    #[serde(rename = "type")]
    pub task_type: TaskType,

    /// Caller-defined document, immutable after creation.
    pub payload: serde_json::Value,

    pub status: TaskStatus,

    pub created_at: DateTime<Utc>,

    /// Refreshed on every status transition.
    pub updated_at: DateTime<Utc>,

    /// Set only on transition to Done.
    pub result: Option<serde_json::Value>,

    /// Set only on transition to Failed.
    pub error: Option<String>,

    /// Optional human label, immutable after creation.
    pub title: Option<String>,

    /// Caller-defined labels; a `session:<id>` tag associates the task
    /// with a session.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Task {
    /// Build a fresh pending task. Callers go through [`TaskStore::create`]
    /// so the record is persisted with its identifier.
    ///
    /// [`TaskStore::create`]: crate::store::TaskStore::create
    pub(crate) fn new(
        task_type: TaskType,
        payload: serde_json::Value,
        title: Option<String>,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::generate(),
            task_type,
            payload,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
            title,
            tags,
        }
    }

    /// Validated transition helper.
    ///
    /// Sets the new status, refreshes `updated_at`, and records the outcome.
    /// A result is required on the edge to Done and an error on the edge to
    /// Failed, so "exactly one outcome once terminal" holds by construction.
    /// Persistence is the caller's job via `TaskStore::update`.
    pub fn transition(
        &mut self,
        to: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<(), TransitionError> {
        match (self.status, to) {
            (TaskStatus::Pending, TaskStatus::Running)
            | (TaskStatus::Running, TaskStatus::Done)
            | (TaskStatus::Running, TaskStatus::Failed) => {}
            (from, to) => return Err(TransitionError::InvalidTransition { from, to }),
        }

        match to {
            TaskStatus::Running => {
                if result.is_some() || error.is_some() {
                    return Err(TransitionError::UnexpectedOutcome { to });
                }
            }
            TaskStatus::Done => {
                if error.is_some() {
                    return Err(TransitionError::UnexpectedOutcome { to });
                }
                self.result = Some(result.ok_or(TransitionError::MissingResult)?);
            }
            TaskStatus::Failed => {
                if result.is_some() {
                    return Err(TransitionError::UnexpectedOutcome { to });
                }
                self.error = Some(error.ok_or(TransitionError::MissingError)?);
            }
            // Unreachable through the edge check above; Pending is never a
            // transition target.
            TaskStatus::Pending => {
                return Err(TransitionError::InvalidTransition {
                    from: self.status,
                    to,
                });
            }
        }

        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark as running.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Running, None, None)
    }

    /// Mark as done with a result document.
    pub fn complete(&mut self, result: serde_json::Value) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Done, Some(result), None)
    }

    /// Mark as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed, None, Some(error.into()))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn task() -> Task {
        Task::new(TaskType::new("shell"), json!({"command": "echo hi"}), None, vec![])
    }

    #[test]
    fn new_task_is_pending_with_no_outcome() {
        let t = task();
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.result.is_none());
        assert!(t.error.is_none());
        assert_eq!(t.created_at, t.updated_at);
    }

    #[test]
    fn happy_path_to_done() {
        let mut t = task();
        t.start().unwrap();
        assert_eq!(t.status, TaskStatus::Running);

        t.complete(json!({"output": "hi\n"})).unwrap();
        assert_eq!(t.status, TaskStatus::Done);
        assert_eq!(t.result, Some(json!({"output": "hi\n"})));
        assert!(t.error.is_none());
        assert!(t.updated_at >= t.created_at);
    }

    #[test]
    fn failure_path_sets_error_only() {
        let mut t = task();
        t.start().unwrap();
        t.fail("boom").unwrap();

        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.error.as_deref(), Some("boom"));
        assert!(t.result.is_none());
    }

    #[rstest]
    #[case::pending_to_done(TaskStatus::Pending, TaskStatus::Done)]
    #[case::pending_to_failed(TaskStatus::Pending, TaskStatus::Failed)]
    #[case::pending_to_pending(TaskStatus::Pending, TaskStatus::Pending)]
    #[case::running_to_pending(TaskStatus::Running, TaskStatus::Pending)]
    #[case::running_to_running(TaskStatus::Running, TaskStatus::Running)]
    #[case::done_to_running(TaskStatus::Done, TaskStatus::Running)]
    #[case::done_to_failed(TaskStatus::Done, TaskStatus::Failed)]
    #[case::failed_to_running(TaskStatus::Failed, TaskStatus::Running)]
    #[case::failed_to_done(TaskStatus::Failed, TaskStatus::Done)]
    fn invalid_edges_are_rejected(#[case] from: TaskStatus, #[case] to: TaskStatus) {
        let mut t = task();

        // Drive the task to the starting state through valid edges.
        match from {
            TaskStatus::Pending => {}
            TaskStatus::Running => t.start().unwrap(),
            TaskStatus::Done => {
                t.start().unwrap();
                t.complete(json!({})).unwrap();
            }
            TaskStatus::Failed => {
                t.start().unwrap();
                t.fail("x").unwrap();
            }
        }

        let result = if to == TaskStatus::Done {
            t.transition(to, Some(json!({})), None)
        } else if to == TaskStatus::Failed {
            t.transition(to, None, Some("x".into()))
        } else {
            t.transition(to, None, None)
        };

        assert_eq!(
            result,
            Err(TransitionError::InvalidTransition { from, to })
        );
        assert_eq!(t.status, from);
    }

    #[test]
    fn done_requires_a_result() {
        let mut t = task();
        t.start().unwrap();
        assert_eq!(
            t.transition(TaskStatus::Done, None, None),
            Err(TransitionError::MissingResult)
        );
    }

    #[test]
    fn failed_requires_an_error() {
        let mut t = task();
        t.start().unwrap();
        assert_eq!(
            t.transition(TaskStatus::Failed, None, None),
            Err(TransitionError::MissingError)
        );
    }

    #[test]
    fn running_rejects_an_outcome() {
        let mut t = task();
        assert_eq!(
            t.transition(TaskStatus::Running, Some(json!({})), None),
            Err(TransitionError::UnexpectedOutcome {
                to: TaskStatus::Running
            })
        );
    }

    #[test]
    fn wire_form_matches_store_layout() {
        let t = Task::new(
            TaskType::new("shell"),
            json!({"command": "ls"}),
            Some("list it".into()),
            vec!["session:s1".into()],
        );
        let v: serde_json::Value = serde_json::to_value(&t).unwrap();

        assert_eq!(v["type"], "shell");
        assert_eq!(v["status"], "pending");
        assert_eq!(v["title"], "list it");
        assert_eq!(v["tags"], json!(["session:s1"]));
        assert!(v["result"].is_null());
        assert!(v["error"].is_null());
    }

    #[test]
    fn records_without_tags_still_parse() {
        // v0 records predate the tags/title fields.
        let line = format!(
            r#"{{"id":"{}","type":"shell","payload":{{}},"status":"pending","created_at":"2026-01-05T10:00:00Z","updated_at":"2026-01-05T10:00:00Z","result":null,"error":null}}"#,
            TaskId::generate().as_ulid()
        );
        let t: Task = serde_json::from_str(&line).unwrap();
        assert!(t.tags.is_empty());
        assert!(t.title.is_none());
    }
}
