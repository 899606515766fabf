//! Single-step worker.
//!
//! Pulls the next pending task, walks it through the lifecycle, and records
//! every step in the event log. One task per call: control returns to the
//! caller between tasks (the explicitly user-in-the-loop model).

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{EventType, Task};
use crate::error::ForemanError;
use crate::runtime::HandlerRegistry;
use crate::store::{EventLog, TaskStore};

pub struct Worker {
    tasks: Arc<TaskStore>,
    events: Arc<EventLog>,
    registry: Arc<HandlerRegistry>,
}

impl Worker {
    pub fn new(
        tasks: Arc<TaskStore>,
        events: Arc<EventLog>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            tasks,
            events,
            registry,
        }
    }

    /// Execute the next pending task, if any, and return its final record.
    ///
    /// The sequence matches the store contracts: transition to running and
    /// persist, log task_started, dispatch, then persist the terminal state
    /// and log task_completed or task_failed. A missing handler counts as a
    /// task failure, not a worker error.
    pub async fn run_next(&self) -> Result<Option<Task>, ForemanError> {
        let Some(mut task) = self.tasks.next_pending()? else {
            return Ok(None);
        };

        info!(task_id = %task.id, task_type = %task.task_type, "processing task");

        task.start()?;
        self.tasks.update(&task)?;
        self.events.append(
            EventType::TaskStarted,
            json!({"task_type": task.task_type.as_str(), "payload": task.payload}),
            Some(task.id),
        )?;

        let outcome = match self.registry.get(&task.task_type) {
            Some(handler) => handler.run(&task).await,
            None => Err(format!(
                "no handler registered for task type '{}'",
                task.task_type
            )),
        };

        match outcome {
            Ok(result) => {
                task.complete(result.clone())?;
                self.tasks.update(&task)?;
                self.events.append(
                    EventType::TaskCompleted,
                    json!({"result": result}),
                    Some(task.id),
                )?;
                info!(task_id = %task.id, "task completed");
            }
            Err(error) => {
                warn!(task_id = %task.id, error = %error, "task failed");
                task.fail(error.clone())?;
                self.tasks.update(&task)?;
                self.events.append(
                    EventType::TaskFailed,
                    json!({"error": error}),
                    Some(task.id),
                )?;
            }
        }

        Ok(Some(task))
    }
}
