//! Append-only event log.
//!
//! Design:
//! - `append` is the only mutating operation; records are immutable after.
//! - Retrieval order is append order; there is no secondary index.
//! - Every read is a full re-scan of the durable log. O(total events), which
//!   is fine at local single-user scale and is the documented ceiling.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::paths::StorePaths;
use super::{DEFAULT_LOCK_TIMEOUT, jsonl, tail};
use crate::domain::{Event, EventType, TaskId};
use crate::error::ForemanError;

const NO_EVENTS_SENTINEL: &str = "No previous events for this task.";

pub struct EventLog {
    path: PathBuf,
    lock_timeout: Duration,
}

impl EventLog {
    pub fn new(paths: &StorePaths) -> Self {
        Self {
            path: paths.events_file(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Assign id and timestamp, append durably, return the full record.
    pub fn append(
        &self,
        event_type: EventType,
        data: serde_json::Value,
        task_id: Option<TaskId>,
    ) -> Result<Event, ForemanError> {
        let event = Event::new(event_type, data, task_id);
        jsonl::append_record(&self.path, self.lock_timeout, &event)?;
        debug!(event_type = %event.event_type, event_id = %event.id, "appended event");
        Ok(event)
    }

    /// Every event in append order. Corrupt lines are skipped.
    pub fn all(&self) -> Result<Vec<Event>, ForemanError> {
        jsonl::read_records(&self.path)
    }

    /// Events tagged with the given task, in append order.
    pub fn for_task(&self, task_id: TaskId) -> Result<Vec<Event>, ForemanError> {
        let mut events = self.all()?;
        events.retain(|e| e.task_id == Some(task_id));
        Ok(events)
    }

    /// The last `limit` events, oldest-first within the window.
    pub fn recent(&self, limit: usize) -> Result<Vec<Event>, ForemanError> {
        Ok(tail(self.all()?, limit))
    }

    /// Events whose data names the given session, in append order.
    pub fn for_session(&self, session_id: &str) -> Result<Vec<Event>, ForemanError> {
        let mut events = self.all()?;
        events.retain(|e| e.session_id() == Some(session_id));
        Ok(events)
    }

    /// Human-readable context block: the last `max_events` events for a
    /// task, one line each with time of day, type, and compact data.
    pub fn render_context(
        &self,
        task_id: TaskId,
        max_events: usize,
    ) -> Result<String, ForemanError> {
        let events = tail(self.for_task(task_id)?, max_events);
        if events.is_empty() {
            return Ok(NO_EVENTS_SENTINEL.to_string());
        }

        let mut out = String::from("Previous events for this task:");
        for event in &events {
            let time = event.timestamp.format("%H:%M:%S");
            let data = serde_json::to_string(&event.data)?;
            // Writing into a String cannot fail.
            let _ = write!(out, "\n[{time}] {}: {data}", event.event_type);
        }
        Ok(out)
    }
}
