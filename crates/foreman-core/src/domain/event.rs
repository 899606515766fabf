//! Immutable event records for the append-only log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{EventId, TaskId};

/// Closed enumeration of everything the system records.
///
/// The enum is deliberately strict: a persisted line with an unknown
/// `event_type` fails deserialization and is skipped by the log's tolerant
/// scan, the same way a torn write is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Task lifecycle.
    TaskStarted,
    TaskCompleted,
    TaskFailed,

    // Tool lifecycle.
    ToolCalled,
    ToolResult,

    // LLM lifecycle.
    LlmRequest,
    LlmResponse,

    // Session lifecycle.
    SessionMessage,
    SessionResponse,
    SessionSummary,

    // Generic.
    Info,
    Error,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::TaskStarted => "task_started",
            EventType::TaskCompleted => "task_completed",
            EventType::TaskFailed => "task_failed",
            EventType::ToolCalled => "tool_called",
            EventType::ToolResult => "tool_result",
            EventType::LlmRequest => "llm_request",
            EventType::LlmResponse => "llm_response",
            EventType::SessionMessage => "session_message",
            EventType::SessionResponse => "session_response",
            EventType::SessionSummary => "session_summary",
            EventType::Info => "info",
            EventType::Error => "error",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// One record of something that happened, optionally tied to a task.
///
/// Events are immutable once appended; the log never updates or deletes
/// them. Session membership lives inside `data` as a `session_id` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,

    pub event_type: EventType,

    /// Assignment time; non-decreasing in append order.
    pub timestamp: DateTime<Utc>,

    pub task_id: Option<TaskId>,

    /// Shape depends on `event_type`; defaults to `{}` on read.
    #[serde(default = "empty_object")]
    pub data: serde_json::Value,
}

impl Event {
    pub(crate) fn new(
        event_type: EventType,
        data: serde_json::Value,
        task_id: Option<TaskId>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            event_type,
            timestamp: Utc::now(),
            task_id,
            data,
        }
    }

    /// The session this event belongs to, if its data names one.
    pub fn session_id(&self) -> Option<&str> {
        self.data.get("session_id").and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_uses_snake_case_on_the_wire() {
        let s = serde_json::to_string(&EventType::SessionSummary).unwrap();
        assert_eq!(s, "\"session_summary\"");

        let back: EventType = serde_json::from_str("\"tool_called\"").unwrap();
        assert_eq!(back, EventType::ToolCalled);
    }

    #[test]
    fn unknown_event_type_fails_to_parse() {
        assert!(serde_json::from_str::<EventType>("\"mystery\"").is_err());
    }

    #[test]
    fn missing_data_defaults_to_empty_object() {
        let line = format!(
            r#"{{"id":"{}","event_type":"info","timestamp":"2026-01-05T10:00:00Z","task_id":null}}"#,
            EventId::generate().as_ulid()
        );
        let e: Event = serde_json::from_str(&line).unwrap();
        assert_eq!(e.data, json!({}));
    }

    #[test]
    fn session_id_is_read_from_data() {
        let e = Event::new(
            EventType::SessionMessage,
            json!({"session_id": "s1", "message": "hi"}),
            None,
        );
        assert_eq!(e.session_id(), Some("s1"));

        let bare = Event::new(EventType::Info, json!({}), None);
        assert_eq!(bare.session_id(), None);
    }
}
