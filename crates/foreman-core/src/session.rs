//! Session materialization.
//!
//! Sessions are not stored as first-class records: a session is whatever
//! falls out of folding the event log for one `session_id`. Messages come
//! from session_message/session_response events, the rolling summary from
//! the most recent session_summary event.

use serde_json::json;
use std::collections::BTreeSet;

use crate::domain::{Event, EventType, Role, SessionMessage, TaskId};
use crate::error::ForemanError;
use crate::store::{EventLog, TaskStore, tail};

/// Tag that associates a task with a session.
pub fn session_tag(session_id: &str) -> String {
    format!("session:{session_id}")
}

const SESSION_TAG_PREFIX: &str = "session:";

/// Character cap applied to each message when assembling summarization
/// context, to bound the block handed to the text-generation collaborator.
const MESSAGE_CHAR_CAP: usize = 500;

/// Read-only projection over an [`EventLog`], plus the record_* helpers
/// that append session events in the expected shape.
pub struct SessionView<'a> {
    log: &'a EventLog,
}

impl<'a> SessionView<'a> {
    pub fn new(log: &'a EventLog) -> Self {
        Self { log }
    }

    /// Ordered conversation turns for a session; with `limit`, the last
    /// `limit` of them.
    pub fn messages(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SessionMessage>, ForemanError> {
        let messages: Vec<SessionMessage> = self
            .log
            .for_session(session_id)?
            .into_iter()
            .filter_map(fold_message)
            .collect();

        Ok(match limit {
            Some(limit) => tail(messages, limit),
            None => messages,
        })
    }

    /// The current rolling summary: last session_summary event wins.
    pub fn summary(&self, session_id: &str) -> Result<Option<String>, ForemanError> {
        Ok(self
            .log
            .for_session(session_id)?
            .into_iter()
            .rev()
            .find(|e| e.event_type == EventType::SessionSummary)
            .and_then(|e| {
                e.data
                    .get("summary")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
            }))
    }

    /// Append a user turn.
    pub fn record_message(
        &self,
        session_id: &str,
        content: &str,
        task_id: Option<TaskId>,
    ) -> Result<Event, ForemanError> {
        validate(session_id, content, "message")?;
        self.log.append(
            EventType::SessionMessage,
            json!({"session_id": session_id, "message": content}),
            task_id,
        )
    }

    /// Append an assistant turn.
    pub fn record_response(
        &self,
        session_id: &str,
        content: &str,
        task_id: Option<TaskId>,
    ) -> Result<Event, ForemanError> {
        validate(session_id, content, "response")?;
        self.log.append(
            EventType::SessionResponse,
            json!({"session_id": session_id, "message": content}),
            task_id,
        )
    }

    /// Append a new rolling summary. Summaries accumulate; the log never
    /// shrinks, and "current" always means most recent by append order.
    pub fn record_summary(
        &self,
        session_id: &str,
        summary: &str,
        task_id: Option<TaskId>,
    ) -> Result<Event, ForemanError> {
        validate(session_id, summary, "summary")?;
        self.log.append(
            EventType::SessionSummary,
            json!({"session_id": session_id, "summary": summary}),
            task_id,
        )
    }

    /// Deterministic text block for the external summarizer: the existing
    /// summary, if any, plus the last `max_recent` messages truncated to a
    /// fixed cap. Pure assembly; no generation happens here.
    pub fn build_summarization_context(
        &self,
        session_id: &str,
        max_recent: usize,
    ) -> Result<String, ForemanError> {
        let mut out = String::new();

        if let Some(summary) = self.summary(session_id)? {
            out.push_str("Summary of the conversation so far:\n");
            out.push_str(&summary);
            out.push_str("\n\n");
        }

        out.push_str("Recent messages:\n");
        for message in self.messages(session_id, Some(max_recent))? {
            out.push_str(message.role.as_str());
            out.push_str(": ");
            out.push_str(&truncate(&message.content, MESSAGE_CHAR_CAP));
            out.push('\n');
        }
        Ok(out)
    }

    /// Distinct session ids harvested from `session:` task tags, sorted.
    pub fn list_sessions(&self, tasks: &TaskStore) -> Result<Vec<String>, ForemanError> {
        let mut ids = BTreeSet::new();
        for task in tasks.all()? {
            for tag in &task.tags {
                if let Some(id) = tag.strip_prefix(SESSION_TAG_PREFIX) {
                    ids.insert(id.to_string());
                }
            }
        }
        Ok(ids.into_iter().collect())
    }
}

fn fold_message(event: Event) -> Option<SessionMessage> {
    let role = match event.event_type {
        EventType::SessionMessage => Role::User,
        EventType::SessionResponse => Role::Assistant,
        _ => return None,
    };
    let content = event.data.get("message")?.as_str()?.to_string();
    Some(SessionMessage {
        role,
        content,
        timestamp: event.timestamp,
    })
}

fn validate(session_id: &str, content: &str, what: &str) -> Result<(), ForemanError> {
    if session_id.is_empty() {
        return Err(ForemanError::Validation("session id must not be empty".into()));
    }
    if content.is_empty() {
        return Err(ForemanError::Validation(format!("{what} must not be empty")));
    }
    Ok(())
}

fn truncate(content: &str, cap: usize) -> String {
    if content.chars().count() <= cap {
        return content.to_string();
    }
    let mut out: String = content.chars().take(cap).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use crate::store::StorePaths;
    use serde_json::json;
    use tempfile::TempDir;

    fn view() -> (TempDir, EventLog) {
        let dir = TempDir::new().unwrap();
        let paths = StorePaths::new(dir.path());
        (dir, EventLog::new(&paths))
    }

    #[test]
    fn messages_fold_in_append_order_with_roles() {
        let (_dir, log) = view();
        let view = SessionView::new(&log);

        view.record_message("s1", "hi", None).unwrap();
        view.record_response("s1", "hello", None).unwrap();
        view.record_message("s1", "bye", None).unwrap();
        // Another session's turn must not leak in.
        view.record_message("s2", "other", None).unwrap();

        let messages = view.messages("s1", None).unwrap();
        let turns: Vec<(Role, &str)> = messages
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            turns,
            vec![
                (Role::User, "hi"),
                (Role::Assistant, "hello"),
                (Role::User, "bye"),
            ]
        );
    }

    #[test]
    fn messages_limit_keeps_the_most_recent() {
        let (_dir, log) = view();
        let view = SessionView::new(&log);

        for n in 0..5 {
            view.record_message("s1", &format!("m{n}"), None).unwrap();
        }

        let messages = view.messages("s1", Some(2)).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "m3");
        assert_eq!(messages[1].content, "m4");
    }

    #[test]
    fn last_summary_wins() {
        let (_dir, log) = view();
        let view = SessionView::new(&log);

        assert!(view.summary("s1").unwrap().is_none());

        view.record_summary("s1", "A", None).unwrap();
        view.record_summary("s1", "B", None).unwrap();
        view.record_summary("s2", "C", None).unwrap();

        assert_eq!(view.summary("s1").unwrap().as_deref(), Some("B"));
    }

    #[test]
    fn non_message_session_events_are_not_turns() {
        let (_dir, log) = view();
        let view = SessionView::new(&log);

        view.record_message("s1", "hi", None).unwrap();
        view.record_summary("s1", "so far", None).unwrap();
        log.append(EventType::Info, json!({"session_id": "s1"}), None)
            .unwrap();

        assert_eq!(view.messages("s1", None).unwrap().len(), 1);
    }

    #[test]
    fn empty_session_id_or_content_is_rejected() {
        let (_dir, log) = view();
        let view = SessionView::new(&log);

        assert!(matches!(
            view.record_message("", "hi", None),
            Err(ForemanError::Validation(_))
        ));
        assert!(matches!(
            view.record_summary("s1", "", None),
            Err(ForemanError::Validation(_))
        ));
    }

    #[test]
    fn summarization_context_includes_summary_and_truncates() {
        let (_dir, log) = view();
        let view = SessionView::new(&log);

        view.record_summary("s1", "the story so far", None).unwrap();
        view.record_message("s1", &"x".repeat(600), None).unwrap();
        view.record_response("s1", "short", None).unwrap();

        let context = view.build_summarization_context("s1", 10).unwrap();

        assert!(context.contains("Summary of the conversation so far:\nthe story so far"));
        assert!(context.contains("Recent messages:\n"));
        assert!(context.contains(&format!("user: {}...", "x".repeat(500))));
        assert!(context.contains("assistant: short"));
    }

    #[test]
    fn summarization_context_without_summary_has_no_summary_section() {
        let (_dir, log) = view();
        let view = SessionView::new(&log);

        view.record_message("s1", "hi", None).unwrap();

        let context = view.build_summarization_context("s1", 10).unwrap();
        assert!(!context.contains("Summary of the conversation so far:"));
        assert!(context.starts_with("Recent messages:\n"));
    }

    #[test]
    fn summarization_context_honors_the_window() {
        let (_dir, log) = view();
        let view = SessionView::new(&log);

        for n in 0..5 {
            view.record_message("s1", &format!("m{n}"), None).unwrap();
        }

        let context = view.build_summarization_context("s1", 2).unwrap();
        assert!(!context.contains("m2"));
        assert!(context.contains("m3"));
        assert!(context.contains("m4"));
    }

    #[test]
    fn list_sessions_harvests_tags_sorted_and_deduped() {
        let dir = TempDir::new().unwrap();
        let paths = StorePaths::new(dir.path());
        let log = EventLog::new(&paths);
        let tasks = TaskStore::new(&paths);
        let view = SessionView::new(&log);

        for tags in [
            vec![session_tag("beta")],
            vec![session_tag("alpha"), "urgent".to_string()],
            vec![session_tag("beta")],
            vec![],
        ] {
            tasks
                .create(TaskType::new("llm_session"), json!({}), None, tags)
                .unwrap();
        }

        assert_eq!(
            view.list_sessions(&tasks).unwrap(),
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }
}
