//! Handler seam: the boundary between the store and task execution.
//!
//! The store has no knowledge of how a task is executed; it only expects
//! something to pick tasks up, do the work, and report back. Handlers
//! implement that something, one per task type.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Task, TaskType};
use crate::error::ForemanError;

/// Executes tasks of one type.
///
/// A handler returns an opaque result document on success or a failure
/// message. The message becomes the task's `error`; a storage failure
/// inside a handler is reported the same way, and the worker records it as
/// a task failure rather than dying.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn task_type(&self) -> &str;

    async fn run(&self, task: &Task) -> Result<serde_json::Value, String>;
}

/// Registry of handlers (task_type -> handler).
///
/// Design:
/// - Built during initialization (mutable).
/// - Used during runtime (immutable).
/// This avoids locks and keeps dispatch a plain map lookup.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its declared task type.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) -> Result<(), ForemanError> {
        let task_type = handler.task_type().to_string();
        if self.handlers.contains_key(&task_type) {
            return Err(ForemanError::DuplicateHandler(task_type));
        }
        self.handlers.insert(task_type, handler);
        Ok(())
    }

    pub fn get(&self, task_type: &TaskType) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(task_type.as_str())
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
