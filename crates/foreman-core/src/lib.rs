//! foreman-core
//!
//! Core building blocks for a local task orchestration substrate: callers
//! submit tasks, a single worker executes them one at a time, and every
//! state transition and side effect lands in an append-only event log.
//!
//! # Modules
//! - **domain**: records and state machines (Task, Event, ids, session
//!   message views)
//! - **store**: durable persistence, line-delimited JSON files guarded by
//!   advisory locks (TaskStore, EventLog, StorePaths)
//! - **session**: read-side projection of the event log into conversations
//! - **runtime**: the TaskHandler seam and registry
//! - **worker**: single-step execution loop tying the above together
//! - **handlers**: local shell/filesystem handlers
//!
//! Stores are explicitly constructed from a [`StorePaths`] owned by the
//! process entry point and passed by handle; nothing here is global.

pub mod domain;
pub mod error;
pub mod handlers;
pub mod runtime;
pub mod session;
pub mod store;
pub mod worker;

pub use domain::{Event, EventId, EventType, Role, SessionMessage, Task, TaskId, TaskStatus, TaskType, TransitionError};
pub use error::ForemanError;
pub use runtime::{HandlerRegistry, TaskHandler};
pub use session::SessionView;
pub use store::{EventLog, StorePaths, TaskFilter, TaskStore};
pub use worker::Worker;
