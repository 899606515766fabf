//! Domain model: identifiers, task records, event records, session views.

pub mod event;
pub mod ids;
pub mod message;
pub mod task;

pub use event::{Event, EventType};
pub use ids::{EventId, TaskId};
pub use message::{Role, SessionMessage};
pub use task::{Task, TaskStatus, TaskType, TransitionError};
