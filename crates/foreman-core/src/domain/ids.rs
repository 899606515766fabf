//! Strongly-typed store identifiers.
//!
//! ULIDs give 128-bit collision-free identifiers that also sort by creation
//! time, which is convenient when eyeballing the log files. The phantom
//! parameter keeps `TaskId` and `EventId` distinct at compile time while the
//! implementation stays generic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// Marker trait for identifier families.
///
/// Provides the prefix used in `Display` ("task-", "event-"). The wire form
/// stays the bare ULID string; prefixes are a presentation concern only.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic identifier over a marker type.
///
/// `PhantomData` costs nothing at runtime; it only prevents a `TaskId` from
/// being passed where an `EventId` is expected.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Allocate a fresh identifier.
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ulid::DecodeError;

    /// Accepts the bare ULID form and the prefixed `Display` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ok(Self::from_ulid(Ulid::from_string(bare)?))
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for task identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskIdent {}

impl IdMarker for TaskIdent {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Marker for event identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventIdent {}

impl IdMarker for EventIdent {
    fn prefix() -> &'static str {
        "event-"
    }
}

/// Identifier of a task record.
pub type TaskId = Id<TaskIdent>;

/// Identifier of an event record.
pub type EventId = Id<EventIdent>;
