//! Crate error type.
//!
//! NotFound is deliberately absent: lookups return `Option`, never an
//! error. Corrupt records never surface here either; the stores skip them
//! on read.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::domain::TransitionError;

#[derive(Debug, Error)]
pub enum ForemanError {
    /// The backing medium is unavailable or a write failed. Fatal; no
    /// automatic retry at this layer.
    #[error("storage i/o at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record encoding: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("lock timed out after {waited:?} at {path}")]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("validation: {0}")]
    Validation(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("duplicate handler for task type '{0}'")]
    DuplicateHandler(String),
}

impl ForemanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
