//! Store file locations.
//!
//! A `StorePaths` is plain data constructed by the process entry point and
//! handed to whichever component needs it. There are no module-level
//! defaults and no import-time side effects.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ForemanError;

const TASKS_FILE: &str = "tasks.jsonl";
const EVENTS_FILE: &str = "events.jsonl";

#[derive(Debug, Clone)]
pub struct StorePaths {
    data_dir: PathBuf,
}

impl StorePaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure(&self) -> Result<(), ForemanError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| ForemanError::io(&self.data_dir, e))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.data_dir.join(TASKS_FILE)
    }

    pub fn events_file(&self) -> PathBuf {
        self.data_dir.join(EVENTS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_file_names() {
        let paths = StorePaths::new("/var/lib/foreman");
        assert_eq!(paths.tasks_file(), Path::new("/var/lib/foreman/tasks.jsonl"));
        assert_eq!(paths.events_file(), Path::new("/var/lib/foreman/events.jsonl"));
    }
}
