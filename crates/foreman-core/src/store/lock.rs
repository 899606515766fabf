//! Advisory file locking for store critical sections.
//!
//! One exclusive lock per store file, taken on a sibling `.lock` file so
//! the data file itself can be atomically replaced while the lock is held.
//! Concurrent appends from multiple processes interleave as whole lines;
//! `TaskStore::update` holds the lock across its whole
//! load-replace-rewrite sequence.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ForemanError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// RAII guard for an exclusive advisory lock. Released on drop.
#[derive(Debug)]
pub(crate) struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquire the lock at `path`, polling until `timeout` elapses.
    pub(crate) fn acquire(path: &Path, timeout: Duration) -> Result<Self, ForemanError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ForemanError::io(parent, e))?;
        }

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)
                .map_err(|e| ForemanError::io(path, e))?;

            if file.try_lock_exclusive().is_ok() {
                return Ok(Self { file });
            }

            if start.elapsed() >= timeout {
                return Err(ForemanError::LockTimeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

pub(crate) fn lock_path_for(data_file: &Path) -> PathBuf {
    let mut name = data_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    data_file.with_file_name(name)
}

pub(crate) fn not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.lock");

        let lock = FileLock::acquire(&path, Duration::from_millis(50)).unwrap();
        drop(lock);

        // A second acquisition succeeds once the guard is gone.
        FileLock::acquire(&path, Duration::from_millis(50)).unwrap();
    }

    #[test]
    fn times_out_while_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.lock");

        let _held = FileLock::acquire(&path, Duration::from_millis(50)).unwrap();
        let err = FileLock::acquire(&path, Duration::from_millis(20)).unwrap_err();

        assert!(matches!(err, ForemanError::LockTimeout { path: p, .. } if p == path));
    }

    #[test]
    fn lock_path_is_a_sibling() {
        let p = lock_path_for(Path::new("/data/tasks.jsonl"));
        assert_eq!(p, Path::new("/data/tasks.jsonl.lock"));
    }
}
