//! Line-delimited JSON primitives shared by both stores.
//!
//! Writes are durable before returning: each append flushes to disk inside
//! an exclusive advisory lock, so concurrent writers interleave whole lines.
//! Reads are lock-free full scans that skip lines which fail to parse;
//! partial corruption must not make the rest of the history unreadable.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use super::lock::{self, FileLock};
use crate::error::ForemanError;

/// Serialize `record` and append it as one line, lock-flush-release.
pub(crate) fn append_record<T: Serialize>(
    path: &Path,
    lock_timeout: Duration,
    record: &T,
) -> Result<(), ForemanError> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let _guard = FileLock::acquire(&lock::lock_path_for(path), lock_timeout)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ForemanError::io(path, e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| ForemanError::io(path, e))?;
    file.sync_all().map_err(|e| ForemanError::io(path, e))?;

    Ok(())
}

/// Scan every record in file order. A missing file reads as empty; a line
/// that fails to parse is skipped with a warning.
pub(crate) fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ForemanError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if lock::not_found(&e) => return Ok(Vec::new()),
        Err(e) => return Err(ForemanError::io(path, e)),
    };

    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ForemanError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    line = number + 1,
                    %err,
                    "skipping corrupt record"
                );
            }
        }
    }
    Ok(records)
}

/// Replace the whole file with `records`, one line each.
///
/// Goes through a sibling temp file and an atomic rename so a crash
/// mid-rewrite never leaves a truncated store behind. The caller holds the
/// store lock for the duration of its load-replace-rewrite sequence.
pub(crate) fn rewrite_records<T: Serialize>(
    path: &Path,
    records: &[T],
) -> Result<(), ForemanError> {
    let tmp = path.with_extension("jsonl.tmp");

    let mut file = File::create(&tmp).map_err(|e| ForemanError::io(&tmp, e))?;
    for record in records {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .map_err(|e| ForemanError::io(&tmp, e))?;
    }
    file.sync_all().map_err(|e| ForemanError::io(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| ForemanError::io(path, e))
}
