//! Filesystem operations handler.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use super::truncate_output;
use crate::domain::{EventType, Task, TaskId};
use crate::error::ForemanError;
use crate::runtime::TaskHandler;
use crate::store::EventLog;

/// Dispatches `payload.operation` (read / write / append / list) against
/// the local filesystem.
///
/// Caught I/O problems (missing file, permission) come back as
/// `success: false` results; only a malformed payload fails the task.
pub struct FsHandler {
    events: Arc<EventLog>,
}

impl FsHandler {
    pub fn new(events: Arc<EventLog>) -> Self {
        Self { events }
    }

    fn log_call(
        &self,
        tool: &str,
        data: Value,
        task_id: TaskId,
    ) -> Result<(), ForemanError> {
        self.events.append(EventType::ToolCalled, data_with_tool(tool, data), Some(task_id))?;
        Ok(())
    }

    fn log_result(
        &self,
        tool: &str,
        success: bool,
        task_id: TaskId,
    ) -> Result<(), ForemanError> {
        self.events.append(
            EventType::ToolResult,
            json!({"tool": tool, "success": success}),
            Some(task_id),
        )?;
        Ok(())
    }

    async fn read(&self, filepath: &str, task_id: TaskId) -> Result<Value, ForemanError> {
        self.log_call("read_file", json!({"filepath": filepath}), task_id)?;

        let outcome = match tokio::fs::read_to_string(filepath).await {
            Ok(content) => json!({
                "success": true,
                "content": truncate_output(&content),
                "error": Value::Null,
            }),
            Err(err) => json!({
                "success": false,
                "content": "",
                "error": read_error(filepath, &err),
            }),
        };
        self.log_result("read_file", outcome["success"] == true, task_id)?;
        Ok(outcome)
    }

    async fn write(
        &self,
        filepath: &str,
        content: &str,
        append: bool,
        task_id: TaskId,
    ) -> Result<Value, ForemanError> {
        let tool = if append { "append_file" } else { "write_file" };
        self.log_call(
            tool,
            json!({"filepath": filepath, "content_length": content.len()}),
            task_id,
        )?;

        let outcome = match write_file(filepath, content, append).await {
            Ok(()) => json!({"success": true, "error": Value::Null}),
            Err(err) => json!({"success": false, "error": err.to_string()}),
        };
        self.log_result(tool, outcome["success"] == true, task_id)?;
        Ok(outcome)
    }

    async fn list(&self, dirpath: &str, task_id: TaskId) -> Result<Value, ForemanError> {
        self.log_call("list_directory", json!({"dirpath": dirpath}), task_id)?;

        let outcome = match list_directory(dirpath).await {
            Ok((files, directories)) => json!({
                "success": true,
                "files": files,
                "directories": directories,
                "error": Value::Null,
            }),
            Err(err) => json!({
                "success": false,
                "files": [],
                "directories": [],
                "error": err,
            }),
        };
        self.log_result("list_directory", outcome["success"] == true, task_id)?;
        Ok(outcome)
    }
}

#[async_trait]
impl TaskHandler for FsHandler {
    fn task_type(&self) -> &str {
        "filesystem"
    }

    async fn run(&self, task: &Task) -> Result<Value, String> {
        let operation = task
            .payload
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| "filesystem task requires 'operation' in payload".to_string())?;

        let outcome = match operation {
            "read" => {
                let filepath = require(task, "filepath", "read")?;
                self.read(filepath, task.id).await
            }
            "write" | "append" => {
                let filepath = require(task, "filepath", operation)?;
                let content = task
                    .payload
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                self.write(filepath, content, operation == "append", task.id)
                    .await
            }
            "list" => {
                let dirpath = require(task, "dirpath", "list")?;
                self.list(dirpath, task.id).await
            }
            other => return Err(format!("Unknown filesystem operation: {other}")),
        };

        outcome.map_err(|e| e.to_string())
    }
}

fn data_with_tool(tool: &str, mut data: Value) -> Value {
    if let Some(map) = data.as_object_mut() {
        map.insert("tool".into(), Value::String(tool.to_string()));
    }
    data
}

fn require<'t>(task: &'t Task, field: &str, operation: &str) -> Result<&'t str, String> {
    task.payload
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{operation} operation requires '{field}'"))
}

fn read_error(filepath: &str, err: &std::io::Error) -> String {
    if err.kind() == std::io::ErrorKind::NotFound {
        format!("File not found: {filepath}")
    } else {
        err.to_string()
    }
}

async fn write_file(filepath: &str, content: &str, append: bool) -> std::io::Result<()> {
    if let Some(parent) = Path::new(filepath).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(!append)
        .append(append)
        .open(filepath)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

async fn list_directory(dirpath: &str) -> Result<(Vec<String>, Vec<String>), String> {
    let path = Path::new(dirpath);
    if !path.exists() {
        return Err(format!("Directory not found: {dirpath}"));
    }
    if !path.is_dir() {
        return Err(format!("Not a directory: {dirpath}"));
    }

    let mut files = Vec::new();
    let mut directories = Vec::new();
    let mut entries = tokio::fs::read_dir(path).await.map_err(|e| e.to_string())?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| e.to_string())? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().await.map_err(|e| e.to_string())?;
        if file_type.is_dir() {
            directories.push(name);
        } else {
            files.push(name);
        }
    }
    files.sort();
    directories.sort();
    Ok((files, directories))
}
