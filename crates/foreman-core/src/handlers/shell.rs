//! Shell command handler.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use super::truncate_output;
use crate::domain::{EventType, Task};
use crate::runtime::TaskHandler;
use crate::store::EventLog;

/// Hard cap on command runtime.
const SHELL_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs `payload.command` through `sh -c`, capturing exit code and output.
///
/// A non-zero exit is not a task failure: the task completes with
/// `success: false` in its result, mirroring how an operator would read the
/// command's own outcome. Only a malformed payload fails the task.
pub struct ShellHandler {
    events: Arc<EventLog>,
    timeout: Duration,
}

impl ShellHandler {
    pub fn new(events: Arc<EventLog>) -> Self {
        Self::with_timeout(events, SHELL_TIMEOUT)
    }

    pub fn with_timeout(events: Arc<EventLog>, timeout: Duration) -> Self {
        Self { events, timeout }
    }
}

#[async_trait]
impl TaskHandler for ShellHandler {
    fn task_type(&self) -> &str {
        "shell"
    }

    async fn run(&self, task: &Task) -> Result<Value, String> {
        let command = task
            .payload
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| "shell task requires 'command' in payload".to_string())?;
        let cwd = task.payload.get("cwd").and_then(Value::as_str);

        self.events
            .append(
                EventType::ToolCalled,
                json!({"tool": "run_shell_command", "command": command, "cwd": cwd}),
                Some(task.id),
            )
            .map_err(|e| e.to_string())?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let (success, exit_code, stdout, stderr) =
            match tokio::time::timeout(self.timeout, cmd.output()).await {
                Ok(Ok(output)) => (
                    output.status.success(),
                    output.status.code().unwrap_or(-1),
                    truncate_output(&String::from_utf8_lossy(&output.stdout)),
                    truncate_output(&String::from_utf8_lossy(&output.stderr)),
                ),
                Ok(Err(err)) => (false, -1, String::new(), format!("failed to spawn: {err}")),
                Err(_) => (
                    false,
                    -1,
                    String::new(),
                    format!("Command timed out after {} seconds", self.timeout.as_secs()),
                ),
            };

        self.events
            .append(
                EventType::ToolResult,
                json!({
                    "tool": "run_shell_command",
                    "success": success,
                    "exit_code": exit_code,
                    "stdout_length": stdout.len(),
                    "stderr_length": stderr.len(),
                }),
                Some(task.id),
            )
            .map_err(|e| e.to_string())?;

        Ok(json!({
            "success": success,
            "exit_code": exit_code,
            "output": stdout,
            "error": if success { Value::Null } else { Value::String(stderr) },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventType, TaskType};
    use crate::store::{StorePaths, TaskStore};
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Arc<EventLog>, TaskStore) {
        let dir = TempDir::new().unwrap();
        let paths = StorePaths::new(dir.path());
        let log = Arc::new(EventLog::new(&paths));
        let tasks = TaskStore::new(&paths);
        (dir, log, tasks)
    }

    fn shell_task(tasks: &TaskStore, payload: Value) -> Task {
        tasks
            .create(TaskType::new("shell"), payload, None, vec![])
            .unwrap()
    }

    #[tokio::test]
    async fn echo_round_trip() {
        let (_dir, log, tasks) = fixture();
        let handler = ShellHandler::new(Arc::clone(&log));
        let task = shell_task(&tasks, json!({"command": "echo hi"}));

        let result = handler.run(&task).await.unwrap();

        assert_eq!(result["success"], true);
        assert_eq!(result["exit_code"], 0);
        assert_eq!(result["output"], "hi\n");
        assert!(result["error"].is_null());

        let types: Vec<EventType> = log
            .for_task(task.id)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(types, vec![EventType::ToolCalled, EventType::ToolResult]);
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_completed_result() {
        let (_dir, log, tasks) = fixture();
        let handler = ShellHandler::new(log);
        let task = shell_task(&tasks, json!({"command": "echo oops >&2; exit 3"}));

        let result = handler.run(&task).await.unwrap();

        assert_eq!(result["success"], false);
        assert_eq!(result["exit_code"], 3);
        assert_eq!(result["error"], "oops\n");
    }

    #[tokio::test]
    async fn cwd_is_honored() {
        let (dir, log, tasks) = fixture();
        let handler = ShellHandler::new(log);
        let task = shell_task(
            &tasks,
            json!({"command": "pwd", "cwd": dir.path().to_str().unwrap()}),
        );

        let result = handler.run(&task).await.unwrap();
        let output = result["output"].as_str().unwrap();
        assert!(output.trim_end().ends_with(dir.path().file_name().unwrap().to_str().unwrap()));
    }

    #[tokio::test]
    async fn missing_command_fails_the_task() {
        let (_dir, log, tasks) = fixture();
        let handler = ShellHandler::new(log);
        let task = shell_task(&tasks, json!({}));

        let err = handler.run(&task).await.unwrap_err();
        assert!(err.contains("requires 'command'"));
    }

    #[tokio::test]
    async fn long_output_is_truncated() {
        let (_dir, log, tasks) = fixture();
        let handler = ShellHandler::new(log);
        let task = shell_task(
            &tasks,
            json!({"command": "head -c 20000 /dev/zero | tr '\\0' 'a'"}),
        );

        let result = handler.run(&task).await.unwrap();
        let output = result["output"].as_str().unwrap();
        assert!(output.ends_with("... [truncated]"));
        assert!(output.len() < 20_000);
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let (_dir, log, tasks) = fixture();
        let handler = ShellHandler::with_timeout(log, Duration::from_millis(50));
        let task = shell_task(&tasks, json!({"command": "sleep 5"}));

        let result = handler.run(&task).await.unwrap();
        assert_eq!(result["success"], false);
        assert!(result["error"].as_str().unwrap().contains("timed out"));
    }
}
