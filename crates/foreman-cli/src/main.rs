//! foreman: command-line front end for the task orchestration substrate.
//!
//! The entry point owns the store lifecycle: it builds a `StorePaths` from
//! `FOREMAN_DATA_DIR` (default `logs/`), constructs the stores, and hands
//! them to whichever command needs them.

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use foreman_core::handlers::{FsHandler, ShellHandler};
use foreman_core::session::session_tag;
use foreman_core::{
    EventLog, ForemanError, HandlerRegistry, SessionView, StorePaths, TaskFilter, TaskStatus,
    TaskStore, TaskType, Worker,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: foreman <command> [options]

commands:
  add <type> <payload-json> [--title T] [--tag T]... [--session S]
  run-next
  list [--status S] [--type T] [--tag T] [--limit N]
  show <task-id>
  events [--limit N]
  session <id> [--limit N]
  sessions
";

enum CliError {
    Usage(String),
    Runtime(String),
}

impl From<ForemanError> for CliError {
    fn from(err: ForemanError) -> Self {
        Self::Runtime(err.to_string())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}\n{USAGE}");
            ExitCode::from(1)
        }
        Err(CliError::Runtime(msg)) => {
            eprintln!("error: {msg}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Vec<String>) -> Result<(), CliError> {
    let Some((command, rest)) = args.split_first() else {
        return Err(CliError::Usage("missing command".into()));
    };
    let opts = Opts::parse(rest)?;

    let data_dir = std::env::var("FOREMAN_DATA_DIR").unwrap_or_else(|_| "logs".to_string());
    let paths = StorePaths::new(data_dir);
    paths.ensure()?;
    let tasks = Arc::new(TaskStore::new(&paths));
    let events = Arc::new(EventLog::new(&paths));

    match command.as_str() {
        "add" => add(&tasks, &opts),
        "run-next" => run_next(tasks, events).await,
        "list" => list(&tasks, &opts),
        "show" => show(&tasks, &events, &opts),
        "events" => tail_events(&events, &opts),
        "session" => session(&events, &opts),
        "sessions" => sessions(&tasks, &events),
        other => Err(CliError::Usage(format!("unknown command '{other}'"))),
    }
}

fn add(tasks: &TaskStore, opts: &Opts) -> Result<(), CliError> {
    let [task_type, payload] = opts.positional()?;
    let payload: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| CliError::Usage(format!("payload is not valid JSON: {e}")))?;

    let mut tags = opts.values("tag");
    if let Some(session_id) = opts.value("session") {
        tags.push(session_tag(session_id));
    }

    let task = tasks.create(
        TaskType::new(task_type.as_str()),
        payload,
        opts.value("title").map(str::to_string),
        tags,
    )?;
    println!("created {} ({})", task.id, task.task_type);
    Ok(())
}

async fn run_next(tasks: Arc<TaskStore>, events: Arc<EventLog>) -> Result<(), CliError> {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(ShellHandler::new(Arc::clone(&events))))?;
    registry.register(Arc::new(FsHandler::new(Arc::clone(&events))))?;

    let worker = Worker::new(tasks, Arc::clone(&events), Arc::new(registry));
    match worker.run_next().await? {
        None => println!("No pending tasks."),
        Some(task) => {
            println!("{} finished as {}", task.id, task.status);
            match task.status {
                TaskStatus::Done => {
                    let result = task.result.unwrap_or(serde_json::Value::Null);
                    println!("{}", pretty(&result)?);
                }
                TaskStatus::Failed => {
                    println!("error: {}", task.error.unwrap_or_default());
                }
                // run_next only returns terminal tasks.
                TaskStatus::Pending | TaskStatus::Running => {}
            }
        }
    }
    Ok(())
}

fn list(tasks: &TaskStore, opts: &Opts) -> Result<(), CliError> {
    let filter = TaskFilter {
        status: opts.value("status").map(parse_status).transpose()?,
        task_type: opts.value("type").map(TaskType::new),
        tag: opts.value("tag").map(str::to_string),
        limit: Some(opts.limit(50)?),
    };

    for task in tasks.filtered(&filter)? {
        let title = task.title.as_deref().unwrap_or("-");
        println!(
            "{}  {:<8}{:<14}{}",
            task.id,
            task.status.as_str(),
            task.task_type,
            title
        );
    }
    Ok(())
}

fn show(tasks: &TaskStore, events: &EventLog, opts: &Opts) -> Result<(), CliError> {
    let [query] = opts.positional()?;
    let needle = query.strip_prefix("task-").unwrap_or(query);

    let matches: Vec<_> = tasks
        .all()?
        .into_iter()
        .filter(|t| t.id.as_ulid().to_string().starts_with(needle))
        .collect();

    let task = match matches.as_slice() {
        [] => return Err(CliError::Runtime("Task not found".into())),
        [task] => task,
        many => {
            return Err(CliError::Runtime(format!(
                "Ambiguous ID - found {} matches",
                many.len()
            )));
        }
    };

    let record = serde_json::to_value(task).map_err(|e| CliError::Runtime(e.to_string()))?;
    println!("{}", pretty(&record)?);
    println!();
    println!("{}", events.render_context(task.id, 20)?);
    Ok(())
}

fn tail_events(events: &EventLog, opts: &Opts) -> Result<(), CliError> {
    for event in events.recent(opts.limit(20)?)? {
        let data =
            serde_json::to_string(&event.data).map_err(|e| CliError::Runtime(e.to_string()))?;
        println!(
            "[{}] {}: {}",
            event.timestamp.format("%H:%M:%S"),
            event.event_type,
            data
        );
    }
    Ok(())
}

fn session(events: &EventLog, opts: &Opts) -> Result<(), CliError> {
    let [session_id] = opts.positional()?;
    let view = SessionView::new(events);

    let limit = match opts.value("limit") {
        Some(_) => Some(opts.limit(0)?),
        None => None,
    };
    for message in view.messages(session_id, limit)? {
        println!("{}: {}", message.role, message.content);
    }
    if let Some(summary) = view.summary(session_id)? {
        println!("\nsummary: {summary}");
    }
    Ok(())
}

fn sessions(tasks: &TaskStore, events: &EventLog) -> Result<(), CliError> {
    let view = SessionView::new(events);
    for id in view.list_sessions(tasks)? {
        println!("{id}");
    }
    Ok(())
}

fn parse_status(s: &str) -> Result<TaskStatus, CliError> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "running" => Ok(TaskStatus::Running),
        "done" => Ok(TaskStatus::Done),
        "failed" => Ok(TaskStatus::Failed),
        other => Err(CliError::Usage(format!(
            "unknown status '{other}' (expected pending/running/done/failed)"
        ))),
    }
}

fn pretty(value: &serde_json::Value) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Runtime(e.to_string()))
}

/// Tiny option parser: positionals plus `--flag value` pairs, flags
/// repeatable.
struct Opts {
    positional: Vec<String>,
    flags: HashMap<String, Vec<String>>,
}

impl Opts {
    fn parse(args: &[String]) -> Result<Self, CliError> {
        let mut positional = Vec::new();
        let mut flags: HashMap<String, Vec<String>> = HashMap::new();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if let Some(name) = arg.strip_prefix("--") {
                let value = iter
                    .next()
                    .ok_or_else(|| CliError::Usage(format!("--{name} needs a value")))?;
                flags.entry(name.to_string()).or_default().push(value.clone());
            } else {
                positional.push(arg.clone());
            }
        }
        Ok(Self { positional, flags })
    }

    fn positional<const N: usize>(&self) -> Result<[&String; N], CliError> {
        let slice: Vec<&String> = self.positional.iter().collect();
        slice
            .try_into()
            .map_err(|_| CliError::Usage(format!("expected {N} argument(s)")))
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.flags
            .get(name)
            .and_then(|v| v.last())
            .map(String::as_str)
    }

    fn values(&self, name: &str) -> Vec<String> {
        self.flags.get(name).cloned().unwrap_or_default()
    }

    fn limit(&self, default: usize) -> Result<usize, CliError> {
        match self.value("limit") {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| CliError::Usage(format!("--limit '{raw}' is not a number"))),
        }
    }
}
