//! Event log: newline-delimited JSON records for bots and the manager.
//!
//! Every record is one JSON object on one line:
//!
//! ```text
//! {"action":"say","msg":"message sent to channel","channel":"#c","time":1700000000000}
//! {"action":"connect","msg":"connection not started: failed to connect","isError":true,"err":{...},"time":...}
//! ```
//!
//! Records go to an append-only file when one is configured, otherwise to
//! stdout (logs) / stderr (errors). An in-memory sink keeps records for
//! inspection.
//!
//! The sink never fails its caller: write errors are reported through
//! `tracing` and dropped. File sinks are shared per path, so every
//! `EventLog` appending to one file serializes on the same lock.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::utils;

/// Keys owned by the record itself; `extra` cannot override them.
const RESERVED_KEYS: [&str; 5] = ["action", "msg", "time", "isError", "err"];

/// Live file sinks by path.
static FILE_SINKS: OnceLock<Mutex<HashMap<PathBuf, Weak<Sink>>>> = OnceLock::new();

/// Where records end up.
enum Sink {
    Console,
    File { path: PathBuf, lock: Mutex<()> },
    Memory(Mutex<Vec<Value>>),
}

/// Shared, cheaply cloneable structured event sink.
#[derive(Clone)]
pub struct EventLog {
    sink: Arc<Sink>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.sink.as_ref() {
            Sink::Console => "console".to_string(),
            Sink::File { path, .. } => format!("file:{}", path.display()),
            Sink::Memory(_) => "memory".to_string(),
        };
        f.debug_struct("EventLog").field("sink", &kind).finish()
    }
}

impl EventLog {
    /// Records go to stdout / stderr.
    pub fn stdout() -> Self {
        Self {
            sink: Arc::new(Sink::Console),
        }
    }

    /// Records are appended to `path`. Parent directories are created.
    ///
    /// Two calls with the same path share one sink.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut sinks = lock(FILE_SINKS.get_or_init(Default::default));
        sinks.retain(|_, sink| sink.strong_count() > 0);
        if let Some(sink) = sinks.get(&path).and_then(Weak::upgrade) {
            return Self { sink };
        }

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %path.display(), error = %e, "failed to create log directory");
            }
        }
        let sink = Arc::new(Sink::File {
            path: path.clone(),
            lock: Mutex::new(()),
        });
        sinks.insert(path, Arc::downgrade(&sink));
        Self { sink }
    }

    /// Whether both handles write through the same sink.
    pub fn shares_sink_with(&self, other: &EventLog) -> bool {
        Arc::ptr_eq(&self.sink, &other.sink)
    }

    /// Records are kept in memory (see [`EventLog::records`]).
    pub fn memory() -> Self {
        Self {
            sink: Arc::new(Sink::Memory(Mutex::new(Vec::new()))),
        }
    }

    /// File sink for a configured path (resolved against the working
    /// directory), console sink when unset.
    pub fn from_config(log_file: Option<&str>) -> Self {
        match log_file {
            Some(path) if !path.trim().is_empty() => Self::file(utils::resolve_path(path)),
            _ => Self::stdout(),
        }
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self.sink.as_ref() {
            Sink::File { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Records captured by a memory sink. Empty for the other sinks.
    pub fn records(&self) -> Vec<Value> {
        match self.sink.as_ref() {
            Sink::Memory(records) => lock(records).clone(),
            _ => Vec::new(),
        }
    }

    /// Emit a regular event.
    pub fn log(&self, action: &str, msg: &str, extra: Value) {
        debug!(action, msg, "event");
        let record = build_record(action, msg, None, extra);
        self.write(record, false);
    }

    /// Emit an error event (`isError: true` plus the serialized error).
    pub fn error(&self, action: &str, msg: &str, err: &anyhow::Error, extra: Value) {
        warn!(action, msg, error = %err, "error event");
        let record = build_record(action, msg, Some(err), extra);
        self.write(record, true);
    }

    fn write(&self, record: Value, is_error: bool) {
        match self.sink.as_ref() {
            Sink::Console => {
                let line = record.to_string();
                if is_error {
                    eprintln!("{line}");
                } else {
                    println!("{line}");
                }
            }
            Sink::File { path, lock: file_lock } => {
                let mut line = match serde_json::to_string(&record) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize event record");
                        return;
                    }
                };
                line.push('\n');

                // One write per record keeps lines whole under O_APPEND.
                let _guard = lock(file_lock);
                let result = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .and_then(|mut file| file.write_all(line.as_bytes()));
                if let Err(e) = result {
                    warn!(path = %path.display(), error = %e, "failed to append event record");
                }
            }
            Sink::Memory(records) => lock(records).push(record),
        }
    }
}

/// Serialize an error and its cause chain.
pub fn serialize_error(err: &anyhow::Error) -> Value {
    let chain: Vec<Value> = err
        .chain()
        .skip(1)
        .map(|cause| Value::String(cause.to_string()))
        .collect();
    serde_json::json!({
        "message": err.to_string(),
        "chain": chain,
    })
}

fn build_record(action: &str, msg: &str, err: Option<&anyhow::Error>, extra: Value) -> Value {
    let mut record = Map::new();
    record.insert("action".into(), Value::String(action.to_string()));
    record.insert("msg".into(), Value::String(msg.to_string()));

    match extra {
        Value::Object(fields) => {
            for (key, value) in fields {
                if !RESERVED_KEYS.contains(&key.as_str()) {
                    record.insert(key, value);
                }
            }
        }
        Value::Null => {}
        other => {
            record.insert("data".into(), other);
        }
    }

    if let Some(err) = err {
        record.insert("isError".into(), Value::Bool(true));
        record.insert("err".into(), serialize_error(err));
    }

    record.insert("time".into(), Value::from(utils::now_millis()));
    Value::Object(record)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
