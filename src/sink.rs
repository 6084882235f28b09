use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a user-facing log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Plain output, e.g. streamed partial results.
    Log,
    /// Typewriter-style assistant output: busy warnings and echoed results.
    Warning,
}

/// A typed entry delivered to the terminal logger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: LogKind,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn log(value: impl Into<String>) -> Self {
        Self {
            kind: LogKind::Log,
            value: value.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn warning(value: impl Into<String>) -> Self {
        Self {
            kind: LogKind::Warning,
            value: value.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Terminal the user reads assistant output from.
pub trait Logger: Send + Sync {
    fn log(&self, entry: LogEntry);
}

/// Chat composer that receives the message describing a staged request.
pub trait Composer: Send + Sync {
    fn send(&self, message: &str);
}

/// Routes entries into `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, entry: LogEntry) {
        match entry.kind {
            LogKind::Log => tracing::info!(target: "assist_relay::terminal", "{}", entry.value),
            LogKind::Warning => tracing::warn!(target: "assist_relay::terminal", "{}", entry.value),
        }
    }
}

/// Writes entries to stdout/stderr for the command-line front end.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalLogger;

impl Logger for TerminalLogger {
    fn log(&self, entry: LogEntry) {
        match entry.kind {
            // Streamed chunks arrive without separators
            LogKind::Log => {
                use std::io::Write;
                print!("{}", entry.value);
                let _ = std::io::stdout().flush();
            }
            LogKind::Warning => eprintln!("assist-relay: {}", entry.value),
        }
    }
}

/// Prints composer messages as if typed into the chat box.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleComposer;

impl Composer for ConsoleComposer {
    fn send(&self, message: &str) {
        eprintln!("> {}", message);
    }
}
