use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogLevel {
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "WARN")]
    Warning,
    #[serde(rename = "ERR")]
    Severe,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Severe => write!(f, "ERR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

pub trait LogSink {
    fn record(&self, level: LogLevel, message: String);

    fn info(&self, message: String) {
        self.record(LogLevel::Info, message);
    }

    fn warn(&self, message: String) {
        self.record(LogLevel::Warning, message);
    }

    fn severe(&self, message: String) {
        self.record(LogLevel::Severe, message);
    }
}

#[derive(Debug, Default)]
pub struct RunLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn problems(&self) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.level != LogLevel::Info)
            .collect()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries
            .lock()
            .map(|guard| guard.iter().filter(|entry| entry.level == level).count())
            .unwrap_or(0)
    }
}

impl LogSink for RunLog {
    fn record(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warning => tracing::warn!("{message}"),
            LogLevel::Severe => tracing::error!("{message}"),
        }
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(LogEntry { level, message });
        }
    }
}
