//! Logging sink for storage plugins.
//!
//! Backends never log directly; they report through [`StorageLogger`] so the
//! host application decides where messages go. The production sink forwards
//! to `tracing`; tests install a capturing sink to assert on warnings.

use std::fmt;

/// Severity levels reported by storage plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Sink for messages emitted by storage plugins.
///
/// `plugin_id` identifies the reporting backend so interleaved output from
/// the SQLite store and its JSONL mirror stays attributable.
pub trait StorageLogger: Send + Sync {
    fn info(&self, plugin_id: &str, message: &str);
    fn warn(&self, plugin_id: &str, message: &str, error: Option<&dyn fmt::Display>);
    fn error(&self, plugin_id: &str, message: &str, error: Option<&dyn fmt::Display>);
}

/// Production sink: forwards to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl StorageLogger for TracingLogger {
    fn info(&self, plugin_id: &str, message: &str) {
        tracing::info!(plugin = plugin_id, "{message}");
    }

    fn warn(&self, plugin_id: &str, message: &str, error: Option<&dyn fmt::Display>) {
        match error {
            Some(e) => tracing::warn!(plugin = plugin_id, error = %e, "{message}"),
            None => tracing::warn!(plugin = plugin_id, "{message}"),
        }
    }

    fn error(&self, plugin_id: &str, message: &str, error: Option<&dyn fmt::Display>) {
        match error {
            Some(e) => tracing::error!(plugin = plugin_id, error = %e, "{message}"),
            None => tracing::error!(plugin = plugin_id, "{message}"),
        }
    }
}

/// Capturing sink for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: std::sync::Mutex<Vec<(LogLevel, String, String)>>,
}

#[cfg(test)]
impl MemoryLogger {
    fn push(&self, level: LogLevel, plugin_id: &str, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, plugin_id.to_string(), message.to_string()));
    }

    /// Messages recorded at the given level.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _, _)| *l == level)
            .map(|(_, _, m)| m.clone())
            .collect()
    }

    pub fn count_at(&self, level: LogLevel) -> usize {
        self.messages_at(level).len()
    }
}

#[cfg(test)]
impl StorageLogger for MemoryLogger {
    fn info(&self, plugin_id: &str, message: &str) {
        self.push(LogLevel::Info, plugin_id, message);
    }

    fn warn(&self, plugin_id: &str, message: &str, _error: Option<&dyn fmt::Display>) {
        self.push(LogLevel::Warn, plugin_id, message);
    }

    fn error(&self, plugin_id: &str, message: &str, _error: Option<&dyn fmt::Display>) {
        self.push(LogLevel::Error, plugin_id, message);
    }
}
