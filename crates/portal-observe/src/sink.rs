//! Console-equivalent destinations for accepted log entries.

use std::sync::{Mutex, PoisonError};

use portal_core::Severity;

use crate::entry::LogEntry;

/// Destination for formatted log entries.
pub trait LogSink: Send + Sync {
    fn write(&self, entry: &LogEntry);
}

/// Writes each entry as a `tracing` event at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, entry: &LogEntry) {
        let line = entry.format_line();
        match entry.severity() {
            Severity::Debug => tracing::debug!(target: "portal", "{}", line),
            Severity::Info => tracing::info!(target: "portal", "{}", line),
            Severity::Warn => tracing::warn!(target: "portal", "{}", line),
            Severity::Error => tracing::error!(target: "portal", "{}", line),
        }
    }
}

/// Keeps every written entry in memory. Used by tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries written at exactly `severity`.
    pub fn at(&self, severity: Severity) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.severity() == severity)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: &LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LogOptions;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.write(&LogEntry::new(Severity::Info, "one", &LogOptions::new()));
        sink.write(&LogEntry::new(Severity::Error, "two", &LogOptions::new()));
        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message(), "one");
        assert_eq!(entries[1].message(), "two");
        assert_eq!(sink.at(Severity::Error).len(), 1);
    }

    #[test]
    fn test_tracing_sink_does_not_panic_without_subscriber() {
        TracingSink.write(&LogEntry::new(Severity::Warn, "no subscriber", &LogOptions::new()));
    }
}
