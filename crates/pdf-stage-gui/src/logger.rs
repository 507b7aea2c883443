use chrono::{DateTime, Local};
use log::{Level, LevelFilter, Metadata, Record};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Keeps the most recent log records in memory for the log window
#[derive(Clone)]
pub struct AppLogger {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    max_entries: usize,
    level: LevelFilter,
}

impl AppLogger {
    pub fn new(max_entries: usize, level: LevelFilter) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(max_entries))),
            max_entries,
            level,
        }
    }

    /// Install as the global logger. The returned handle shares the buffer.
    pub fn init(self) -> Result<Self, log::SetLoggerError> {
        log::set_boxed_logger(Box::new(self.clone()))?;
        log::set_max_level(self.level);
        Ok(self)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Latest warning or info, for the status bar
    pub fn latest_message(&self) -> Option<String> {
        self.lock()
            .iter()
            .rev()
            .find(|entry| entry.level <= Level::Info)
            .map(|entry| entry.message.clone())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl log::Log for AppLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry {
            timestamp: Local::now(),
            level: record.level(),
            target: record.target().to_string(),
            message: format!("{}", record.args()),
        };

        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    fn flush(&self) {}
}
