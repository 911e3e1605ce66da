//! In-memory line-buffer logger.

use crate::log::{LogLevel, Logger};
use parking_lot::Mutex;
use std::fmt::Arguments;

/// Logger that retains formatted lines in memory.
///
/// Backs log inspection surfaces (a dashboard paging through recent lines,
/// tests asserting that something was logged) without touching a global
/// subscriber. Lines below the configured minimum level are dropped at
/// append time; retrieval can filter further.
pub struct BufferLogger {
    min_level: LogLevel,
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl BufferLogger {
    /// Buffer everything from `Debug` up.
    pub fn new() -> Self {
        Self::with_min_level(LogLevel::Debug)
    }

    /// Buffer only messages at `min_level` or above.
    pub fn with_min_level(min_level: LogLevel) -> Self {
        Self {
            min_level,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Number of buffered lines.
    pub fn line_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// A page of formatted lines: skip `start`, take up to `count`, keeping
    /// only entries at `min_level` or above.
    ///
    /// Lines render as `[LEVEL] message`.
    pub fn lines(&self, start: usize, count: usize, min_level: LogLevel) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(level, _)| *level >= min_level)
            .skip(start)
            .take(count)
            .map(|(level, message)| format!("[{}] {}", level.as_str(), message))
            .collect()
    }

    /// True when any buffered line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|(_, message)| message.contains(needle))
    }

    /// Drop all buffered lines.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Logger for BufferLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        if level < self.min_level {
            return;
        }
        self.entries.lock().push((level, args.to_string()));
    }
}

impl Default for BufferLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{log_info, log_warn};

    #[test]
    fn test_buffers_formatted_lines() {
        let logger = BufferLogger::new();
        log_info!(logger, "session {} started", 3);
        log_warn!(logger, "requeue");

        assert_eq!(logger.line_count(), 2);
        let lines = logger.lines(0, usize::MAX, LogLevel::Debug);
        assert_eq!(lines[0], "[INFO] session 3 started");
        assert_eq!(lines[1], "[WARNING] requeue");
    }

    #[test]
    fn test_min_level_drops_at_append() {
        let logger = BufferLogger::with_min_level(LogLevel::Warn);
        logger.debug(format_args!("noise"));
        logger.info(format_args!("noise"));
        logger.error(format_args!("kept"));

        assert_eq!(logger.line_count(), 1);
        assert!(logger.contains("kept"));
        assert!(!logger.contains("noise"));
    }

    #[test]
    fn test_paged_retrieval_with_filter() {
        let logger = BufferLogger::new();
        for i in 0..5 {
            logger.debug(format_args!("d{i}"));
            logger.warn(format_args!("w{i}"));
        }

        let warnings = logger.lines(1, 2, LogLevel::Warn);
        assert_eq!(warnings, vec!["[WARNING] w1", "[WARNING] w2"]);

        let tail_past_end = logger.lines(10, 5, LogLevel::Warn);
        assert!(tail_past_end.is_empty());
    }

    #[test]
    fn test_clear() {
        let logger = BufferLogger::new();
        logger.info(format_args!("line"));
        logger.clear();
        assert_eq!(logger.line_count(), 0);
    }
}
