//! Logger trait definition.

use std::fmt::Arguments;

/// Log level for filtering messages.
///
/// The core emits exactly these four levels: per-task progress at `Debug`,
/// lifecycle milestones at `Info`, requeues and mismatches at `Warn`,
/// fatal I/O at `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Per-task progress and dispatch detail.
    Debug,
    /// Lifecycle milestones: startup, shutdown, connections.
    Info,
    /// Correlation mismatches, requeues, retries.
    Warn,
    /// Fatal I/O and protocol violations.
    Error,
}

impl LogLevel {
    /// Uppercase name used in formatted log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Leveled append-interface the core components log through.
///
/// Sessions, runtimes, the registry, and the server take an
/// `Arc<dyn Logger>` and never name a concrete backend. Implementations
/// must be `Send + Sync`; one instance is shared across the acceptor
/// thread, the event-loop threads, and control threads.
pub trait Logger: Send + Sync {
    /// Append a message at the given level.
    ///
    /// This is the one method implementations must provide; the
    /// `debug`/`info`/`warn`/`error` conveniences delegate to it.
    fn log(&self, level: LogLevel, args: Arguments<'_>);

    /// Append a debug-level message.
    fn debug(&self, args: Arguments<'_>) {
        self.log(LogLevel::Debug, args);
    }

    /// Append an info-level message.
    fn info(&self, args: Arguments<'_>) {
        self.log(LogLevel::Info, args);
    }

    /// Append a warning-level message.
    fn warn(&self, args: Arguments<'_>) {
        self.log(LogLevel::Warn, args);
    }

    /// Append an error-level message.
    fn error(&self, args: Arguments<'_>) {
        self.log(LogLevel::Error, args);
    }
}

/// Convenience macros for logging with format strings.
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_log_level_names() {
        assert_eq!(LogLevel::Debug.as_str(), "DEBUG");
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Warn.as_str(), "WARNING");
        assert_eq!(LogLevel::Error.as_str(), "ERROR");
    }
}
