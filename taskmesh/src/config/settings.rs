//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use super::defaults::*;
use std::str::FromStr;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Manager-side transport server settings
    pub transport: TransportSettings,
    /// Worker-side connection settings
    pub worker: WorkerSettings,
    /// Wire protocol and timing settings shared by both sides
    pub protocol: ProtocolSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            transport: TransportSettings::default(),
            worker: WorkerSettings::default(),
            protocol: ProtocolSettings::default(),
        }
    }
}

/// Transport server configuration (`[transport]`).
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Address the manager listens on.
    pub listen_host: String,
    /// Port the manager listens on.
    pub listen_port: u16,
    /// Number of event-loop worker threads, clamped to `[1, 512]`.
    pub io_threads: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            listen_host: DEFAULT_LISTEN_HOST.to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
            io_threads: DEFAULT_IO_THREADS,
        }
    }
}

/// Worker configuration (`[worker]`).
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Runtime strategy: blocking reads on a dedicated thread, or the
    /// coroutine adapter driven by an event loop.
    pub mode: WorkerMode,
    /// Manager address to connect to.
    pub manager_host: String,
    /// Manager port to connect to.
    pub manager_port: u16,
    /// Reserved: the worker dashboard ships separately from the core.
    pub ui: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            mode: WorkerMode::Blocking,
            manager_host: DEFAULT_MANAGER_HOST.to_string(),
            manager_port: DEFAULT_MANAGER_PORT,
            ui: false,
        }
    }
}

/// Worker runtime strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerMode {
    /// Synchronous read/write loop on a dedicated thread.
    #[default]
    Blocking,
    /// Same loop driven as a future on an event loop.
    Async,
}

impl WorkerMode {
    /// Short lowercase name, as written in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerMode::Blocking => "blocking",
            WorkerMode::Async => "async",
        }
    }
}

impl FromStr for WorkerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blocking" => Ok(WorkerMode::Blocking),
            "async" => Ok(WorkerMode::Async),
            other => Err(format!("unknown worker mode '{other}'")),
        }
    }
}

/// Protocol and timing configuration (`[protocol]`).
#[derive(Debug, Clone)]
pub struct ProtocolSettings {
    /// Maximum frame body size in bytes. Enforced by every reader.
    pub max_frame_size: usize,
    /// Timed-accept timeout for the acceptor thread, in milliseconds.
    pub accept_timeout_ms: u64,
    /// Interval between maintenance passes, in milliseconds.
    pub maintenance_interval_ms: u64,
    /// Event-loop poll interval, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            accept_timeout_ms: DEFAULT_ACCEPT_TIMEOUT_MS,
            maintenance_interval_ms: DEFAULT_MAINTENANCE_INTERVAL_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_defaults() {
        let t = TransportSettings::default();
        assert_eq!(t.listen_host, "0.0.0.0");
        assert_eq!(t.listen_port, 8080);
        assert_eq!(t.io_threads, 1);
    }

    #[test]
    fn test_worker_defaults() {
        let w = WorkerSettings::default();
        assert_eq!(w.mode, WorkerMode::Blocking);
        assert_eq!(w.manager_host, "127.0.0.1");
        assert_eq!(w.manager_port, 8080);
        assert!(!w.ui);
    }

    #[test]
    fn test_worker_mode_parse() {
        assert_eq!("blocking".parse::<WorkerMode>().unwrap(), WorkerMode::Blocking);
        assert_eq!("Async".parse::<WorkerMode>().unwrap(), WorkerMode::Async);
        assert!("threaded".parse::<WorkerMode>().is_err());
    }

    #[test]
    fn test_worker_mode_roundtrip() {
        for mode in [WorkerMode::Blocking, WorkerMode::Async] {
            assert_eq!(mode.as_str().parse::<WorkerMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_protocol_defaults() {
        let p = ProtocolSettings::default();
        assert_eq!(p.max_frame_size, 16 * 1024 * 1024);
        assert_eq!(p.accept_timeout_ms, 500);
        assert_eq!(p.maintenance_interval_ms, 2000);
        assert_eq!(p.poll_interval_ms, 10);
    }
}
