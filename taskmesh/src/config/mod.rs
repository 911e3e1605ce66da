//! Configuration types for TaskMesh components.
//!
//! Settings are grouped per concern, one struct per `[section]` of the INI
//! config file at `~/.taskmesh/config.ini`. Use [`ConfigFile::load()`] to
//! load settings; missing files and missing keys fall back to defaults, and
//! CLI arguments override file values in the binary crate.
//!
//! # Example
//!
//! ```
//! use taskmesh::config::ConfigFile;
//!
//! let config = ConfigFile::load().unwrap_or_default();
//! assert!(config.transport.io_threads >= 1);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;

pub use defaults::{
    clamp_io_threads, DEFAULT_ACCEPT_TIMEOUT_MS, DEFAULT_IO_THREADS, DEFAULT_LISTEN_HOST,
    DEFAULT_LISTEN_PORT, DEFAULT_MAINTENANCE_INTERVAL_MS, DEFAULT_MANAGER_HOST,
    DEFAULT_MANAGER_PORT, DEFAULT_MAX_FRAME_SIZE, DEFAULT_POLL_INTERVAL_MS, MAX_IO_THREADS,
};
pub use file::{config_directory, config_file_path, ConfigError};
pub use settings::{ConfigFile, ProtocolSettings, TransportSettings, WorkerMode, WorkerSettings};
pub use size::{format_size, parse_size, SizeParseError};
