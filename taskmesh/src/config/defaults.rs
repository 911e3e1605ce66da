//! Default values and clamping helpers for configuration.
//!
//! Single place where every tunable's default lives, so the parser, the
//! settings structs, and the CLI help text agree.

/// Default listen address for the manager's transport server.
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// Default listen port for the manager's transport server.
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Default number of event-loop worker threads.
pub const DEFAULT_IO_THREADS: usize = 1;

/// Upper bound on event-loop worker threads.
pub const MAX_IO_THREADS: usize = 512;

/// Default manager address a worker connects to.
pub const DEFAULT_MANAGER_HOST: &str = "127.0.0.1";

/// Default manager port a worker connects to.
pub const DEFAULT_MANAGER_PORT: u16 = 8080;

/// Default maximum frame body size (16 MiB). Headers announcing more than
/// this are a fatal framing error for the connection.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default timeout for the acceptor thread's timed accept, in milliseconds.
/// Bounds worst-case shutdown latency of the acceptor.
pub const DEFAULT_ACCEPT_TIMEOUT_MS: u64 = 500;

/// Default interval between maintenance passes (session reaping, closed
/// connection purging), in milliseconds.
pub const DEFAULT_MAINTENANCE_INTERVAL_MS: u64 = 2000;

/// Default event-loop poll interval, in milliseconds. The timed condvar wait
/// that backs the notification path.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Clamp an io_threads value into the supported `[1, MAX_IO_THREADS]` range.
pub fn clamp_io_threads(threads: usize) -> usize {
    threads.clamp(1, MAX_IO_THREADS)
}
