//! Worker control loop.
//!
//! Owns the runtime strategy and supervises it from a control thread:
//! connect with backoff, run the task loop, honor pause / disconnect /
//! shutdown requests. The status string and counters feed logs and any
//! out-of-process dashboard.

use super::processor::TaskProcessor;
use super::runtime::RuntimeMode;
use super::{AsyncRuntime, BlockingRuntime};
use crate::config::WorkerMode;
use crate::log::Logger;
use crate::{log_error, log_info, log_warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Backoff between failed connection attempts.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Idle wait between control-loop iterations.
const IDLE_WAIT: Duration = Duration::from_millis(500);

/// Supervises one worker runtime from a control thread.
pub struct WorkerController {
    logger: Arc<dyn Logger>,
    processor: TaskProcessor,
    runtime: Arc<dyn RuntimeMode>,
    mode: WorkerMode,
    host: String,
    port: u16,
    start_requested: AtomicBool,
    disconnect_requested: AtomicBool,
    shutdown_requested: AtomicBool,
    status: Mutex<String>,
}

impl WorkerController {
    /// Create a controller for the configured runtime strategy.
    ///
    /// The controller starts with a pending start request, so
    /// [`run`](Self::run) connects immediately.
    pub fn new(
        mode: WorkerMode,
        host: &str,
        port: u16,
        max_frame_size: usize,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let runtime: Arc<dyn RuntimeMode> = match mode {
            WorkerMode::Blocking => Arc::new(BlockingRuntime::new(
                host,
                port,
                max_frame_size,
                logger.clone(),
            )),
            WorkerMode::Async => Arc::new(AsyncRuntime::new(
                host,
                port,
                max_frame_size,
                logger.clone(),
            )),
        };

        Self {
            processor: TaskProcessor::new(logger.clone()),
            logger,
            runtime,
            mode,
            host: host.to_string(),
            port,
            start_requested: AtomicBool::new(true),
            disconnect_requested: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
            status: Mutex::new("Stopped".to_string()),
        }
    }

    /// Control loop; blocks the calling thread until shutdown.
    pub fn run(&self) {
        while !self.shutdown_requested.load(Ordering::Relaxed) {
            let need_connection = !self.runtime.is_connected();

            if self.start_requested.load(Ordering::Relaxed) && need_connection {
                self.set_status("Connecting");
                log_info!(
                    self.logger,
                    "Worker starting (mode={}), target={}:{}, completed={}",
                    self.mode.as_str(),
                    self.host,
                    self.port,
                    self.runtime.task_count()
                );

                if !self.runtime.connect() {
                    if self.shutdown_requested.load(Ordering::Relaxed) {
                        log_info!(
                            self.logger,
                            "WorkerController: shutdown requested during connect; exiting"
                        );
                        break;
                    }
                    log_warn!(
                        self.logger,
                        "WorkerController: connect failed; retrying in {:?}",
                        RECONNECT_BACKOFF
                    );
                    std::thread::sleep(RECONNECT_BACKOFF);
                    continue;
                }

                self.set_status("Connected");
                log_info!(
                    self.logger,
                    "WorkerController: connected to manager from {}",
                    self.runtime.local_endpoint()
                );
            }

            if self.start_requested.load(Ordering::Relaxed) && self.runtime.is_connected() {
                log_info!(self.logger, "WorkerController: starting task loop");
                // Consume the start request for this run.
                self.start_requested.store(false, Ordering::Relaxed);
                self.set_status("Running");

                let paused_cleanly = self.runtime.run_loop(&self.processor);
                if paused_cleanly {
                    self.set_status("Paused");
                    log_info!(
                        self.logger,
                        "WorkerController: paused; awaiting next start request"
                    );
                } else if !self.shutdown_requested.load(Ordering::Relaxed) {
                    log_error!(self.logger, "WorkerController: task loop ended on error");
                    // Reconnect on the next iteration.
                    self.start_requested.store(true, Ordering::Relaxed);
                }
            }

            if self.disconnect_requested.swap(false, Ordering::Relaxed) {
                log_info!(self.logger, "WorkerController: disconnect requested");
                self.runtime.disconnect();
                self.set_status("Disconnected");
                continue;
            }

            std::thread::sleep(IDLE_WAIT);
        }

        log_info!(self.logger, "WorkerController: shutdown in progress");
        self.runtime.release();
        self.set_status("Stopped");
    }

    /// Request a (re)start of the task loop.
    pub fn start_runtime(&self) {
        self.start_requested.store(true, Ordering::Relaxed);
    }

    /// Ask the runtime to pause after its current task.
    pub fn pause_runtime(&self) {
        self.runtime.pause();
    }

    /// Close the connection; the loop exits and waits for the next start.
    pub fn disconnect_runtime(&self) {
        self.disconnect_requested.store(true, Ordering::Relaxed);
        self.runtime.disconnect();
    }

    /// Stop everything and let [`run`](Self::run) return.
    pub fn shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
        self.disconnect_requested.store(true, Ordering::Relaxed);
        self.runtime.shutdown();
    }

    /// Current connection status string.
    pub fn connection_status(&self) -> String {
        self.status.lock().clone()
    }

    /// Tasks completed so far.
    pub fn task_count(&self) -> u64 {
        self.runtime.task_count()
    }

    /// Human-readable bytes written to the manager.
    pub fn bytes_sent_display(&self) -> String {
        format_bytes(self.runtime.bytes_sent())
    }

    /// Human-readable bytes read from the manager.
    pub fn bytes_received_display(&self) -> String {
        format_bytes(self.runtime.bytes_received())
    }

    fn set_status(&self, status: &str) {
        *self.status.lock() = status.to_string();
    }
}

/// Format a byte count in powers of 1024 so log output stays legible.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }

    if value >= 100.0 || unit == 0 {
        format!("{:.0}{}", value, UNITS[unit])
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0KB");
        assert_eq!(format_bytes(150 * 1024), "150KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0GB");
    }

    #[test]
    fn test_controller_shutdown_before_run() {
        let controller = WorkerController::new(
            WorkerMode::Blocking,
            "127.0.0.1",
            1,
            1024,
            Arc::new(NoOpLogger),
        );
        controller.shutdown();
        // run() observes the shutdown flag immediately and returns.
        controller.run();
        assert_eq!(controller.connection_status(), "Stopped");
        assert_eq!(controller.task_count(), 0);
    }
}
