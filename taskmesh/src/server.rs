//! Manager-side transport server.
//!
//! Boots the event loop, listens for worker connections on a dedicated
//! acceptor thread, wires accepted sockets into the session manager, and
//! runs periodic maintenance (session reaping, closed-connection purging).
//!
//! Accept loop design: a timed blocking accept (500 ms default) leans on
//! the TCP stack's own sleep/wake behavior instead of hand-rolled polling.
//! Idle CPU stays near zero, the logic here stays simple, and shutdown
//! latency is bounded by the timeout. Transient wake-ups come back as
//! "no client, no error" so the loop can re-check its running flag without
//! noisy logs.

use crate::config::ConfigFile;
use crate::io::{IoContext, WorkGuard};
use crate::log::Logger;
use crate::message::Task;
use crate::net::{NetError, SocketAdapter, TcpAcceptor};
use crate::session::SessionManager;
use crate::{log_debug, log_error, log_info};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Server tunables, usually derived from [`ConfigFile`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_host: String,
    pub listen_port: u16,
    pub io_threads: usize,
    pub max_frame_size: usize,
    pub accept_timeout: Duration,
    pub maintenance_interval: Duration,
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ConfigFile::default().into()
    }
}

impl From<ConfigFile> for ServerConfig {
    fn from(config: ConfigFile) -> Self {
        Self {
            listen_host: config.transport.listen_host,
            listen_port: config.transport.listen_port,
            io_threads: config.transport.io_threads,
            max_frame_size: config.protocol.max_frame_size,
            accept_timeout: Duration::from_millis(config.protocol.accept_timeout_ms),
            maintenance_interval: Duration::from_millis(config.protocol.maintenance_interval_ms),
            poll_interval: Duration::from_millis(config.protocol.poll_interval_ms),
        }
    }
}

/// Accept loop, session set, and event loop for one manager process.
pub struct TransportServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    config: ServerConfig,
    logger: Arc<dyn Logger>,
    context: Arc<IoContext>,
    session_manager: SessionManager,
    running: AtomicBool,
    acceptor: Mutex<Option<JoinHandle<()>>>,
    listener: Mutex<Option<Arc<TcpAcceptor>>>,
    connections: Mutex<Vec<SocketAdapter>>,
    work_guard: Mutex<Option<WorkGuard>>,
    last_maintenance: Mutex<Instant>,
}

impl TransportServer {
    pub fn new(config: ServerConfig, logger: Arc<dyn Logger>) -> Self {
        let context = Arc::new(IoContext::with_poll_interval(
            logger.clone(),
            config.poll_interval,
        ));
        let session_manager =
            SessionManager::new(logger.clone(), context.clone(), config.max_frame_size);

        Self {
            inner: Arc::new(ServerInner {
                config,
                logger,
                context,
                session_manager,
                running: AtomicBool::new(false),
                acceptor: Mutex::new(None),
                listener: Mutex::new(None),
                connections: Mutex::new(Vec::new()),
                work_guard: Mutex::new(None),
                last_maintenance: Mutex::new(Instant::now()),
            }),
        }
    }

    /// Start the event loop, bind the listener, and spawn the acceptor.
    pub fn start(&self) -> Result<(), NetError> {
        let inner = &self.inner;
        if inner.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        inner.context.start(inner.config.io_threads);
        *inner.work_guard.lock() = Some(inner.context.make_work_guard());

        let listener =
            match TcpAcceptor::listen(&inner.config.listen_host, inner.config.listen_port) {
                Ok(listener) => Arc::new(listener),
                Err(e) => {
                    log_error!(
                        inner.logger,
                        "TransportServer: failed to listen on {}:{}: {}",
                        inner.config.listen_host,
                        inner.config.listen_port,
                        e
                    );
                    inner.running.store(false, Ordering::Release);
                    *inner.work_guard.lock() = None;
                    inner.context.stop();
                    return Err(e);
                }
            };
        *inner.listener.lock() = Some(listener);
        *inner.last_maintenance.lock() = Instant::now();

        let acceptor_inner = inner.clone();
        let handle = std::thread::Builder::new()
            .name("transport-acceptor".to_string())
            .spawn(move || acceptor_loop(acceptor_inner))
            .map_err(NetError::Io)?;
        *inner.acceptor.lock() = Some(handle);

        log_info!(
            inner.logger,
            "TransportServer: listening on {}:{}, io_threads={}",
            inner.config.listen_host,
            inner.config.listen_port,
            inner.config.io_threads
        );
        Ok(())
    }

    /// Stop accepting, drain sessions, and shut the event loop down.
    pub fn stop(&self) {
        let inner = &self.inner;
        if !inner.running.swap(false, Ordering::AcqRel) {
            return;
        }

        // Join the acceptor BEFORE closing the listening socket to avoid
        // races inside the transport stack. The timed accept bounds the
        // join latency.
        if let Some(handle) = inner.acceptor.lock().take() {
            let _ = handle.join();
        }
        if let Some(listener) = inner.listener.lock().take() {
            listener.close();
        }

        // Release every session: socket shutdown unblocks in-flight I/O,
        // pool shutdown resumes consumers waiting for tasks.
        inner.session_manager.terminate_all_sessions();
        inner.session_manager.task_pool().shutdown();

        // Bounded wait for session coroutines to reach a terminal state
        // while the event loop is still running.
        let deadline = Instant::now() + Duration::from_secs(1);
        while inner.session_manager.unfinished_session_count() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        *inner.work_guard.lock() = None;
        inner.context.stop();

        cleanup_closed_connections(inner);
        inner.session_manager.cleanup_completed_sessions();
        log_info!(inner.logger, "TransportServer: stopped");
    }

    /// Whether the server is accepting connections.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// The bound listen address; useful when configured with port 0.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.inner
            .listener
            .lock()
            .as_ref()
            .and_then(|l| l.local_addr())
    }

    /// Hand a batch of tasks to the shared pool.
    pub fn enqueue_tasks(&self, tasks: Vec<Task>) {
        self.inner.session_manager.enqueue_tasks(tasks);
        // Opportunistic maintenance in case there are no incoming accepts.
        maybe_run_maintenance(&self.inner);
    }

    /// (queued task count, suspended consumer count).
    pub fn task_pool_stats(&self) -> (usize, usize) {
        self.inner.session_manager.task_pool_stats()
    }

    /// The session manager, for stats queries and tests.
    pub fn session_manager(&self) -> &SessionManager {
        &self.inner.session_manager
    }

    /// The event loop driving this server's sessions.
    pub fn io_context(&self) -> &Arc<IoContext> {
        &self.inner.context
    }

    /// Dump event-loop and session statistics through the logger.
    pub fn log_transport_statistics(&self) {
        let inner = &self.inner;
        let per_thread = inner.context.operations_processed_per_thread();
        let mut per_thread_text = String::new();
        for (i, count) in per_thread.iter().enumerate() {
            if i > 0 {
                per_thread_text.push_str(", ");
            }
            per_thread_text.push_str(&format!("{i}:{count}"));
        }
        log_info!(
            inner.logger,
            "IO stats: total={}, per-thread=[{}]",
            inner.context.total_operations_processed(),
            per_thread_text
        );
        inner.context.log_detailed_statistics();
        inner.session_manager.log_comprehensive_statistics();
    }
}

impl Drop for TransportServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn acceptor_loop(inner: Arc<ServerInner>) {
    while inner.running.load(Ordering::Acquire) {
        let Some(listener) = inner.listener.lock().clone() else {
            break;
        };

        match listener.blocking_accept(inner.config.accept_timeout) {
            Ok(None) => {
                // Timeout or transient condition; loop re-checks running.
                continue;
            }
            Ok(Some(stream)) => {
                if !inner.running.load(Ordering::Acquire) {
                    // Stopping: close the just-accepted connection and exit.
                    use crate::net::NonBlockingStream;
                    stream.close();
                    break;
                }
                let adapter = SocketAdapter::new(Arc::new(stream), inner.context.clone());
                inner.connections.lock().push(adapter.clone());
                let session_id = inner.session_manager.create_session(adapter);
                log_debug!(
                    inner.logger,
                    "TransportServer: accepted connection as session {session_id}"
                );
                maybe_run_maintenance(&inner);
            }
            Err(e) => {
                if inner.running.load(Ordering::Acquire) {
                    log_error!(inner.logger, "TransportServer: accept error: {e}");
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }
}

/// Reap terminal sessions and purge closed connections, throttled by the
/// configured maintenance interval.
fn maybe_run_maintenance(inner: &ServerInner) {
    {
        let mut last = inner.last_maintenance.lock();
        if last.elapsed() < inner.config.maintenance_interval {
            return;
        }
        *last = Instant::now();
    }
    inner.session_manager.cleanup_completed_sessions();
    cleanup_closed_connections(inner);
}

fn cleanup_closed_connections(inner: &ServerInner) {
    let mut connections = inner.connections.lock();
    let before = connections.len();
    connections.retain(|c| c.is_open());
    let cleaned = before - connections.len();
    if cleaned > 0 {
        log_debug!(
            inner.logger,
            "TransportServer: cleaned {cleaned} closed connections"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;

    fn test_config() -> ServerConfig {
        ServerConfig {
            listen_host: "127.0.0.1".to_string(),
            listen_port: 0,
            io_threads: 1,
            max_frame_size: 1024 * 1024,
            accept_timeout: Duration::from_millis(100),
            maintenance_interval: Duration::from_millis(200),
            poll_interval: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_default_config_matches_settings() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_host, "0.0.0.0");
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.io_threads, 1);
        assert_eq!(config.max_frame_size, 16 * 1024 * 1024);
        assert_eq!(config.accept_timeout, Duration::from_millis(500));
        assert_eq!(config.maintenance_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_start_and_stop() {
        let server = TransportServer::new(test_config(), Arc::new(NoOpLogger));
        server.start().unwrap();
        assert!(server.is_running());
        assert!(server.listen_addr().is_some());

        server.stop();
        assert!(!server.is_running());
    }

    #[test]
    fn test_start_is_idempotent() {
        let server = TransportServer::new(test_config(), Arc::new(NoOpLogger));
        server.start().unwrap();
        let addr = server.listen_addr();
        server.start().unwrap();
        assert_eq!(server.listen_addr(), addr);
        server.stop();
    }

    #[test]
    fn test_stop_joins_acceptor_within_timeout() {
        let server = TransportServer::new(test_config(), Arc::new(NoOpLogger));
        server.start().unwrap();

        let start = Instant::now();
        server.stop();
        // Bounded by the accept timeout plus scheduling slack.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_enqueue_reaches_pool() {
        let server = TransportServer::new(test_config(), Arc::new(NoOpLogger));
        server.start().unwrap();

        server.enqueue_tasks(vec![
            Task::new(1, 1, bytes::Bytes::from_static(b"a")),
            Task::new(2, 1, bytes::Bytes::from_static(b"b")),
        ]);
        assert_eq!(server.task_pool_stats().0, 2);
        server.stop();
    }
}
