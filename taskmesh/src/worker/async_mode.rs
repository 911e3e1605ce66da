//! Event-loop runtime strategy.
//!
//! Drives the same read/dispatch/respond loop as the blocking strategy, but
//! as a coroutine over the awaitable socket adapter, scheduled on the
//! runtime's own event loop. `run_loop` still blocks its caller until the
//! coroutine finishes, so both strategies present the same interface.

use super::processor::TaskProcessor;
use super::runtime::RuntimeMode;
use crate::io::IoContext;
use crate::log::Logger;
use crate::net::SocketAdapter;
use crate::wire::{encode_frame, WireHeader, HEADER_SIZE};
use crate::{log_error, log_info, log_warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Coroutine-based worker runtime sharing the manager's socket adapter.
pub struct AsyncRuntime {
    host: String,
    port: u16,
    context: Arc<IoContext>,
    adapter: Mutex<Option<SocketAdapter>>,
    shared: Arc<LoopShared>,
}

/// State the loop coroutine carries across awaits.
struct LoopShared {
    logger: Arc<dyn Logger>,
    max_frame_size: usize,
    pause_requested: AtomicBool,
    tasks_completed: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl AsyncRuntime {
    pub fn new(host: &str, port: u16, max_frame_size: usize, logger: Arc<dyn Logger>) -> Self {
        let context = Arc::new(IoContext::new(logger.clone()));
        context.start(1);
        Self {
            host: host.to_string(),
            port,
            context,
            adapter: Mutex::new(None),
            shared: Arc::new(LoopShared {
                logger,
                max_frame_size,
                pause_requested: AtomicBool::new(false),
                tasks_completed: AtomicU64::new(0),
                bytes_sent: AtomicU64::new(0),
                bytes_received: AtomicU64::new(0),
            }),
        }
    }

    fn current_adapter(&self) -> Option<SocketAdapter> {
        self.adapter.lock().clone()
    }
}

impl RuntimeMode for AsyncRuntime {
    fn connect(&self) -> bool {
        if let Some(old) = self.current_adapter() {
            old.close();
        }
        match SocketAdapter::connect(&self.host, self.port, self.context.clone()) {
            Ok(adapter) => {
                *self.adapter.lock() = Some(adapter);
                true
            }
            Err(e) => {
                log_error!(self.shared.logger, "AsyncRuntime: failed to connect: {e}");
                false
            }
        }
    }

    fn run_loop(&self, processor: &TaskProcessor) -> bool {
        let Some(adapter) = self.current_adapter() else {
            log_error!(self.shared.logger, "AsyncRuntime: run_loop without a socket");
            return false;
        };

        self.shared.pause_requested.store(false, Ordering::Relaxed);

        let shared = self.shared.clone();
        let processor = processor.clone();
        let (tx, rx) = futures::channel::oneshot::channel();
        self.context.spawn(async move {
            let outcome = worker_loop(adapter, shared, processor).await;
            let _ = tx.send(outcome);
        });

        // The coroutine runs on the event loop; block this control thread
        // until it reports back.
        futures::executor::block_on(rx).unwrap_or(false)
    }

    fn pause(&self) {
        self.shared.pause_requested.store(true, Ordering::Relaxed);
    }

    fn disconnect(&self) {
        if let Some(adapter) = self.current_adapter() {
            adapter.close();
        }
    }

    fn shutdown(&self) {
        if let Some(adapter) = self.current_adapter() {
            adapter.shutdown_stream();
            adapter.close();
        }
    }

    fn release(&self) {
        *self.adapter.lock() = None;
    }

    fn is_connected(&self) -> bool {
        self.current_adapter().map(|a| a.is_open()).unwrap_or(false)
    }

    fn local_endpoint(&self) -> String {
        self.current_adapter()
            .map(|a| a.local_endpoint())
            .unwrap_or_default()
    }

    fn task_count(&self) -> u64 {
        self.shared.tasks_completed.load(Ordering::Relaxed)
    }

    fn bytes_sent(&self) -> u64 {
        self.shared.bytes_sent.load(Ordering::Relaxed)
    }

    fn bytes_received(&self) -> u64 {
        self.shared.bytes_received.load(Ordering::Relaxed)
    }
}

/// The coroutine body: read header, read body, dispatch, respond.
async fn worker_loop(
    adapter: SocketAdapter,
    shared: Arc<LoopShared>,
    processor: TaskProcessor,
) -> bool {
    loop {
        if shared.pause_requested.swap(false, Ordering::Relaxed) {
            log_info!(shared.logger, "AsyncRuntime: pause requested");
            return true;
        }

        let header_buf = match adapter.read_header().await {
            Ok(buf) => buf,
            Err(e) if e.is_disconnect() => {
                log_info!(shared.logger, "AsyncRuntime: manager closed connection");
                adapter.close();
                return false;
            }
            Err(e) => {
                log_error!(shared.logger, "AsyncRuntime: header read failed: {e}");
                adapter.close();
                return false;
            }
        };
        shared
            .bytes_received
            .fetch_add(HEADER_SIZE as u64, Ordering::Relaxed);

        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&header_buf);
        let header = WireHeader::decode(&raw);

        if let Err(e) = header.check_body_size(shared.max_frame_size) {
            log_error!(shared.logger, "AsyncRuntime: {e}; closing connection");
            adapter.close();
            return false;
        }

        let body = if header.body_size > 0 {
            match adapter.read(header.body_size as usize).await {
                Ok(buf) => buf,
                Err(e) => {
                    log_error!(shared.logger, "AsyncRuntime: body read failed: {e}");
                    adapter.close();
                    return false;
                }
            }
        } else {
            Vec::new()
        };
        shared
            .bytes_received
            .fetch_add(body.len() as u64, Ordering::Relaxed);

        let (response_skill, response_payload) =
            processor.process(header.task_id, header.skill_id, &body);

        let (response_header, payload) =
            match encode_frame(header.task_id, response_skill, response_payload) {
                Ok(frame) => frame,
                Err(e) => {
                    log_warn!(shared.logger, "AsyncRuntime: response framing failed: {e}");
                    adapter.close();
                    return false;
                }
            };

        match adapter.write_frame(response_header, payload).await {
            Ok(written) => {
                shared
                    .bytes_sent
                    .fetch_add(written as u64, Ordering::Relaxed);
            }
            Err(e) => {
                log_error!(shared.logger, "AsyncRuntime: response write failed: {e}");
                adapter.close();
                return false;
            }
        }

        let completed = shared.tasks_completed.fetch_add(1, Ordering::Relaxed) + 1;
        if completed % 10 == 0 {
            log_info!(shared.logger, "Worker: completed {completed} tasks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;
    use std::net::TcpListener;

    #[test]
    fn test_connect_failure_returns_false() {
        let runtime = AsyncRuntime::new("127.0.0.1", 1, 1024, Arc::new(NoOpLogger));
        assert!(!runtime.connect());
        assert!(!runtime.is_connected());
    }

    #[test]
    fn test_connect_and_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let runtime = AsyncRuntime::new("127.0.0.1", port, 1024, Arc::new(NoOpLogger));
        assert!(runtime.connect());
        assert!(runtime.is_connected());

        runtime.disconnect();
        assert!(!runtime.is_connected());
        runtime.release();
    }
}
