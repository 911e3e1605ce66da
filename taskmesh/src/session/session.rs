//! Per-connection session state machine.
//!
//! One coroutine per connection: pull a task from the shared pool, send it,
//! read the response, classify the outcome, account for it. Failed exchanges
//! requeue the task; disconnects terminate the session cleanly; anything
//! else is a fault.

use super::stats::{SessionStats, StatsSnapshot};
use crate::io::IoContext;
use crate::log::Logger;
use crate::message::Task;
use crate::net::{NetError, SocketAdapter};
use crate::pool::TaskPool;
use crate::wire::{encode_frame, WireHeader, HEADER_SIZE};
use crate::{log_debug, log_error, log_info, log_warn};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Session lifecycle state.
///
/// Transitions are monotonic toward the terminal states `Terminated` and
/// `Error`; a session never moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    /// Constructed, coroutine not yet running.
    Initializing = 0,
    /// Processing tasks.
    Active = 1,
    /// Termination requested; finishing up.
    Completing = 2,
    /// Ended cleanly (pool shutdown, termination, or peer disconnect).
    Terminated = 3,
    /// Ended on an unclassified or protocol failure.
    Error = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Initializing,
            1 => SessionState::Active,
            2 => SessionState::Completing,
            3 => SessionState::Terminated,
            _ => SessionState::Error,
        }
    }

    /// Human-readable name for logs and session info listings.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::Active => "active",
            SessionState::Completing => "completing",
            SessionState::Terminated => "terminated",
            SessionState::Error => "error",
        }
    }

    /// True for `Terminated` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Terminated | SessionState::Error)
    }
}

pub(crate) struct SessionShared {
    id: u32,
    adapter: SocketAdapter,
    state: AtomicU8,
    stats: SessionStats,
    termination_requested: AtomicBool,
    logger: Arc<dyn Logger>,
    pool: Arc<TaskPool>,
    max_frame_size: usize,
}

impl SessionShared {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move forward in the state graph; transitions out of a terminal state
    /// or backward are ignored.
    fn advance_state(&self, new: SessionState) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let current = SessionState::from_u8(current);
                if current.is_terminal() || new <= current {
                    None
                } else {
                    Some(new as u8)
                }
            });
    }
}

/// Manager-side handle for one worker connection.
///
/// The coroutine started by [`start`](Self::start) is the sole mutator of
/// session state on the hot path; this handle only reads.
pub struct Session {
    shared: Arc<SessionShared>,
}

impl Session {
    /// Create a session over an accepted connection.
    pub fn new(
        adapter: SocketAdapter,
        session_id: u32,
        logger: Arc<dyn Logger>,
        pool: Arc<TaskPool>,
        max_frame_size: usize,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                id: session_id,
                adapter,
                state: AtomicU8::new(SessionState::Initializing as u8),
                stats: SessionStats::new(),
                termination_requested: AtomicBool::new(false),
                logger,
                pool,
                max_frame_size,
            }),
        }
    }

    /// Start the session coroutine on the event loop.
    pub fn start(&self, context: &Arc<IoContext>) {
        context.spawn(run(self.shared.clone()));
    }

    /// Session identifier, unique within the manager.
    pub fn id(&self) -> u32 {
        self.shared.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Plain-read snapshot of the session's counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Peer address of the worker connection.
    pub fn client_endpoint(&self) -> String {
        self.shared.adapter.remote_endpoint()
    }

    /// True while the session can still process tasks.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Active | SessionState::Completing
        ) && self.shared.adapter.is_open()
            && !self.shared.termination_requested.load(Ordering::Acquire)
    }

    /// True once the session reached a terminal state.
    pub fn is_completed(&self) -> bool {
        self.state().is_terminal()
    }

    /// Ask the coroutine to stop after its current exchange.
    ///
    /// Shuts the socket down as well, which unblocks any pending read or
    /// write with a classifiable error.
    pub fn request_termination(&self) {
        self.shared
            .termination_requested
            .store(true, Ordering::Release);
        self.shared.advance_state(SessionState::Completing);
        self.shared.adapter.shutdown_stream();
    }
}

enum ExchangeOutcome {
    /// Matching task id and skill id: the task is done.
    Completed,
    /// Response named a different task; carries the id we got.
    CorrelationMismatch(u32),
    /// Response named a different skill; carries the id we got.
    SkillMismatch(u32),
}

/// The session coroutine body.
async fn run(shared: Arc<SessionShared>) {
    shared.advance_state(SessionState::Active);
    log_info!(
        shared.logger,
        "Session {}: connection established with {}",
        shared.id,
        shared.adapter.remote_endpoint()
    );

    loop {
        if shared.termination_requested.load(Ordering::Acquire) || !shared.adapter.is_open() {
            break;
        }

        log_debug!(
            shared.logger,
            "Session {}: awaiting task from shared pool",
            shared.id
        );
        let task = shared.pool.get_next_task().await;
        if !task.is_valid() {
            log_info!(
                shared.logger,
                "Session {}: no more tasks available or pool shutting down",
                shared.id
            );
            break;
        }

        shared.stats.record_task_sent();
        log_debug!(
            shared.logger,
            "Session {}: sending {} ({} bytes payload, age {:?})",
            shared.id,
            task,
            task.payload_len(),
            task.age()
        );

        match exchange(&shared, &task).await {
            Ok(ExchangeOutcome::Completed) => {
                shared.stats.record_task_completed();
                log_debug!(shared.logger, "Session {}: {} completed", shared.id, task);
            }
            Ok(ExchangeOutcome::CorrelationMismatch(got)) => {
                shared.stats.record_task_failed();
                log_warn!(
                    shared.logger,
                    "Session {}: response task id mismatch (expected {}, got {}), requeuing",
                    shared.id,
                    task.task_id,
                    got
                );
                shared.pool.requeue_task(task);
            }
            Ok(ExchangeOutcome::SkillMismatch(got)) => {
                shared.stats.record_task_failed();
                log_warn!(
                    shared.logger,
                    "Session {}: {} returned mismatched skill id {} , requeuing",
                    shared.id,
                    task,
                    got
                );
                shared.pool.requeue_task(task);
            }
            Err(err) => {
                // The task was acquired but the exchange died: put it back
                // before deciding the session's fate.
                shared.stats.record_task_failed();
                log_warn!(
                    shared.logger,
                    "Session {}: I/O error for {}, requeuing: {}",
                    shared.id,
                    task,
                    err
                );
                shared.pool.requeue_task(task);

                if err.is_disconnect() {
                    log_info!(
                        shared.logger,
                        "Session {}: connection lost: {}",
                        shared.id,
                        err
                    );
                    shared.advance_state(SessionState::Terminated);
                } else {
                    log_error!(shared.logger, "Session {}: I/O error: {}", shared.id, err);
                    shared.advance_state(SessionState::Error);
                }
                finalize(&shared);
                return;
            }
        }
    }

    shared.advance_state(SessionState::Terminated);
    log_info!(
        shared.logger,
        "Session {}: task processing loop completed",
        shared.id
    );
    finalize(&shared);
}

/// One strict request/response exchange.
async fn exchange(shared: &SessionShared, task: &Task) -> Result<ExchangeOutcome, NetError> {
    let (header_bytes, payload) = encode_frame(task.task_id, task.skill_id, task.payload.clone())?;

    // Timing starts at the first network write so pool wait time stays out
    // of the round-trip figures.
    let rt_start = Instant::now();

    let sent = shared.adapter.write_frame(header_bytes, payload).await?;
    shared.stats.add_bytes_sent(sent as u64);

    let header_buf = shared.adapter.read_header().await?;
    shared.stats.add_bytes_received(header_buf.len() as u64);
    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(&header_buf);
    let response = WireHeader::decode(&raw);

    if response.task_id != task.task_id {
        return Ok(ExchangeOutcome::CorrelationMismatch(response.task_id));
    }

    if response.body_size > 0 {
        response.check_body_size(shared.max_frame_size)?;
        let body = shared.adapter.read(response.body_size as usize).await?;
        shared.stats.add_bytes_received(body.len() as u64);
    }

    shared.stats.record_roundtrip(rt_start.elapsed());

    if response.skill_id == task.skill_id {
        Ok(ExchangeOutcome::Completed)
    } else {
        Ok(ExchangeOutcome::SkillMismatch(response.skill_id))
    }
}

fn finalize(shared: &SessionShared) {
    shared.adapter.shutdown_stream();
    shared.adapter.close();

    let snap = shared.stats.snapshot();
    log_info!(
        shared.logger,
        "Session {}: finalized. sent={} completed={} failed={} success_rate={:.1}% timed={} \
         roundtrip total={:.3?} avg={:.3?} last={:.3?} bytes sent={} received={}",
        shared.id,
        snap.tasks_sent,
        snap.tasks_completed,
        snap.tasks_failed,
        snap.success_rate(),
        snap.timed_tasks,
        snap.total_roundtrip,
        snap.avg_roundtrip(),
        snap.last_roundtrip,
        snap.bytes_sent,
        snap.bytes_received
    );
}
