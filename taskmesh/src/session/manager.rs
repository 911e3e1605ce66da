//! Session orchestration and task pool fan-out.

use super::session::{Session, SessionState};
use super::stats::StatsSnapshot;
use crate::io::IoContext;
use crate::log::Logger;
use crate::message::Task;
use crate::net::SocketAdapter;
use crate::pool::TaskPool;
use crate::{log_debug, log_info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Owns the shared task pool and the set of live sessions.
///
/// Accepts, reaps, and stat queries all contend on one mutex, but only for
/// short map manipulations; session I/O never runs under it.
pub struct SessionManager {
    logger: Arc<dyn Logger>,
    context: Arc<IoContext>,
    task_pool: Arc<TaskPool>,
    sessions: Mutex<HashMap<u32, Session>>,
    next_session_id: AtomicU32,
    max_frame_size: usize,
}

impl SessionManager {
    /// Create a manager with a fresh, empty task pool.
    pub fn new(logger: Arc<dyn Logger>, context: Arc<IoContext>, max_frame_size: usize) -> Self {
        log_info!(logger, "SessionManager: initialized task pool");
        Self {
            logger,
            context,
            task_pool: Arc::new(TaskPool::new()),
            sessions: Mutex::new(HashMap::new()),
            next_session_id: AtomicU32::new(1),
            max_frame_size,
        }
    }

    /// The pool shared across all sessions.
    pub fn task_pool(&self) -> &Arc<TaskPool> {
        &self.task_pool
    }

    /// Create a session for an accepted connection and start its coroutine.
    ///
    /// Returns the assigned session id.
    pub fn create_session(&self, adapter: SocketAdapter) -> u32 {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::new(
            adapter,
            session_id,
            self.logger.clone(),
            self.task_pool.clone(),
            self.max_frame_size,
        );

        session.start(&self.context);
        self.sessions.lock().insert(session_id, session);
        session_id
    }

    /// Number of sessions currently tracked (terminal ones included until
    /// the next maintenance pass reaps them).
    pub fn active_session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Number of sessions not yet in a terminal state.
    pub fn unfinished_session_count(&self) -> usize {
        self.sessions
            .lock()
            .values()
            .filter(|s| !s.is_completed())
            .count()
    }

    /// True when the session exists and can still process tasks.
    pub fn has_active_session(&self, session_id: u32) -> bool {
        self.sessions
            .lock()
            .get(&session_id)
            .map(|s| s.is_active())
            .unwrap_or(false)
    }

    /// One line per session: id, endpoint, state.
    pub fn session_info(&self) -> Vec<String> {
        self.sessions
            .lock()
            .values()
            .map(|session| {
                format!(
                    "Session {}: {} [{}]",
                    session.id(),
                    session.client_endpoint(),
                    session.state().as_str()
                )
            })
            .collect()
    }

    /// Stats snapshot for one session, if it is still tracked.
    pub fn session_stats(&self, session_id: u32) -> Option<StatsSnapshot> {
        self.sessions.lock().get(&session_id).map(|s| s.stats())
    }

    /// Current state for one session, if it is still tracked.
    pub fn session_state(&self, session_id: u32) -> Option<SessionState> {
        self.sessions.lock().get(&session_id).map(|s| s.state())
    }

    /// Ask one session to stop. Returns false when the id is unknown.
    pub fn terminate_session(&self, session_id: u32) -> bool {
        let sessions = self.sessions.lock();
        match sessions.get(&session_id) {
            Some(session) => {
                session.request_termination();
                true
            }
            None => false,
        }
    }

    /// Ask every tracked session to stop.
    pub fn terminate_all_sessions(&self) {
        let sessions = self.sessions.lock();
        for session in sessions.values() {
            session.request_termination();
        }
        log_info!(
            self.logger,
            "SessionManager: requested termination of {} sessions",
            sessions.len()
        );
    }

    /// Remove sessions in a terminal state, logging their final stats.
    ///
    /// Returns the number reaped.
    pub fn cleanup_completed_sessions(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let completed: Vec<u32> = sessions
            .iter()
            .filter(|(_, session)| session.is_completed())
            .map(|(id, _)| *id)
            .collect();

        for id in &completed {
            if let Some(session) = sessions.remove(id) {
                let stats = session.stats();
                log_info!(
                    self.logger,
                    "SessionManager: completed session {} - tasks: {}, success rate: {:.1}%",
                    id,
                    stats.tasks_sent,
                    stats.success_rate()
                );
            }
        }

        if !completed.is_empty() {
            log_debug!(
                self.logger,
                "SessionManager: cleaned up {} completed sessions",
                completed.len()
            );
        }
        completed.len()
    }

    /// Hand a batch of tasks to the pool.
    pub fn enqueue_tasks(&self, tasks: Vec<Task>) {
        if tasks.is_empty() {
            return;
        }
        log_info!(
            self.logger,
            "SessionManager: enqueuing {} external tasks",
            tasks.len()
        );
        self.task_pool.add_tasks(tasks);
        log_info!(
            self.logger,
            "SessionManager: pool size now: {}",
            self.task_pool.size()
        );
    }

    /// (queued task count, suspended consumer count).
    pub fn task_pool_stats(&self) -> (usize, usize) {
        (self.task_pool.size(), self.task_pool.waiting_count())
    }

    /// Dump per-session details and totals through the logger.
    pub fn log_comprehensive_statistics(&self) {
        let sessions = self.sessions.lock();
        log_info!(self.logger, "=== session statistics ===");

        if sessions.is_empty() {
            log_info!(self.logger, "No active sessions");
            log_info!(
                self.logger,
                "Task pool: {} tasks available",
                self.task_pool.size()
            );
            return;
        }

        let mut total_sent = 0u64;
        let mut total_completed = 0u64;
        let mut total_failed = 0u64;
        let mut total_bytes_sent = 0u64;
        let mut total_bytes_received = 0u64;
        let mut total_roundtrip = std::time::Duration::ZERO;
        let mut total_timed = 0u64;

        for session in sessions.values() {
            let stats = session.stats();
            let secs = stats.duration.as_secs();
            log_info!(
                self.logger,
                "Session {}: endpoint={} state={} duration={}s sent={} completed={} failed={} \
                 success_rate={:.1}% throughput={:.1} tasks/s bytes sent={} received={} \
                 roundtrip total={:.3?} avg={:.3?} last={:.3?}",
                session.id(),
                session.client_endpoint(),
                session.state().as_str(),
                secs,
                stats.tasks_sent,
                stats.tasks_completed,
                stats.tasks_failed,
                stats.success_rate(),
                if secs > 0 {
                    stats.tasks_completed as f64 / secs as f64
                } else {
                    0.0
                },
                stats.bytes_sent,
                stats.bytes_received,
                stats.total_roundtrip,
                stats.avg_roundtrip(),
                stats.last_roundtrip
            );

            total_sent += stats.tasks_sent as u64;
            total_completed += stats.tasks_completed as u64;
            total_failed += stats.tasks_failed as u64;
            total_bytes_sent += stats.bytes_sent;
            total_bytes_received += stats.bytes_received;
            total_roundtrip += stats.total_roundtrip;
            total_timed += stats.timed_tasks as u64;
        }

        log_info!(
            self.logger,
            "Totals: sessions={} sent={} completed={} failed={} success_rate={}% bytes sent={} \
             received={} roundtrip total={:.3?} timed tasks={}",
            sessions.len(),
            total_sent,
            total_completed,
            total_failed,
            if total_sent > 0 {
                total_completed * 100 / total_sent
            } else {
                0
            },
            total_bytes_sent,
            total_bytes_received,
            total_roundtrip,
            total_timed
        );
        log_info!(
            self.logger,
            "Task pool: {} available, {} sessions waiting",
            self.task_pool.size(),
            self.task_pool.waiting_count()
        );
    }
}
