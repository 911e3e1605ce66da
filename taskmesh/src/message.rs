//! Task model shared between manager and worker.
//!
//! A [`Task`] is the unit of work the manager dispatches: a nonzero id, a
//! skill discriminator known to the registry, and an opaque payload. The
//! payload is [`Bytes`] so moving a task through the pool, a session, and a
//! requeue never copies it.

use bytes::Bytes;
use std::time::{Duration, Instant};

/// A unit of work dispatched from manager to worker.
///
/// `task_id == 0` is reserved as the invalid sentinel: it never appears on
/// the wire and is only produced by the pool to signal shutdown to waiting
/// consumers.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique identifier shared across request and response.
    pub task_id: u32,
    /// Dispatch discriminator known to the skill registry.
    pub skill_id: u32,
    /// Opaque payload; interpretation is delegated to the skill handler.
    pub payload: Bytes,
    created_at: Instant,
}

impl Task {
    /// Creates a new task. `task_id` must be nonzero for dispatchable work.
    pub fn new(task_id: u32, skill_id: u32, payload: Bytes) -> Self {
        Self {
            task_id,
            skill_id,
            payload,
            created_at: Instant::now(),
        }
    }

    /// The invalid-task sentinel handed to pool waiters on shutdown.
    pub fn invalid() -> Self {
        Self::new(0, 0, Bytes::new())
    }

    /// Returns true for dispatchable work, false for the shutdown sentinel.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.task_id != 0
    }

    /// Elapsed time since this task was created.
    ///
    /// Requeued tasks keep their original creation time, so age reflects how
    /// long the work has been outstanding, not the latest attempt.
    #[inline]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Payload length in bytes.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}/skill-{}", self.task_id, self.skill_id)
    }
}
