//! Per-session counters and timing.
//!
//! Counters are written only by the owning session coroutine; snapshots are
//! plain atomic reads exposed to the manager and UI. There is no
//! synchronization between fields, so a snapshot taken mid-task may be
//! slightly skewed; readers tolerate that.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for one session's lifetime.
pub struct SessionStats {
    start_time: Instant,
    tasks_sent: AtomicU32,
    tasks_completed: AtomicU32,
    tasks_failed: AtomicU32,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    // Round-trip time covers send through full response, excluding the wait
    // for the next task from the pool.
    total_roundtrip_ns: AtomicU64,
    last_roundtrip_ns: AtomicU64,
    min_roundtrip_ns: AtomicU64,
    max_roundtrip_ns: AtomicU64,
    timed_tasks: AtomicU32,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            tasks_sent: AtomicU32::new(0),
            tasks_completed: AtomicU32::new(0),
            tasks_failed: AtomicU32::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            total_roundtrip_ns: AtomicU64::new(0),
            last_roundtrip_ns: AtomicU64::new(0),
            min_roundtrip_ns: AtomicU64::new(u64::MAX),
            max_roundtrip_ns: AtomicU64::new(0),
            timed_tasks: AtomicU32::new(0),
        }
    }

    pub fn record_task_sent(&self) {
        self.tasks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record one full round-trip (send through complete response).
    pub fn record_roundtrip(&self, elapsed: Duration) {
        let ns = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        self.total_roundtrip_ns.fetch_add(ns, Ordering::Relaxed);
        self.last_roundtrip_ns.store(ns, Ordering::Relaxed);
        self.min_roundtrip_ns.fetch_min(ns, Ordering::Relaxed);
        self.max_roundtrip_ns.fetch_max(ns, Ordering::Relaxed);
        self.timed_tasks.fetch_add(1, Ordering::Relaxed);
    }

    /// Plain-read snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let min = self.min_roundtrip_ns.load(Ordering::Relaxed);
        StatsSnapshot {
            duration: self.start_time.elapsed(),
            tasks_sent: self.tasks_sent.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            total_roundtrip: Duration::from_nanos(self.total_roundtrip_ns.load(Ordering::Relaxed)),
            last_roundtrip: Duration::from_nanos(self.last_roundtrip_ns.load(Ordering::Relaxed)),
            min_roundtrip: Duration::from_nanos(if min == u64::MAX { 0 } else { min }),
            max_roundtrip: Duration::from_nanos(self.max_roundtrip_ns.load(Ordering::Relaxed)),
            timed_tasks: self.timed_tasks.load(Ordering::Relaxed),
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of a session's counters.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// Time since the session started.
    pub duration: Duration,
    pub tasks_sent: u32,
    pub tasks_completed: u32,
    pub tasks_failed: u32,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub total_roundtrip: Duration,
    pub last_roundtrip: Duration,
    pub min_roundtrip: Duration,
    pub max_roundtrip: Duration,
    /// How many tasks contributed to the timing figures.
    pub timed_tasks: u32,
}

impl StatsSnapshot {
    /// Success rate over classified outcomes, as a percentage.
    pub fn success_rate(&self) -> f64 {
        let classified = self.tasks_completed + self.tasks_failed;
        if classified == 0 {
            return 0.0;
        }
        (self.tasks_completed as f64 / classified as f64) * 100.0
    }

    /// Average round-trip over timed tasks.
    pub fn avg_roundtrip(&self) -> Duration {
        if self.timed_tasks == 0 {
            return Duration::ZERO;
        }
        self.total_roundtrip / self.timed_tasks
    }
}
