//! Worker-thread event loop with readiness polling and completion metrics.

use crate::log::Logger;
use futures::future::BoxFuture;
use futures::task::{waker_ref, ArcWake};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};
use std::thread::JoinHandle;
use std::time::Duration;

/// Number of attempt-histogram buckets; the last bucket saturates.
pub const MAX_TRACKED_ATTEMPTS: usize = 16;

/// Number of pending-operation categories.
pub const CATEGORY_COUNT: usize = 5;

/// Category of a pending operation, used to attribute attempt histograms.
///
/// Header reads are tracked separately from bulk body reads so the two
/// traffic shapes stay distinguishable in the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCategory {
    /// Anything that is not one of the specific categories below.
    Generic = 0,
    /// Bulk body read.
    Read = 1,
    /// Fixed-size header read.
    ReadHeader = 2,
    /// Write of header or payload segments.
    Write = 3,
    /// Reserved for deadline-driven operations.
    Timer = 4,
}

impl OpCategory {
    fn name(self) -> &'static str {
        match self {
            OpCategory::Generic => "Generic",
            OpCategory::Read => "Read",
            OpCategory::ReadHeader => "ReadHeader",
            OpCategory::Write => "Write",
            OpCategory::Timer => "Timer",
        }
    }
}

/// A registered operation waiting for readiness.
///
/// `probe` re-attempts the operation; returning `true` means finished
/// (success or classified error) and the waker is invoked. `attempts` counts
/// failed probes before completion, feeding the per-category histograms.
struct PendingOp {
    probe: Box<dyn FnMut() -> bool + Send>,
    waker: Waker,
    attempts: u16,
    category: OpCategory,
}

/// A spawned future plus its re-schedule hook.
struct ScheduledTask {
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    shared: Weak<Shared>,
}

impl ArcWake for ScheduledTask {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if let Some(shared) = arc_self.shared.upgrade() {
            let mut queues = shared.queues.lock();
            queues.ready.push_back(arc_self.clone());
            shared.condvar.notify_one();
        }
    }
}

/// Both work queues live under the one mutex the condvar waits on, so an
/// enqueue can never race a worker into a missed wakeup.
struct Queues {
    pending: Vec<PendingOp>,
    ready: VecDeque<Arc<ScheduledTask>>,
}

struct Shared {
    queues: Mutex<Queues>,
    condvar: Condvar,
    running: AtomicBool,
    outstanding_work: AtomicUsize,
    poll_interval: Duration,
    stats: Mutex<ContextStats>,
    per_thread_ops: Mutex<Vec<Arc<AtomicU64>>>,
    logger: Arc<dyn Logger>,
}

struct ContextStats {
    total_operations: u64,
    histograms: [[u64; MAX_TRACKED_ATTEMPTS]; CATEGORY_COUNT],
    min_failures: u64,
    max_failures: u64,
    sum_failures: u64,
    completed_ops: u64,
}

impl ContextStats {
    fn new() -> Self {
        Self {
            total_operations: 0,
            histograms: [[0; MAX_TRACKED_ATTEMPTS]; CATEGORY_COUNT],
            min_failures: u64::MAX,
            max_failures: 0,
            sum_failures: 0,
            completed_ops: 0,
        }
    }
}

/// Aggregate of failed readiness probes before success, across categories.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailureAttemptStats {
    pub min: u64,
    pub max: u64,
    pub average: f64,
    pub samples: u64,
}

/// Cooperative event loop shared by sessions and socket adapters.
///
/// Start it with [`start`](Self::start), hand futures to
/// [`spawn`](Self::spawn), and keep a [`WorkGuard`] alive for as long as the
/// loop must outlive `stop()`.
pub struct IoContext {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl IoContext {
    /// Creates a stopped context with the default 10 ms poll interval.
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self::with_poll_interval(logger, Duration::from_millis(10))
    }

    /// Creates a stopped context with an explicit poll interval.
    ///
    /// The interval bounds how long a completed-but-unnotified probe can sit
    /// before a worker retries it; registration and wake-ups cut the wait
    /// short via the condvar.
    pub fn with_poll_interval(logger: Arc<dyn Logger>, poll_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                queues: Mutex::new(Queues {
                    pending: Vec::new(),
                    ready: VecDeque::new(),
                }),
                condvar: Condvar::new(),
                running: AtomicBool::new(false),
                outstanding_work: AtomicUsize::new(0),
                poll_interval,
                stats: Mutex::new(ContextStats::new()),
                per_thread_ops: Mutex::new(Vec::new()),
                logger,
            }),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Starts `threads` worker threads (at least one).
    ///
    /// Idempotent: a running context ignores further calls.
    pub fn start(self: &Arc<Self>, threads: usize) {
        let threads = threads.max(1);
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        {
            let mut counters = self.shared.per_thread_ops.lock();
            counters.clear();
            counters.resize_with(threads, || Arc::new(AtomicU64::new(0)));
        }

        let mut handles = self.threads.lock();
        for index in 0..threads {
            let shared = self.shared.clone();
            let handle = std::thread::Builder::new()
                .name(format!("io-context-{index}"))
                .spawn(move || run_worker(shared, index));
            match handle {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    crate::log_error!(self.shared.logger, "IoContext: failed to spawn worker: {e}")
                }
            }
        }
        crate::log_info!(
            self.shared.logger,
            "IoContext started with {} thread(s)",
            threads
        );
    }

    /// Stops the loop and joins the worker threads.
    ///
    /// Workers keep draining while any [`WorkGuard`] is alive, then exit
    /// after finishing the operations currently queued.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::AcqRel) {
            self.shared.condvar.notify_all();
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.threads.lock());
            for handle in handles {
                let _ = handle.join();
            }
            crate::log_info!(self.shared.logger, "IoContext stopped");
        }
    }

    /// Whether the loop is accepting and processing work.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Schedules a future onto the loop.
    ///
    /// The future is polled on whichever worker thread picks it up; it
    /// migrates threads only across suspension points.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = Arc::new(ScheduledTask {
            future: Mutex::new(Some(Box::pin(future))),
            shared: Arc::downgrade(&self.shared),
        });
        let mut queues = self.shared.queues.lock();
        queues.ready.push_back(task);
        self.shared.condvar.notify_one();
    }

    /// Registers a pending operation with its readiness probe.
    ///
    /// The probe is retried each tick; once it reports completion the waker
    /// runs and the operation's attempt count lands in the `category`
    /// histogram.
    pub fn register_pending(
        &self,
        category: OpCategory,
        probe: Box<dyn FnMut() -> bool + Send>,
        waker: Waker,
    ) {
        let mut queues = self.shared.queues.lock();
        queues.pending.push(PendingOp {
            probe,
            waker,
            attempts: 0,
            category,
        });
        self.shared.condvar.notify_one();
    }

    /// Keeps the loop alive past `stop()` until the guard drops.
    pub fn make_work_guard(self: &Arc<Self>) -> WorkGuard {
        WorkGuard::new(self.clone())
    }

    // ==================== statistics ====================

    /// Total operations completed since start (or the last reset).
    pub fn total_operations_processed(&self) -> u64 {
        self.shared.stats.lock().total_operations
    }

    /// Operations completed per worker thread.
    pub fn operations_processed_per_thread(&self) -> Vec<u64> {
        self.shared
            .per_thread_ops
            .lock()
            .iter()
            .map(|c| c.load(Ordering::Acquire))
            .collect()
    }

    /// Attempt histogram aggregated across categories.
    ///
    /// Bucket `i` counts operations that failed `i` readiness probes before
    /// completing; the final bucket saturates.
    pub fn completion_attempt_histogram(&self) -> [u64; MAX_TRACKED_ATTEMPTS] {
        let stats = self.shared.stats.lock();
        let mut agg = [0u64; MAX_TRACKED_ATTEMPTS];
        for hist in &stats.histograms {
            for (slot, count) in agg.iter_mut().zip(hist.iter()) {
                *slot += count;
            }
        }
        agg
    }

    /// Attempt histograms per operation category.
    pub fn completion_attempt_histograms_by_category(
        &self,
    ) -> [[u64; MAX_TRACKED_ATTEMPTS]; CATEGORY_COUNT] {
        self.shared.stats.lock().histograms
    }

    /// Min/avg/max failed probes before success.
    pub fn failure_attempt_stats(&self) -> FailureAttemptStats {
        let stats = self.shared.stats.lock();
        if stats.completed_ops == 0 {
            return FailureAttemptStats {
                min: 0,
                max: 0,
                average: 0.0,
                samples: 0,
            };
        }
        FailureAttemptStats {
            min: stats.min_failures,
            max: stats.max_failures,
            average: stats.sum_failures as f64 / stats.completed_ops as f64,
            samples: stats.completed_ops,
        }
    }

    /// Renders the full statistics block as a multi-line string.
    pub fn format_detailed_statistics(&self) -> String {
        let stats = self.shared.stats.lock();
        let mut out = String::new();
        out.push_str("IoContext detailed statistics\n");
        out.push_str(&format!(
            "Total operations processed: {}\n",
            stats.total_operations
        ));
        if stats.completed_ops > 0 {
            let avg = stats.sum_failures as f64 / stats.completed_ops as f64;
            let min = if stats.min_failures == u64::MAX {
                0
            } else {
                stats.min_failures
            };
            out.push_str(&format!(
                "Failed probes before success (min/avg/max): {}/{:.2}/{}\n",
                min, avg, stats.max_failures
            ));
        } else {
            out.push_str("Failed probes before success: (no completed ops)\n");
        }

        let categories = [
            OpCategory::Generic,
            OpCategory::Read,
            OpCategory::ReadHeader,
            OpCategory::Write,
            OpCategory::Timer,
        ];
        let mut any = false;
        for category in categories {
            let hist = &stats.histograms[category as usize];
            if hist.iter().all(|&v| v == 0) {
                continue;
            }
            any = true;
            out.push_str(&format!(
                "Completion attempt distribution [{}]:\n",
                category.name()
            ));
            for (bucket, &count) in hist.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                if bucket < MAX_TRACKED_ATTEMPTS - 1 {
                    out.push_str(&format!("  {bucket} : {count}\n"));
                } else {
                    out.push_str(&format!("  >={bucket} : {count}\n"));
                }
            }
        }
        if !any {
            out.push_str("(no histogram data)\n");
        }
        out
    }

    /// Emits the detailed statistics block through the logger at info level.
    pub fn log_detailed_statistics(&self) {
        crate::log_info!(self.shared.logger, "{}", self.format_detailed_statistics());
    }

    /// Zeroes all counters and histograms.
    pub fn reset_statistics(&self) {
        *self.shared.stats.lock() = ContextStats::new();
        for counter in self.shared.per_thread_ops.lock().iter() {
            counter.store(0, Ordering::Release);
        }
    }
}

impl Drop for IoContext {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-thread main loop: poll ready futures, probe pending operations,
/// requeue the unfinished, then park on the condvar with a bounded timeout.
fn run_worker(shared: Arc<Shared>, thread_index: usize) {
    crate::log_debug!(shared.logger, "IoContext worker {thread_index} started");

    loop {
        let (ready, pending) = {
            let mut queues = shared.queues.lock();
            (
                std::mem::take(&mut queues.ready),
                std::mem::take(&mut queues.pending),
            )
        };

        for task in ready {
            poll_task(task);
        }

        let mut requeue = Vec::new();
        for mut op in pending {
            if (op.probe)() {
                record_completion(&shared, thread_index, &op);
                op.waker.wake();
            } else {
                op.attempts = op.attempts.saturating_add(1);
                requeue.push(op);
            }
        }

        let mut queues = shared.queues.lock();
        queues.pending.append(&mut requeue);

        let running = shared.running.load(Ordering::Acquire);
        let outstanding = shared.outstanding_work.load(Ordering::Acquire) > 0;
        if !running && !outstanding {
            break;
        }
        if queues.ready.is_empty() {
            let _ = shared
                .condvar
                .wait_for(&mut queues, shared.poll_interval);
        }
    }

    crate::log_debug!(shared.logger, "IoContext worker {thread_index} finished");
}

fn poll_task(task: Arc<ScheduledTask>) {
    let mut slot = task.future.lock();
    if let Some(mut future) = slot.take() {
        let waker = waker_ref(&task);
        let mut cx = Context::from_waker(&waker);
        if future.as_mut().poll(&mut cx) == Poll::Pending {
            *slot = Some(future);
        }
    }
}

fn record_completion(shared: &Shared, thread_index: usize, op: &PendingOp) {
    {
        let mut stats = shared.stats.lock();
        stats.total_operations += 1;

        let failures = op.attempts as u64;
        let bucket = (failures as usize).min(MAX_TRACKED_ATTEMPTS - 1);
        stats.histograms[op.category as usize][bucket] += 1;

        if failures < stats.min_failures {
            stats.min_failures = failures;
        }
        if failures > stats.max_failures {
            stats.max_failures = failures;
        }
        stats.sum_failures += failures;
        stats.completed_ops += 1;
    }
    if let Some(counter) = shared.per_thread_ops.lock().get(thread_index) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// RAII handle that keeps the event loop draining after `stop()`.
///
/// The transport server holds one for the lifetime of the listener so
/// in-flight session I/O finishes before the worker threads exit.
pub struct WorkGuard {
    context: Arc<IoContext>,
}

impl WorkGuard {
    fn new(context: Arc<IoContext>) -> Self {
        context
            .shared
            .outstanding_work
            .fetch_add(1, Ordering::AcqRel);
        context.shared.condvar.notify_all();
        Self { context }
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        let shared = &self.context.shared;
        if shared.outstanding_work.fetch_sub(1, Ordering::AcqRel) == 1 {
            shared.condvar.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    fn context() -> Arc<IoContext> {
        Arc::new(IoContext::new(Arc::new(NoOpLogger)))
    }

    fn wait_until(deadline: Duration, mut predicate: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if predicate() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        predicate()
    }

    // ==================== spawn / lifecycle ====================

    #[test]
    fn test_spawn_runs_future() {
        let ctx = context();
        ctx.start(1);

        let counter = Arc::new(AtomicU32::new(0));
        let seen = counter.clone();
        ctx.spawn(async move {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(wait_until(Duration::from_secs(1), || {
            counter.load(Ordering::SeqCst) == 1
        }));
        ctx.stop();
    }

    #[test]
    fn test_start_is_idempotent() {
        let ctx = context();
        ctx.start(2);
        ctx.start(4);
        assert_eq!(ctx.operations_processed_per_thread().len(), 2);
        ctx.stop();
    }

    #[test]
    fn test_stop_joins_threads() {
        let ctx = context();
        ctx.start(2);
        ctx.stop();
        assert!(!ctx.is_running());
        // A second stop is a no-op.
        ctx.stop();
    }

    // ==================== pending operations ====================

    #[test]
    fn test_pending_op_retried_until_ready() {
        let ctx = context();
        ctx.start(1);

        let probes = Arc::new(AtomicU32::new(0));
        let woken = Arc::new(AtomicBool::new(false));

        let probe_count = probes.clone();
        let probe = Box::new(move || probe_count.fetch_add(1, Ordering::SeqCst) >= 3);

        let woken_flag = woken.clone();
        let flag_waker = futures::task::waker(Arc::new(FlagWake(woken_flag)));
        ctx.register_pending(OpCategory::Read, probe, flag_waker);

        assert!(wait_until(Duration::from_secs(1), || {
            woken.load(Ordering::SeqCst)
        }));
        assert!(probes.load(Ordering::SeqCst) >= 4);

        // Three failed probes land the op in bucket 3 of the Read histogram.
        let hist = ctx.completion_attempt_histograms_by_category();
        assert_eq!(hist[OpCategory::Read as usize][3], 1);
        assert_eq!(ctx.total_operations_processed(), 1);

        let stats = ctx.failure_attempt_stats();
        assert_eq!(stats.samples, 1);
        assert_eq!(stats.min, 3);
        assert_eq!(stats.max, 3);
        ctx.stop();
    }

    struct FlagWake(Arc<AtomicBool>);

    impl ArcWake for FlagWake {
        fn wake_by_ref(arc_self: &Arc<Self>) {
            arc_self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_immediate_op_lands_in_bucket_zero() {
        let ctx = context();
        ctx.start(1);

        let woken = Arc::new(AtomicBool::new(false));
        let flag_waker = futures::task::waker(Arc::new(FlagWake(woken.clone())));
        ctx.register_pending(OpCategory::Write, Box::new(|| true), flag_waker);

        assert!(wait_until(Duration::from_secs(1), || {
            woken.load(Ordering::SeqCst)
        }));
        let hist = ctx.completion_attempt_histograms_by_category();
        assert_eq!(hist[OpCategory::Write as usize][0], 1);
        ctx.stop();
    }

    #[test]
    fn test_per_thread_counters_sum_to_total() {
        let ctx = context();
        ctx.start(2);

        let remaining = Arc::new(AtomicU32::new(8));
        for _ in 0..8 {
            let remaining = remaining.clone();
            let flag_waker = futures::task::waker(Arc::new(FlagWake(Arc::new(
                AtomicBool::new(false),
            ))));
            ctx.register_pending(
                OpCategory::Generic,
                Box::new(move || {
                    remaining.fetch_sub(1, Ordering::SeqCst);
                    true
                }),
                flag_waker,
            );
        }

        assert!(wait_until(Duration::from_secs(1), || {
            ctx.total_operations_processed() == 8
        }));
        let per_thread: u64 = ctx.operations_processed_per_thread().iter().sum();
        assert_eq!(per_thread, 8);
        ctx.stop();
    }

    // ==================== work guard ====================

    #[test]
    fn test_work_guard_keeps_loop_draining() {
        let ctx = context();
        ctx.start(1);
        let guard = ctx.make_work_guard();

        ctx.shared.running.store(false, Ordering::Release);
        ctx.shared.condvar.notify_all();
        std::thread::sleep(Duration::from_millis(30));

        // Workers are still alive because of the guard: a spawned future runs.
        let counter = Arc::new(AtomicU32::new(0));
        let seen = counter.clone();
        ctx.spawn(async move {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert!(wait_until(Duration::from_secs(1), || {
            counter.load(Ordering::SeqCst) == 1
        }));

        drop(guard);
        ctx.stop();
    }

    // ==================== statistics ====================

    #[test]
    fn test_reset_statistics() {
        let ctx = context();
        ctx.start(1);

        let flag_waker =
            futures::task::waker(Arc::new(FlagWake(Arc::new(AtomicBool::new(false)))));
        ctx.register_pending(OpCategory::Generic, Box::new(|| true), flag_waker);
        assert!(wait_until(Duration::from_secs(1), || {
            ctx.total_operations_processed() == 1
        }));

        ctx.reset_statistics();
        assert_eq!(ctx.total_operations_processed(), 0);
        assert_eq!(ctx.failure_attempt_stats().samples, 0);
        assert!(ctx
            .operations_processed_per_thread()
            .iter()
            .all(|&c| c == 0));
        ctx.stop();
    }

    #[test]
    fn test_format_statistics_empty() {
        let ctx = context();
        let text = ctx.format_detailed_statistics();
        assert!(text.contains("Total operations processed: 0"));
        assert!(text.contains("no histogram data"));
    }
}
