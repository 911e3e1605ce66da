//! Shared, awaitable task pool.
//!
//! The pool multiplexes a single producer stream of tasks across many
//! per-connection consumers with fair FIFO semantics. Consumers call
//! [`TaskPool::get_next_task`] and suspend when the pool is empty; producers
//! call [`TaskPool::add_task`], which hands the task straight to the oldest
//! waiter when one exists instead of growing the queue.
//!
//! Invariants:
//! - At any instant under the lock, the task queue or the waiter queue is
//!   empty (enqueue hands off immediately, dequeue drains tasks first).
//! - Both queues are FIFO; there are no priority classes.
//! - The shutdown flag is monotonic. Waiters resumed by shutdown receive the
//!   invalid-task sentinel (`task_id == 0`), their signal to exit.
//!
//! The mutex is never held across a waker invocation, so consumer code never
//! runs under the pool lock.

use crate::message::Task;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Shared FIFO queue of pending tasks plus a FIFO queue of suspended consumers.
pub struct TaskPool {
    inner: Mutex<PoolInner>,
    shutdown: AtomicBool,
}

struct PoolInner {
    tasks: VecDeque<Task>,
    waiters: VecDeque<Arc<WaiterSlot>>,
}

/// Single-slot result cell shared between a suspended consumer and the pool.
struct WaiterSlot {
    state: Mutex<SlotState>,
}

struct SlotState {
    /// Task delivered by a producer, not yet picked up by the consumer.
    delivered: Option<Task>,
    /// Set by shutdown; the consumer resumes with the invalid sentinel.
    closed: bool,
    waker: Option<Waker>,
}

impl TaskPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                tasks: VecDeque::new(),
                waiters: VecDeque::new(),
            }),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Awaitable fetch of the next task.
    ///
    /// Resolves immediately when a task is queued; otherwise the consumer
    /// suspends until a producer enqueues or the pool shuts down. After
    /// shutdown the returned task is the invalid sentinel
    /// (`Task::is_valid() == false`).
    pub fn get_next_task(&self) -> NextTask<'_> {
        NextTask {
            pool: self,
            slot: None,
        }
    }

    /// Enqueues one task, waking the oldest waiter if any.
    ///
    /// Tasks added after shutdown are dropped.
    pub fn add_task(&self, task: Task) {
        if self.shutdown.load(Ordering::Acquire) {
            return;
        }

        let mut inner = self.inner.lock();
        loop {
            match inner.waiters.pop_front() {
                Some(slot) => {
                    let mut state = slot.state.lock();
                    if state.closed {
                        continue;
                    }
                    state.delivered = Some(task);
                    let waker = state.waker.take();
                    drop(state);
                    drop(inner);
                    if let Some(waker) = waker {
                        waker.wake();
                    }
                    return;
                }
                None => {
                    inner.tasks.push_back(task);
                    return;
                }
            }
        }
    }

    /// Requeues a task at the back of the pool after a failed exchange.
    ///
    /// Same as [`add_task`](Self::add_task); the separate name marks requeue
    /// call sites in session code.
    pub fn requeue_task(&self, task: Task) {
        self.add_task(task);
    }

    /// Enqueues a batch of tasks.
    ///
    /// The lock is released around each waiter wake-up, so bulk enqueue never
    /// holds the pool lock across consumer code.
    pub fn add_tasks(&self, tasks: Vec<Task>) {
        for task in tasks {
            self.add_task(task);
        }
    }

    /// Shuts the pool down, releasing every suspended consumer.
    ///
    /// Idempotent; only the first call drains the waiter queue. Each drained
    /// waiter resumes with the invalid-task sentinel. Wake-ups happen outside
    /// the pool lock.
    pub fn shutdown(&self) {
        if self
            .shutdown
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let drained: Vec<Arc<WaiterSlot>> = {
            let mut inner = self.inner.lock();
            inner.waiters.drain(..).collect()
        };

        for slot in drained {
            let waker = {
                let mut state = slot.state.lock();
                state.closed = true;
                state.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        }
    }

    /// Returns true once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Number of queued tasks.
    pub fn size(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    /// True when no tasks are queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().tasks.is_empty()
    }

    /// Number of consumers currently suspended on the pool.
    pub fn waiting_count(&self) -> usize {
        self.inner.lock().waiters.len()
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`TaskPool::get_next_task`].
pub struct NextTask<'a> {
    pool: &'a TaskPool,
    slot: Option<Arc<WaiterSlot>>,
}

impl Future for NextTask<'_> {
    type Output = Task;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Task> {
        let this = self.get_mut();

        // Already registered: check our result cell.
        if let Some(slot) = &this.slot {
            let mut state = slot.state.lock();
            if let Some(task) = state.delivered.take() {
                drop(state);
                this.slot = None;
                return Poll::Ready(task);
            }
            if state.closed {
                drop(state);
                this.slot = None;
                return Poll::Ready(Task::invalid());
            }
            state.waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        // First poll: fast path and registration happen under one lock so a
        // concurrent add_task cannot slip between the emptiness check and the
        // waiter insert (the no-lost-wakeup guarantee).
        let mut inner = this.pool.inner.lock();
        if this.pool.shutdown.load(Ordering::Acquire) {
            return Poll::Ready(Task::invalid());
        }
        if let Some(task) = inner.tasks.pop_front() {
            return Poll::Ready(task);
        }
        let slot = Arc::new(WaiterSlot {
            state: Mutex::new(SlotState {
                delivered: None,
                closed: false,
                waker: Some(cx.waker().clone()),
            }),
        });
        inner.waiters.push_back(slot.clone());
        drop(inner);
        this.slot = Some(slot);
        Poll::Pending
    }
}

impl Drop for NextTask<'_> {
    fn drop(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };

        let mut inner = self.pool.inner.lock();
        // Still queued: deregister so producers never deliver into a dead cell.
        if let Some(pos) = inner
            .waiters
            .iter()
            .position(|s| Arc::ptr_eq(s, &slot))
        {
            let _ = inner.waiters.remove(pos);
            return;
        }
        // Already dequeued by a producer or by shutdown. A task delivered to
        // a cancelled waiter goes back to the front so it is not lost and
        // keeps its place in line.
        let mut state = slot.state.lock();
        state.closed = true;
        if let Some(task) = state.delivered.take() {
            inner.tasks.push_front(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::executor::block_on;
    use futures::task::noop_waker;
    use std::thread;
    use std::time::Duration;

    fn task(id: u32) -> Task {
        Task::new(id, 1, Bytes::from(format!("payload-{id}")))
    }

    // ==================== basic queue behavior ====================

    #[test]
    fn test_fast_path_pops_in_fifo_order() {
        let pool = TaskPool::new();
        pool.add_task(task(1));
        pool.add_task(task(2));
        pool.add_task(task(3));

        assert_eq!(block_on(pool.get_next_task()).task_id, 1);
        assert_eq!(block_on(pool.get_next_task()).task_id, 2);
        assert_eq!(block_on(pool.get_next_task()).task_id, 3);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_add_tasks_batch_preserves_order() {
        let pool = TaskPool::new();
        pool.add_tasks((1..=5).map(task).collect());

        for expected in 1..=5 {
            assert_eq!(block_on(pool.get_next_task()).task_id, expected);
        }
    }

    #[test]
    fn test_size_and_waiting_count() {
        let pool = TaskPool::new();
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.waiting_count(), 0);

        pool.add_task(task(1));
        assert_eq!(pool.size(), 1);
        assert!(!pool.is_empty());
    }

    // ==================== waiter handoff ====================

    #[test]
    fn test_enqueue_wakes_suspended_consumer() {
        let pool = Arc::new(TaskPool::new());
        let consumer = {
            let pool = pool.clone();
            thread::spawn(move || block_on(pool.get_next_task()))
        };

        // Wait until the consumer has actually suspended.
        while pool.waiting_count() == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        pool.add_task(task(42));
        let got = consumer.join().unwrap();
        assert_eq!(got.task_id, 42);
        // No lost wakeup: the pool is empty afterwards.
        assert!(pool.is_empty());
        assert_eq!(pool.waiting_count(), 0);
    }

    #[test]
    fn test_waiters_resume_in_fifo_order() {
        let pool = Arc::new(TaskPool::new());
        let first = {
            let pool = pool.clone();
            thread::spawn(move || block_on(pool.get_next_task()))
        };
        while pool.waiting_count() < 1 {
            thread::sleep(Duration::from_millis(1));
        }
        let second = {
            let pool = pool.clone();
            thread::spawn(move || block_on(pool.get_next_task()))
        };
        while pool.waiting_count() < 2 {
            thread::sleep(Duration::from_millis(1));
        }

        pool.add_task(task(1));
        pool.add_task(task(2));

        assert_eq!(first.join().unwrap().task_id, 1);
        assert_eq!(second.join().unwrap().task_id, 2);
    }

    #[test]
    fn test_tasks_and_waiters_never_both_nonempty() {
        let pool = Arc::new(TaskPool::new());
        let consumer = {
            let pool = pool.clone();
            thread::spawn(move || block_on(pool.get_next_task()))
        };
        while pool.waiting_count() == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        pool.add_task(task(1));
        consumer.join().unwrap();

        let inner = pool.inner.lock();
        assert!(inner.tasks.is_empty() || inner.waiters.is_empty());
    }

    // ==================== shutdown ====================

    #[test]
    fn test_shutdown_releases_all_waiters_with_sentinel() {
        let pool = Arc::new(TaskPool::new());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || block_on(pool.get_next_task()))
            })
            .collect();
        while pool.waiting_count() < 4 {
            thread::sleep(Duration::from_millis(1));
        }

        pool.shutdown();

        for consumer in consumers {
            let got = consumer.join().unwrap();
            assert_eq!(got.task_id, 0);
            assert!(!got.is_valid());
        }
        assert!(pool.is_shutdown());
    }

    #[test]
    fn test_get_after_shutdown_returns_sentinel_immediately() {
        let pool = TaskPool::new();
        pool.shutdown();
        let got = block_on(pool.get_next_task());
        assert!(!got.is_valid());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = TaskPool::new();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_shutdown());
    }

    #[test]
    fn test_add_after_shutdown_is_dropped() {
        let pool = TaskPool::new();
        pool.shutdown();
        pool.add_task(task(1));
        assert_eq!(pool.size(), 0);
    }

    // ==================== requeue ====================

    #[test]
    fn test_requeue_goes_to_the_back_byte_identical() {
        let pool = TaskPool::new();
        let original = task(42);
        let payload = original.payload.clone();

        pool.add_task(original);
        let acquired = block_on(pool.get_next_task());

        pool.add_task(task(43));
        pool.requeue_task(acquired);

        assert_eq!(block_on(pool.get_next_task()).task_id, 43);
        let requeued = block_on(pool.get_next_task());
        assert_eq!(requeued.task_id, 42);
        assert_eq!(requeued.skill_id, 1);
        assert_eq!(requeued.payload, payload);
    }

    // ==================== cancellation ====================

    #[test]
    fn test_dropped_waiter_deregisters() {
        let pool = TaskPool::new();
        {
            let mut fut = pool.get_next_task();
            let waker = noop_waker();
            let mut cx = Context::from_waker(&waker);
            assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
            assert_eq!(pool.waiting_count(), 1);
        }
        assert_eq!(pool.waiting_count(), 0);

        // A task enqueued after the drop sits in the queue for the next consumer.
        pool.add_task(task(5));
        assert_eq!(pool.size(), 1);
    }
}
