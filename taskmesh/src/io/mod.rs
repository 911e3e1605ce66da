//! Cooperative I/O event loop.
//!
//! A small pool of worker threads drives two queues: futures that are ready
//! to be polled, and pending socket operations waiting for readiness. The
//! socket adapter registers a pending operation whenever a non-blocking call
//! would block; the loop retries its readiness probe each tick and wakes the
//! owning future once the operation completes.
//!
//! This is the scheduler the rest of the crate runs on: session coroutines,
//! the async worker runtime, and every awaitable socket operation.

mod context;

pub use context::{
    FailureAttemptStats, IoContext, OpCategory, WorkGuard, CATEGORY_COUNT, MAX_TRACKED_ATTEMPTS,
};
