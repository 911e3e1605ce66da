//! Worker-side runtime: the client counterpart of the manager.
//!
//! A worker connects to the manager, reads framed tasks, dispatches them
//! through the skill registry, and writes framed responses back. Two
//! interchangeable strategies implement the same [`RuntimeMode`] interface:
//! a blocking loop on a dedicated thread and an event-loop driven variant
//! using the same socket adapter the manager uses. The
//! [`WorkerController`] supervises either one, reconnecting with backoff.

mod async_mode;
mod blocking;
mod controller;
mod processor;
mod runtime;

pub use async_mode::AsyncRuntime;
pub use blocking::BlockingRuntime;
pub use controller::{format_bytes, WorkerController};
pub use processor::TaskProcessor;
pub use runtime::RuntimeMode;
