//! Logging abstraction layer.
//!
//! The core depends only on a leveled append-interface: components take an
//! `Arc<dyn Logger>` and never talk to a concrete logging backend directly.
//! This keeps sessions, runtimes, and the registry testable without a global
//! subscriber, and lets the CLI decide where log lines actually go.
//!
//! - [`Logger`] trait: the four-level append interface the core emits through
//! - [`TracingLogger`]: production adapter that delegates to the `tracing` crate
//! - [`BufferLogger`]: retains formatted lines in memory for inspection
//! - [`NoOpLogger`]: silent logger for tests and benchmarks
//!
//! # Usage
//!
//! ```
//! use taskmesh::log::{BufferLogger, Logger};
//! use taskmesh::{log_debug, log_info};
//! use std::sync::Arc;
//!
//! struct Dispatcher {
//!     logger: Arc<BufferLogger>,
//! }
//!
//! impl Dispatcher {
//!     fn dispatch(&self) {
//!         log_info!(self.logger, "dispatching");
//!         log_debug!(self.logger, "details follow");
//!     }
//! }
//!
//! let d = Dispatcher { logger: Arc::new(BufferLogger::new()) };
//! d.dispatch();
//! assert_eq!(d.logger.line_count(), 2);
//! ```

mod buffer;
mod noop;
mod tracing_adapter;
mod r#trait;

pub use buffer::BufferLogger;
pub use noop::NoOpLogger;
pub use r#trait::{LogLevel, Logger};
pub use tracing_adapter::TracingLogger;
