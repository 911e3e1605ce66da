//! Runtime strategy interface.

use super::processor::TaskProcessor;

/// A worker runtime strategy: how the read/dispatch/respond loop is driven.
///
/// Implementations share the same observable behavior; only the execution
/// model differs (dedicated blocking thread vs. event loop).
pub trait RuntimeMode: Send + Sync {
    /// Establish (or re-establish) the connection to the manager.
    ///
    /// Returns false on failure; the controller retries with backoff.
    fn connect(&self) -> bool;

    /// Run the task loop until pause, disconnect, or a connection failure.
    ///
    /// Returns true for a clean pause, false when the connection ended; the
    /// controller decides whether to reconnect.
    fn run_loop(&self, processor: &TaskProcessor) -> bool;

    /// Ask the loop to stop after its current task. The socket stays open.
    fn pause(&self);

    /// Close the socket, interrupting any in-flight blocking read.
    fn disconnect(&self);

    /// Close and interrupt everything immediately.
    fn shutdown(&self);

    /// Drop the socket entirely, releasing transport resources.
    fn release(&self);

    /// True while a usable connection exists.
    fn is_connected(&self) -> bool;

    /// Local endpoint of the current connection, or empty.
    fn local_endpoint(&self) -> String;

    /// Tasks completed over the runtime's lifetime.
    fn task_count(&self) -> u64;

    /// Bytes written to the manager.
    fn bytes_sent(&self) -> u64;

    /// Bytes read from the manager.
    fn bytes_received(&self) -> u64;
}
