//! Transport error taxonomy.
//!
//! Transient conditions (would-block, interrupted) are not errors; they are
//! the [`TryStatus::WouldBlock`] value and never surface past the event
//! loop's retry machinery. Everything else is classified so sessions can
//! tell an orderly disconnect from a fault.

use crate::wire::FrameError;
use std::io;
use thiserror::Error;

/// Outcome of a single non-blocking attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryStatus {
    /// The call transferred this many bytes. Zero on a read means the peer
    /// closed the stream.
    Done(usize),
    /// The operation would block; retry when the stream is ready.
    WouldBlock,
}

/// Classified transport failure.
#[derive(Debug, Error)]
pub enum NetError {
    /// Peer closed the connection at a frame boundary (zero-byte read).
    #[error("connection closed by peer")]
    Disconnected,

    /// Connection dropped mid-operation (reset, aborted, not connected,
    /// broken pipe).
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] io::Error),

    /// Operation attempted on a socket already closed locally.
    #[error("socket closed")]
    Closed,

    /// Framing violation; fatal for the connection.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Any other I/O failure.
    #[error("i/o error: {0}")]
    Io(#[source] io::Error),
}

impl NetError {
    /// True for disconnect-class failures: the peer went away and the
    /// session should terminate cleanly rather than report a fault.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            NetError::Disconnected | NetError::ConnectionLost(_) | NetError::Closed
        )
    }
}

/// Classify an I/O error from a non-blocking call.
///
/// Callers have already peeled off `WouldBlock`/`Interrupted` as
/// [`TryStatus::WouldBlock`].
pub(crate) fn classify_io_error(e: io::Error) -> NetError {
    match e.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe => NetError::ConnectionLost(e),
        _ => NetError::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_classification() {
        assert!(NetError::Disconnected.is_disconnect());
        assert!(NetError::Closed.is_disconnect());
        assert!(
            NetError::ConnectionLost(io::Error::from(io::ErrorKind::ConnectionReset))
                .is_disconnect()
        );

        assert!(!NetError::Io(io::Error::from(io::ErrorKind::Other)).is_disconnect());
        assert!(!NetError::Frame(FrameError::ShortRead {
            read: 1,
            expected: 12
        })
        .is_disconnect());
    }

    #[test]
    fn test_classify_io_error() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::NotConnected,
            io::ErrorKind::BrokenPipe,
        ] {
            assert!(classify_io_error(io::Error::from(kind)).is_disconnect());
        }
        assert!(matches!(
            classify_io_error(io::Error::from(io::ErrorKind::PermissionDenied)),
            NetError::Io(_)
        ));
    }

    #[test]
    fn test_frame_error_converts() {
        let err: NetError = FrameError::BodySizeTooLarge {
            size: 100,
            max: 10,
        }
        .into();
        assert!(matches!(err, NetError::Frame(_)));
        assert!(!err.is_disconnect());
    }
}
