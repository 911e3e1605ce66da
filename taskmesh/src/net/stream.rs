//! Non-blocking stream trait and the TCP-backed default transport.

use super::error::{classify_io_error, NetError, TryStatus};
use std::io::{self, IoSlice, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Abstract non-blocking byte stream consumed by the socket adapter.
///
/// Implementations must offer single-attempt `try_*` operations with
/// classifiable outcomes: transferred bytes, would-block, or a
/// [`NetError`]. A zero-byte `try_read` completion means the peer closed
/// the stream.
pub trait NonBlockingStream: Send + Sync {
    /// Attempt one read into `buf`.
    fn try_read(&self, buf: &mut [u8]) -> Result<TryStatus, NetError>;

    /// Attempt one write from `buf`.
    fn try_write(&self, buf: &[u8]) -> Result<TryStatus, NetError>;

    /// Attempt one vectored write across `bufs`.
    ///
    /// Lets the framing layer emit header and payload in a single
    /// kernel-visible batch (scatter-send) without concatenating them.
    fn try_write_vectored(&self, bufs: &[IoSlice<'_>]) -> Result<TryStatus, NetError>;

    /// Shut both directions down, unblocking any in-flight operation on the
    /// peer thread with a classifiable error.
    fn shutdown(&self);

    /// Mark the stream closed locally; subsequent operations fail with
    /// [`NetError::Closed`].
    fn close(&self);

    /// True until `close()` is called.
    fn is_open(&self) -> bool;

    /// Peer address, or a placeholder when unavailable.
    fn remote_endpoint(&self) -> String;

    /// Local address, or a placeholder when unavailable.
    fn local_endpoint(&self) -> String;
}

/// Non-blocking TCP stream with `NO_DELAY` set.
///
/// The default transport backend. Accepted sockets and outbound client
/// sockets both come through [`from_stream`](Self::from_stream), which flips
/// the socket into non-blocking mode.
pub struct TcpBackend {
    stream: TcpStream,
    open: AtomicBool,
}

impl TcpBackend {
    /// Connect to `host:port` and wrap the resulting stream.
    ///
    /// The connect itself is the backend's blocking primitive; established
    /// sockets are switched to non-blocking for all subsequent I/O.
    pub fn connect(host: &str, port: u16) -> Result<Self, NetError> {
        let stream = TcpStream::connect((host, port)).map_err(classify_io_error)?;
        Self::from_stream(stream)
    }

    /// Wrap an already-established stream (e.g. from accept).
    pub fn from_stream(stream: TcpStream) -> Result<Self, NetError> {
        stream.set_nonblocking(true).map_err(NetError::Io)?;
        stream.set_nodelay(true).map_err(NetError::Io)?;
        Ok(Self {
            stream,
            open: AtomicBool::new(true),
        })
    }
}

impl NonBlockingStream for TcpBackend {
    fn try_read(&self, buf: &mut [u8]) -> Result<TryStatus, NetError> {
        if !self.is_open() {
            return Err(NetError::Closed);
        }
        match (&self.stream).read(buf) {
            Ok(n) => Ok(TryStatus::Done(n)),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(TryStatus::WouldBlock)
            }
            Err(e) => Err(classify_io_error(e)),
        }
    }

    fn try_write(&self, buf: &[u8]) -> Result<TryStatus, NetError> {
        if !self.is_open() {
            return Err(NetError::Closed);
        }
        match (&self.stream).write(buf) {
            Ok(n) => Ok(TryStatus::Done(n)),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(TryStatus::WouldBlock)
            }
            Err(e) => Err(classify_io_error(e)),
        }
    }

    fn try_write_vectored(&self, bufs: &[IoSlice<'_>]) -> Result<TryStatus, NetError> {
        if !self.is_open() {
            return Err(NetError::Closed);
        }
        match (&self.stream).write_vectored(bufs) {
            Ok(n) => Ok(TryStatus::Done(n)),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(TryStatus::WouldBlock)
            }
            Err(e) => Err(classify_io_error(e)),
        }
    }

    fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn remote_endpoint(&self) -> String {
        self.stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn local_endpoint(&self) -> String {
        self.stream
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

/// Listening socket with a timed accept for the dedicated acceptor thread.
///
/// `blocking_accept` returning `Ok(None)` means "no client, no error":
/// timeouts and transient conditions come back quietly so the caller can
/// re-check its running flag without noisy logs.
pub struct TcpAcceptor {
    listener: TcpListener,
    open: AtomicBool,
}

/// Sleep granularity while waiting for an incoming connection.
const ACCEPT_POLL_STEP: Duration = Duration::from_millis(10);

impl TcpAcceptor {
    /// Bind and listen on `host:port`.
    pub fn listen(host: &str, port: u16) -> Result<Self, NetError> {
        let listener = TcpListener::bind((host, port)).map_err(NetError::Io)?;
        listener.set_nonblocking(true).map_err(NetError::Io)?;
        Ok(Self {
            listener,
            open: AtomicBool::new(true),
        })
    }

    /// The bound address; useful when listening on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Wait up to `timeout` for a connection.
    ///
    /// Returns `Ok(Some(stream))` for an accepted client, `Ok(None)` on
    /// timeout or a transient condition, and `Err` only for non-transient
    /// failures.
    pub fn blocking_accept(&self, timeout: Duration) -> Result<Option<TcpBackend>, NetError> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.open.load(Ordering::Acquire) {
                return Ok(None);
            }
            match self.listener.accept() {
                Ok((stream, _peer)) => return TcpBackend::from_stream(stream).map(Some),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(ACCEPT_POLL_STEP.min(deadline - now));
                }
                // A connection that reset between arrival and accept, or an
                // interrupted syscall: let the caller re-check its flags.
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionAborted | io::ErrorKind::Interrupted
                    ) =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(NetError::Io(e)),
            }
        }
    }

    /// Stop accepting; a blocked `blocking_accept` returns `Ok(None)` on its
    /// next poll step.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}
