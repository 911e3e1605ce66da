//! Awaitable socket operations over a non-blocking stream.
//!
//! [`SocketAdapter`] adds coroutine-style awaitable reads and writes to a
//! [`NonBlockingStream`]. Each operation first attempts the non-blocking
//! call once (the fast path); only if it would block does the future
//! register a pending operation with the [`IoContext`], whose readiness
//! probe retries the call until it completes.
//!
//! At most one operation may be in flight per adapter at a time. This is a
//! static invariant of the design: the session state machine's single
//! consumer coroutine is the only issuer, so no lock enforces it (a debug
//! assertion catches misuse in tests).
//!
//! Reads and writes run to exact completion. EOF before the first byte of a
//! read classifies as [`NetError::Disconnected`]; EOF mid-frame is a fatal
//! short read/write.

use super::error::{NetError, TryStatus};
use super::stream::NonBlockingStream;
use crate::io::{IoContext, OpCategory};
use crate::wire::{FrameError, HEADER_SIZE};
use bytes::Bytes;
use parking_lot::Mutex;
use std::future::Future;
use std::io::IoSlice;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Coroutine-aware wrapper adding awaitable operations to a stream.
///
/// Clones share the underlying stream and operation state; the session and
/// the server's connection bookkeeping hold handles to the same socket.
pub struct SocketAdapter {
    stream: Arc<dyn NonBlockingStream>,
    context: Arc<IoContext>,
    op: Arc<Mutex<OpState>>,
}

impl Clone for SocketAdapter {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            context: self.context.clone(),
            op: self.op.clone(),
        }
    }
}

/// State of the adapter's single in-flight operation.
struct OpState {
    kind: OpKind,
    result: Option<Result<OpOutput, NetError>>,
}

enum OpKind {
    Idle,
    Read {
        buf: Vec<u8>,
        filled: usize,
    },
    Write {
        segments: Vec<Bytes>,
        segment: usize,
        offset: usize,
        written: usize,
        total: usize,
    },
}

enum OpOutput {
    Read(Vec<u8>),
    Written(usize),
}

enum Step {
    NotReady,
    Finish(Result<OpOutput, NetError>),
}

impl SocketAdapter {
    /// Wrap a connected stream.
    pub fn new(stream: Arc<dyn NonBlockingStream>, context: Arc<IoContext>) -> Self {
        Self {
            stream,
            context,
            op: Arc::new(Mutex::new(OpState {
                kind: OpKind::Idle,
                result: None,
            })),
        }
    }

    /// Connect to `host:port` over the default TCP backend and wrap the
    /// result.
    ///
    /// The connect itself delegates to the backend's blocking primitive;
    /// awaitability starts with the first read or write.
    pub fn connect(
        host: &str,
        port: u16,
        context: Arc<IoContext>,
    ) -> Result<Self, NetError> {
        let backend = super::stream::TcpBackend::connect(host, port)?;
        Ok(Self::new(Arc::new(backend), context))
    }

    /// Awaitable exact read of `len` bytes.
    pub fn read(&self, len: usize) -> ReadOp<'_> {
        ReadOp {
            adapter: self,
            len,
            category: OpCategory::Read,
            started: false,
        }
    }

    /// Awaitable read of one fixed-size frame header.
    ///
    /// Separate from [`read`](Self::read) so header waits are attributed to
    /// their own histogram category and header-specific policies have a
    /// place to live.
    pub fn read_header(&self) -> ReadOp<'_> {
        ReadOp {
            adapter: self,
            len: HEADER_SIZE,
            category: OpCategory::ReadHeader,
            started: false,
        }
    }

    /// Awaitable exact write of one buffer.
    pub fn write(&self, data: Bytes) -> WriteOp<'_> {
        self.write_segments(vec![data])
    }

    /// Awaitable scatter-send of a frame: header and payload as two
    /// segments in a single vectored write when the transport accepts it.
    pub fn write_frame(&self, header: [u8; HEADER_SIZE], payload: Bytes) -> WriteOp<'_> {
        let mut segments = vec![Bytes::copy_from_slice(&header)];
        if !payload.is_empty() {
            segments.push(payload);
        }
        self.write_segments(segments)
    }

    fn write_segments(&self, segments: Vec<Bytes>) -> WriteOp<'_> {
        WriteOp {
            adapter: self,
            segments: Some(segments),
            started: false,
        }
    }

    /// Shut the stream down, unblocking any pending operation.
    pub fn shutdown_stream(&self) {
        self.stream.shutdown();
    }

    /// Close the stream locally.
    pub fn close(&self) {
        self.stream.close();
    }

    /// True until the stream is closed locally.
    pub fn is_open(&self) -> bool {
        self.stream.is_open()
    }

    /// Peer address for logs and session info.
    pub fn remote_endpoint(&self) -> String {
        self.stream.remote_endpoint()
    }

    /// Local address.
    pub fn local_endpoint(&self) -> String {
        self.stream.local_endpoint()
    }

    fn register(&self, category: OpCategory, waker: std::task::Waker) {
        let stream = self.stream.clone();
        let op = self.op.clone();
        self.context.register_pending(
            category,
            Box::new(move || try_advance(stream.as_ref(), &mut op.lock())),
            waker,
        );
    }
}

/// Advance the active operation by one round of non-blocking calls.
///
/// Returns true when the operation finished (success or classified error);
/// the outcome is parked in `state.result` for the owning future.
fn try_advance(stream: &dyn NonBlockingStream, state: &mut OpState) -> bool {
    if state.result.is_some() {
        return true;
    }

    let step = match &mut state.kind {
        OpKind::Idle => Step::NotReady,
        OpKind::Read { buf, filled } => {
            let mut step = Step::NotReady;
            loop {
                if *filled == buf.len() {
                    step = Step::Finish(Ok(OpOutput::Read(std::mem::take(buf))));
                    break;
                }
                match stream.try_read(&mut buf[*filled..]) {
                    Ok(TryStatus::Done(0)) => {
                        let err = if *filled == 0 {
                            NetError::Disconnected
                        } else {
                            NetError::Frame(FrameError::ShortRead {
                                read: *filled,
                                expected: buf.len(),
                            })
                        };
                        step = Step::Finish(Err(err));
                        break;
                    }
                    Ok(TryStatus::Done(n)) => *filled += n,
                    Ok(TryStatus::WouldBlock) => break,
                    Err(e) => {
                        step = Step::Finish(Err(e));
                        break;
                    }
                }
            }
            step
        }
        OpKind::Write {
            segments,
            segment,
            offset,
            written,
            total,
        } => {
            let mut step = Step::NotReady;
            loop {
                if *segment == segments.len() {
                    step = Step::Finish(Ok(OpOutput::Written(*written)));
                    break;
                }
                let mut slices: Vec<IoSlice<'_>> = Vec::with_capacity(segments.len() - *segment);
                slices.push(IoSlice::new(&segments[*segment][*offset..]));
                for seg in &segments[*segment + 1..] {
                    slices.push(IoSlice::new(seg));
                }
                match stream.try_write_vectored(&slices) {
                    Ok(TryStatus::Done(0)) => {
                        step = Step::Finish(Err(NetError::Frame(FrameError::ShortWrite {
                            written: *written,
                            expected: *total,
                        })));
                        break;
                    }
                    Ok(TryStatus::Done(mut n)) => {
                        *written += n;
                        while n > 0 {
                            let remaining = segments[*segment].len() - *offset;
                            if n >= remaining {
                                n -= remaining;
                                *segment += 1;
                                *offset = 0;
                            } else {
                                *offset += n;
                                n = 0;
                            }
                        }
                    }
                    Ok(TryStatus::WouldBlock) => break,
                    Err(e) => {
                        step = Step::Finish(Err(e));
                        break;
                    }
                }
            }
            step
        }
    };

    match step {
        Step::NotReady => false,
        Step::Finish(result) => {
            state.kind = OpKind::Idle;
            state.result = Some(result);
            true
        }
    }
}

/// Future for an exact read. Resolves to the filled buffer.
pub struct ReadOp<'a> {
    adapter: &'a SocketAdapter,
    len: usize,
    category: OpCategory,
    started: bool,
}

impl Future for ReadOp<'_> {
    type Output = Result<Vec<u8>, NetError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let adapter = this.adapter;

        if !this.started {
            this.started = true;
            let mut state = adapter.op.lock();
            debug_assert!(
                matches!(state.kind, OpKind::Idle),
                "at most one in-flight operation per adapter"
            );
            state.kind = OpKind::Read {
                buf: vec![0u8; this.len],
                filled: 0,
            };
            state.result = None;

            if try_advance(adapter.stream.as_ref(), &mut state) {
                return Poll::Ready(take_read_result(&mut state));
            }
            drop(state);
            adapter.register(this.category, cx.waker().clone());
            return Poll::Pending;
        }

        let mut state = adapter.op.lock();
        if state.result.is_some() {
            Poll::Ready(take_read_result(&mut state))
        } else {
            Poll::Pending
        }
    }
}

fn take_read_result(state: &mut OpState) -> Result<Vec<u8>, NetError> {
    match state.result.take() {
        Some(Ok(OpOutput::Read(buf))) => Ok(buf),
        Some(Err(e)) => Err(e),
        // One op in flight: a read future only ever sees a read outcome.
        Some(Ok(OpOutput::Written(_))) | None => unreachable!("read op resolved without result"),
    }
}

/// Future for an exact (possibly multi-segment) write. Resolves to the total
/// bytes written.
pub struct WriteOp<'a> {
    adapter: &'a SocketAdapter,
    segments: Option<Vec<Bytes>>,
    started: bool,
}

impl Future for WriteOp<'_> {
    type Output = Result<usize, NetError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let adapter = this.adapter;

        if !this.started {
            this.started = true;
            let segments = this.segments.take().unwrap_or_default();
            let total: usize = segments.iter().map(|s| s.len()).sum();

            let mut state = adapter.op.lock();
            debug_assert!(
                matches!(state.kind, OpKind::Idle),
                "at most one in-flight operation per adapter"
            );
            state.kind = OpKind::Write {
                segments,
                segment: 0,
                offset: 0,
                written: 0,
                total,
            };
            state.result = None;

            if try_advance(adapter.stream.as_ref(), &mut state) {
                return Poll::Ready(take_write_result(&mut state));
            }
            drop(state);
            adapter.register(OpCategory::Write, cx.waker().clone());
            return Poll::Pending;
        }

        let mut state = adapter.op.lock();
        if state.result.is_some() {
            Poll::Ready(take_write_result(&mut state))
        } else {
            Poll::Pending
        }
    }
}

fn take_write_result(state: &mut OpState) -> Result<usize, NetError> {
    match state.result.take() {
        Some(Ok(OpOutput::Written(n))) => Ok(n),
        Some(Err(e)) => Err(e),
        Some(Ok(OpOutput::Read(_))) | None => unreachable!("write op resolved without result"),
    }
}
