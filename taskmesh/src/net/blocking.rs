//! Blocking TCP stream for the synchronous worker runtime.
//!
//! The blocking strategy reads and writes on a dedicated thread; this type
//! keeps the socket in blocking mode and exposes exact-completion reads and
//! vectored frame writes. `shutdown` from another thread interrupts an
//! in-flight blocking read with a classifiable error.

use super::error::{classify_io_error, NetError};
use crate::wire::{FrameError, HEADER_SIZE};
use bytes::Bytes;
use std::io::{IoSlice, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};

/// Blocking TCP stream with `NO_DELAY` set.
pub struct BlockingTcp {
    stream: TcpStream,
    open: AtomicBool,
}

impl BlockingTcp {
    /// Connect to `host:port`.
    pub fn connect(host: &str, port: u16) -> Result<Self, NetError> {
        let stream = TcpStream::connect((host, port)).map_err(classify_io_error)?;
        stream.set_nodelay(true).map_err(NetError::Io)?;
        Ok(Self {
            stream,
            open: AtomicBool::new(true),
        })
    }

    /// Read exactly `len` bytes.
    ///
    /// EOF before the first byte is [`NetError::Disconnected`]; EOF mid-way
    /// is a fatal short read.
    pub fn read_exact(&self, len: usize) -> Result<Vec<u8>, NetError> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            if !self.is_open() {
                return Err(NetError::Closed);
            }
            match (&self.stream).read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(if filled == 0 {
                        NetError::Disconnected
                    } else {
                        NetError::Frame(FrameError::ShortRead {
                            read: filled,
                            expected: len,
                        })
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(classify_io_error(e)),
            }
        }
        Ok(buf)
    }

    /// Write a whole frame (header + payload) with vectored writes.
    ///
    /// Returns the total bytes written.
    pub fn write_frame(
        &self,
        header: [u8; HEADER_SIZE],
        payload: &Bytes,
    ) -> Result<usize, NetError> {
        let total = HEADER_SIZE + payload.len();
        let mut written = 0;
        while written < total {
            if !self.is_open() {
                return Err(NetError::Closed);
            }
            let slices: Vec<IoSlice<'_>> = if written < HEADER_SIZE {
                if payload.is_empty() {
                    vec![IoSlice::new(&header[written..])]
                } else {
                    vec![IoSlice::new(&header[written..]), IoSlice::new(payload)]
                }
            } else {
                vec![IoSlice::new(&payload[written - HEADER_SIZE..])]
            };
            match (&self.stream).write_vectored(&slices) {
                Ok(0) => {
                    return Err(NetError::Frame(FrameError::ShortWrite {
                        written,
                        expected: total,
                    }));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(classify_io_error(e)),
            }
        }
        Ok(total)
    }

    /// Shut both directions down, interrupting a blocked read.
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    /// Mark closed locally and shut the socket down.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }

    /// True until `close()` is called.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Local address, or a placeholder when unavailable.
    pub fn local_endpoint(&self) -> String {
        self.stream
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Peer address, or a placeholder when unavailable.
    pub fn remote_endpoint(&self) -> String {
        self.stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireHeader;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_frame_roundtrip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; HEADER_SIZE + 5];
            stream.read_exact(&mut buf).unwrap();
            buf
        });

        let client = BlockingTcp::connect("127.0.0.1", addr.port()).unwrap();
        let header = WireHeader {
            task_id: 7,
            body_size: 5,
            skill_id: 1,
        };
        let written = client
            .write_frame(header.encode(), &Bytes::from_static(b"hello"))
            .unwrap();
        assert_eq!(written, HEADER_SIZE + 5);

        let seen = server.join().unwrap();
        assert_eq!(&seen[..HEADER_SIZE], &header.encode());
        assert_eq!(&seen[HEADER_SIZE..], b"hello");
    }

    #[test]
    fn test_read_exact_sees_peer_close_as_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let client = BlockingTcp::connect("127.0.0.1", addr.port()).unwrap();
        server.join().unwrap();

        let err = client.read_exact(4).unwrap_err();
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_shutdown_interrupts_blocked_read() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = std::sync::Arc::new(BlockingTcp::connect("127.0.0.1", addr.port()).unwrap());
        let (_server_stream, _) = listener.accept().unwrap();

        let reader = {
            let client = client.clone();
            thread::spawn(move || client.read_exact(4))
        };

        thread::sleep(std::time::Duration::from_millis(50));
        client.shutdown();

        let result = reader.join().unwrap();
        assert!(result.is_err());
    }
}
