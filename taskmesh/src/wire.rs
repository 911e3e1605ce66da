//! Wire framing for task requests and responses.
//!
//! Every frame is a fixed 12-byte header followed by `body_size` opaque
//! payload bytes. The header carries three little-endian u32 fields in order
//! `task_id`, `body_size`, `skill_id`, regardless of host endianness. The
//! header is self-delimiting: a reader first consumes 12 bytes, then exactly
//! `body_size` bytes. There is no separator, trailer, or checksum; the
//! transport provides reliable ordered delivery.

use crate::message::Task;
use bytes::Bytes;
use thiserror::Error;

/// Size of the wire header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Errors produced when framing or de-framing a task.
///
/// All of these are fatal for the session they occur in: once framing is in
/// doubt the byte stream cannot be resynchronized.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Payload length does not fit in the header's u32 body_size field.
    #[error("payload of {0} bytes exceeds protocol limits")]
    TooLargePayload(usize),

    /// Peer announced a body larger than the configured maximum.
    #[error("announced body of {size} bytes exceeds the {max} byte frame limit")]
    BodySizeTooLarge { size: u64, max: usize },

    /// Stream ended before a full frame was read.
    #[error("stream ended mid-frame after {read} of {expected} bytes")]
    ShortRead { read: usize, expected: usize },

    /// Stream ended before a full frame was written.
    #[error("stream ended mid-frame after {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

/// The fixed 12-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireHeader {
    /// Unique task identifier shared across request and response.
    pub task_id: u32,
    /// Exact length of the payload bytes that follow. Zero is legal.
    pub body_size: u32,
    /// Dispatch discriminator; copied back by the worker on success.
    pub skill_id: u32,
}

impl WireHeader {
    /// Builds the request header for a task.
    ///
    /// The framing invariant `body_size == payload.len()` holds by
    /// construction; [`encode_frame`] is the checked entry point.
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_id: task.task_id,
            body_size: task.payload.len() as u32,
            skill_id: task.skill_id,
        }
    }

    /// Serializes the header into its 12-byte little-endian wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.task_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.body_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.skill_id.to_le_bytes());
        buf
    }

    /// Deserializes a header from its 12-byte little-endian wire form.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            task_id: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            body_size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            skill_id: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        }
    }

    /// Validates an announced body size against the configured frame limit.
    pub fn check_body_size(&self, max_frame_size: usize) -> Result<(), FrameError> {
        if self.body_size as usize > max_frame_size {
            return Err(FrameError::BodySizeTooLarge {
                size: self.body_size as u64,
                max: max_frame_size,
            });
        }
        Ok(())
    }
}

/// Frames a request or response as (header bytes, payload).
///
/// The two segments are kept separate so the writer can emit them with a
/// single vectored write (scatter-send) instead of concatenating into a
/// fresh buffer.
pub fn encode_frame(
    task_id: u32,
    skill_id: u32,
    payload: Bytes,
) -> Result<([u8; HEADER_SIZE], Bytes), FrameError> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::TooLargePayload(payload.len()));
    }
    let header = WireHeader {
        task_id,
        body_size: payload.len() as u32,
        skill_id,
    };
    Ok((header.encode(), payload))
}
