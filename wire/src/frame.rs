//! Reassembly of length-prefixed frames from a byte stream.

use std::collections::VecDeque;

use tracing::warn;

use crate::error::{DecodeError, LimitKind, WireResult};
use crate::header::HEADER_SIZE;
use crate::limits::Limits;

/// Buffers transport reads until complete messages are available.
///
/// Chunks may split a message anywhere, including inside the 2-byte length
/// prefix. Complete messages are queued in arrival order.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
    frames: VecDeque<Vec<u8>>,
    limits: Limits,
}

impl FrameBuffer {
    /// Creates an empty buffer with the given limits.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            pending: Vec::new(),
            frames: VecDeque::new(),
            limits,
        }
    }

    /// Returns the number of buffered bytes of the incomplete frame.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns the number of complete frames waiting to be popped.
    #[must_use]
    pub fn ready(&self) -> usize {
        self.frames.len()
    }

    /// Feeds a chunk of transport data.
    ///
    /// On a framing error the incomplete frame is discarded, since the stream
    /// position can no longer be trusted. Frames completed earlier stay queued.
    pub fn push(&mut self, mut data: &[u8]) -> WireResult<usize> {
        while !data.is_empty() {
            if self.pending.len() < 2 {
                let take = (2 - self.pending.len()).min(data.len());
                self.pending.extend_from_slice(&data[..take]);
                data = &data[take..];
                if self.pending.len() < 2 {
                    break;
                }
            }

            let length = u16::from_le_bytes([self.pending[0], self.pending[1]]);
            let frame_len = usize::from(length);
            if frame_len < HEADER_SIZE {
                self.pending.clear();
                return Err(DecodeError::FrameTooSmall { length });
            }
            if frame_len > self.limits.max_frame_bytes {
                self.pending.clear();
                warn!(frame_len, "discarding oversized frame");
                return Err(DecodeError::LimitsExceeded {
                    kind: LimitKind::FrameBytes,
                    limit: self.limits.max_frame_bytes,
                    actual: frame_len,
                });
            }

            let take = (frame_len - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.pending.len() == frame_len {
                if self.frames.len() >= self.limits.max_pending_frames {
                    self.pending.clear();
                    return Err(DecodeError::LimitsExceeded {
                        kind: LimitKind::PendingFrames,
                        limit: self.limits.max_pending_frames,
                        actual: self.frames.len() + 1,
                    });
                }
                self.frames.push_back(std::mem::take(&mut self.pending));
            }
        }
        Ok(self.frames.len())
    }

    /// Pops the oldest complete frame.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.frames.pop_front()
    }

    /// Drops all buffered data.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.frames.clear();
    }
}

impl Iterator for FrameBuffer {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(opcode: u16, payload: &[u8]) -> Vec<u8> {
        let len = u16::try_from(HEADER_SIZE + payload.len()).unwrap();
        let mut out = len.to_le_bytes().to_vec();
        out.extend_from_slice(&opcode.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn single_complete_frame() {
        let mut buf = FrameBuffer::new(Limits::for_testing());
        let msg = frame(1, &[9, 9]);
        assert_eq!(buf.push(&msg).unwrap(), 1);
        assert_eq!(buf.pop().unwrap(), msg);
        assert!(buf.pop().is_none());
    }

    #[test]
    fn two_frames_in_one_chunk() {
        let mut buf = FrameBuffer::new(Limits::for_testing());
        let a = frame(1, &[1]);
        let b = frame(2, &[2, 2, 2]);
        let mut chunk = a.clone();
        chunk.extend_from_slice(&b);
        assert_eq!(buf.push(&chunk).unwrap(), 2);
        assert_eq!(buf.pop().unwrap(), a);
        assert_eq!(buf.pop().unwrap(), b);
    }

    #[test]
    fn length_prefix_split_across_chunks() {
        let mut buf = FrameBuffer::new(Limits::for_testing());
        let msg = frame(0x1234, &[5, 6, 7]);
        assert_eq!(buf.push(&msg[..1]).unwrap(), 0);
        assert_eq!(buf.pending_len(), 1);
        assert_eq!(buf.push(&msg[1..3]).unwrap(), 0);
        assert_eq!(buf.push(&msg[3..]).unwrap(), 1);
        assert_eq!(buf.pop().unwrap(), msg);
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn byte_at_a_time() {
        let mut buf = FrameBuffer::new(Limits::for_testing());
        let msg = frame(3, b"abcdef");
        for byte in &msg {
            buf.push(std::slice::from_ref(byte)).unwrap();
        }
        assert_eq!(buf.collect::<Vec<_>>(), vec![msg]);
    }

    #[test]
    fn rejects_frame_below_header_size() {
        let mut buf = FrameBuffer::new(Limits::for_testing());
        let err = buf.push(&[3, 0, 1, 0]).unwrap_err();
        assert_eq!(err, DecodeError::FrameTooSmall { length: 3 });
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn rejects_oversized_frame() {
        let mut buf = FrameBuffer::new(Limits::for_testing());
        let err = buf.push(&[0xFF, 0x7F]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::LimitsExceeded {
                kind: LimitKind::FrameBytes,
                ..
            }
        ));
    }

    #[test]
    fn pending_frame_limit() {
        let limits = Limits {
            max_frame_bytes: 64,
            max_pending_frames: 1,
        };
        let mut buf = FrameBuffer::new(limits);
        buf.push(&frame(1, &[])).unwrap();
        let err = buf.push(&frame(2, &[])).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::LimitsExceeded {
                kind: LimitKind::PendingFrames,
                ..
            }
        ));
        assert_eq!(buf.ready(), 1);
    }
}
