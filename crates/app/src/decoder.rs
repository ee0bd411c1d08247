//! Incremental frame decoder for one bus connection.
//!
//! Bytes arrive in arbitrary chunks. The decoder accumulates them, skips
//! garbage up to the next sync byte, waits for partial frames, drops frames that fail
//! validation and hands back every complete frame in arrival order.

use serde::Serialize;

use minido_domain::frame::{self, Decoded, Frame, MIN_FRAME_LEN, SYNC};

/// Running counters of one decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Frames emitted.
    pub frames: u64,
    /// Frames dropped for a bad checksum or length.
    pub invalid: u64,
    /// Bytes thrown away, including invalid frames and garbage before a sync byte.
    pub discarded_bytes: u64,
}

/// Stateful decoder owned by a single connection.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    stats: DecoderStats,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received but not yet decoded.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Append `bytes` and return every frame that is now complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while self.buffer.len() >= MIN_FRAME_LEN {
            if self.buffer[0] != SYNC {
                if let Some(offset) = self.buffer.iter().position(|byte| *byte == SYNC) {
                    tracing::debug!(skipped = offset, "resynchronizing on sync byte");
                    self.discard(offset);
                    continue;
                }
                tracing::warn!(
                    discarded = self.buffer.len(),
                    "no sync byte in buffer, dropping unsyncable data"
                );
                self.discard(self.buffer.len());
                break;
            }

            let Some(total) = frame::announced_len(&self.buffer) else {
                break;
            };
            if self.buffer.len() < total {
                break;
            }

            match frame::decode_one(&self.buffer) {
                Decoded::Frame { frame, consumed } => {
                    self.buffer.drain(..consumed);
                    self.stats.frames += 1;
                    frames.push(frame);
                }
                Decoded::Invalid { error, consumed } => {
                    tracing::warn!(%error, consumed, "dropping invalid frame");
                    self.stats.invalid += 1;
                    self.discard(consumed);
                }
                Decoded::NeedMoreData => break,
            }
        }

        frames
    }

    fn discard(&mut self, count: usize) {
        self.buffer.drain(..count);
        self.stats.discarded_bytes += count as u64;
    }
}
