//! Wire frame and its codec.
//!
//! Layout on the wire:
//!
//! ```text
//! 0x23 | dest | src | length | command | payload ... | checksum
//! ```
//!
//! `length` counts every byte after itself (`command`, `payload` and
//! `checksum`), so a frame occupies `length + 4` bytes. The checksum is the
//! XOR of `command` and every payload byte.

use serde::Serialize;

/// Marker byte that starts every frame.
pub const SYNC: u8 = 0x23;

/// Bytes before the command: sync, dest, src, length.
pub const HEADER_LEN: usize = 4;

/// Smallest complete frame: header plus command and checksum.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 2;

/// Largest payload whose length still fits the length byte.
pub const MAX_PAYLOAD: usize = 253;

/// Errors raised while encoding or decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The trailing byte disagrees with the XOR of command and payload.
    #[error("checksum mismatch: computed {expected:#04x}, frame carries {actual:#04x}")]
    BadChecksum {
        /// Checksum computed over the received bytes.
        expected: u8,
        /// Checksum byte carried by the frame.
        actual: u8,
    },

    /// The buffer does not start with [`SYNC`].
    #[error("expected sync byte 0x23, found {0:#04x}")]
    NotSynced(u8),

    /// The declared length cannot hold a command and a checksum.
    #[error("declared length {0} is too short for command and checksum")]
    LengthTooShort(u8),

    /// The payload overflows the length byte.
    #[error("payload of {0} bytes does not fit in a frame")]
    PayloadTooLong(usize),
}

/// A validated bus frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub dest: u8,
    pub src: u8,
    pub command: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn new(dest: u8, src: u8, command: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            dest,
            src,
            command,
            payload: payload.into(),
        }
    }

    /// XOR checksum of this frame's command and payload.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        checksum(self.command, &self.payload)
    }

    /// Serialize to wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::PayloadTooLong`] when the payload exceeds [`MAX_PAYLOAD`].
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(self.dest, self.src, self.command, &self.payload)
    }
}

/// XOR-fold of `command` followed by `payload`.
#[must_use]
pub fn checksum(command: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(command, |acc, byte| acc ^ byte)
}

/// Build the wire bytes for one frame.
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLong`] when the payload exceeds [`MAX_PAYLOAD`].
pub fn encode(dest: u8, src: u8, command: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let length = u8::try_from(payload.len() + 2)
        .map_err(|_| FrameError::PayloadTooLong(payload.len()))?;
    let mut bytes = Vec::with_capacity(usize::from(length) + HEADER_LEN);
    bytes.extend_from_slice(&[SYNC, dest, src, length, command]);
    bytes.extend_from_slice(payload);
    bytes.push(checksum(command, payload));
    Ok(bytes)
}

/// Outcome of [`decode_one`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete, checksum-valid frame occupying the first `consumed` bytes.
    Frame { frame: Frame, consumed: usize },
    /// The buffer holds the start of a frame but not all of it.
    NeedMoreData,
    /// The first `consumed` bytes cannot form a frame and should be dropped.
    Invalid { error: FrameError, consumed: usize },
}

/// Try to decode a single frame from the start of `buffer`.
#[must_use]
pub fn decode_one(buffer: &[u8]) -> Decoded {
    if buffer.len() < HEADER_LEN {
        return Decoded::NeedMoreData;
    }
    if buffer[0] != SYNC {
        return Decoded::Invalid {
            error: FrameError::NotSynced(buffer[0]),
            consumed: 1,
        };
    }

    let length = buffer[3];
    let total = usize::from(length) + HEADER_LEN;
    if buffer.len() < total {
        return Decoded::NeedMoreData;
    }
    if length < 2 {
        return Decoded::Invalid {
            error: FrameError::LengthTooShort(length),
            consumed: total,
        };
    }

    let command = buffer[HEADER_LEN];
    let payload = &buffer[HEADER_LEN + 1..total - 1];
    let actual = buffer[total - 1];
    let expected = checksum(command, payload);
    if expected != actual {
        return Decoded::Invalid {
            error: FrameError::BadChecksum { expected, actual },
            consumed: total,
        };
    }

    Decoded::Frame {
        frame: Frame::new(buffer[1], buffer[2], command, payload),
        consumed: total,
    }
}

/// Total frame size announced by a header, if enough bytes are present to read it.
#[must_use]
pub fn announced_len(buffer: &[u8]) -> Option<usize> {
    buffer
        .get(3)
        .map(|length| usize::from(*length) + HEADER_LEN)
}
