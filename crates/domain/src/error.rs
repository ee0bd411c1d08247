//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`MinidoError`]
//! via `From` at the port boundary.

use crate::frame::FrameError;

/// Boxed error used for infrastructure failures crossing a port boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error for bus and control-plane operations.
#[derive(Debug, thiserror::Error)]
pub enum MinidoError {
    /// A domain invariant was violated by the caller's input.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The addressed module or device does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A frame could not be built or parsed.
    #[error("frame error")]
    Frame(#[from] FrameError),

    /// The persistence layer failed.
    #[error("storage error")]
    Storage(#[source] BoxError),

    /// The bus transport failed to accept an outbound frame.
    #[error("transport error")]
    Transport(#[source] BoxError),
}

/// Caller input that violates a domain rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Output module ids live in `1..=16`.
    #[error("module id {0} is outside 1..=16")]
    ModuleOutOfRange(u8),

    /// Input module ids live in `1..=16`.
    #[error("input id {0} is outside 1..=16")]
    InputOutOfRange(u8),

    /// Channels are numbered `1..=8`.
    #[error("channel {0} is outside 1..=8")]
    ChannelOutOfRange(u8),

    /// A channel given as text that is not a number at all.
    #[error("`{0}` is not a channel number")]
    MalformedChannel(String),

    /// A device name must not be blank.
    #[error("device name must not be empty")]
    EmptyName,

    /// A device is missing a binding its kind requires.
    #[error("device {device} is missing the `{role}` binding")]
    MissingRole {
        /// Offending device id.
        device: u32,
        /// The role that must be bound.
        role: &'static str,
    },

    /// Two devices share one id.
    #[error("device id {0} is declared more than once")]
    DuplicateDevice(u32),

    /// Both shade roles point at the same output channel.
    #[error("device {0} binds `up` and `down` to the same channel")]
    SharedShadeChannel(u32),

    /// The value is not understood by the targeted device.
    #[error("`{value}` is not a valid {kind} command")]
    InvalidCommand {
        /// Device kind that rejected the value.
        kind: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Learn mode must be one of `add`, `cancel`, `remove`.
    #[error("unknown learn mode `{0}`")]
    UnknownLearnMode(String),
}

/// A lookup by id found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    /// Kind of thing that was looked up (e.g. `"Module"`).
    pub entity: &'static str,
    /// The id that was requested.
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_found_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Module",
            id: "7".to_string(),
        };
        assert_eq!(err.to_string(), "Module not found: 7");
    }

    #[test]
    fn should_convert_validation_error_into_minido_error() {
        let err: MinidoError = ValidationError::ChannelOutOfRange(9).into();
        assert!(matches!(
            err,
            MinidoError::Validation(ValidationError::ChannelOutOfRange(9))
        ));
    }

    #[test]
    fn should_describe_missing_role() {
        let err = ValidationError::MissingRole {
            device: 4,
            role: "power",
        };
        assert_eq!(err.to_string(), "device 4 is missing the `power` binding");
    }
}
