//! Bounded identifier newtypes for bus entities.
//!
//! Bus numbering is 1-based everywhere: modules and inputs `1..=16`,
//! channels `1..=8`. Construction validates the range so a value of these
//! types is always addressable.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! define_bus_id {
    ($(#[doc = $doc:expr])* $name:ident, max = $max:expr, err = $err:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub struct $name(u8);

        impl $name {
            /// Highest valid number.
            pub const MAX: u8 = $max;

            /// Validate and wrap a 1-based number.
            ///
            /// # Errors
            ///
            /// Returns a [`ValidationError`] when `value` is outside `1..=MAX`.
            pub fn new(value: u8) -> Result<Self, ValidationError> {
                if (1..=Self::MAX).contains(&value) {
                    Ok(Self(value))
                } else {
                    Err(ValidationError::$err(value))
                }
            }

            /// The 1-based number.
            #[must_use]
            pub fn get(self) -> u8 {
                self.0
            }

            /// Zero-based position, for indexing arrays.
            #[must_use]
            pub fn index(self) -> usize {
                usize::from(self.0 - 1)
            }

            /// Every valid value in ascending order.
            pub fn all() -> impl Iterator<Item = Self> {
                (1..=Self::MAX).map(Self)
            }
        }

        impl TryFrom<u8> for $name {
            type Error = ValidationError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for u8 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:02}", self.0)
            }
        }
    };
}

define_bus_id!(
    /// Identifier of an output module (Exo), `1..=16`.
    ModuleId,
    max = 16,
    err = ModuleOutOfRange
);

define_bus_id!(
    /// Identifier of an input module (Exi), `1..=16`.
    InputId,
    max = 16,
    err = InputOutOfRange
);

define_bus_id!(
    /// One of the eight outputs of a module, `1..=8`.
    Channel,
    max = 8,
    err = ChannelOutOfRange
);

impl Channel {
    /// Build from a zero-based array position.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ChannelOutOfRange`] for positions past 7.
    pub fn from_index(index: usize) -> Result<Self, ValidationError> {
        let number = u8::try_from(index + 1).map_err(|_| ValidationError::ChannelOutOfRange(0))?;
        Self::new(number)
    }
}

/// Identifier of a configured device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u32);

impl DeviceId {
    /// Wrap a configured device number.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Access the inner number.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_boundaries_of_module_range() {
        assert!(ModuleId::new(1).is_ok());
        assert!(ModuleId::new(16).is_ok());
    }

    #[test]
    fn should_reject_zero_and_overflowing_module_ids() {
        assert_eq!(ModuleId::new(0), Err(ValidationError::ModuleOutOfRange(0)));
        assert_eq!(
            ModuleId::new(17),
            Err(ValidationError::ModuleOutOfRange(17))
        );
    }

    #[test]
    fn should_reject_channel_nine() {
        assert_eq!(Channel::new(9), Err(ValidationError::ChannelOutOfRange(9)));
    }

    #[test]
    fn should_map_channel_to_zero_based_index() {
        let channel = Channel::new(3).unwrap();
        assert_eq!(channel.index(), 2);
        assert_eq!(Channel::from_index(2).unwrap(), channel);
    }

    #[test]
    fn should_iterate_all_channels_in_order() {
        let numbers: Vec<u8> = Channel::all().map(Channel::get).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn should_reject_out_of_range_id_during_deserialization() {
        let result: Result<ModuleId, _> = serde_json::from_str("42");
        assert!(result.is_err());
        let ok: ModuleId = serde_json::from_str("4").unwrap();
        assert_eq!(ok.get(), 4);
    }

    #[test]
    fn should_display_with_two_digits() {
        assert_eq!(ModuleId::new(3).unwrap().to_string(), "03");
    }

    #[test]
    fn should_parse_device_id_from_str() {
        let id: DeviceId = "12".parse().unwrap();
        assert_eq!(id.get(), 12);
    }
}
