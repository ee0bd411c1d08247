//! Device: a named appliance driven by one or two output channels.
//!
//! Devices are declared in configuration and never change membership at
//! runtime. Their behaviour lives in the `app` crate; this module holds the
//! declaration, its invariants and the command vocabulary.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MinidoError, ValidationError};
use crate::id::{Channel, DeviceId, ModuleId};

/// Closed set of device behaviours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// On/off or dimmable load on a single channel.
    #[serde(alias = "light", alias = "rcs", alias = "default")]
    Switch,
    /// Motorised shade on an `up` and a `down` channel.
    #[serde(alias = "store")]
    Shade,
    /// Mechanical ventilation; accepted but not driven.
    #[serde(alias = "vmc")]
    Ventilation,
}

impl DeviceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Shade => "shade",
            Self::Ventilation => "ventilation",
        }
    }

    /// Roles a device of this kind must bind.
    #[must_use]
    pub fn required_roles(self) -> &'static [Role] {
        match self {
            Self::Switch => &[Role::Power],
            Self::Shade => &[Role::Up, Role::Down],
            Self::Ventilation => &[],
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purpose of a channel within a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Power,
    Up,
    Down,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Address of one output: a module and one of its channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub module: ModuleId,
    pub channel: Channel,
}

impl ChannelRef {
    #[must_use]
    pub fn new(module: ModuleId, channel: Channel) -> Self {
        Self { module, channel }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EXO-{}/{}", self.module, self.channel)
    }
}

/// A configured device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub name: String,
    pub floor: Option<String>,
    pub room: Option<String>,
    pub description: Option<String>,
    /// Position on a floor plan, in plan units.
    pub posx: Option<i32>,
    pub posy: Option<i32>,
    pub bindings: BTreeMap<Role, ChannelRef>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Channel bound to `role`, if any.
    #[must_use]
    pub fn binding(&self, role: Role) -> Option<ChannelRef> {
        self.bindings.get(&role).copied()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::Validation`] when the name is blank, a role the
    /// kind needs is unbound, or a shade drives both directions from one channel.
    pub fn validate(&self) -> Result<(), MinidoError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        for role in self.kind.required_roles() {
            if !self.bindings.contains_key(role) {
                return Err(ValidationError::MissingRole {
                    device: self.id.get(),
                    role: role.as_str(),
                }
                .into());
            }
        }
        if self.kind == DeviceKind::Shade && self.binding(Role::Up) == self.binding(Role::Down) {
            return Err(ValidationError::SharedShadeChannel(self.id.get()).into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug)]
pub struct DeviceBuilder {
    id: DeviceId,
    kind: DeviceKind,
    name: Option<String>,
    floor: Option<String>,
    room: Option<String>,
    description: Option<String>,
    posx: Option<i32>,
    posy: Option<i32>,
    bindings: BTreeMap<Role, ChannelRef>,
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        Self {
            id: DeviceId::new(0),
            kind: DeviceKind::Switch,
            name: None,
            floor: None,
            room: None,
            description: None,
            posx: None,
            posy: None,
            bindings: BTreeMap::new(),
        }
    }
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: DeviceKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn floor(mut self, floor: Option<String>) -> Self {
        self.floor = floor;
        self
    }

    #[must_use]
    pub fn room(mut self, room: Option<String>) -> Self {
        self.room = room;
        self
    }

    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    #[must_use]
    pub fn position(mut self, posx: Option<i32>, posy: Option<i32>) -> Self {
        self.posx = posx;
        self.posy = posy;
        self
    }

    #[must_use]
    pub fn bind(mut self, role: Role, target: ChannelRef) -> Self {
        self.bindings.insert(role, target);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::Validation`] when [`Device::validate`] fails.
    pub fn build(self) -> Result<Device, MinidoError> {
        let device = Device {
            id: self.id,
            kind: self.kind,
            name: self.name.unwrap_or_default(),
            floor: self.floor,
            room: self.room,
            description: self.description,
            posx: self.posx,
            posy: self.posy,
            bindings: self.bindings,
        };
        device.validate()?;
        Ok(device)
    }
}

/// Raw value submitted to or read from a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceValue {
    Level(u8),
    Text(String),
}

impl fmt::Display for DeviceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level(level) => level.fmt(f),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Commands understood by a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCommand {
    On,
    Off,
    Toggle,
    Level(u8),
}

impl TryFrom<&DeviceValue> for SwitchCommand {
    type Error = ValidationError;

    fn try_from(value: &DeviceValue) -> Result<Self, Self::Error> {
        match value {
            DeviceValue::Level(level) => Ok(Self::Level(*level)),
            DeviceValue::Text(text) => text.parse(),
        }
    }
}

impl FromStr for SwitchCommand {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "toggle" => Ok(Self::Toggle),
            other => other
                .parse::<u8>()
                .map(Self::Level)
                .map_err(|_| ValidationError::InvalidCommand {
                    kind: DeviceKind::Switch.as_str(),
                    value: s.to_string(),
                }),
        }
    }
}

/// Commands understood by a shade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadeCommand {
    Up,
    Down,
    Stop,
}

impl TryFrom<&DeviceValue> for ShadeCommand {
    type Error = ValidationError;

    fn try_from(value: &DeviceValue) -> Result<Self, Self::Error> {
        match value {
            DeviceValue::Text(text) => text.parse(),
            DeviceValue::Level(_) => Err(ValidationError::InvalidCommand {
                kind: DeviceKind::Shade.as_str(),
                value: value.to_string(),
            }),
        }
    }
}

impl FromStr for ShadeCommand {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "stop" => Ok(Self::Stop),
            _ => Err(ValidationError::InvalidCommand {
                kind: DeviceKind::Shade.as_str(),
                value: s.to_string(),
            }),
        }
    }
}

/// Movement of a shade as derived from its two channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadeMotion {
    Up,
    Down,
    Stop,
}

impl ShadeMotion {
    /// `up` wins when both channels read nonzero; unset counts as off.
    #[must_use]
    pub fn from_channels(up: Option<u8>, down: Option<u8>) -> Self {
        let energized = |value: Option<u8>| value.is_some_and(|v| v != 0);
        if energized(up) {
            Self::Up
        } else if energized(down) {
            Self::Down
        } else {
            Self::Stop
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Stop => "stop",
        }
    }
}
