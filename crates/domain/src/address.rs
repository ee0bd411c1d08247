//! Bus address map and command opcodes.
//!
//! The address space is fixed by the hardware: output modules and input
//! modules each occupy a block of sixteen consecutive addresses above their
//! base, and the central controller has a single address.

use serde::Serialize;

use crate::id::{InputId, ModuleId};

/// Offset of the output module block; module `n` answers at `EXO_BASE + n`.
pub const EXO_BASE: u8 = 0x3B;

/// Offset of the input module block; input `n` answers at `EXI_BASE + n`.
pub const EXI_BASE: u8 = 0x13;

/// Address of the central controller (D2000).
pub const CONTROLLER: u8 = 0x0B;

/// Source address this bridge uses for the frames it emits.
pub const LOCAL_SOURCE: u8 = 0x17;

/// Number of addressable modules in each block.
pub const BLOCK_SIZE: u8 = 16;

/// Logical endpoint behind a raw bus address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Endpoint {
    /// An output module (Exo).
    Output(ModuleId),
    /// An input module (Exi).
    Input(InputId),
    /// The central controller.
    Controller,
    /// An address outside every known block.
    Unknown(u8),
}

impl Endpoint {
    /// Classify a raw address.
    #[must_use]
    pub fn classify(address: u8) -> Self {
        if address == CONTROLLER {
            return Self::Controller;
        }
        if let Some(offset) = block_offset(address, EXO_BASE) {
            if let Ok(id) = ModuleId::new(offset) {
                return Self::Output(id);
            }
        }
        if let Some(offset) = block_offset(address, EXI_BASE) {
            if let Ok(id) = InputId::new(offset) {
                return Self::Input(id);
            }
        }
        Self::Unknown(address)
    }
}

fn block_offset(address: u8, base: u8) -> Option<u8> {
    address
        .checked_sub(base)
        .filter(|offset| (1..=BLOCK_SIZE).contains(offset))
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Output(id) => write!(f, "EXO-{id}"),
            Self::Input(id) => write!(f, "EXI-{id}"),
            Self::Controller => f.write_str("D-2000"),
            Self::Unknown(address) => write!(f, "ADDR-{address:02x}"),
        }
    }
}

impl ModuleId {
    /// Bus address of this output module.
    #[must_use]
    pub fn address(self) -> u8 {
        EXO_BASE + self.get()
    }
}

impl InputId {
    /// Bus address of this input module.
    #[must_use]
    pub fn address(self) -> u8 {
        EXI_BASE + self.get()
    }
}

/// Command opcodes observed on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Full 8-channel status of an output module.
    Update = 0x01,
    /// An output module answering an echo request.
    ExoEchoReply = 0x05,
    /// Button report to the controller, also used to enter learn mode.
    ExiCentral = 0x31,
    /// An input module answering an echo request.
    ExiEchoReply = 0x38,
    /// Echo request addressed to an input module.
    ExiEchoRequest = 0x39,
    /// Echo request addressed to an output module.
    ExoEchoRequest = 0x49,
}

impl Command {
    /// Recognise an opcode byte.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Update),
            0x05 => Some(Self::ExoEchoReply),
            0x31 => Some(Self::ExiCentral),
            0x38 => Some(Self::ExiEchoReply),
            0x39 => Some(Self::ExiEchoRequest),
            0x49 => Some(Self::ExoEchoRequest),
            _ => None,
        }
    }

    /// The opcode byte.
    #[must_use]
    pub fn byte(self) -> u8 {
        self as u8
    }
}

/// Learn-mode sub-code carried as the first payload byte of [`Command::ExiCentral`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearnMode {
    /// Leave learn or delete mode.
    Cancel = 0x00,
    /// Bind the next pressed button to the output.
    Add = 0x01,
    /// Unbind the next pressed button from the output.
    Remove = 0x02,
}

impl LearnMode {
    /// The sub-code byte.
    #[must_use]
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl std::str::FromStr for LearnMode {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "cancel" => Ok(Self::Cancel),
            "remove" => Ok(Self::Remove),
            other => Err(crate::error::ValidationError::UnknownLearnMode(
                other.to_string(),
            )),
        }
    }
}
