//! Persisted audit trail of output changes.

use serde::{Deserialize, Serialize};

use crate::id::{Channel, ModuleId};
use crate::output_module::{ChannelChange, Sample};
use crate::time::Timestamp;

/// Kind recorded for changes of an output module channel.
pub const OUTPUT_KIND: &str = "OUTPUT";

/// One recorded channel value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub recorded_at: Timestamp,
    pub kind: String,
    pub module: ModuleId,
    pub channel: Channel,
    pub value: u8,
}

impl HistoryEntry {
    /// Entry for an output channel value.
    #[must_use]
    pub fn output(module: ModuleId, channel: Channel, value: u8, recorded_at: Timestamp) -> Self {
        Self {
            recorded_at,
            kind: OUTPUT_KIND.to_string(),
            module,
            channel,
            value,
        }
    }

    #[must_use]
    pub fn from_change(module: ModuleId, change: &ChannelChange) -> Self {
        Self::output(module, change.channel, change.value, change.at)
    }

    #[must_use]
    pub fn is_output(&self) -> bool {
        self.kind == OUTPUT_KIND
    }

    #[must_use]
    pub fn sample(&self) -> Sample {
        Sample {
            at: self.recorded_at,
            value: self.value,
        }
    }
}
