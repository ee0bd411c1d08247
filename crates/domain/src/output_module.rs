//! Output module (Exo) state: eight channels with a bounded history each.
//!
//! The latest value of a channel is always the tail of its history, so the
//! two can never disagree. A channel that has never been reported is unset.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::id::{Channel, ModuleId};
use crate::time::Timestamp;

/// Number of outputs on every module.
pub const CHANNEL_COUNT: usize = 8;

/// History depth kept per channel unless configured otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

/// One recorded value of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub at: Timestamp,
    pub value: u8,
}

/// A channel whose value moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelChange {
    pub channel: Channel,
    pub value: u8,
    pub previous: Option<u8>,
    pub at: Timestamp,
}

/// Read-only view of a module, as exposed to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSnapshot {
    pub id: ModuleId,
    pub present: bool,
    pub channels: [Option<u8>; CHANNEL_COUNT],
}

/// State of one output module.
#[derive(Debug, Clone)]
pub struct OutputModule {
    id: ModuleId,
    capacity: usize,
    present: bool,
    history: [VecDeque<Sample>; CHANNEL_COUNT],
}

impl OutputModule {
    /// Create a module with every channel unset.
    ///
    /// A `capacity` of zero is raised to one so the latest value always survives.
    #[must_use]
    pub fn new(id: ModuleId, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            id,
            capacity,
            present: false,
            history: std::array::from_fn(|_| VecDeque::with_capacity(capacity)),
        }
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the module has answered an echo request.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Record that the module answered on the bus. Returns `true` the first time.
    pub fn mark_present(&mut self) -> bool {
        !std::mem::replace(&mut self.present, true)
    }

    /// Latest value of `channel`, or `None` when never reported.
    #[must_use]
    pub fn value(&self, channel: Channel) -> Option<u8> {
        self.history[channel.index()].back().map(|sample| sample.value)
    }

    /// Latest value of every channel.
    #[must_use]
    pub fn values(&self) -> [Option<u8>; CHANNEL_COUNT] {
        std::array::from_fn(|index| self.history[index].back().map(|sample| sample.value))
    }

    /// Status vector as sent on the wire; unset channels read as 0.
    #[must_use]
    pub fn wire_status(&self) -> [u8; CHANNEL_COUNT] {
        self.values().map(|value| value.unwrap_or(0))
    }

    /// Recorded samples of `channel`, oldest first.
    #[must_use]
    pub fn history(&self, channel: Channel) -> Vec<Sample> {
        self.history[channel.index()].iter().copied().collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot {
            id: self.id,
            present: self.present,
            channels: self.values(),
        }
    }

    /// Apply a full status report, returning the channels that changed.
    ///
    /// Reporting the same status twice yields no changes the second time.
    pub fn apply_status(
        &mut self,
        status: &[u8; CHANNEL_COUNT],
        at: Timestamp,
    ) -> Vec<ChannelChange> {
        Channel::all()
            .zip(status.iter().copied())
            .filter_map(|(channel, value)| {
                let previous = self.value(channel);
                (previous != Some(value)).then(|| {
                    self.push(channel, Sample { at, value });
                    ChannelChange {
                        channel,
                        value,
                        previous,
                        at,
                    }
                })
            })
            .collect()
    }

    /// Unconditionally record `value` as the new state of `channel`.
    pub fn write(&mut self, channel: Channel, value: u8, at: Timestamp) -> ChannelChange {
        let previous = self.value(channel);
        self.push(channel, Sample { at, value });
        ChannelChange {
            channel,
            value,
            previous,
            at,
        }
    }

    /// Write `value` only if `channel` currently holds `expected`.
    pub fn compare_and_write(
        &mut self,
        channel: Channel,
        expected: Option<u8>,
        value: u8,
        at: Timestamp,
    ) -> Option<ChannelChange> {
        (self.value(channel) == expected).then(|| self.write(channel, value, at))
    }

    /// Replay a persisted sample. Samples must be fed oldest first.
    pub fn restore(&mut self, channel: Channel, sample: Sample) {
        self.push(channel, sample);
    }

    fn push(&mut self, channel: Channel, sample: Sample) {
        let queue = &mut self.history[channel.index()];
        while queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(sample);
    }
}
