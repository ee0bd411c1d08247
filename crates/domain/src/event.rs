//! Events describing what happened on the bus.
//!
//! Events are published after the state they describe has been applied, so a
//! subscriber reading the registry on receipt sees at least that state.

use serde::Serialize;

use crate::id::{Channel, InputId, ModuleId};
use crate::output_module::ChannelChange;
use crate::time::Timestamp;

/// What caused a channel to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// A status report received from the bus.
    Bus,
    /// A write issued through the control plane or a device.
    Command,
}

/// Something observable happened on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    ChannelChanged {
        module: ModuleId,
        channel: Channel,
        value: u8,
        previous: Option<u8>,
        origin: ChangeOrigin,
        at: Timestamp,
    },
    ButtonPressed {
        input: InputId,
        button: u8,
        at: Timestamp,
    },
    ModulePresent {
        module: ModuleId,
        at: Timestamp,
    },
}

impl BusEvent {
    #[must_use]
    pub fn channel_changed(module: ModuleId, change: ChannelChange, origin: ChangeOrigin) -> Self {
        Self::ChannelChanged {
            module,
            channel: change.channel,
            value: change.value,
            previous: change.previous,
            origin,
            at: change.at,
        }
    }

    /// Short name used in logs and SSE event types.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChannelChanged { .. } => "channel_changed",
            Self::ButtonPressed { .. } => "button_pressed",
            Self::ModulePresent { .. } => "module_present",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    #[test]
    fn should_serialize_with_type_tag() {
        let event = BusEvent::ModulePresent {
            module: ModuleId::new(2).unwrap(),
            at: now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "module_present");
        assert_eq!(json["module"], 2);
        assert_eq!(event.name(), "module_present");
    }

    #[test]
    fn should_build_channel_changed_from_change() {
        let at = now();
        let change = ChannelChange {
            channel: Channel::new(5).unwrap(),
            value: 255,
            previous: Some(0),
            at,
        };
        let event = BusEvent::channel_changed(ModuleId::new(1).unwrap(), change, ChangeOrigin::Bus);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["channel"], 5);
        assert_eq!(json["previous"], 0);
        assert_eq!(json["origin"], "bus");
    }
}
