//! Bus service: control-plane use-cases over modules and devices.
//!
//! Module and channel numbers arrive unvalidated from the outside. An
//! unknown module or device yields [`MinidoError::NotFound`]; a bad channel
//! or value yields [`MinidoError::Validation`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use minido_domain::address::{Command, LOCAL_SOURCE, LearnMode};
use minido_domain::device::{Device, DeviceValue};
use minido_domain::error::{MinidoError, NotFoundError, ValidationError};
use minido_domain::frame::Frame;
use minido_domain::id::{Channel, DeviceId, InputId, ModuleId};
use minido_domain::output_module::{ModuleSnapshot, Sample};

use crate::controller::{DeviceController, ShadeTiming};
use crate::ports::{EventPublisher, HistoryStore, TransportBridge};
use crate::registry::ModuleRegistry;

/// Input modules that receive learn-mode frames unless configured otherwise.
pub const DEFAULT_LEARN_INPUTS: [u8; 4] = [1, 2, 3, 5];

/// A device together with its current value.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDetails {
    #[serde(flatten)]
    pub device: Device,
    pub value: Option<DeviceValue>,
}

/// Application service for the control plane.
pub struct BusService<H, T, P> {
    registry: Arc<ModuleRegistry<H, T, P>>,
    devices: BTreeMap<DeviceId, DeviceController<H, T, P>>,
    learn_inputs: Vec<InputId>,
}

impl<H, T, P> BusService<H, T, P>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Create a service with no devices and the default learn-mode inputs.
    pub fn new(registry: Arc<ModuleRegistry<H, T, P>>) -> Self {
        let learn_inputs = DEFAULT_LEARN_INPUTS
            .iter()
            .filter_map(|n| InputId::new(*n).ok())
            .collect();
        Self {
            registry,
            devices: BTreeMap::new(),
            learn_inputs,
        }
    }

    #[must_use]
    pub fn with_learn_inputs(mut self, inputs: Vec<InputId>) -> Self {
        self.learn_inputs = inputs;
        self
    }

    /// Bind a configured device to the registry.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::Validation`] when the device is invalid or its id
    /// is already taken.
    pub fn add_device(&mut self, device: Device, timing: ShadeTiming) -> Result<(), MinidoError> {
        if self.devices.contains_key(&device.id) {
            return Err(ValidationError::DuplicateDevice(device.id.get()).into());
        }
        let id = device.id;
        let controller = DeviceController::build(device, Arc::clone(&self.registry), timing)?;
        self.devices.insert(id, controller);
        Ok(())
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ModuleRegistry<H, T, P>> {
        &self.registry
    }

    /// Latest value of a channel, `None` when never reported.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] for an unknown module, or
    /// [`MinidoError::Validation`] for a channel outside `1..=8`.
    #[tracing::instrument(skip(self))]
    pub fn get_output(&self, module: u8, channel: u8) -> Result<Option<u8>, MinidoError> {
        let module = module_id(module)?;
        self.registry.get_output(module, Channel::new(channel)?)
    }

    /// Write a channel; the module's full status is re-sent on the bus.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] for an unknown module, or
    /// [`MinidoError::Validation`] for a channel outside `1..=8`.
    #[tracing::instrument(skip(self))]
    pub fn set_output(
        &self,
        module: u8,
        channel: u8,
        value: u8,
    ) -> Result<ModuleSnapshot, MinidoError> {
        let module = module_id(module)?;
        let channel = Channel::new(channel)?;
        self.registry.set_output(module, channel, value)
    }

    /// Every provisioned module.
    #[tracing::instrument(skip(self))]
    pub fn list_modules(&self) -> Vec<ModuleSnapshot> {
        self.registry.list()
    }

    /// Bounded in-memory history of a channel, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] for an unknown module, or
    /// [`MinidoError::Validation`] for a channel outside `1..=8`.
    #[tracing::instrument(skip(self))]
    pub fn channel_history(&self, module: u8, channel: u8) -> Result<Vec<Sample>, MinidoError> {
        let module = module_id(module)?;
        self.registry.history(module, Channel::new(channel)?)
    }

    /// Current value of a device.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] when no device has `id`.
    #[tracing::instrument(skip(self))]
    pub fn get_device_value(&self, id: DeviceId) -> Result<Option<DeviceValue>, MinidoError> {
        self.device(id)?.get_value()
    }

    /// Command a device and return its value afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] when no device has `id`, or
    /// [`MinidoError::Validation`] when the device rejects `value`.
    #[tracing::instrument(skip(self))]
    pub async fn set_device_value(
        &self,
        id: DeviceId,
        value: DeviceValue,
    ) -> Result<Option<DeviceValue>, MinidoError> {
        let device = self.device(id)?;
        device.set_value(&value).await?;
        device.get_value()
    }

    /// Every configured device with its current value, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] when a device is bound to a module
    /// that is not provisioned.
    #[tracing::instrument(skip(self))]
    pub fn get_device_details(&self) -> Result<Vec<DeviceDetails>, MinidoError> {
        self.devices
            .values()
            .map(|controller| {
                Ok(DeviceDetails {
                    device: controller.device().clone(),
                    value: controller.get_value()?,
                })
            })
            .collect()
    }

    /// Put the configured input modules into learn, delete or normal mode for one output.
    ///
    /// Returns the number of frames queued.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] for an unknown module,
    /// [`MinidoError::Validation`] for a bad channel, or
    /// [`MinidoError::Transport`] when a frame cannot be queued.
    #[tracing::instrument(skip(self))]
    pub fn program_learn_mode(
        &self,
        module: u8,
        channel: u8,
        mode: LearnMode,
    ) -> Result<usize, MinidoError> {
        let module = module_id(module)?;
        let channel = Channel::new(channel)?;
        // Confirms the module exists before anything goes out on the bus.
        self.registry.snapshot(module)?;

        let payload = [mode.byte(), module.get(), channel.get() - 1, 0x00];
        for input in &self.learn_inputs {
            let frame = Frame::new(
                input.address(),
                LOCAL_SOURCE,
                Command::ExiCentral.byte(),
                payload.to_vec(),
            );
            self.registry.transmit(&frame)?;
        }
        tracing::info!(%module, %channel, ?mode, inputs = self.learn_inputs.len(), "learn mode sent");
        Ok(self.learn_inputs.len())
    }

    fn device(&self, id: DeviceId) -> Result<&DeviceController<H, T, P>, MinidoError> {
        self.devices.get(&id).ok_or_else(|| {
            NotFoundError {
                entity: "Device",
                id: id.to_string(),
            }
            .into()
        })
    }
}

fn module_id(raw: u8) -> Result<ModuleId, MinidoError> {
    ModuleId::new(raw).map_err(|_| {
        NotFoundError {
            entity: "Module",
            id: raw.to_string(),
        }
        .into()
    })
}
