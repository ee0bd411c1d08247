//! Device controllers: behaviour of configured devices over module channels.
//!
//! [`DeviceController`] dispatches to one concrete controller per
//! [`DeviceKind`], chosen once when the device is built from configuration.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use minido_domain::device::{
    ChannelRef, Device, DeviceKind, DeviceValue, Role, ShadeCommand, ShadeMotion, SwitchCommand,
};
use minido_domain::error::{MinidoError, ValidationError};

use crate::ports::{EventPublisher, HistoryStore, TransportBridge};
use crate::registry::ModuleRegistry;

/// Value a channel is driven to when switched on.
pub const FULL_ON: u8 = 255;

/// Timing of shade motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadeTiming {
    /// Pause between releasing one direction and energizing the other.
    pub settle: Duration,
    /// How long a motor runs before it is switched off automatically.
    pub auto_stop: Duration,
}

impl Default for ShadeTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(300),
            auto_stop: Duration::from_secs(30),
        }
    }
}

/// A configured device bound to the module registry.
pub enum DeviceController<H, T, P> {
    Switch(SwitchController<H, T, P>),
    Shade(ShadeController<H, T, P>),
    Ventilation(VentilationController),
}

impl<H, T, P> DeviceController<H, T, P>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Resolve the controller for `device`.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::Validation`] when a binding the kind needs is absent.
    pub fn build(
        device: Device,
        registry: Arc<ModuleRegistry<H, T, P>>,
        timing: ShadeTiming,
    ) -> Result<Self, MinidoError> {
        device.validate()?;
        Ok(match device.kind {
            DeviceKind::Switch => {
                let power = required(&device, Role::Power)?;
                Self::Switch(SwitchController {
                    device,
                    power,
                    registry,
                })
            }
            DeviceKind::Shade => {
                let up = required(&device, Role::Up)?;
                let down = required(&device, Role::Down)?;
                Self::Shade(ShadeController {
                    inner: Arc::new(ShadeInner {
                        device,
                        up,
                        down,
                        timing,
                        registry,
                        timer: Arc::new(Mutex::new(ShadeTimer::default())),
                    }),
                })
            }
            DeviceKind::Ventilation => Self::Ventilation(VentilationController { device }),
        })
    }

    #[must_use]
    pub fn device(&self) -> &Device {
        match self {
            Self::Switch(inner) => &inner.device,
            Self::Shade(inner) => &inner.inner.device,
            Self::Ventilation(inner) => &inner.device,
        }
    }

    /// Apply a command value.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::Validation`] when the device does not understand
    /// `value`, or [`MinidoError::NotFound`] when a bound module is missing.
    pub async fn set_value(&self, value: &DeviceValue) -> Result<(), MinidoError> {
        match self {
            Self::Switch(inner) => inner.set_value(value),
            Self::Shade(inner) => inner.set_value(value).await,
            Self::Ventilation(inner) => {
                inner.set_value(value);
                Ok(())
            }
        }
    }

    /// Current value, or `None` when the device has none to report.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] when a bound module is missing.
    pub fn get_value(&self) -> Result<Option<DeviceValue>, MinidoError> {
        match self {
            Self::Switch(inner) => inner.get_value(),
            Self::Shade(inner) => inner
                .inner
                .motion()
                .map(|motion| Some(DeviceValue::Text(motion.as_str().to_string()))),
            Self::Ventilation(_) => Ok(None),
        }
    }
}

fn required(device: &Device, role: Role) -> Result<ChannelRef, MinidoError> {
    device.binding(role).ok_or_else(|| {
        ValidationError::MissingRole {
            device: device.id.get(),
            role: role.as_str(),
        }
        .into()
    })
}

fn is_energized(value: Option<u8>) -> bool {
    value.is_some_and(|v| v != 0)
}

/// Single-channel load.
pub struct SwitchController<H, T, P> {
    device: Device,
    power: ChannelRef,
    registry: Arc<ModuleRegistry<H, T, P>>,
}

impl<H, T, P> SwitchController<H, T, P>
where
    H: HistoryStore,
    T: TransportBridge,
    P: EventPublisher,
{
    fn set_value(&self, value: &DeviceValue) -> Result<(), MinidoError> {
        let level = match SwitchCommand::try_from(value)? {
            SwitchCommand::On => FULL_ON,
            SwitchCommand::Off => 0,
            // Only a channel known to be off is switched on; unset turns off.
            SwitchCommand::Toggle => {
                if self.status()? == Some(0) {
                    FULL_ON
                } else {
                    0
                }
            }
            SwitchCommand::Level(level) => level,
        };
        tracing::debug!(device = %self.device.id, target = %self.power, level, "switching");
        self.registry
            .set_output(self.power.module, self.power.channel, level)?;
        Ok(())
    }

    fn status(&self) -> Result<Option<u8>, MinidoError> {
        self.registry
            .get_output(self.power.module, self.power.channel)
    }

    fn get_value(&self) -> Result<Option<DeviceValue>, MinidoError> {
        Ok(self.status()?.map(DeviceValue::Level))
    }
}

/// Pending auto-stop of a shade.
///
/// Every cancellation bumps `generation`; a timer only acts when the
/// generation it was armed with is still current.
#[derive(Default)]
struct ShadeTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl ShadeTimer {
    fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Motorised shade on an `up` and a `down` channel that must never both run.
///
/// Commands run on a task owned by the shade, so a caller that goes away
/// mid-settle does not leave the shade half driven.
pub struct ShadeController<H, T, P> {
    inner: Arc<ShadeInner<H, T, P>>,
}

struct ShadeInner<H, T, P> {
    device: Device,
    up: ChannelRef,
    down: ChannelRef,
    timing: ShadeTiming,
    registry: Arc<ModuleRegistry<H, T, P>>,
    timer: Arc<Mutex<ShadeTimer>>,
}

impl<H, T, P> ShadeController<H, T, P>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    async fn set_value(&self, value: &DeviceValue) -> Result<(), MinidoError> {
        let command = ShadeCommand::try_from(value)?;
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.apply(command).await });
        match task.await {
            Ok(result) => result,
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(error) => {
                tracing::warn!(device = %self.inner.device.id, %error, "shade command did not complete");
                Ok(())
            }
        }
    }
}

impl<H, T, P> ShadeInner<H, T, P>
where
    H: HistoryStore + Send + Sync + 'static,
    T: TransportBridge + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    async fn apply(&self, command: ShadeCommand) -> Result<(), MinidoError> {
        let mut timer = self.timer.lock().await;
        match command {
            ShadeCommand::Up => self.drive(&mut timer, self.up, self.down).await,
            ShadeCommand::Down => self.drive(&mut timer, self.down, self.up).await,
            ShadeCommand::Stop => self.stop(&mut timer),
        }
    }

    fn motion(&self) -> Result<ShadeMotion, MinidoError> {
        Ok(ShadeMotion::from_channels(
            self.value(self.up)?,
            self.value(self.down)?,
        ))
    }

    fn value(&self, target: ChannelRef) -> Result<Option<u8>, MinidoError> {
        self.registry.get_output(target.module, target.channel)
    }

    async fn drive(
        &self,
        timer: &mut ShadeTimer,
        target: ChannelRef,
        opposing: ChannelRef,
    ) -> Result<(), MinidoError> {
        if is_energized(self.value(target)?) {
            tracing::debug!(device = %self.device.id, %target, "already moving, ignoring");
            return Ok(());
        }
        timer.cancel();

        if is_energized(self.value(opposing)?) {
            self.registry
                .set_output(opposing.module, opposing.channel, 0)?;
            tokio::time::sleep(self.timing.settle).await;
        }

        if !self.registry.energize_exclusive(target, opposing, FULL_ON)? {
            tracing::warn!(
                device = %self.device.id,
                %target,
                %opposing,
                "opposing motor energized during settle, not driving"
            );
            return Ok(());
        }
        tracing::info!(device = %self.device.id, %target, "shade moving");
        self.arm(timer, target);
        Ok(())
    }

    fn stop(&self, timer: &mut ShadeTimer) -> Result<(), MinidoError> {
        timer.cancel();
        let running = if is_energized(self.value(self.up)?) {
            Some(self.up)
        } else if is_energized(self.value(self.down)?) {
            Some(self.down)
        } else {
            None
        };
        if let Some(target) = running {
            tracing::info!(device = %self.device.id, %target, "shade stopped");
            self.registry.set_output(target.module, target.channel, 0)?;
        }
        Ok(())
    }

    fn arm(&self, timer: &mut ShadeTimer, target: ChannelRef) {
        timer.cancel();
        let generation = timer.generation;
        let shared = Arc::clone(&self.timer);
        let registry = Arc::clone(&self.registry);
        let delay = self.timing.auto_stop;
        let device = self.device.id;

        timer.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut timer = shared.lock().await;
            if timer.generation != generation {
                return;
            }
            timer.handle = None;
            match registry.compare_and_set(target, Some(FULL_ON), 0) {
                Ok(true) => tracing::info!(%device, %target, "auto-stop"),
                Ok(false) => tracing::debug!(%device, %target, "channel moved since armed, auto-stop skipped"),
                Err(error) => tracing::warn!(%device, %target, %error, "auto-stop failed"),
            }
        }));
    }
}

impl<H, T, P> Drop for ShadeInner<H, T, P> {
    fn drop(&mut self) {
        // A pending auto-stop holds a registry handle; it must not outlive the shade.
        if let Ok(mut timer) = self.timer.try_lock() {
            timer.cancel();
        }
    }
}

/// Mechanical ventilation. Accepted in configuration but not driven.
pub struct VentilationController {
    device: Device,
}

impl VentilationController {
    fn set_value(&self, value: &DeviceValue) {
        tracing::debug!(device = %self.device.id, %value, "ventilation is not driven, ignoring");
    }
}
