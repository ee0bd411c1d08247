//! Address-based dispatch of decoded frames.

use std::sync::Arc;

use minido_domain::address::{Command, Endpoint};
use minido_domain::event::BusEvent;
use minido_domain::frame::Frame;
use minido_domain::id::{InputId, ModuleId};
use minido_domain::output_module::CHANNEL_COUNT;
use minido_domain::time::now;

use crate::ports::{EventPublisher, HistoryStore, TransportBridge};
use crate::registry::ModuleRegistry;

/// What the router did with a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// A status report was applied; `changes` channels moved.
    StatusApplied { module: ModuleId, changes: usize },
    /// An output module answered an echo request.
    ModulePresent(ModuleId),
    /// An input module reported a button to the controller.
    ButtonPressed { input: InputId, button: u8 },
    /// Known traffic that only gets logged.
    Observed,
    /// Nothing here knows how to read this frame.
    Undecodable,
}

/// Routes frames from the bus to the module registry.
pub struct FrameRouter<H, T, P> {
    registry: Arc<ModuleRegistry<H, T, P>>,
}

impl<H, T, P> Clone for FrameRouter<H, T, P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<H, T, P> FrameRouter<H, T, P>
where
    H: HistoryStore,
    T: TransportBridge,
    P: EventPublisher,
{
    pub fn new(registry: Arc<ModuleRegistry<H, T, P>>) -> Self {
        Self { registry }
    }

    /// Classify `frame` by destination and command and apply it.
    pub fn dispatch(&self, frame: &Frame) -> Routed {
        let dest = Endpoint::classify(frame.dest);
        let src = Endpoint::classify(frame.src);
        let command = Command::from_byte(frame.command);

        match (dest, command) {
            (Endpoint::Output(module), Some(Command::Update)) => {
                let Some(status) = status_vector(&frame.payload) else {
                    tracing::debug!(
                        %module,
                        len = frame.payload.len(),
                        "status payload shorter than eight channels"
                    );
                    return Routed::Undecodable;
                };
                let changes = self.registry.update(module, src, &status).len();
                Routed::StatusApplied { module, changes }
            }
            (Endpoint::Output(module), Some(Command::ExoEchoRequest)) => {
                tracing::debug!(%src, %module, "echo request to output module");
                Routed::Observed
            }
            (Endpoint::Input(_), Some(Command::ExoEchoReply)) => match src {
                Endpoint::Output(module) => {
                    self.registry.mark_present(module);
                    Routed::ModulePresent(module)
                }
                _ => {
                    tracing::debug!(%src, %dest, "echo reply from non-output address");
                    Routed::Observed
                }
            },
            (Endpoint::Input(input), Some(Command::ExiEchoRequest | Command::ExiEchoReply)) => {
                tracing::debug!(%src, %input, command = frame.command, "input echo traffic");
                Routed::Observed
            }
            (Endpoint::Input(input), Some(_)) => {
                tracing::debug!(
                    %src,
                    %input,
                    command = frame.command,
                    payload = ?frame.payload,
                    "input module traffic"
                );
                Routed::Observed
            }
            (Endpoint::Controller, Some(Command::ExiCentral)) => self.button_press(frame, src),
            _ => {
                tracing::debug!(
                    dest = frame.dest,
                    src = frame.src,
                    command = frame.command,
                    payload = ?frame.payload,
                    "undecodable frame dropped"
                );
                Routed::Undecodable
            }
        }
    }

    fn button_press(&self, frame: &Frame, src: Endpoint) -> Routed {
        let Endpoint::Input(input) = src else {
            tracing::debug!(%src, "controller frame from non-input address");
            return Routed::Undecodable;
        };
        match frame.payload.as_slice() {
            [echoed, button, ..] if *echoed == input.get() => {
                tracing::info!(%input, button, "button pressed");
                self.registry.events().publish(BusEvent::ButtonPressed {
                    input,
                    button: *button,
                    at: now(),
                });
                Routed::ButtonPressed {
                    input,
                    button: *button,
                }
            }
            _ => {
                tracing::debug!(%input, payload = ?frame.payload, "controller traffic");
                Routed::Observed
            }
        }
    }
}

fn status_vector(payload: &[u8]) -> Option<[u8; CHANNEL_COUNT]> {
    payload.get(..CHANNEL_COUNT)?.try_into().ok()
}
