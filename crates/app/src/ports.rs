//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.
//!
//! The bus path is synchronous end to end: decoding a frame and applying it to
//! a module must never wait on persistence or on the transport. Ports used on
//! that path ([`HistoryStore`], [`TransportBridge`], [`EventPublisher`]) are
//! therefore plain `fn`s that enqueue and return. Only [`HistoryRepository`],
//! which sits behind the history recorder's background task, is async.

pub mod event_bus;
pub mod history;
pub mod transport;

pub use event_bus::{EventPublisher, NoopPublisher};
pub use history::{HistoryRepository, HistoryStore};
pub use transport::TransportBridge;
