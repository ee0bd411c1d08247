//! # minido-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `HistoryStore`: fire-and-forget audit sink on the bus path
//!   - `HistoryRepository`: durable history storage
//!   - `TransportBridge`: outbound frame queue of the bus connection
//!   - `EventPublisher`: broadcast of bus events
//! - Turn raw bytes into frames (`FrameDecoder`) and route them (`FrameRouter`)
//! - Own output module state (`ModuleRegistry`) and device behaviour (`DeviceController`)
//! - Define **driving/inbound ports** as use-case structs:
//!   - `BusService`: control-plane reads and writes over modules and devices
//! - Provide **in-process infrastructure** (event bus, history recorder) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `minido-domain` only (plus `tokio` for channels, timers and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod controller;
pub mod decoder;
pub mod event_bus;
pub mod history_recorder;
pub mod ports;
pub mod registry;
pub mod router;
pub mod services;

#[cfg(test)]
mod testing;
