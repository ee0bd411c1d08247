//! # minido-adapter-transport-tcp
//!
//! TCP transport adapter: the byte pipe between the bridge and the bus gateway.
//!
//! ## Responsibilities
//! - Implement the `TransportBridge` port with an unbounded outbound queue
//! - Keep a client connection to the gateway, reconnecting after a fixed delay
//! - Feed every received chunk to one `FrameDecoder` per connection and hand
//!   decoded frames to the `FrameRouter`
//! - Optionally write a keepalive sequence while connected
//!
//! ## Dependency rule
//! Depends on `minido-app` (for port traits, decoder and router) and
//! `minido-domain`. The `app` and `domain` crates must never reference this adapter.

pub mod config;
pub mod connection;
pub mod error;

pub use config::TransportConfig;
pub use connection::{BusConnection, Outbound, TcpTransport};
pub use error::TransportError;
