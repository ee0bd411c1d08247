//! # minido-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **JSON API** over the control plane
//!   (`/api/modules`, `/api/devices`, learn mode, channel history)
//! - Stream bus events to clients as **Server-Sent Events** (`/api/events/stream`)
//! - Map HTTP requests into `BusService` calls (driving adapter)
//! - Map domain errors into HTTP status codes
//!
//! ## Dependency rule
//! Depends on `minido-app` (for port traits and services) and `minido-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;

#[cfg(test)]
mod testing;
