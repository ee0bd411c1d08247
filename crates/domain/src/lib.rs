//! # minido-domain
//!
//! Pure domain model for the minido bus bridge.
//!
//! ## Responsibilities
//! - Foundational types: bounded bus identifiers, error conventions, timestamps
//! - Define the **wire frame** and its codec (sync, length, XOR checksum)
//! - Define the **address map** (output modules, input modules, controller) and opcodes
//! - Define **output module state** (8 channels with bounded history)
//! - Define **devices** (switches, shades, ventilation) bound to output channels
//! - Define **bus events** and **history entries**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod address;
pub mod device;
pub mod event;
pub mod frame;
pub mod history;
pub mod output_module;
