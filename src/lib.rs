//! BTHome v2 beacon library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod bthome;
pub mod config;
pub mod error;
pub mod events;
pub mod task;

pub mod adapters;
pub mod drivers;

pub use app::service::{BeaconHandle, BeaconService};
pub use error::{Error, Result};
