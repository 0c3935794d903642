//! Application core: pure domain logic, zero I/O.
//!
//! The advertising state machine, its owned context and the port traits
//! it drives. All interaction with the Bluetooth stack happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without a radio.

pub mod dispatcher;
pub mod events;
pub mod ports;
pub mod service;
