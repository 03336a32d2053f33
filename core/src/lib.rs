//! Platform-agnostic pulse logging core
//!
//! Counts debounced pulses and appends a time-stamped record per pulse to an
//! AT24C32 EEPROM, with a DS1307 real-time clock on the same I2C bus. All
//! hardware access goes through `embedded-hal` 1.0 traits, so this crate has
//! no board dependencies and its tests run on the host.
//!
//! [`node::Node`] is the entry point: it owns the bus and every shared
//! resource, and provides the bodies of the long-running tasks.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

pub mod bcd;
pub mod bus;
pub mod cache;
pub mod clock;
pub mod config;
pub mod eeprom;
pub mod error;
pub mod event;
pub mod indicator;
pub mod log;
pub mod node;

#[cfg(test)]
mod mock;

pub use clock::ClockReading;
pub use config::NodeConfig;
pub use error::{Error, Result};
pub use log::EventRecord;
pub use node::{run_status_indicator, Logged, Node};
