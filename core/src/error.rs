//! Error types shared by the clock, log and indicator drivers

use embedded_hal::{digital, i2c};

/// Failures surfaced by node operations
///
/// Bus failures are reported as the `embedded-hal` error kind so the type stays
/// independent of the concrete I2C peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Transaction on the shared I2C bus failed (NACK, arbitration loss, ...)
    Bus(i2c::ErrorKind),
    /// Status indicator pin could not be read or driven
    Pin(digital::ErrorKind),
    /// Address outside the clock's battery-backed RAM window; no bus traffic was generated
    RamAddressOutOfRange(u8),
}

impl Error {
    pub(crate) fn bus<E: i2c::Error>(e: E) -> Self {
        Self::Bus(e.kind())
    }

    pub(crate) fn pin<E: digital::Error>(e: E) -> Self {
        Self::Pin(e.kind())
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus(kind) => write!(f, "I2C bus error: {kind:?}"),
            Self::Pin(kind) => write!(f, "GPIO error: {kind:?}"),
            Self::RamAddressOutOfRange(addr) => {
                write!(f, "RAM address {addr:#04x} outside clock RAM window")
            }
        }
    }
}

// Implement core::error::Error for no_std compatibility
impl core::error::Error for Error {}

/// Result alias used across the crate
pub type Result<T> = core::result::Result<T, Error>;
