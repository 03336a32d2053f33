//! AT24C32 byte access
//!
//! Every transaction starts with a two-byte word address, high byte first.
//! Writes are single-byte and must be followed by the device write cycle
//! before it acknowledges again.

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::bus::Bus;
use crate::error::{Error, Result};

/// Split a word address into the (high, low) bytes sent on the wire
pub fn split(addr: u16) -> (u8, u8) {
    let [high, low] = addr.to_be_bytes();
    (high, low)
}

/// EEPROM at a fixed 7-bit bus address
#[derive(Debug, Clone, Copy)]
pub struct Eeprom {
    address: u8,
    write_cycle: Duration,
}

impl Eeprom {
    /// `write_cycle` is the device's minimum self-timed write cycle
    pub const fn new(address: u8, write_cycle: Duration) -> Self {
        Self {
            address,
            write_cycle,
        }
    }

    /// Random read of one byte
    pub async fn read_byte<I2C: I2c, D>(&self, bus: &mut Bus<I2C, D>, addr: u16) -> Result<u8> {
        let (high, low) = split(addr);
        let mut value = [0u8; 1];
        bus.i2c
            .write_read(self.address, &[high, low], &mut value)
            .await
            .map_err(Error::bus)?;
        Ok(value[0])
    }

    /// Sequential read starting at `addr`; the device auto-increments
    pub async fn read<I2C: I2c, D>(
        &self,
        bus: &mut Bus<I2C, D>,
        addr: u16,
        buf: &mut [u8],
    ) -> Result<()> {
        let (high, low) = split(addr);
        bus.i2c
            .write_read(self.address, &[high, low], buf)
            .await
            .map_err(Error::bus)
    }

    /// Write one byte and wait out the write cycle
    pub async fn write_byte<I2C: I2c, D: DelayNs>(
        &self,
        bus: &mut Bus<I2C, D>,
        addr: u16,
        value: u8,
    ) -> Result<()> {
        let (high, low) = split(addr);
        bus.i2c
            .write(self.address, &[high, low, value])
            .await
            .map_err(Error::bus)?;
        bus.settle(self.write_cycle).await;
        Ok(())
    }
}
