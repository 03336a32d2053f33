#![deny(unsafe_code)]
//! DS1307 real-time clock driver
//!
//! Register map (all BCD):
//!
//! ```text
//! 0x00 seconds  (bit 7 = clock halt)
//! 0x01 minutes
//! 0x02 hours    (bit 6 = 12/24 mode, bit 5 = PM or tens of hours)
//! 0x03 weekday  (1-7, user defined, 1 = Sunday here)
//! 0x04 date
//! 0x05 month
//! 0x06 year     (00-99, offset from 2000)
//! 0x07 control
//! 0x08-0x3F battery-backed RAM
//! ```
//!
//! The driver holds no bus handle. Every call borrows the bus from a
//! [`BusGuard`](crate::bus::BusGuard) the caller already holds.

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::bcd;
use crate::bus::Bus;
use crate::error::{Error, Result};

/// Number of time/calendar registers read and written as one burst
const TIME_REGISTERS: usize = 7;

/// Seconds register bit that stops the oscillator
const CLOCK_HALT: u8 = 0x80;

/// Fixed mode bit OR'd into the hours register on every write
///
/// The write path always sets it; the read path masks it away and decodes the
/// hours as a 24-hour value.
pub const HOURS_MODE_BIT: u8 = 0x40;

/// First address of the battery-backed RAM window
pub const RAM_START: u8 = 0x08;
/// Last address of the battery-backed RAM window (inclusive)
pub const RAM_END: u8 = 0x3F;

/// Time and calendar as stored in the clock registers, in binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockReading {
    /// 0-59
    pub seconds: u8,
    /// 0-59
    pub minutes: u8,
    /// 0-23
    pub hours: u8,
    /// 1-7
    pub weekday: u8,
    /// Day of month, 1-31
    pub date: u8,
    /// 1-12
    pub month: u8,
    /// 0-99, years since 2000
    pub year: u8,
}

impl ClockReading {
    /// 2000-01-01 00:00:00, a Saturday
    pub const EPOCH: Self = Self {
        seconds: 0,
        minutes: 0,
        hours: 0,
        weekday: 7,
        date: 1,
        month: 1,
        year: 0,
    };

    /// Calendar year including the 2000 base
    pub fn full_year(&self) -> u16 {
        2000 + u16::from(self.year)
    }

    /// Check every field against its register range
    pub fn is_valid(&self) -> bool {
        self.seconds <= 59
            && self.minutes <= 59
            && self.hours <= 23
            && (1..=7).contains(&self.weekday)
            && (1..=31).contains(&self.date)
            && (1..=12).contains(&self.month)
            && self.year <= 99
    }

    fn from_registers(raw: &[u8; TIME_REGISTERS]) -> Self {
        Self {
            seconds: bcd::decode(raw[0] & 0x70, raw[0] & 0x0F),
            minutes: bcd::decode(raw[1] & 0x70, raw[1] & 0x0F),
            // 0x30 drops the 12/24 mode bit (0x40)
            hours: bcd::decode(raw[2] & 0x30, raw[2] & 0x0F),
            weekday: bcd::decode(0x00, raw[3] & 0x07),
            date: bcd::decode(raw[4] & 0x30, raw[4] & 0x0F),
            month: bcd::decode(raw[5] & 0x10, raw[5] & 0x0F),
            year: bcd::decode(raw[6] & 0xF0, raw[6] & 0x0F),
        }
    }

    fn to_registers(self) -> [u8; TIME_REGISTERS] {
        [
            bcd::encode(0x3F, self.seconds),
            bcd::encode(0x3F, self.minutes),
            HOURS_MODE_BIT | bcd::encode(0x3F, self.hours),
            bcd::encode(0x07, self.weekday),
            bcd::encode(0x1F, self.date),
            bcd::encode(0x0F, self.month),
            bcd::encode(0x7F, self.year),
        ]
    }
}

/// DS1307 register access
#[derive(Debug, Clone, Copy)]
pub struct ClockDriver {
    address: u8,
    write_cycle: Duration,
}

impl ClockDriver {
    /// Driver for the clock at 7-bit `address`
    ///
    /// `write_cycle` is waited after every register write before the bus is
    /// handed on; the DS1307 latches immediately, so zero is the usual value.
    pub const fn new(address: u8, write_cycle: Duration) -> Self {
        Self {
            address,
            write_cycle,
        }
    }

    /// Probe the device and restart the oscillator if it is halted
    ///
    /// A DS1307 powers up with the clock-halt bit set and the time frozen.
    pub async fn init<I2C: I2c, D: DelayNs>(&self, bus: &mut Bus<I2C, D>) -> Result<()> {
        let mut seconds = [0u8; 1];
        bus.i2c
            .write_read(self.address, &[0x00], &mut seconds)
            .await
            .map_err(Error::bus)?;

        if seconds[0] & CLOCK_HALT != 0 {
            warn!("clock oscillator halted, restarting");
            bus.i2c
                .write(self.address, &[0x00, seconds[0] & !CLOCK_HALT])
                .await
                .map_err(Error::bus)?;
            bus.settle(self.write_cycle).await;
        }
        Ok(())
    }

    /// Reset the register pointer and burst-read the seven time registers
    pub async fn read<I2C: I2c, D>(&self, bus: &mut Bus<I2C, D>) -> Result<ClockReading> {
        let mut raw = [0u8; TIME_REGISTERS];
        bus.i2c
            .write_read(self.address, &[0x00], &mut raw)
            .await
            .map_err(Error::bus)?;
        Ok(ClockReading::from_registers(&raw))
    }

    /// Encode and write all seven time registers, forcing the hours mode bit
    ///
    /// Writing the seconds register also clears the clock-halt bit.
    pub async fn write<I2C: I2c, D: DelayNs>(
        &self,
        bus: &mut Bus<I2C, D>,
        reading: &ClockReading,
    ) -> Result<()> {
        let regs = reading.to_registers();
        let mut frame = [0u8; TIME_REGISTERS + 1];
        frame[1..].copy_from_slice(&regs);

        bus.i2c
            .write(self.address, &frame)
            .await
            .map_err(Error::bus)?;
        bus.settle(self.write_cycle).await;
        Ok(())
    }

    /// Read one byte from the battery-backed RAM window
    pub async fn read_ram_byte<I2C: I2c, D>(&self, bus: &mut Bus<I2C, D>, addr: u8) -> Result<u8> {
        check_ram(addr)?;
        let mut value = [0u8; 1];
        bus.i2c
            .write_read(self.address, &[addr], &mut value)
            .await
            .map_err(Error::bus)?;
        Ok(value[0])
    }

    /// Write one byte into the battery-backed RAM window
    pub async fn write_ram_byte<I2C: I2c, D: DelayNs>(
        &self,
        bus: &mut Bus<I2C, D>,
        addr: u8,
        value: u8,
    ) -> Result<()> {
        check_ram(addr)?;
        bus.i2c
            .write(self.address, &[addr, value])
            .await
            .map_err(Error::bus)?;
        bus.settle(self.write_cycle).await;
        Ok(())
    }
}

fn check_ram(addr: u8) -> Result<()> {
    if (RAM_START..=RAM_END).contains(&addr) {
        Ok(())
    } else {
        Err(Error::RamAddressOutOfRange(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusArbiter;
    use crate::mock::{MockBus, MockDelay, CLOCK_ADDR};
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

    type Arbiter = BusArbiter<CriticalSectionRawMutex, MockBus, MockDelay>;

    const DRIVER: ClockDriver = ClockDriver::new(CLOCK_ADDR, Duration::from_ticks(0));

    fn sample() -> ClockReading {
        ClockReading {
            seconds: 30,
            minutes: 15,
            hours: 9,
            weekday: 3,
            date: 22,
            month: 2,
            year: 22,
        }
    }

    #[test]
    fn test_write_encodes_registers() {
        let arbiter = Arbiter::new(MockBus::new(), MockDelay::default());
        block_on(async {
            let mut bus = arbiter.acquire().await;
            DRIVER.write(&mut *bus, &sample()).await.unwrap();
            assert_eq!(
                &bus.i2c.clock[..7],
                &[0x30, 0x15, 0x40 | 0x09, 0x03, 0x22, 0x02, 0x22]
            );
        });
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let arbiter = Arbiter::new(MockBus::new(), MockDelay::default());
        block_on(async {
            let mut bus = arbiter.acquire().await;
            let t = ClockReading {
                seconds: 59,
                minutes: 59,
                hours: 23,
                weekday: 7,
                date: 31,
                month: 12,
                year: 99,
            };
            DRIVER.write(&mut *bus, &t).await.unwrap();
            assert_eq!(DRIVER.read(&mut *bus).await.unwrap(), t);
        });
    }

    #[test]
    fn test_read_masks_control_bits() {
        let mut dev = MockBus::new();
        // clock halt on seconds, 12-hour flag + PM bit pattern on hours
        dev.clock[..7].copy_from_slice(&[0x80 | 0x45, 0x07, 0x40 | 0x11, 0xF3, 0xC5, 0xE9, 0x24]);
        let arbiter = Arbiter::new(dev, MockDelay::default());
        block_on(async {
            let mut bus = arbiter.acquire().await;
            let t = DRIVER.read(&mut *bus).await.unwrap();
            assert_eq!(t.seconds, 45);
            assert_eq!(t.minutes, 7);
            // mode bit discarded, hour decoded as 24-hour value
            assert_eq!(t.hours, 11);
            assert_eq!(t.weekday, 3);
            assert_eq!(t.date, 5);
            assert_eq!(t.month, 9);
            assert_eq!(t.year, 24);
        });
    }

    #[test]
    fn test_init_clears_clock_halt() {
        let mut dev = MockBus::new();
        dev.clock[0] = 0x80 | 0x12;
        let arbiter = Arbiter::new(dev, MockDelay::default());
        block_on(async {
            let mut bus = arbiter.acquire().await;
            DRIVER.init(&mut *bus).await.unwrap();
            assert_eq!(bus.i2c.clock[0], 0x12);
        });
    }

    #[test]
    fn test_init_leaves_running_clock_alone() {
        let mut dev = MockBus::new();
        dev.clock[0] = 0x12;
        let arbiter = Arbiter::new(dev, MockDelay::default());
        block_on(async {
            let mut bus = arbiter.acquire().await;
            DRIVER.init(&mut *bus).await.unwrap();
            assert_eq!(bus.i2c.transactions, 1);
        });
    }

    #[test]
    fn test_ram_window_bounds() {
        let arbiter = Arbiter::new(MockBus::new(), MockDelay::default());
        block_on(async {
            let mut bus = arbiter.acquire().await;
            DRIVER.write_ram_byte(&mut *bus, RAM_START, 0xA5).await.unwrap();
            DRIVER.write_ram_byte(&mut *bus, RAM_END, 0x5A).await.unwrap();
            assert_eq!(DRIVER.read_ram_byte(&mut *bus, RAM_START).await.unwrap(), 0xA5);
            assert_eq!(DRIVER.read_ram_byte(&mut *bus, RAM_END).await.unwrap(), 0x5A);

            let before = bus.i2c.transactions;
            assert_eq!(
                DRIVER.write_ram_byte(&mut *bus, 0x07, 1).await,
                Err(Error::RamAddressOutOfRange(0x07))
            );
            assert_eq!(
                DRIVER.read_ram_byte(&mut *bus, 0x40).await,
                Err(Error::RamAddressOutOfRange(0x40))
            );
            // rejected before touching the bus; control register untouched
            assert_eq!(bus.i2c.transactions, before);
            assert_eq!(bus.i2c.clock[0x07], 0);
        });
    }

    #[test]
    fn test_missing_device_reports_nack() {
        let mut dev = MockBus::new();
        dev.nack = Some(CLOCK_ADDR);
        let arbiter = Arbiter::new(dev, MockDelay::default());
        block_on(async {
            let mut bus = arbiter.acquire().await;
            assert_eq!(
                DRIVER.read(&mut *bus).await,
                Err(Error::Bus(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)))
            );
        });
    }

    #[test]
    fn test_reading_validity() {
        assert!(sample().is_valid());
        assert!(ClockReading::EPOCH.is_valid());
        assert!(!ClockReading { weekday: 0, ..sample() }.is_valid());
        assert!(!ClockReading { month: 13, ..sample() }.is_valid());
        assert_eq!(sample().full_year(), 2022);
    }
}
