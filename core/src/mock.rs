//! In-memory devices for host tests
//!
//! `MockBus` answers at the clock and EEPROM addresses with the same pointer
//! semantics as the real parts: the first byte of a clock write sets the
//! register pointer, the first two bytes of an EEPROM write set the 12-bit
//! word address, and reads continue from the current pointer.

use std::collections::VecDeque;

use core::convert::Infallible;
use embedded_hal::digital;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

pub const CLOCK_ADDR: u8 = 0x68;
pub const EEPROM_ADDR: u8 = 0x50;
/// AT24C32: 4 KiB, upper address bits ignored
pub const EEPROM_SIZE: usize = 4096;

/// One byte moved over the bus, in bus order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Write { device: u8, addr: u16, value: u8 },
    Read { device: u8, addr: u16, value: u8 },
}

pub struct MockBus {
    pub clock: [u8; 64],
    pub eeprom: Vec<u8>,
    pub trace: Vec<Access>,
    pub transactions: usize,
    /// Yield to the executor before every transaction so concurrent futures interleave
    pub yield_each: bool,
    /// Device address that stops acknowledging
    pub nack: Option<u8>,
    /// Transactions that succeed before every device stops acknowledging
    pub fail_after: Option<usize>,
    clock_ptr: u8,
    eeprom_ptr: u16,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            clock: [0; 64],
            eeprom: vec![0xFF; EEPROM_SIZE],
            trace: Vec::new(),
            transactions: 0,
            yield_each: false,
            nack: None,
            fail_after: None,
            clock_ptr: 0,
            eeprom_ptr: 0,
        }
    }

    pub fn interleaving() -> Self {
        Self {
            yield_each: true,
            ..Self::new()
        }
    }

    /// EEPROM addresses written, in bus order
    pub fn eeprom_writes(&self) -> Vec<u16> {
        self.trace
            .iter()
            .filter_map(|a| match a {
                Access::Write { device, addr, .. } if *device == EEPROM_ADDR => Some(*addr),
                _ => None,
            })
            .collect()
    }

    fn set_pointer(&mut self, device: u8, header: &[u8]) {
        if device == CLOCK_ADDR {
            self.clock_ptr = header[0] & 0x3F;
        } else {
            self.eeprom_ptr = u16::from_be_bytes([header[0], header[1]]) & 0x0FFF;
        }
    }

    fn store(&mut self, device: u8, value: u8) {
        if device == CLOCK_ADDR {
            let addr = self.clock_ptr;
            self.clock[usize::from(addr)] = value;
            self.clock_ptr = (addr + 1) & 0x3F;
            self.trace.push(Access::Write { device, addr: u16::from(addr), value });
        } else {
            let addr = self.eeprom_ptr;
            self.eeprom[usize::from(addr)] = value;
            self.eeprom_ptr = (addr + 1) & 0x0FFF;
            self.trace.push(Access::Write { device, addr, value });
        }
    }

    fn load(&mut self, device: u8) -> u8 {
        if device == CLOCK_ADDR {
            let addr = self.clock_ptr;
            let value = self.clock[usize::from(addr)];
            self.clock_ptr = (addr + 1) & 0x3F;
            self.trace.push(Access::Read { device, addr: u16::from(addr), value });
            value
        } else {
            let addr = self.eeprom_ptr;
            let value = self.eeprom[usize::from(addr)];
            self.eeprom_ptr = (addr + 1) & 0x0FFF;
            self.trace.push(Access::Read { device, addr, value });
            value
        }
    }
}

impl ErrorType for MockBus {
    type Error = ErrorKind;
}

impl I2c for MockBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.yield_each {
            embassy_futures::yield_now().await;
        }
        let exhausted = self.fail_after.is_some_and(|n| self.transactions >= n);
        if exhausted
            || self.nack == Some(address)
            || (address != CLOCK_ADDR && address != EEPROM_ADDR)
        {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        self.transactions += 1;

        let pointer_len = if address == CLOCK_ADDR { 1 } else { 2 };
        let mut header = Vec::new();
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    for &b in bytes.iter() {
                        if header.len() < pointer_len {
                            header.push(b);
                            if header.len() == pointer_len {
                                self.set_pointer(address, &header);
                            }
                        } else {
                            self.store(address, b);
                        }
                    }
                }
                Operation::Read(buf) => {
                    for slot in buf.iter_mut() {
                        *slot = self.load(address);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Delay provider that returns after one executor yield and records what was asked
#[derive(Debug, Default)]
pub struct MockDelay {
    pub calls: usize,
    pub total_ns: u64,
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ns);
        embassy_futures::yield_now().await;
    }
}

/// Input pin replaying a scripted level sequence, holding the last level afterwards
pub struct MockInput {
    levels: VecDeque<bool>,
    last: bool,
}

impl MockInput {
    pub fn new(levels: &[bool]) -> Self {
        Self {
            levels: levels.iter().copied().collect(),
            last: false,
        }
    }
}

impl digital::ErrorType for MockInput {
    type Error = Infallible;
}

impl digital::InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        if let Some(level) = self.levels.pop_front() {
            self.last = level;
        }
        Ok(self.last)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|h| !h)
    }
}

/// Output pin remembering every level it was driven to
#[derive(Debug, Default)]
pub struct MockLed {
    pub history: Vec<bool>,
}

impl digital::ErrorType for MockLed {
    type Error = Infallible;
}

impl digital::OutputPin for MockLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.history.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.history.push(true);
        Ok(())
    }
}
