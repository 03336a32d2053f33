#![deny(unsafe_code)]
//! Append-only event log in EEPROM
//!
//! ```text
//!  ________ ______________________
//! |  Addr  |  Content             |
//! |--------|----------------------|
//! | 0x0000 |  cursor MSB          |
//! | 0x0001 |  cursor LSB          |
//! |--------|----------------------|
//! | cursor |  sequence MSB        |  <- one 8-byte record
//! |   +1   |  sequence LSB        |
//! |   +2   |  hours               |
//! |   +3   |  minutes             |
//! |   +4   |  seconds             |
//! |   +5   |  date                |
//! |   +6   |  month               |
//! |   +7   |  year                |
//! |________|______________________|
//! ```
//!
//! The cursor is the address the next record goes to. It is persisted after
//! every append, so a record interrupted by a bus failure or power loss is
//! overwritten by the next append rather than followed by it.
//!
//! There is no capacity check. Past the end of the device the cursor keeps
//! counting and the part folds the address onto its low bits, overwriting
//! the header and the oldest records.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::bus::Bus;
use crate::clock::ClockReading;
use crate::eeprom::Eeprom;
use crate::error::Result;

/// Address of the persisted cursor (big-endian u16)
pub const CURSOR_ADDR: u16 = 0x0000;
/// First record address, right after the cursor
pub const LOG_BASE: u16 = 0x0002;
/// Encoded size of one [`EventRecord`]
pub const RECORD_LEN: u16 = 8;

/// One logged pulse with the clock snapshot taken when it was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventRecord {
    /// Pulse count, wraps at 65535
    pub sequence: u16,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub date: u8,
    pub month: u8,
    pub year: u8,
}

impl EventRecord {
    pub fn new(sequence: u16, time: &ClockReading) -> Self {
        Self {
            sequence,
            hours: time.hours,
            minutes: time.minutes,
            seconds: time.seconds,
            date: time.date,
            month: time.month,
            year: time.year,
        }
    }

    /// On-device layout, binary fields (not BCD)
    pub fn to_bytes(&self) -> [u8; RECORD_LEN as usize] {
        let [seq_hi, seq_lo] = self.sequence.to_be_bytes();
        [
            seq_hi,
            seq_lo,
            self.hours,
            self.minutes,
            self.seconds,
            self.date,
            self.month,
            self.year,
        ]
    }

    pub fn from_bytes(raw: &[u8; RECORD_LEN as usize]) -> Self {
        Self {
            sequence: u16::from_be_bytes([raw[0], raw[1]]),
            hours: raw[2],
            minutes: raw[3],
            seconds: raw[4],
            date: raw[5],
            month: raw[6],
            year: raw[7],
        }
    }
}

/// Single-writer sequential log
///
/// Holds an in-memory shadow of the cursor for diagnostics. Appends always
/// re-read the persisted cursor, so the device stays the source of truth.
pub struct SequentialLog<M: RawMutex> {
    rom: Eeprom,
    cursor: BlockingMutex<M, Cell<u16>>,
}

impl<M: RawMutex> SequentialLog<M> {
    /// Log on the EEPROM at `address`, pausing `write_cycle` after each byte
    pub const fn new(address: u8, write_cycle: Duration) -> Self {
        Self {
            rom: Eeprom::new(address, write_cycle),
            cursor: BlockingMutex::new(Cell::new(LOG_BASE)),
        }
    }

    /// Start an empty log: persist the cursor at [`LOG_BASE`]
    ///
    /// Whatever the EEPROM held before is abandoned, not recovered.
    pub async fn init<I2C: I2c, D: DelayNs>(&self, bus: &mut Bus<I2C, D>) -> Result<u16> {
        self.write_cursor(bus, LOG_BASE).await?;
        self.cursor.lock(|c| c.set(LOG_BASE));
        info!("event log initialized, cursor {=u16}", LOG_BASE);
        Ok(LOG_BASE)
    }

    /// Continue an existing log from its persisted cursor
    ///
    /// A cursor below [`LOG_BASE`] or not on a record boundary means the
    /// header was never written (or is garbage); the log is re-initialized.
    pub async fn resume<I2C: I2c, D: DelayNs>(&self, bus: &mut Bus<I2C, D>) -> Result<u16> {
        let stored = self.read_cursor(bus).await?;
        if stored < LOG_BASE || (stored - LOG_BASE) % RECORD_LEN != 0 {
            warn!("stored cursor {=u16} invalid, starting empty", stored);
            return self.init(bus).await;
        }
        self.cursor.lock(|c| c.set(stored));
        info!("event log resumed, cursor {=u16}", stored);
        Ok(stored)
    }

    /// Write `record` at the persisted cursor and advance the cursor by one record
    ///
    /// Must run inside a single bus critical section: cursor read, eight byte
    /// writes and the cursor update are one indivisible sequence for other bus
    /// users. Returns the new cursor.
    pub async fn append<I2C: I2c, D: DelayNs>(
        &self,
        bus: &mut Bus<I2C, D>,
        record: &EventRecord,
    ) -> Result<u16> {
        let cursor = self.read_cursor(bus).await?;
        debug!("append at {=u16}", cursor);

        for (offset, byte) in (0u16..).zip(record.to_bytes()) {
            self.rom
                .write_byte(bus, cursor.wrapping_add(offset), byte)
                .await?;
        }

        let next = cursor.wrapping_add(RECORD_LEN);
        self.write_cursor(bus, next).await?;
        self.cursor.lock(|c| c.set(next));
        Ok(next)
    }

    /// Read back the record stored at `addr`
    pub async fn read_record<I2C: I2c, D>(
        &self,
        bus: &mut Bus<I2C, D>,
        addr: u16,
    ) -> Result<EventRecord> {
        let mut raw = [0u8; RECORD_LEN as usize];
        self.rom.read(bus, addr, &mut raw).await?;
        Ok(EventRecord::from_bytes(&raw))
    }

    /// Read up to `N` records, oldest first, from the base to the persisted cursor
    pub async fn read_all<I2C: I2c, D, const N: usize>(
        &self,
        bus: &mut Bus<I2C, D>,
    ) -> Result<heapless::Vec<EventRecord, N>> {
        let end = self.read_cursor(bus).await?;
        let mut records = heapless::Vec::new();
        let mut addr = LOG_BASE;
        while addr < end {
            let record = self.read_record(bus, addr).await?;
            if records.push(record).is_err() {
                break;
            }
            match addr.checked_add(RECORD_LEN) {
                Some(a) => addr = a,
                None => break,
            }
        }
        Ok(records)
    }

    /// Last cursor this log wrote or loaded
    pub fn cursor(&self) -> u16 {
        self.cursor.lock(|c| c.get())
    }

    /// Records between the base and the shadow cursor
    pub fn len(&self) -> usize {
        usize::from(self.cursor().saturating_sub(LOG_BASE) / RECORD_LEN)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn read_cursor<I2C: I2c, D>(&self, bus: &mut Bus<I2C, D>) -> Result<u16> {
        let high = self.rom.read_byte(bus, CURSOR_ADDR).await?;
        let low = self.rom.read_byte(bus, CURSOR_ADDR + 1).await?;
        Ok(u16::from_be_bytes([high, low]))
    }

    async fn write_cursor<I2C: I2c, D: DelayNs>(
        &self,
        bus: &mut Bus<I2C, D>,
        value: u16,
    ) -> Result<()> {
        let [high, low] = value.to_be_bytes();
        self.rom.write_byte(bus, CURSOR_ADDR, high).await?;
        self.rom.write_byte(bus, CURSOR_ADDR + 1, low).await
    }
}
