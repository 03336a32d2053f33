//! Node context and the long-running task bodies
//!
//! [`Node`] owns everything the tasks share: the bus arbiter, the clock and
//! log drivers, the clock cache and the pulse source. The firmware places one
//! `Node` in a `StaticCell` and hands `&'static Node` to each task.
//!
//! ```text
//!  edge IRQ ──on_edge──▶ EventSource ──wait──▶ run_event_logger ──▶ cache.get
//!                                                      │
//!  run_clock_refresh ──▶ BusArbiter ◀─────────────────┘ (append)
//!          │                 │
//!          └──▶ cache.set    └── ClockDriver / SequentialLog
//! ```
//!
//! Task loops never return. Failures are logged and the loop carries on.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Instant, Timer};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::bus::BusArbiter;
use crate::cache::ClockCache;
use crate::clock::{ClockDriver, ClockReading};
use crate::config::NodeConfig;
use crate::error::Result;
use crate::event::EventSource;
use crate::indicator::StatusIndicator;
use crate::log::{EventRecord, SequentialLog, RECORD_LEN};

/// Outcome of one logged pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Logged {
    /// EEPROM address the record was written to
    pub address: u16,
    /// Cursor after the append
    pub cursor: u16,
    pub record: EventRecord,
}

/// Shared state of one logging node
pub struct Node<M: RawMutex, I2C, D> {
    config: NodeConfig,
    pub bus: BusArbiter<M, I2C, D>,
    pub clock: ClockDriver,
    pub log: SequentialLog<M>,
    pub cache: ClockCache<M>,
    pub events: EventSource<M>,
}

impl<M: RawMutex, I2C, D> Node<M, I2C, D> {
    pub const fn new(config: NodeConfig, i2c: I2C, delay: D) -> Self {
        Self {
            config,
            bus: BusArbiter::new(i2c, delay),
            clock: ClockDriver::new(config.clock_address, config.clock_write_cycle),
            log: SequentialLog::new(config.eeprom_address, config.eeprom_write_cycle),
            cache: ClockCache::new(ClockReading::EPOCH),
            events: EventSource::new(config.debounce),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}

impl<M: RawMutex, I2C: I2c, D: DelayNs> Node<M, I2C, D> {
    /// Bring up the devices: restart the clock if halted, start an empty log
    ///
    /// A clock failure is logged and does not stop the log from initializing.
    /// Returns the initial cursor.
    pub async fn start(&self) -> Result<u16> {
        let mut bus = self.bus.acquire().await;
        if let Err(e) = self.clock.init(&mut *bus).await {
            warn!("clock init failed: {:?}", e);
        }
        self.log.init(&mut *bus).await
    }

    /// Set the clock device
    pub async fn set_time(&self, reading: &ClockReading) -> Result<()> {
        let mut bus = self.bus.acquire().await;
        self.clock.write(&mut *bus, reading).await
    }

    /// Read the clock under the bus lock, then publish the reading to the cache
    ///
    /// The bus is released before the cache mutex is taken. On failure the
    /// cache keeps its previous value.
    pub async fn refresh_clock(&self) -> Result<ClockReading> {
        let reading = {
            let mut bus = self.bus.acquire().await;
            self.clock.read(&mut *bus).await?
        };
        self.cache.set(reading, Instant::now()).await;
        Ok(reading)
    }

    /// Stamp pulse `sequence` from the cache and append it to the log
    pub async fn record_event(&self, sequence: u16) -> Result<Logged> {
        let time = self.cache.get().await;
        let record = EventRecord::new(sequence, &time);
        let cursor = {
            let mut bus = self.bus.acquire().await;
            self.log.append(&mut *bus, &record).await?
        };
        Ok(Logged {
            address: cursor.wrapping_sub(RECORD_LEN),
            cursor,
            record,
        })
    }

    /// Clock-refresh task: read, publish, sleep one refresh interval
    pub async fn run_clock_refresh(&self) -> ! {
        info!("clock refresh task started");
        loop {
            match self.refresh_clock().await {
                Ok(t) => info!(
                    "{=u8:02}:{=u8:02}:{=u8:02} - {=u8:02}/{=u8:02}/{=u16} (weekday {=u8})",
                    t.hours,
                    t.minutes,
                    t.seconds,
                    t.date,
                    t.month,
                    t.full_year(),
                    t.weekday
                ),
                Err(e) => warn!("clock read failed: {:?}", e),
            }
            Timer::after(self.config.refresh_interval).await;
        }
    }

    /// Event-logging task: one record per pending-pulse wake-up
    ///
    /// The pulse count lives here and advances on every wake-up, whether or
    /// not the append succeeds.
    pub async fn run_event_logger(&self) -> ! {
        info!("event logger task started");
        let mut sequence: u16 = 0;
        loop {
            self.events.wait().await;
            sequence = sequence.wrapping_add(1);
            match self.record_event(sequence).await {
                Ok(logged) => info!(
                    "pulse {=u16} logged at {=u16}, cursor {=u16} ({=u32} coalesced)",
                    logged.record.sequence,
                    logged.address,
                    logged.cursor,
                    self.events.coalesced()
                ),
                Err(e) => warn!("pulse {=u16} not logged: {:?}", sequence, e),
            }
        }
    }
}

/// Status-indicator task: poll the input every `period`
pub async fn run_status_indicator<IN: InputPin, OUT: OutputPin>(
    indicator: &mut StatusIndicator<IN, OUT>,
    period: embassy_time::Duration,
) -> ! {
    loop {
        if let Err(e) = indicator.poll() {
            warn!("status indicator: {:?}", e);
        }
        Timer::after(period).await;
    }
}
