//! Shared I2C bus arbitration
//!
//! The clock and the EEPROM sit on the same two-wire bus. Every transaction
//! sequence (pointer write then data, record bytes then cursor) runs while
//! holding a [`BusGuard`], so another task never observes a half-finished
//! sequence. Drivers take `&mut Bus` and never lock on their own; acquiring
//! the guard is the caller's job.
//!
//! Waiting for the bus is unbounded. If a device holds SDA low the task that
//! owns the guard stalls, and every task queued behind it stalls too.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;

/// Bus peripheral plus the delay provider used for device settling times
pub struct Bus<I2C, D> {
    /// I2C master
    pub i2c: I2C,
    delay: D,
}

impl<I2C, D: DelayNs> Bus<I2C, D> {
    /// Wait out a device write cycle
    ///
    /// Zero durations return immediately without touching the delay provider.
    pub async fn settle(&mut self, cycle: Duration) {
        if cycle == Duration::from_ticks(0) {
            return;
        }
        let us = u32::try_from(cycle.as_micros()).unwrap_or(u32::MAX);
        self.delay.delay_us(us).await;
    }
}

impl<I2C, D> Bus<I2C, D> {
    /// Delay provider, exposed for inspection
    pub fn delay(&self) -> &D {
        &self.delay
    }
}

/// Exclusive access to the bus for the lifetime of the guard
pub type BusGuard<'a, M, I2C, D> = MutexGuard<'a, M, Bus<I2C, D>>;

/// Mutual-exclusion wrapper around the shared bus
pub struct BusArbiter<M: RawMutex, I2C, D> {
    bus: Mutex<M, Bus<I2C, D>>,
}

impl<M: RawMutex, I2C, D> BusArbiter<M, I2C, D> {
    /// Take ownership of the bus peripheral and its delay provider
    pub const fn new(i2c: I2C, delay: D) -> Self {
        Self {
            bus: Mutex::new(Bus { i2c, delay }),
        }
    }

    /// Wait (indefinitely) for exclusive bus access
    ///
    /// The lock is released when the guard drops, including early returns via
    /// `?` inside the critical section.
    pub async fn acquire(&self) -> BusGuard<'_, M, I2C, D> {
        let guard = self.bus.lock().await;
        trace!("bus acquired");
        guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, MockDelay};
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    type Arbiter = BusArbiter<CriticalSectionRawMutex, MockBus, MockDelay>;

    #[test]
    fn test_guard_is_exclusive_until_dropped() {
        let arbiter = Arbiter::new(MockBus::new(), MockDelay::default());
        block_on(async {
            let guard = arbiter.acquire().await;
            assert!(arbiter.bus.try_lock().is_err());
            drop(guard);
            assert!(arbiter.bus.try_lock().is_ok());
        });
    }

    #[test]
    fn test_settle_skips_zero_cycle() {
        let arbiter = Arbiter::new(MockBus::new(), MockDelay::default());
        block_on(async {
            let mut bus = arbiter.acquire().await;
            bus.settle(Duration::from_ticks(0)).await;
            assert_eq!(bus.delay().calls, 0);
            bus.settle(Duration::from_millis(10)).await;
            assert_eq!(bus.delay().calls, 1);
            assert_eq!(bus.delay().total_ns, 10_000_000);
        });
    }
}
