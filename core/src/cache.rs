//! Latest clock reading, shared between the refresh and logging tasks
//!
//! The logging task stamps records from here instead of reading the clock,
//! which keeps bus traffic off the event path. The price is staleness: a value
//! can be up to one refresh interval (plus one bus transaction) behind the
//! device.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant};

use crate::clock::ClockReading;

/// Cached reading and when it was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    pub reading: ClockReading,
    /// `None` until the first refresh
    pub refreshed_at: Option<Instant>,
}

impl Snapshot {
    /// Time since the last refresh, `None` if never refreshed
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.refreshed_at
            .map(|at| now.checked_duration_since(at).unwrap_or(Duration::from_ticks(0)))
    }
}

/// Single-slot holder guarded by its own mutex (not the bus arbiter's)
pub struct ClockCache<M: RawMutex> {
    slot: Mutex<M, Snapshot>,
}

impl<M: RawMutex> ClockCache<M> {
    /// Cache holding `initial` until the first [`set`](Self::set)
    pub const fn new(initial: ClockReading) -> Self {
        Self {
            slot: Mutex::new(Snapshot {
                reading: initial,
                refreshed_at: None,
            }),
        }
    }

    /// Replace the cached reading
    pub async fn set(&self, reading: ClockReading, at: Instant) {
        let mut slot = self.slot.lock().await;
        slot.reading = reading;
        slot.refreshed_at = Some(at);
    }

    /// Copy of the cached reading
    pub async fn get(&self) -> ClockReading {
        self.slot.lock().await.reading
    }

    /// Copy of the cached reading with its refresh time
    pub async fn snapshot(&self) -> Snapshot {
        *self.slot.lock().await
    }
}
