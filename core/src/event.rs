//! Debounced pulse input and its hand-off to the logging task
//!
//! The edge handler runs in interrupt context. It only compares timestamps and
//! raises a one-slot pending flag: no bus I/O, no async mutex, no waiting.
//!
//! The flag holds at most one credit. Pulses accepted while a credit is still
//! pending fold into it, so the consumer sees at least one wake-up per burst
//! but possibly fewer wake-ups than pulses. Folded pulses are counted in
//! [`EventSource::coalesced`].

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant};

/// Pulse source shared between the edge interrupt and the logging task
///
/// Use a `CriticalSectionRawMutex` when `on_edge` is called from an interrupt.
pub struct EventSource<M: RawMutex> {
    debounce: Duration,
    last_accepted: BlockingMutex<M, Cell<Option<Instant>>>,
    pending: Signal<M, ()>,
    accepted: AtomicU32,
    coalesced: AtomicU32,
}

impl<M: RawMutex> EventSource<M> {
    /// Edges closer than `debounce` to the last accepted one are ignored
    pub const fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_accepted: BlockingMutex::new(Cell::new(None)),
            pending: Signal::new(),
            accepted: AtomicU32::new(0),
            coalesced: AtomicU32::new(0),
        }
    }

    /// Rising-edge handler, `now` being the time the edge was seen
    ///
    /// Returns whether the edge passed the debounce filter. The first edge is
    /// always accepted. A timestamp earlier than the last accepted edge is
    /// treated as a bounce.
    pub fn on_edge(&self, now: Instant) -> bool {
        self.last_accepted.lock(|last| {
            let bounce = match last.get() {
                Some(prev) => now
                    .checked_duration_since(prev)
                    .is_none_or(|elapsed| elapsed < self.debounce),
                None => false,
            };
            if bounce {
                return false;
            }
            last.set(Some(now));

            if self.pending.signaled() {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
            }
            self.pending.signal(());
            self.accepted.fetch_add(1, Ordering::Relaxed);
            true
        })
    }

    /// Wait (indefinitely) for a pending pulse and consume its credit
    pub async fn wait(&self) {
        self.pending.wait().await
    }

    /// Consume the pending credit without waiting
    pub fn try_take(&self) -> bool {
        self.pending.try_take().is_some()
    }

    /// Edges that passed the debounce filter
    pub fn accepted(&self) -> u32 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Accepted edges that found a credit already pending
    pub fn coalesced(&self) -> u32 {
        self.coalesced.load(Ordering::Relaxed)
    }
}
