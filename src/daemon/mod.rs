//! # Daemon Scheduler
//!
//! Multiplexes many soft timers over one periodic tick.
//!
//! Each registered entry counts down once per tick. When its count reaches
//! zero its callback runs. The scheduler never reloads an entry by itself:
//! the callback rearms it, and an entry left at zero is dispatched again on
//! every following tick. The remote-control watchdog relies on this; other
//! owners simply rearm first thing.
//!
//! ## Threading
//!
//! [`DaemonScheduler`] owns the dispatch array and is driven from exactly one
//! task. Owners register through a cloneable [`DaemonHandle`]: capacity is
//! checked and reserved under a short mutex, and the new entry is queued.
//! The scheduler picks queued changes up at the start of the next tick and
//! then dispatches without holding any lock, so callbacks may register
//! further timers.

pub mod entry;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

pub use entry::{OwnerTag, TimerEntry, TimerHandle, TimerState};

use crate::error::DaemonError;

/// Registry capacity used by the controller firmware
pub const DEFAULT_CAPACITY: usize = 10;

/// Default tick period
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(50);

/// Callback invoked when an entry is due
pub type TimerCallback = Box<dyn FnMut(&mut TimerEntry) + Send>;

struct Slot {
    entry: TimerEntry,
    callback: TimerCallback,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum Change {
    Add(Slot),
    Remove(TimerHandle),
}

#[derive(Debug, Default)]
struct Registry {
    live: Vec<TimerHandle>,
    pending: Vec<Change>,
    next_id: u32,
}

#[derive(Debug)]
struct Shared {
    capacity: usize,
    registry: Mutex<Registry>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Registry mutations cannot be left half-done, so a poisoned lock is still usable
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration side of the daemon, cloneable across tasks
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    shared: Arc<Shared>,
}

impl DaemonHandle {
    /// Register a soft timer
    ///
    /// The entry starts armed with `remaining_ticks = reload_ticks` and is
    /// first considered on the next tick.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::CapacityExceeded` when the registry is full;
    /// nothing is registered in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_link::daemon::{DaemonScheduler, OwnerTag};
    ///
    /// let (mut daemon, handle) = DaemonScheduler::new(4);
    /// handle
    ///     .register(OwnerTag::Led, 0, 2, |entry| entry.rearm())
    ///     .unwrap();
    ///
    /// daemon.tick();
    /// assert_eq!(daemon.tick(), 1);
    /// ```
    pub fn register<F>(
        &self,
        owner_tag: OwnerTag,
        owner_index: u8,
        reload_ticks: u16,
        callback: F,
    ) -> Result<TimerHandle, DaemonError>
    where
        F: FnMut(&mut TimerEntry) + Send + 'static,
    {
        let mut registry = self.shared.lock();

        if registry.live.len() >= self.shared.capacity {
            return Err(DaemonError::CapacityExceeded {
                capacity: self.shared.capacity,
            });
        }

        let handle = TimerHandle(registry.next_id);
        registry.next_id = registry.next_id.wrapping_add(1);
        registry.live.push(handle);
        registry.pending.push(Change::Add(Slot {
            entry: TimerEntry::new(handle, owner_tag, owner_index, reload_ticks),
            callback: Box::new(callback),
        }));

        debug!(timer = handle.id(), %owner_tag, owner_index, reload_ticks, "Daemon timer registered");
        Ok(handle)
    }

    /// Register a timer whose callback receives its owner's state
    ///
    /// Convenience over [`register`](Self::register) for owners shared behind
    /// an `Arc`.
    pub fn register_owner<O>(
        &self,
        owner: Arc<O>,
        owner_tag: OwnerTag,
        owner_index: u8,
        reload_ticks: u16,
        callback: fn(&mut TimerEntry, &O),
    ) -> Result<TimerHandle, DaemonError>
    where
        O: Send + Sync + 'static,
    {
        self.register(owner_tag, owner_index, reload_ticks, move |entry| {
            callback(entry, &owner)
        })
    }

    /// Remove a timer
    ///
    /// Its capacity slot is released immediately; the entry stops being
    /// dispatched from the next tick on.
    pub fn unregister(&self, handle: TimerHandle) -> Result<(), DaemonError> {
        let mut registry = self.shared.lock();

        let Some(position) = registry.live.iter().position(|h| *h == handle) else {
            return Err(DaemonError::UnknownTimer(handle.id()));
        };
        registry.live.remove(position);
        registry.pending.push(Change::Remove(handle));

        debug!(timer = handle.id(), "Daemon timer unregistered");
        Ok(())
    }

    /// Number of registered timers, including ones not yet picked up
    pub fn len(&self) -> usize {
        self.shared.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

/// Dispatch side of the daemon
#[derive(Debug)]
pub struct DaemonScheduler {
    slots: Vec<Slot>,
    shared: Arc<Shared>,
    ticks: u64,
}

impl DaemonScheduler {
    /// Create a scheduler holding at most `capacity` timers
    pub fn new(capacity: usize) -> (Self, DaemonHandle) {
        let shared = Arc::new(Shared {
            capacity,
            registry: Mutex::new(Registry::default()),
        });

        let scheduler = Self {
            slots: Vec::with_capacity(capacity),
            shared: Arc::clone(&shared),
            ticks: 0,
        };

        (scheduler, DaemonHandle { shared })
    }

    /// A new registration handle
    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Entries currently in the dispatch array, in dispatch order
    pub fn entries(&self) -> impl Iterator<Item = &TimerEntry> {
        self.slots.iter().map(|slot| &slot.entry)
    }

    /// Run one scheduler period
    ///
    /// Applies queued registrations and removals, then walks the entries in
    /// registration order: each one counts down by one (never below zero),
    /// and every entry at zero has its callback invoked.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of callbacks dispatched
    pub fn tick(&mut self) -> usize {
        self.apply_pending();
        self.ticks += 1;

        let mut fired = 0;
        for slot in self.slots.iter_mut() {
            if slot.entry.advance() {
                (slot.callback)(&mut slot.entry);
                fired += 1;
            }
        }

        trace!(tick = self.ticks, timers = self.slots.len(), fired, "Daemon tick");
        fired
    }

    /// Drive [`tick`](Self::tick) every `period` until `shutdown` resolves
    ///
    /// Ticks never overlap; a late tick is delayed rather than bursted.
    pub async fn run_until<S>(mut self, period: Duration, shutdown: S) -> Self
    where
        S: Future<Output = ()>,
    {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Daemon started with {}ms tick", period.as_millis());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }

                _ = &mut shutdown => {
                    info!("Daemon stopped after {} ticks", self.ticks);
                    break;
                }
            }
        }

        self
    }

    fn apply_pending(&mut self) {
        let pending = std::mem::take(&mut self.shared.lock().pending);

        for change in pending {
            match change {
                Change::Add(slot) => self.slots.push(slot),
                Change::Remove(handle) => self.slots.retain(|slot| slot.entry.handle() != handle),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    /// Run `ticks` ticks and record on which ones `hits` grew
    fn fire_ticks(daemon: &mut DaemonScheduler, hits: &AtomicUsize, ticks: u64) -> Vec<u64> {
        let mut fired_at = Vec::new();
        for _ in 0..ticks {
            let before = hits.load(Ordering::SeqCst);
            daemon.tick();
            if hits.load(Ordering::SeqCst) > before {
                fired_at.push(daemon.ticks());
            }
        }
        fired_at
    }

    #[test]
    fn test_rearming_entry_fires_every_reload_ticks() {
        let (mut daemon, handle) = DaemonScheduler::new(DEFAULT_CAPACITY);
        let hits = counter();
        let h = Arc::clone(&hits);

        handle
            .register(OwnerTag::Led, 0, 4, move |entry| {
                entry.rearm();
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(fire_ticks(&mut daemon, &hits, 16), vec![4, 8, 12, 16]);
    }

    #[test]
    fn test_non_rearming_entry_fires_every_tick_after_expiry() {
        let (mut daemon, handle) = DaemonScheduler::new(DEFAULT_CAPACITY);
        let hits = counter();
        let h = Arc::clone(&hits);

        handle
            .register(OwnerTag::RemoteControl, 0, 3, move |_entry| {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(fire_ticks(&mut daemon, &hits, 6), vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_zero_reload_fires_every_tick() {
        let (mut daemon, handle) = DaemonScheduler::new(DEFAULT_CAPACITY);
        handle.register(OwnerTag::RgbStrip, 0, 0, |e| e.rearm()).unwrap();

        for _ in 0..3 {
            assert_eq!(daemon.tick(), 1);
        }
    }

    #[test]
    fn test_callback_can_set_custom_countdown() {
        let (mut daemon, handle) = DaemonScheduler::new(DEFAULT_CAPACITY);
        let hits = counter();
        let h = Arc::clone(&hits);

        handle
            .register(OwnerTag::Led, 0, 1, move |entry| {
                entry.set_remaining_ticks(3);
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(fire_ticks(&mut daemon, &hits, 7), vec![1, 4, 7]);
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let (mut daemon, handle) = DaemonScheduler::new(DEFAULT_CAPACITY);
        let order = Arc::new(Mutex::new(Vec::new()));

        for index in 0..3u8 {
            let order = Arc::clone(&order);
            handle
                .register(OwnerTag::Led, index, 1, move |entry| {
                    entry.rearm();
                    order.lock().unwrap().push(entry.owner_index());
                })
                .unwrap();
        }

        daemon.tick();
        daemon.tick();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_capacity_exceeded_leaves_schedules_intact() {
        let (mut daemon, handle) = DaemonScheduler::new(3);
        let hits = counter();

        for index in 0..3u8 {
            let h = Arc::clone(&hits);
            handle
                .register(OwnerTag::Led, index, 2, move |entry| {
                    entry.rearm();
                    h.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        daemon.tick();
        let result = handle.register(OwnerTag::Led, 3, 1, |entry| entry.rearm());
        assert_eq!(result, Err(DaemonError::CapacityExceeded { capacity: 3 }));
        assert_eq!(handle.len(), 3);

        // Existing entries still fire on tick 2
        assert_eq!(daemon.tick(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(daemon.entries().count(), 3);
    }

    #[test]
    fn test_default_capacity_is_ten() {
        let (_daemon, handle) = DaemonScheduler::new(DEFAULT_CAPACITY);
        for index in 0..10u8 {
            handle.register(OwnerTag::Led, index, 1, |e| e.rearm()).unwrap();
        }
        assert!(matches!(
            handle.register(OwnerTag::Led, 10, 1, |e| e.rearm()),
            Err(DaemonError::CapacityExceeded { capacity: 10 })
        ));
    }

    #[test]
    fn test_unregister_stops_dispatch_and_frees_slot() {
        let (mut daemon, handle) = DaemonScheduler::new(1);
        let hits = counter();
        let h = Arc::clone(&hits);

        let timer = handle
            .register(OwnerTag::Led, 0, 1, move |entry| {
                entry.rearm();
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        daemon.tick();
        handle.unregister(timer).unwrap();
        assert!(handle.is_empty());

        daemon.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(handle.register(OwnerTag::Led, 1, 1, |e| e.rearm()).is_ok());
    }

    #[test]
    fn test_unregister_unknown_timer() {
        let (_daemon, handle) = DaemonScheduler::new(2);
        assert_eq!(
            handle.unregister(TimerHandle(7)),
            Err(DaemonError::UnknownTimer(7))
        );
    }

    #[test]
    fn test_callback_may_register_more_timers() {
        let (mut daemon, handle) = DaemonScheduler::new(DEFAULT_CAPACITY);
        let registrar = handle.clone();

        handle
            .register(OwnerTag::Led, 0, 1, move |entry| {
                entry.rearm();
                let _ = registrar.register(OwnerTag::Led, 1, 5, |e| e.rearm());
            })
            .unwrap();

        daemon.tick();
        assert_eq!(handle.len(), 2);
        daemon.tick();
        assert_eq!(daemon.entries().count(), 2);
    }

    #[test]
    fn test_register_owner_passes_state() {
        let (mut daemon, handle) = DaemonScheduler::new(DEFAULT_CAPACITY);
        let owner = counter();

        handle
            .register_owner(Arc::clone(&owner), OwnerTag::RgbStrip, 0, 2, |entry, hits| {
                entry.rearm();
                hits.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        for _ in 0..6 {
            daemon.tick();
        }
        assert_eq!(owner.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_registration_from_another_thread() {
        let (mut daemon, handle) = DaemonScheduler::new(DEFAULT_CAPACITY);

        let workers: Vec<_> = (0..4u8)
            .map(|index| {
                let handle = handle.clone();
                std::thread::spawn(move || handle.register(OwnerTag::Led, index, 1, |e| e.rearm()))
            })
            .collect();

        for worker in workers {
            assert!(worker.join().unwrap().is_ok());
        }

        assert_eq!(daemon.tick(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_ticks_on_period() {
        let (daemon, handle) = DaemonScheduler::new(DEFAULT_CAPACITY);
        let hits = counter();
        let h = Arc::clone(&hits);

        handle
            .register(OwnerTag::Led, 0, 4, move |entry| {
                entry.rearm();
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        // First interval tick fires immediately: ticks land at 0, 50, ..., 950 ms
        let shutdown = tokio::time::sleep(Duration::from_millis(975));
        let daemon = daemon.run_until(DEFAULT_TICK_PERIOD, shutdown).await;

        assert_eq!(daemon.ticks(), 20);
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }
}
