//! # Remote-Control Link Watchdog
//!
//! Declares the receiver link lost when no healthy frame arrived during a
//! whole daemon period. The receive path calls [`LinkWatchdog::feed`]; the
//! daemon calls [`LinkWatchdog::check`] every `reload_ticks`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::daemon::{DaemonHandle, OwnerTag, TimerEntry, TimerHandle};
use crate::error::DaemonError;

/// Default watchdog period in daemon ticks (500 ms at 50 ms)
pub const DEFAULT_LOSS_RELOAD_TICKS: u16 = 10;

/// Receiver link state shared between the receive path and the daemon
#[derive(Debug, Default)]
pub struct LinkWatchdog {
    enabled: AtomicBool,
    fed: AtomicBool,
    online: AtomicBool,
    loss_events: AtomicU64,
}

impl LinkWatchdog {
    /// A disabled watchdog that considers the link offline
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Record a healthy receiver frame
    pub fn feed(&self) {
        self.fed.store(true, Ordering::Release);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Number of online to lost transitions seen
    pub fn loss_events(&self) -> u64 {
        self.loss_events.load(Ordering::Relaxed)
    }

    /// Close one watchdog period
    ///
    /// Consumes the feed flag. A disabled watchdog keeps its state.
    ///
    /// # Returns
    ///
    /// * `bool` - Whether the link is online after this period
    pub fn check(&self) -> bool {
        let fed = self.fed.swap(false, Ordering::AcqRel);

        if !self.is_enabled() {
            return self.is_online();
        }

        if fed {
            if !self.online.swap(true, Ordering::AcqRel) {
                info!("Remote control link online");
            }
            return true;
        }

        if self.online.swap(false, Ordering::AcqRel) {
            let events = self.loss_events.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(loss_events = events, "Remote control link lost");
        }
        false
    }
}

/// Register the periodic check of `watchdog` with the daemon
///
/// The callback rearms before checking, so the watchdog runs once every
/// `reload_ticks` for the life of the daemon.
pub fn attach(
    daemon: &DaemonHandle,
    watchdog: Arc<LinkWatchdog>,
    reload_ticks: u16,
) -> Result<TimerHandle, DaemonError> {
    let handle = daemon.register_owner(watchdog, OwnerTag::RemoteControl, 0, reload_ticks, watchdog_expired)?;
    debug!(timer = handle.id(), reload_ticks, "Link watchdog attached");
    Ok(handle)
}

fn watchdog_expired(entry: &mut TimerEntry, watchdog: &LinkWatchdog) {
    entry.rearm();
    watchdog.check();
}
