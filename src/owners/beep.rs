//! # Buzzer Module
//!
//! Beep sequences on the on-board passive buzzer.
//!
//! Each daemon dispatch is one half-period: a beep is one period on followed
//! by one period off. When watching a [`LinkWatchdog`], every new link loss
//! queues [`LOSS_ALARM_BEEPS`] beeps.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use crate::daemon::{DaemonHandle, OwnerTag, TimerHandle};
use crate::error::DaemonError;
use crate::owners::rc_watchdog::LinkWatchdog;

/// Buzzer half-period in daemon ticks (100 ms at 50 ms)
pub const BEEP_RELOAD_TICKS: u16 = 2;

/// Beeps sounded for each remote-control link loss
pub const LOSS_ALARM_BEEPS: u16 = 3;

/// Buzzer output pin
#[cfg_attr(test, mockall::automock)]
pub trait BuzzerDriver: Send {
    fn set_on(&mut self, on: bool);
}

/// Stand-in driver that logs pin changes
#[derive(Debug, Clone)]
pub struct TracingBuzzerDriver {
    name: String,
}

impl TracingBuzzerDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl BuzzerDriver for TracingBuzzerDriver {
    fn set_on(&mut self, on: bool) {
        trace!(buzzer = %self.name, on, "Buzzer pin");
    }
}

#[derive(Debug)]
struct LossAlarm {
    watchdog: Arc<LinkWatchdog>,
    seen_events: u64,
}

/// Queued beeps for one buzzer
#[derive(Debug)]
pub struct Buzzer<D: BuzzerDriver> {
    driver: D,
    pending: u16,
    sounding: bool,
    alarm: Option<LossAlarm>,
}

impl<D: BuzzerDriver> Buzzer<D> {
    /// A silent buzzer; the pin is driven low
    pub fn new(mut driver: D) -> Self {
        driver.set_on(false);
        Self {
            driver,
            pending: 0,
            sounding: false,
            alarm: None,
        }
    }

    /// Queue `count` more beeps
    pub fn beep(&mut self, count: u16) {
        self.pending = self.pending.saturating_add(count);
    }

    /// Sound the loss alarm whenever `watchdog` reports a new link loss
    ///
    /// Losses that happened before this call are not announced.
    pub fn watch_link(&mut self, watchdog: Arc<LinkWatchdog>) {
        let seen_events = watchdog.loss_events();
        self.alarm = Some(LossAlarm { watchdog, seen_events });
    }

    /// Beeps queued and not yet started
    pub fn pending(&self) -> u16 {
        self.pending
    }

    pub fn is_sounding(&self) -> bool {
        self.sounding
    }

    /// Advance one half-period
    pub fn step(&mut self) {
        if let Some(alarm) = self.alarm.as_mut() {
            let events = alarm.watchdog.loss_events();
            if events > alarm.seen_events {
                alarm.seen_events = events;
                self.pending = self.pending.saturating_add(LOSS_ALARM_BEEPS);
            }
        }

        if self.sounding {
            self.sounding = false;
            self.driver.set_on(false);
        } else if self.pending > 0 {
            self.pending -= 1;
            self.sounding = true;
            self.driver.set_on(true);
        }
    }
}

/// Drive `buzzer` from the daemon, one half-period every `reload_ticks`
pub fn attach<D>(
    daemon: &DaemonHandle,
    buzzer: Arc<Mutex<Buzzer<D>>>,
    reload_ticks: u16,
) -> Result<TimerHandle, DaemonError>
where
    D: BuzzerDriver + 'static,
{
    let handle = daemon.register(OwnerTag::Beep, 0, reload_ticks, move |entry| {
        entry.rearm();
        buzzer.lock().unwrap_or_else(PoisonError::into_inner).step();
    })?;
    debug!(timer = handle.id(), reload_ticks, "Buzzer attached");
    Ok(handle)
}
