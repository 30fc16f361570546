//! RGB breathing effect: a triangle-wave brightness ramp on one color.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::daemon::{DaemonHandle, OwnerTag, TimerHandle};
use crate::error::DaemonError;
use crate::owners::led::{Color, LedDriver};

/// Brightness ramp settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreathingSettings {
    pub min_level: u8,
    pub max_level: u8,
    pub step: u8,
}

impl Default for BreathingSettings {
    fn default() -> Self {
        Self {
            min_level: 10,
            max_level: 255,
            step: 5,
        }
    }
}

/// Ramps `color` between two brightness levels
#[derive(Debug)]
pub struct Breathing<D: LedDriver> {
    color: Color,
    settings: BreathingSettings,
    level: u8,
    rising: bool,
    driver: D,
}

impl<D: LedDriver> Breathing<D> {
    /// Start at `min_level`, rising
    pub fn new(driver: D, color: Color, settings: BreathingSettings) -> Self {
        Self {
            color,
            level: settings.min_level,
            rising: true,
            settings,
            driver,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_rising(&self) -> bool {
        self.rising
    }

    /// Move one step along the ramp and push the scaled color
    ///
    /// The level turns around on reaching either bound, so both bounds are
    /// emitted exactly once per cycle.
    pub fn step(&mut self) {
        let BreathingSettings {
            min_level,
            max_level,
            step,
        } = self.settings;

        if self.rising {
            self.level = self.level.saturating_add(step).min(max_level);
            if self.level == max_level {
                self.rising = false;
            }
        } else {
            self.level = self.level.saturating_sub(step).max(min_level);
            if self.level == min_level {
                self.rising = true;
            }
        }

        let (r, g, b) = self.color.scaled(self.level).compare_values();
        self.driver.set_compare(r, g, b);
    }
}

/// Drive `breathing` from the daemon, one step every `reload_ticks`
pub fn attach<D>(
    daemon: &DaemonHandle,
    breathing: Arc<Mutex<Breathing<D>>>,
    reload_ticks: u16,
) -> Result<TimerHandle, DaemonError>
where
    D: LedDriver + 'static,
{
    let handle = daemon.register(OwnerTag::RgbStrip, 0, reload_ticks, move |entry| {
        entry.rearm();
        breathing.lock().unwrap_or_else(PoisonError::into_inner).step();
    })?;
    debug!(timer = handle.id(), reload_ticks, "Breathing effect attached");
    Ok(handle)
}
