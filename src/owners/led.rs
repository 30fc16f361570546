//! # Status LED Module
//!
//! Blink control for the on-board RGB status LED.
//!
//! The board has a single RGB LED driven by three PWM channels. Up to
//! [`MAX_LEDS`] logical LEDs (colors) can be created; starting one stops all
//! others, so exactly one pattern owns the hardware at a time. Timing is
//! counted in LED periods, one per daemon dispatch.
//!
//! ## Usage
//!
//! ```
//! use rover_link::owners::led::{BlinkPattern, Color, LedBank, TracingLedDriver};
//!
//! let mut bank = LedBank::new(TracingLedDriver::new("status"));
//! bank.create(0, Color::DARK_GREEN).unwrap();
//! bank.start(0, BlinkPattern::new(1, 4, 0)).unwrap();
//! bank.step();
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use crate::daemon::{DaemonHandle, OwnerTag, TimerHandle};
use crate::error::{DaemonError, LedError};

/// Maximum number of logical LEDs
pub const MAX_LEDS: usize = 5;

/// LED period in daemon ticks (200 ms at 50 ms)
pub const LED_RELOAD_TICKS: u16 = 4;

/// PWM compare counts per color step (timer auto-reload is 255 * 5)
pub const PWM_COUNTS_PER_STEP: u16 = 5;

/// PWM output for the RGB LED
#[cfg_attr(test, mockall::automock)]
pub trait LedDriver: Send {
    /// Set the compare value of each channel
    fn set_compare(&mut self, red: u16, green: u16, blue: u16);
}

/// Stand-in driver that logs compare values
#[derive(Debug, Clone)]
pub struct TracingLedDriver {
    name: String,
}

impl TracingLedDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl LedDriver for TracingLedDriver {
    fn set_compare(&mut self, red: u16, green: u16, blue: u16) {
        trace!(led = %self.name, red, green, blue, "PWM compare");
    }
}

/// 24-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u32);

impl Color {
    pub const TURQUOISE: Color = Color(0x00F5FF);
    pub const DARK_GREEN: Color = Color(0x006400);
    pub const DARK_GOLDENROD: Color = Color(0xFFB90F);
    pub const FIREBRICK: Color = Color(0xB22222);
    pub const MEDIUM_PURPLE: Color = Color(0xAB82FF);
    pub const OFF: Color = Color(0x000000);

    pub fn red(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(&self) -> u8 {
        self.0 as u8
    }

    /// PWM compare values for each channel
    pub fn compare_values(&self) -> (u16, u16, u16) {
        (
            self.red() as u16 * PWM_COUNTS_PER_STEP,
            self.green() as u16 * PWM_COUNTS_PER_STEP,
            self.blue() as u16 * PWM_COUNTS_PER_STEP,
        )
    }

    /// Color with every channel scaled by `level / 255`
    pub fn scaled(&self, level: u8) -> Color {
        let scale = |c: u8| ((c as u32 * level as u32) / 255) & 0xFF;
        Color((scale(self.red()) << 16) | (scale(self.green()) << 8) | scale(self.blue()))
    }
}

/// Blink timing, in LED periods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    /// Periods lit per flash
    pub light_periods: u16,

    /// Periods dark between flashes
    pub dark_periods: u16,

    /// Flashes before stopping; 0 blinks forever
    pub flashes: u16,
}

impl BlinkPattern {
    pub fn new(light_periods: u16, dark_periods: u16, flashes: u16) -> Self {
        Self {
            light_periods: light_periods.max(1),
            dark_periods,
            flashes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Lit,
    Dark,
}

#[derive(Debug, Clone)]
struct LedSlot {
    color: Color,
    pattern: BlinkPattern,
    phase: Phase,
    elapsed: u16,
    flashes_done: u16,
}

/// The logical LEDs sharing one physical RGB LED
#[derive(Debug)]
pub struct LedBank<D: LedDriver> {
    slots: [Option<LedSlot>; MAX_LEDS],
    active: Option<usize>,
    driver: D,
}

impl<D: LedDriver> LedBank<D> {
    /// Create an empty bank; the LED is switched off
    pub fn new(mut driver: D) -> Self {
        driver.set_compare(0, 0, 0);
        Self {
            slots: Default::default(),
            active: None,
            driver,
        }
    }

    /// Create logical LED `idx` showing `color`
    ///
    /// # Errors
    ///
    /// Returns error if `idx >= MAX_LEDS` or the LED already exists
    pub fn create(&mut self, idx: usize, color: Color) -> Result<(), LedError> {
        let slot = self.slots.get_mut(idx).ok_or(LedError::IndexOutOfRange(idx))?;
        if slot.is_some() {
            return Err(LedError::AlreadyCreated(idx));
        }

        *slot = Some(LedSlot {
            color,
            pattern: BlinkPattern::new(1, 0, 0),
            phase: Phase::Dark,
            elapsed: 0,
            flashes_done: 0,
        });
        debug!(led = idx, color = %format!("{:06X}", color.0), "LED created");
        Ok(())
    }

    /// Start blinking LED `idx`, stopping whichever LED was running
    pub fn start(&mut self, idx: usize, pattern: BlinkPattern) -> Result<(), LedError> {
        let slot = self
            .slots
            .get_mut(idx)
            .ok_or(LedError::IndexOutOfRange(idx))?
            .as_mut()
            .ok_or(LedError::NotCreated(idx))?;

        slot.pattern = pattern;
        slot.phase = Phase::Lit;
        slot.elapsed = 0;
        slot.flashes_done = 0;
        let (r, g, b) = slot.color.compare_values();

        self.active = Some(idx);
        self.driver.set_compare(r, g, b);
        Ok(())
    }

    /// Switch the LED off
    pub fn stop(&mut self) {
        self.active = None;
        self.driver.set_compare(0, 0, 0);
    }

    /// Index of the running LED
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Whether the running LED is in its lit phase
    pub fn is_lit(&self) -> bool {
        self.active_slot().is_some_and(|slot| slot.phase == Phase::Lit)
    }

    /// Advance the running pattern by one LED period
    pub fn step(&mut self) {
        let Some(idx) = self.active else {
            return;
        };
        let Some(slot) = self.slots[idx].as_mut() else {
            return;
        };

        slot.elapsed += 1;
        match slot.phase {
            Phase::Lit if slot.elapsed >= slot.pattern.light_periods => {
                slot.elapsed = 0;
                if slot.pattern.dark_periods > 0 {
                    slot.phase = Phase::Dark;
                    self.driver.set_compare(0, 0, 0);
                } else {
                    Self::finish_flash(slot, &mut self.active, &mut self.driver);
                }
            }
            Phase::Dark if slot.elapsed >= slot.pattern.dark_periods => {
                slot.elapsed = 0;
                Self::finish_flash(slot, &mut self.active, &mut self.driver);
            }
            _ => {}
        }
    }

    fn finish_flash(slot: &mut LedSlot, active: &mut Option<usize>, driver: &mut D) {
        slot.flashes_done = slot.flashes_done.saturating_add(1);

        if slot.pattern.flashes != 0 && slot.flashes_done >= slot.pattern.flashes {
            *active = None;
            driver.set_compare(0, 0, 0);
            return;
        }

        slot.phase = Phase::Lit;
        let (r, g, b) = slot.color.compare_values();
        driver.set_compare(r, g, b);
    }

    fn active_slot(&self) -> Option<&LedSlot> {
        self.active.and_then(|idx| self.slots[idx].as_ref())
    }
}

/// Drive `bank` from the daemon, one LED period every `reload_ticks`
pub fn attach<D>(
    daemon: &DaemonHandle,
    bank: Arc<Mutex<LedBank<D>>>,
    reload_ticks: u16,
) -> Result<TimerHandle, DaemonError>
where
    D: LedDriver + 'static,
{
    let handle = daemon.register(OwnerTag::Led, 0, reload_ticks, move |entry| {
        entry.rearm();
        bank.lock().unwrap_or_else(PoisonError::into_inner).step();
    })?;
    debug!(timer = handle.id(), reload_ticks, "LED bank attached");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::DaemonScheduler;

    fn recording_driver() -> (MockLedDriver, Arc<Mutex<Vec<(u16, u16, u16)>>>) {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&writes);
        let mut driver = MockLedDriver::new();
        driver
            .expect_set_compare()
            .returning(move |r, g, b| sink.lock().unwrap().push((r, g, b)));
        (driver, writes)
    }

    #[test]
    fn test_color_components() {
        let color = Color::DARK_GOLDENROD;
        assert_eq!(color.red(), 0xFF);
        assert_eq!(color.green(), 0xB9);
        assert_eq!(color.blue(), 0x0F);
        assert_eq!(color.compare_values(), (1275, 925, 75));
    }

    #[test]
    fn test_color_scaled() {
        assert_eq!(Color(0xFF8000).scaled(255), Color(0xFF8000));
        assert_eq!(Color(0xFF8000).scaled(0), Color::OFF);
        assert_eq!(Color(0xFF8000).scaled(128), Color(0x804000));
    }

    #[test]
    fn test_create_rejects_bad_index() {
        let (driver, _) = recording_driver();
        let mut bank = LedBank::new(driver);
        assert_eq!(bank.create(MAX_LEDS, Color::TURQUOISE), Err(LedError::IndexOutOfRange(5)));
    }

    #[test]
    fn test_create_rejects_duplicate() {
        let (driver, _) = recording_driver();
        let mut bank = LedBank::new(driver);
        bank.create(1, Color::TURQUOISE).unwrap();
        assert_eq!(bank.create(1, Color::FIREBRICK), Err(LedError::AlreadyCreated(1)));
    }

    #[test]
    fn test_start_requires_created_led() {
        let (driver, _) = recording_driver();
        let mut bank = LedBank::new(driver);
        assert_eq!(bank.start(2, BlinkPattern::new(1, 1, 0)), Err(LedError::NotCreated(2)));
    }

    #[test]
    fn test_start_replaces_running_led() {
        let (driver, writes) = recording_driver();
        let mut bank = LedBank::new(driver);
        bank.create(0, Color::DARK_GREEN).unwrap();
        bank.create(1, Color::FIREBRICK).unwrap();

        bank.start(0, BlinkPattern::new(1, 1, 0)).unwrap();
        bank.start(1, BlinkPattern::new(1, 1, 0)).unwrap();

        assert_eq!(bank.active(), Some(1));
        assert_eq!(*writes.lock().unwrap().last().unwrap(), Color::FIREBRICK.compare_values());
    }

    #[test]
    fn test_blink_sequence_stops_after_flashes() {
        let (driver, writes) = recording_driver();
        let mut bank = LedBank::new(driver);
        bank.create(0, Color::TURQUOISE).unwrap();
        bank.start(0, BlinkPattern::new(2, 1, 2)).unwrap();

        let on = Color::TURQUOISE.compare_values();
        let off = (0, 0, 0);

        let mut lit = Vec::new();
        for _ in 0..7 {
            bank.step();
            lit.push(bank.is_lit());
        }

        assert_eq!(lit, vec![true, false, true, true, false, false, false]);
        assert_eq!(bank.active(), None);
        assert_eq!(*writes.lock().unwrap(), vec![off, on, off, on, off, off]);
    }

    #[test]
    fn test_solid_pattern_stays_lit() {
        let (driver, _) = recording_driver();
        let mut bank = LedBank::new(driver);
        bank.create(0, Color::MEDIUM_PURPLE).unwrap();
        bank.start(0, BlinkPattern::new(1, 0, 0)).unwrap();

        for _ in 0..5 {
            bank.step();
            assert!(bank.is_lit());
        }
    }

    #[test]
    fn test_stop_switches_off() {
        let (driver, writes) = recording_driver();
        let mut bank = LedBank::new(driver);
        bank.create(0, Color::TURQUOISE).unwrap();
        bank.start(0, BlinkPattern::new(1, 1, 0)).unwrap();
        bank.stop();

        assert_eq!(bank.active(), None);
        assert_eq!(*writes.lock().unwrap().last().unwrap(), (0, 0, 0));
    }

    #[test]
    fn test_attach_steps_every_reload_ticks() {
        let (mut daemon, handle) = DaemonScheduler::new(2);
        let (driver, _) = recording_driver();
        let bank = Arc::new(Mutex::new(LedBank::new(driver)));
        {
            let mut bank = bank.lock().unwrap();
            bank.create(0, Color::DARK_GREEN).unwrap();
            bank.start(0, BlinkPattern::new(1, 1, 0)).unwrap();
        }

        attach(&handle, Arc::clone(&bank), LED_RELOAD_TICKS).unwrap();

        for _ in 0..LED_RELOAD_TICKS - 1 {
            daemon.tick();
        }
        assert!(bank.lock().unwrap().is_lit());

        daemon.tick();
        assert!(!bank.lock().unwrap().is_lit());
    }
}
