//! # Daemon Owners
//!
//! Periodic work driven by the daemon scheduler:
//! - Status LED blink patterns
//! - Remote-control link-loss watchdog
//! - RGB breathing effect
//! - Buzzer beep sequences, including the link-loss alarm
//!
//! Every owner registers itself with the same `attach(daemon, owner, reload_ticks)`
//! free function.

pub mod beep;
pub mod breathing;
pub mod led;
pub mod rc_watchdog;

pub use beep::{Buzzer, BuzzerDriver, TracingBuzzerDriver};
pub use breathing::{Breathing, BreathingSettings};
pub use led::{BlinkPattern, Color, LedBank, LedDriver, TracingLedDriver};
pub use rc_watchdog::LinkWatchdog;
