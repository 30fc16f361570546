//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every key is optional; missing values take the
//! defaults below, which match the controller firmware.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, RoverLinkError};
use crate::owners::breathing::BreathingSettings;

/// Host link baud rates the controller firmware supports
pub const ALLOWED_HOST_BAUD_RATES: [u32; 5] = [57600, 115200, 230400, 460800, 921600];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub indicators: IndicatorConfig,
}

/// Host link configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SerialConfig {
    #[serde(default = "default_host_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Decoded messages buffered between the link and the consumer
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

/// Remote-control receiver configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_enabled")]
    pub enabled: bool,

    #[serde(default = "default_sbus_port")]
    pub port: String,

    /// Watchdog period in daemon ticks
    #[serde(default = "default_loss_reload_ticks")]
    pub loss_reload_ticks: u16,
}

/// Daemon scheduler configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DaemonConfig {
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

/// Status LED and RGB breathing configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct IndicatorConfig {
    #[serde(default = "default_led_reload_ticks")]
    pub led_reload_ticks: u16,

    /// Buzzer half-period in daemon ticks
    #[serde(default = "default_beep_reload_ticks")]
    pub beep_reload_ticks: u16,

    #[serde(default = "default_breathing_enabled")]
    pub breathing_enabled: bool,

    #[serde(default = "default_breathing_reload_ticks")]
    pub breathing_reload_ticks: u16,

    #[serde(default = "default_breathing_min_level")]
    pub breathing_min_level: u8,

    #[serde(default = "default_breathing_max_level")]
    pub breathing_max_level: u8,

    #[serde(default = "default_breathing_step")]
    pub breathing_step: u8,
}

// Default value functions
fn default_host_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { crate::serial::HOST_BAUD_RATE }
fn default_reconnect_interval_ms() -> u64 { 1000 }
fn default_queue_depth() -> usize { 64 }

fn default_remote_enabled() -> bool { false }
fn default_sbus_port() -> String { "/dev/ttyAMA1".to_string() }
fn default_loss_reload_ticks() -> u16 { crate::owners::rc_watchdog::DEFAULT_LOSS_RELOAD_TICKS }

fn default_tick_period_ms() -> u64 { crate::daemon::DEFAULT_TICK_PERIOD.as_millis() as u64 }
fn default_capacity() -> usize { crate::daemon::DEFAULT_CAPACITY }

fn default_led_reload_ticks() -> u16 { crate::owners::led::LED_RELOAD_TICKS }
fn default_beep_reload_ticks() -> u16 { crate::owners::beep::BEEP_RELOAD_TICKS }
fn default_breathing_enabled() -> bool { true }
fn default_breathing_reload_ticks() -> u16 { 1 }
fn default_breathing_min_level() -> u8 { 10 }
fn default_breathing_max_level() -> u8 { 255 }
fn default_breathing_step() -> u8 { 5 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_host_port(),
            baud_rate: default_baud_rate(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: default_remote_enabled(),
            port: default_sbus_port(),
            loss_reload_ticks: default_loss_reload_ticks(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            capacity: default_capacity(),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            led_reload_ticks: default_led_reload_ticks(),
            beep_reload_ticks: default_beep_reload_ticks(),
            breathing_enabled: default_breathing_enabled(),
            breathing_reload_ticks: default_breathing_reload_ticks(),
            breathing_min_level: default_breathing_min_level(),
            breathing_max_level: default_breathing_max_level(),
            breathing_step: default_breathing_step(),
        }
    }
}

impl DaemonConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }
}

impl IndicatorConfig {
    pub fn breathing(&self) -> BreathingSettings {
        BreathingSettings {
            min_level: self.breathing_min_level,
            max_level: self.breathing_max_level,
            step: self.breathing_step,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !ALLOWED_HOST_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                ALLOWED_HOST_BAUD_RATES
            )));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.serial.queue_depth == 0 {
            return Err(invalid("queue_depth must be greater than 0"));
        }

        if self.remote.enabled && self.remote.port.is_empty() {
            return Err(invalid("remote port cannot be empty when enabled"));
        }

        if self.remote.loss_reload_ticks == 0 {
            return Err(invalid("loss_reload_ticks must be at least 1"));
        }

        if self.daemon.tick_period_ms == 0 || self.daemon.tick_period_ms > 1000 {
            return Err(invalid("tick_period_ms must be between 1 and 1000"));
        }

        if self.daemon.capacity == 0 || self.daemon.capacity > 64 {
            return Err(invalid("daemon capacity must be between 1 and 64"));
        }

        if self.indicators.led_reload_ticks == 0 {
            return Err(invalid("led_reload_ticks must be at least 1"));
        }

        if self.indicators.beep_reload_ticks == 0 {
            return Err(invalid("beep_reload_ticks must be at least 1"));
        }

        if self.indicators.breathing_enabled {
            if self.indicators.breathing_reload_ticks == 0 {
                return Err(invalid("breathing_reload_ticks must be at least 1"));
            }

            if self.indicators.breathing_min_level >= self.indicators.breathing_max_level {
                return Err(invalid("breathing_min_level must be less than breathing_max_level"));
            }

            if self.indicators.breathing_step == 0 {
                return Err(invalid("breathing_step must be greater than 0"));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> RoverLinkError {
    RoverLinkError::Config(toml::de::Error::custom(msg))
}
