//! # Error Types
//!
//! Custom error types for Rover Link using `thiserror`.

use thiserror::Error;

/// Reasons a host frame is rejected by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// First byte is not the start-of-frame sentinel
    #[error("bad start of frame: 0x{found:02X}")]
    BadSof {
        /// Byte found at offset 0 (0x00 for an empty delivery)
        found: u8,
    },

    /// Header CRC-8 does not match
    #[error("header CRC-8 mismatch")]
    HeaderCrc,

    /// Whole-frame CRC-16 does not match
    #[error("frame CRC-16 mismatch (cmd_id 0x{cmd_id:04X}, data_length {data_length})")]
    FrameCrc {
        /// Command id parsed from the already validated header
        cmd_id: u16,
        /// Data length parsed from the already validated header
        data_length: u16,
    },

    /// Header is intact but announces an impossible data length
    #[error("invalid data length {data_length}")]
    InvalidLength { data_length: u16 },

    /// Fewer bytes were delivered than the header announces
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Payload does not fit in a single frame
    #[error("payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Daemon registry errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DaemonError {
    /// Registry already holds `capacity` timers
    #[error("daemon registry full ({capacity} timers)")]
    CapacityExceeded { capacity: usize },

    /// Handle does not name a live timer
    #[error("unknown daemon timer {0}")]
    UnknownTimer(u32),
}

/// SBUS receiver frame errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SbusError {
    #[error("SBUS frame too short: {0} bytes")]
    TooShort(usize),

    #[error("invalid SBUS header: 0x{0:02X}")]
    BadHeader(u8),
}

/// Status LED bank errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedError {
    #[error("LED index {0} out of range")]
    IndexOutOfRange(usize),

    #[error("LED {0} already created")]
    AlreadyCreated(usize),

    #[error("LED {0} not created")]
    NotCreated(usize),
}

/// Main error type for Rover Link
#[derive(Debug, Error)]
pub enum RoverLinkError {
    /// Host protocol errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Daemon scheduler errors
    #[error("Daemon error: {0}")]
    Daemon(#[from] DaemonError),

    /// Remote-control receiver errors
    #[error("SBUS error: {0}")]
    Sbus(#[from] SbusError),

    /// Status LED errors
    #[error("LED error: {0}")]
    Led(#[from] LedError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Rover Link
pub type Result<T> = std::result::Result<T, RoverLinkError>;
