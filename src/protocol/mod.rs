//! # Host Protocol Module
//!
//! Binary protocol spoken with the host computer over the serial link.
//!
//! This module handles:
//! - Frame layout constants and the decoded message type
//! - CRC-8 header and CRC-16/MODBUS frame checksums
//! - Frame building (reference and test frames)
//! - Frame validation and decoding with per-cause error counters
//! - Forwarding decoded messages to the application

pub mod frame;
pub mod encoder;
pub mod decoder;
pub mod crc;
pub mod receiver;

pub use decoder::FrameDecoder;
pub use encoder::build_frame;
pub use frame::{DecodedMessage, FrameStats, FrameStatsSnapshot};
pub use receiver::HostReceiver;
