//! # Remote Control Module
//!
//! Receiver-side decoding for the handheld transmitter (SBUS).

pub mod sbus;

pub use sbus::{decode_sbus_frame, SbusFrame, SbusReceiver};
