//! # Rover Link Library
//!
//! Host-side link to the rover chassis controller.
//!
//! This library provides:
//! - The framed host protocol (CRC-8 header, CRC-16 frame) and its statistics
//! - The daemon soft-timer scheduler that drives periodic controller work
//! - Daemon owners: status LED, RGB breathing, remote-control link watchdog
//! - SBUS decoding for the remote-control receiver
//! - Serial transport delivering received chunks to a frame consumer

pub mod config;
pub mod daemon;
pub mod error;
pub mod owners;
pub mod protocol;
pub mod remote;
pub mod serial;
