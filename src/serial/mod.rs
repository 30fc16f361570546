//! # Serial Communication Module
//!
//! Delivers received byte chunks to a registered consumer.
//!
//! This module handles:
//! - Opening the host link and the remote-control receiver ports
//! - Reading one chunk per read call into a fixed receive buffer
//! - Handing each chunk to a [`FrameConsumer`]
//!
//! Framing is the line's job: the consumer sees whatever a single read
//! returned and never a stitched stream.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::error::{Result, RoverLinkError};
use crate::protocol::frame::MAX_FRAME_LEN;

/// Host link baud rate
pub const HOST_BAUD_RATE: u32 = 115_200;

/// SBUS receiver baud rate
pub const SBUS_BAUD_RATE: u32 = 100_000;

/// Receiver of delivered chunks
#[cfg_attr(test, mockall::automock)]
pub trait FrameConsumer {
    /// Called once per delivered chunk with its valid length
    fn on_frame_received(&mut self, buffer: &[u8], length: u16);
}

/// Line settings for a serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSettings {
    pub path: String,
    pub baud_rate: u32,
    pub parity: tokio_serial::Parity,
    pub stop_bits: tokio_serial::StopBits,
}

impl LineSettings {
    /// 8N1 host link
    pub fn host(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            parity: tokio_serial::Parity::None,
            stop_bits: tokio_serial::StopBits::One,
        }
    }

    /// 100 kbaud 8E2 SBUS receiver
    pub fn sbus(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: SBUS_BAUD_RATE,
            parity: tokio_serial::Parity::Even,
            stop_bits: tokio_serial::StopBits::Two,
        }
    }
}

/// Chunk reader over a serial line
pub struct SerialLink<R> {
    reader: R,
    name: String,
    buffer: [u8; MAX_FRAME_LEN],
    chunks: u64,
}

impl<R> std::fmt::Debug for SerialLink<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("name", &self.name)
            .field("chunks", &self.chunks)
            .finish_non_exhaustive()
    }
}

impl SerialLink<tokio_serial::SerialStream> {
    /// Open a serial port
    ///
    /// # Errors
    ///
    /// Returns `RoverLinkError::Serial` if the port cannot be opened
    pub fn open(settings: &LineSettings) -> Result<Self> {
        let port = tokio_serial::new(&settings.path, settings.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(settings.parity)
            .stop_bits(settings.stop_bits)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| RoverLinkError::Serial(format!("Failed to open {}: {}", settings.path, e)))?;

        info!("Opened {} at {} baud", settings.path, settings.baud_rate);
        Ok(Self::new(port, settings.path.clone()))
    }
}

impl<R: AsyncRead + Unpin> SerialLink<R> {
    /// Wrap an already open reader
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            buffer: [0u8; MAX_FRAME_LEN],
            chunks: 0,
        }
    }

    /// Name of the line (device path for real ports)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of chunks delivered so far
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Read one chunk and deliver it
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Bytes delivered; `0` means the line closed
    ///
    /// # Errors
    ///
    /// Returns `RoverLinkError::Io` if the read fails
    pub async fn pump<C: FrameConsumer + ?Sized>(&mut self, consumer: &mut C) -> Result<usize> {
        let read = self.reader.read(&mut self.buffer).await?;
        if read == 0 {
            debug!("{} closed", self.name);
            return Ok(0);
        }

        self.chunks += 1;
        consumer.on_frame_received(&self.buffer[..read], read as u16);
        Ok(read)
    }
}
