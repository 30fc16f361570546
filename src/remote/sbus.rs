//! # SBUS Frame Decoder
//!
//! Decodes the 25-byte frames sent by the remote-control receiver.
//!
//! ```text
//! Byte 0:      header (0x0F)
//! Byte 1-22:   16 channels x 11 bits, packed LSB first
//!              Byte 1: Ch1[0:7]
//!              Byte 2: Ch1[8:10] | Ch2[0:4]
//!              ...
//! Byte 23:     flags (bit0 ch17, bit1 ch18, bit2 frame lost, bit3 failsafe)
//! Byte 24:     footer
//! ```

use tracing::{debug, trace};

use crate::error::SbusError;
use crate::owners::rc_watchdog::LinkWatchdog;
use crate::serial::FrameConsumer;
use std::sync::Arc;

/// SBUS frame header byte
pub const SBUS_HEADER: u8 = 0x0F;

/// SBUS frame size
pub const SBUS_FRAME_LEN: usize = 25;

/// Number of proportional channels
pub const SBUS_NUM_CHANNELS: usize = 16;

/// Packed channel bytes (16 x 11 bits)
pub const SBUS_CHANNEL_BYTES: usize = 22;

/// Channel value range (11-bit)
pub const SBUS_CHANNEL_MAX: u16 = 0x07FF;

const FLAG_CH17: u8 = 0x01;
const FLAG_CH18: u8 = 0x02;
const FLAG_FRAME_LOST: u8 = 0x04;
const FLAG_FAILSAFE: u8 = 0x08;

/// One decoded receiver frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbusFrame {
    /// Proportional channels, 0-2047
    pub channels: [u16; SBUS_NUM_CHANNELS],

    /// Digital channel 17
    pub ch17: bool,

    /// Digital channel 18
    pub ch18: bool,

    /// Receiver missed a frame from the transmitter
    pub frame_lost: bool,

    /// Receiver is in failsafe; channel values are not from the pilot
    pub failsafe: bool,
}

impl SbusFrame {
    /// Frame carries live pilot input
    pub fn is_healthy(&self) -> bool {
        !self.frame_lost && !self.failsafe
    }
}

/// Decode a 25-byte SBUS frame
///
/// # Errors
///
/// Returns error if:
/// - Fewer than 25 bytes are given
/// - Header byte is not 0x0F
pub fn decode_sbus_frame(frame: &[u8]) -> Result<SbusFrame, SbusError> {
    if frame.len() < SBUS_FRAME_LEN {
        return Err(SbusError::TooShort(frame.len()));
    }

    if frame[0] != SBUS_HEADER {
        return Err(SbusError::BadHeader(frame[0]));
    }

    let packed = &frame[1..1 + SBUS_CHANNEL_BYTES];
    let mut channels = [0u16; SBUS_NUM_CHANNELS];
    let mut bit_index = 0;

    for channel in channels.iter_mut() {
        let mut value = 0u16;
        for bit in 0..11 {
            let byte = packed[bit_index / 8];
            if (byte >> (bit_index % 8)) & 1 == 1 {
                value |= 1 << bit;
            }
            bit_index += 1;
        }
        *channel = value;
    }

    let flags = frame[23];
    Ok(SbusFrame {
        channels,
        ch17: flags & FLAG_CH17 != 0,
        ch18: flags & FLAG_CH18 != 0,
        frame_lost: flags & FLAG_FRAME_LOST != 0,
        failsafe: flags & FLAG_FAILSAFE != 0,
    })
}

/// Consumer for the receiver line: decodes frames and feeds the link watchdog
#[derive(Debug)]
pub struct SbusReceiver {
    watchdog: Arc<LinkWatchdog>,
    last: Option<SbusFrame>,
    rejected: u64,
}

impl SbusReceiver {
    pub fn new(watchdog: Arc<LinkWatchdog>) -> Self {
        Self {
            watchdog,
            last: None,
            rejected: 0,
        }
    }

    /// Most recent frame that decoded
    pub fn last_frame(&self) -> Option<&SbusFrame> {
        self.last.as_ref()
    }

    /// Chunks that were not a valid SBUS frame
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl FrameConsumer for SbusReceiver {
    fn on_frame_received(&mut self, buffer: &[u8], length: u16) {
        let available = (length as usize).min(buffer.len());

        match decode_sbus_frame(&buffer[..available]) {
            Ok(frame) => {
                trace!(ch1 = frame.channels[0], ch2 = frame.channels[1], failsafe = frame.failsafe, "SBUS frame");
                if frame.is_healthy() {
                    self.watchdog.feed();
                }
                self.last = Some(frame);
            }
            Err(e) => {
                self.rejected += 1;
                debug!(rejected = self.rejected, "SBUS chunk rejected: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack channels the way a receiver does
    fn encode_sbus_frame(channels: &[u16; SBUS_NUM_CHANNELS], flags: u8) -> [u8; SBUS_FRAME_LEN] {
        let mut frame = [0u8; SBUS_FRAME_LEN];
        frame[0] = SBUS_HEADER;
        let mut bit_index = 0;

        for &channel in channels.iter() {
            let value = channel.min(SBUS_CHANNEL_MAX);
            for bit in 0..11 {
                if (value >> bit) & 1 == 1 {
                    frame[1 + bit_index / 8] |= 1 << (bit_index % 8);
                }
                bit_index += 1;
            }
        }

        frame[23] = flags;
        frame
    }

    #[test]
    fn test_decode_too_short() {
        assert_eq!(decode_sbus_frame(&[SBUS_HEADER; 10]), Err(SbusError::TooShort(10)));
    }

    #[test]
    fn test_decode_bad_header() {
        let mut frame = [0u8; SBUS_FRAME_LEN];
        frame[0] = 0x0E;
        assert_eq!(decode_sbus_frame(&frame), Err(SbusError::BadHeader(0x0E)));
    }

    #[test]
    fn test_decode_all_max() {
        let frame = encode_sbus_frame(&[SBUS_CHANNEL_MAX; SBUS_NUM_CHANNELS], 0);
        assert_eq!(&frame[1..23], &[0xFF; 22]);

        let decoded = decode_sbus_frame(&frame).unwrap();
        assert_eq!(decoded.channels, [SBUS_CHANNEL_MAX; SBUS_NUM_CHANNELS]);
    }

    #[test]
    fn test_decode_first_channel_bits() {
        let mut frame = [0u8; SBUS_FRAME_LEN];
        frame[0] = SBUS_HEADER;
        frame[1] = 0xFF;
        frame[2] = 0x07;

        let decoded = decode_sbus_frame(&frame).unwrap();
        assert_eq!(decoded.channels[0], 0x7FF);
        assert_eq!(decoded.channels[1], 0);
    }

    #[test]
    fn test_decode_mixed_channels() {
        let mut channels = [0u16; SBUS_NUM_CHANNELS];
        for (i, ch) in channels.iter_mut().enumerate() {
            *ch = 282 + (i as u16) * 90;
        }
        channels[8] = 1722;

        let decoded = decode_sbus_frame(&encode_sbus_frame(&channels, 0)).unwrap();
        assert_eq!(decoded.channels, channels);
    }

    #[test]
    fn test_decode_flags() {
        let channels = [1002u16; SBUS_NUM_CHANNELS];

        let decoded = decode_sbus_frame(&encode_sbus_frame(&channels, FLAG_CH17 | FLAG_FAILSAFE)).unwrap();
        assert!(decoded.ch17);
        assert!(!decoded.ch18);
        assert!(decoded.failsafe);
        assert!(!decoded.is_healthy());

        let decoded = decode_sbus_frame(&encode_sbus_frame(&channels, FLAG_FRAME_LOST)).unwrap();
        assert!(decoded.frame_lost);
        assert!(!decoded.is_healthy());
    }

    #[test]
    fn test_receiver_feeds_watchdog_on_healthy_frame() {
        let watchdog = Arc::new(LinkWatchdog::new());
        watchdog.enable();
        let mut receiver = SbusReceiver::new(Arc::clone(&watchdog));

        let frame = encode_sbus_frame(&[1002; SBUS_NUM_CHANNELS], 0);
        receiver.on_frame_received(&frame, frame.len() as u16);

        assert!(watchdog.check());
        assert_eq!(receiver.last_frame().unwrap().channels[0], 1002);
    }

    #[test]
    fn test_receiver_does_not_feed_on_failsafe() {
        let watchdog = Arc::new(LinkWatchdog::new());
        watchdog.enable();
        let mut receiver = SbusReceiver::new(Arc::clone(&watchdog));

        let frame = encode_sbus_frame(&[1002; SBUS_NUM_CHANNELS], FLAG_FAILSAFE);
        receiver.on_frame_received(&frame, frame.len() as u16);

        assert!(!watchdog.check());
        assert!(receiver.last_frame().unwrap().failsafe);
    }

    #[test]
    fn test_receiver_counts_rejected_chunks() {
        let watchdog = Arc::new(LinkWatchdog::new());
        let mut receiver = SbusReceiver::new(watchdog);

        receiver.on_frame_received(&[0x0F, 0x00, 0x00], 3);
        assert_eq!(receiver.rejected(), 1);
        assert!(receiver.last_frame().is_none());
    }
}
