//! # Host Frame Decoder
//!
//! Validates one delivered chunk as a host frame: start sentinel, then the
//! header CRC-8, then the whole-frame CRC-16. Chunks are never scanned for a
//! later sentinel; the transport hands over one framed chunk per call.

use bytes::Bytes;
use tracing::{trace, warn};

use super::crc::{crc16_check, crc8_check};
use super::frame::*;
use crate::error::FrameError;

/// Host frame decoder
///
/// Stateless apart from its [`FrameStats`], which use atomics so a decoder
/// may be shared between receive paths.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    stats: FrameStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Running frame counters
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Decode a delivered chunk
    ///
    /// # Arguments
    ///
    /// * `buffer` - Receive buffer, starting at the frame's first byte
    /// * `length` - Number of valid bytes in `buffer`
    ///
    /// # Returns
    ///
    /// * `Result<DecodedMessage, FrameError>` - Decoded message, or the reason it was rejected
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - First byte is not `0xA5` (`BadSof`)
    /// - Header CRC-8 fails (`HeaderCrc`)
    /// - `data_length` is below 2, carries more than `MAX_PAYLOAD_LEN` payload
    ///   bytes, or overflows the frame buffer (`InvalidLength`)
    /// - Fewer bytes were delivered than announced (`Truncated`)
    /// - Frame CRC-16 fails (`FrameCrc`); the payload is withheld
    ///
    /// Every rejection bumps the matching counter in [`FrameStats`].
    pub fn decode_frame(&self, buffer: &[u8], length: u16) -> Result<DecodedMessage, FrameError> {
        let available = (length as usize).min(buffer.len());
        let frame = &buffer[..available];

        let Some(&sof) = frame.first() else {
            return Err(self.reject_bad_sof(0x00));
        };
        if sof != FRAME_SOF {
            return Err(self.reject_bad_sof(sof));
        }

        if !crc8_check(frame, FRAME_HEADER_LEN) {
            let count = self.stats.record_header_crc();
            warn!(header_errors = count, total_errors = self.stats.error_count(), "Header CRC-8 mismatch, frame dropped");
            return Err(FrameError::HeaderCrc);
        }

        let data_length = u16::from_le_bytes([frame[1], frame[2]]);
        let expected = frame_len(data_length);

        if (data_length as usize) < FLAGS_REGISTER_LEN
            || data_length as usize - FLAGS_REGISTER_LEN > MAX_PAYLOAD_LEN
            || expected > MAX_FRAME_LEN
        {
            let count = self.stats.record_invalid_length();
            warn!(data_length, length_errors = count, total_errors = self.stats.error_count(), "Invalid data length, frame dropped");
            return Err(FrameError::InvalidLength { data_length });
        }

        if expected > available {
            let count = self.stats.record_truncated();
            warn!(expected, available, truncated = count, total_errors = self.stats.error_count(), "Truncated frame dropped");
            return Err(FrameError::Truncated {
                expected,
                actual: available,
            });
        }

        let cmd_id = u16::from_le_bytes([frame[FRAME_CMD_ID_OFFSET], frame[FRAME_CMD_ID_OFFSET + 1]]);

        if !crc16_check(frame, expected) {
            let count = self.stats.record_frame_crc();
            warn!(
                cmd_id,
                data_length,
                frame_errors = count,
                total_errors = self.stats.error_count(),
                "Frame CRC-16 mismatch, payload discarded"
            );
            return Err(FrameError::FrameCrc { cmd_id, data_length });
        }

        let flags_register = u16::from_le_bytes([frame[FRAME_FLAGS_OFFSET], frame[FRAME_FLAGS_OFFSET + 1]]);
        let payload_end = FRAME_PAYLOAD_OFFSET + data_length as usize - FLAGS_REGISTER_LEN;
        let payload = Bytes::copy_from_slice(&frame[FRAME_PAYLOAD_OFFSET..payload_end]);

        let decoded = self.stats.record_decoded();
        trace!(cmd_id, flags_register, payload_len = payload.len(), decoded, "Host frame decoded");

        Ok(DecodedMessage {
            cmd_id,
            flags_register,
            payload,
        })
    }

    fn reject_bad_sof(&self, found: u8) -> FrameError {
        let count = self.stats.record_bad_sof();
        warn!(found, sof_errors = count, total_errors = self.stats.error_count(), "Bad start of frame, chunk dropped");
        FrameError::BadSof { found }
    }
}
