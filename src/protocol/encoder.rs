//! # Host Frame Encoder
//!
//! Builds correctly checksummed host frames. The controller never transmits
//! these itself; they exist so the decoder can be exercised end to end
//! without a live transport, and so host-side tooling has a reference.

use bytes::{BufMut, Bytes, BytesMut};

use super::crc::{crc16, crc8};
use super::frame::*;
use crate::error::FrameError;

/// Build a complete host frame
///
/// # Arguments
///
/// * `cmd_id` - Application message id
/// * `flags_register` - 16-bit flag bitfield
/// * `floats` - Payload values, packed little-endian
///
/// # Returns
///
/// * `Result<Bytes, FrameError>` - `data_length + 8` bytes ready for the wire
///
/// # Errors
///
/// Returns `FrameError::PayloadTooLarge` if the floats exceed `MAX_PAYLOAD_LEN`
///
/// # Examples
///
/// ```
/// use rover_link::protocol::encoder::build_frame;
///
/// let frame = build_frame(0x1000, 0xFE55, &[1.43234, 231.43234, 9.34, 123.4554]).unwrap();
/// assert_eq!(&frame[..4], &[0xA5, 0x12, 0x00, 0x74]);
/// assert_eq!(frame.len(), 26);
/// ```
pub fn build_frame(cmd_id: u16, flags_register: u16, floats: &[f32]) -> Result<Bytes, FrameError> {
    let payload_len = floats.len() * FLOAT_SIZE;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            len: payload_len,
            max: MAX_PAYLOAD_LEN,
        });
    }

    let data_length = (payload_len + FLAGS_REGISTER_LEN) as u16;
    let mut frame = BytesMut::with_capacity(frame_len(data_length));

    // Header: sof + data_length + crc8
    frame.put_u8(FRAME_SOF);
    frame.put_u16_le(data_length);
    let header_crc = crc8(&frame[..FRAME_HEADER_LEN - 1]);
    frame.put_u8(header_crc);

    frame.put_u16_le(cmd_id);
    frame.put_u16_le(flags_register);
    for &value in floats {
        frame.put_f32_le(value);
    }

    // Tail covers everything written so far
    let frame_crc = crc16(&frame);
    frame.put_u16_le(frame_crc);

    Ok(frame.freeze())
}
