//! # Host Frame Constants and Types
//!
//! Wire layout of a host link frame (all multi-byte fields little-endian):
//!
//! ```text
//! offset  size            field
//! 0       1               sof (0xA5)
//! 1       2               data_length = 2 + payload bytes
//! 3       1               header CRC-8 over bytes 0..3
//! 4       2               cmd_id
//! 6       2               flags_register
//! 8       data_length-2   payload (packed f32)
//! ..      2               frame CRC-16 over every preceding byte
//! ```

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};

/// Start-of-frame sentinel
pub const FRAME_SOF: u8 = 0xA5;

/// sof(1) + data_length(2) + crc8(1)
pub const FRAME_HEADER_LEN: usize = 4;

/// Offset of cmd_id
pub const FRAME_CMD_ID_OFFSET: usize = 4;

/// Offset of flags_register
pub const FRAME_FLAGS_OFFSET: usize = 6;

/// Offset of the first payload byte
pub const FRAME_PAYLOAD_OFFSET: usize = 8;

/// Bytes on the wire that are not counted by `data_length`
/// (header(4) + cmd_id(2) + crc16(2))
pub const FRAME_OVERHEAD: usize = 8;

/// Size of the flags_register field, the minimum `data_length`
pub const FLAGS_REGISTER_LEN: usize = 2;

/// Largest frame the receive buffer holds
pub const MAX_FRAME_LEN: usize = 256;

/// Design ceiling for the float payload
pub const MAX_PAYLOAD_LEN: usize = 128;

/// Bytes per packed float
pub const FLOAT_SIZE: usize = 4;

/// Total frame length for a given `data_length`
pub const fn frame_len(data_length: u16) -> usize {
    data_length as usize + FRAME_OVERHEAD
}

/// A validated host message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Application message id
    pub cmd_id: u16,

    /// 16-bit flag bitfield
    pub flags_register: u16,

    /// Raw payload bytes (packed little-endian f32)
    pub payload: Bytes,
}

impl DecodedMessage {
    /// Iterate the payload as little-endian floats
    ///
    /// Trailing bytes that do not form a whole float are skipped.
    pub fn floats(&self) -> impl Iterator<Item = f32> + '_ {
        self.payload
            .chunks_exact(FLOAT_SIZE)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }

    /// Whether bit `bit` of the flags register is set
    pub fn flag(&self, bit: u8) -> bool {
        bit < 16 && (self.flags_register >> bit) & 1 == 1
    }
}

/// Per-cause frame counters
///
/// Counters only ever grow; they live as long as the decoder that owns them.
/// Header and full-frame failures are counted separately so the observer
/// can tell a noisy line from a framing bug.
#[derive(Debug, Default)]
pub struct FrameStats {
    bad_sof: AtomicU64,
    header_crc: AtomicU64,
    frame_crc: AtomicU64,
    invalid_length: AtomicU64,
    truncated: AtomicU64,
    decoded: AtomicU64,
}

/// Point-in-time copy of [`FrameStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStatsSnapshot {
    pub bad_sof: u64,
    pub header_crc: u64,
    pub frame_crc: u64,
    pub invalid_length: u64,
    pub truncated: u64,
    pub decoded: u64,
}

impl FrameStatsSnapshot {
    /// Sum of all failure counters
    pub fn errors(&self) -> u64 {
        self.bad_sof + self.header_crc + self.frame_crc + self.invalid_length + self.truncated
    }
}

impl FrameStats {
    pub(crate) fn record_bad_sof(&self) -> u64 {
        self.bad_sof.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_header_crc(&self) -> u64 {
        self.header_crc.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_frame_crc(&self) -> u64 {
        self.frame_crc.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_invalid_length(&self) -> u64 {
        self.invalid_length.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_truncated(&self) -> u64 {
        self.truncated.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_decoded(&self) -> u64 {
        self.decoded.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Total number of rejected frames
    pub fn error_count(&self) -> u64 {
        self.snapshot().errors()
    }

    /// Number of frames that failed the header CRC-8
    pub fn header_errors(&self) -> u64 {
        self.header_crc.load(Ordering::Relaxed)
    }

    /// Number of frames that passed the header but failed the CRC-16
    pub fn frame_errors(&self) -> u64 {
        self.frame_crc.load(Ordering::Relaxed)
    }

    /// Number of frames accepted
    pub fn decoded_count(&self) -> u64 {
        self.decoded.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            bad_sof: self.bad_sof.load(Ordering::Relaxed),
            header_crc: self.header_crc.load(Ordering::Relaxed),
            frame_crc: self.frame_crc.load(Ordering::Relaxed),
            invalid_length: self.invalid_length.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(FRAME_SOF, 0xA5);
        assert_eq!(FRAME_PAYLOAD_OFFSET, FRAME_HEADER_LEN + 4);
        assert_eq!(frame_len(18), 26);
        assert!(frame_len((MAX_PAYLOAD_LEN + FLAGS_REGISTER_LEN) as u16) <= MAX_FRAME_LEN);
    }

    #[test]
    fn test_decoded_message_floats() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1.5f32.to_le_bytes());
        payload.extend_from_slice(&(-2.25f32).to_le_bytes());
        payload.push(0xFF); // partial float is ignored

        let msg = DecodedMessage {
            cmd_id: 0x0001,
            flags_register: 0,
            payload: Bytes::from(payload),
        };

        let floats: Vec<f32> = msg.floats().collect();
        assert_eq!(floats, vec![1.5, -2.25]);
    }

    #[test]
    fn test_decoded_message_flags() {
        let msg = DecodedMessage {
            cmd_id: 0,
            flags_register: 0x8001,
            payload: Bytes::new(),
        };

        assert!(msg.flag(0));
        assert!(!msg.flag(1));
        assert!(msg.flag(15));
        assert!(!msg.flag(16));
    }

    #[test]
    fn test_stats_counts_separately() {
        let stats = FrameStats::default();
        stats.record_header_crc();
        stats.record_header_crc();
        stats.record_frame_crc();
        stats.record_decoded();

        assert_eq!(stats.header_errors(), 2);
        assert_eq!(stats.frame_errors(), 1);
        assert_eq!(stats.error_count(), 3);
        assert_eq!(stats.decoded_count(), 1);
    }

    #[test]
    fn test_snapshot_errors_sum() {
        let snapshot = FrameStatsSnapshot {
            bad_sof: 1,
            header_crc: 2,
            frame_crc: 3,
            invalid_length: 4,
            truncated: 5,
            decoded: 100,
        };
        assert_eq!(snapshot.errors(), 15);
    }
}
