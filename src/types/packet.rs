//! The device packet record shared by every reader.

use serde::{Deserialize, Serialize};

/// Largest primary payload a decoded packet may carry.
pub const MAX_PRIMARY_LEN: usize = 1_000_000;

/// Largest secondary payload a decoded packet may carry.
pub const MAX_SECONDARY_LEN: usize = 500_000;

/// Sentinel for identifiers the source did not record.
pub const UNKNOWN: i64 = -1;

/// A timestamped record produced by an instrument.
///
/// 64-bit identifiers are signed so the legacy `-1` "unknown" sentinel stays
/// representable; on the wire they occupy the same eight big-endian bytes.
///
/// `secondary` is `None` only for packets decoded from version 1 logs, which
/// had no second buffer. Versions 2 and 3 always carry one, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Device id; also the table name in the relational store.
    pub source_id: i64,
    /// Owning platform id. `-1` is unknown and `0` means none.
    pub parent_id: i64,
    pub packet_type: i32,
    /// Record type.
    pub packet_sub_type: i64,
    /// `0` marks a metadata packet; `-1` is unknown.
    pub metadata_sequence_number: i64,
    pub data_description_version: i64,
    pub timestamp_seconds: i64,
    pub timestamp_nanoseconds: i64,
    pub sequence_number: i64,
    pub primary: Vec<u8>,
    pub secondary: Option<Vec<u8>>,
}

impl Packet {
    /// Create an empty packet for a device with every other field unknown.
    pub fn new(source_id: i64) -> Self {
        Self {
            source_id,
            parent_id: UNKNOWN,
            packet_type: UNKNOWN as i32,
            packet_sub_type: UNKNOWN,
            metadata_sequence_number: UNKNOWN,
            data_description_version: UNKNOWN,
            timestamp_seconds: 0,
            timestamp_nanoseconds: 0,
            sequence_number: UNKNOWN,
            primary: Vec::new(),
            secondary: None,
        }
    }

    /// Set both timestamp components from epoch milliseconds.
    pub fn set_timestamp_millis(&mut self, millis: i64) {
        self.timestamp_seconds = millis / 1000;
        self.timestamp_nanoseconds = (millis % 1000) * 1_000_000;
    }

    /// Timestamp in epoch milliseconds, truncating sub-millisecond precision.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_seconds * 1000 + self.timestamp_nanoseconds / 1_000_000
    }

    /// Secondary payload, treating an absent buffer as empty.
    pub fn secondary_bytes(&self) -> &[u8] {
        self.secondary.as_deref().unwrap_or(&[])
    }

    /// Whether this packet describes the instrument rather than carrying data.
    pub fn is_metadata(&self) -> bool {
        self.metadata_sequence_number == 0
    }
}
