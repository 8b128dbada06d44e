//! Canonical packet layout.
//!
//! The canonical layout is the version 3 body without its tag:
//!
//! ```text
//! sourceId:i64 parentId:i64 packetType:i32 packetSubType:i64
//! metadataSequenceNumber:i64 dataDescriptionVersion:i64
//! timestampSeconds:i64 timestampNanoseconds:i64 sequenceNumber:i64
//! primaryLen:i32 primary secondaryLen:i32 secondary
//! ```
//!
//! Rows fetched from a device table use the same layout, except that they
//! lead with the packet version instead of the device id.

use crate::io::{ByteSource, MemorySource};
use crate::{MAX_PRIMARY_LEN, MAX_SECONDARY_LEN, Packet, PacketError, Result, WireFormatVersion};
use tracing::warn;

/// Fixed-width prefix of the canonical layout, up to and including the
/// primary length.
pub const CANONICAL_HEADER_LEN: usize = 8 * 2 + 4 + 8 * 6 + 4;

/// Converts between packets and their canonical byte form.
///
/// Vendor wire formats convert into this layout elsewhere; the table reader
/// only needs this half.
pub trait CanonicalCodec {
    fn packet_from_canonical_bytes(&self, bytes: &[u8]) -> Result<Packet>;

    fn packet_to_canonical_bytes(&self, packet: &Packet) -> Result<Vec<u8>>;
}

/// The version 3 canonical layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct Version3Layout;

impl CanonicalCodec for Version3Layout {
    /// Trailing bytes after the secondary buffer are ignored.
    fn packet_from_canonical_bytes(&self, bytes: &[u8]) -> Result<Packet> {
        let mut source = MemorySource::new(bytes);
        read_canonical(&mut source).map_err(|e| match e {
            PacketError::Truncated { offset, wanted, got } => PacketError::parse_error(
                "canonical bytes",
                format!(
                    "{} bytes end at offset {} ({} of {} bytes read)",
                    bytes.len(),
                    offset,
                    got,
                    wanted
                ),
            ),
            other => other,
        })
    }

    fn packet_to_canonical_bytes(&self, packet: &Packet) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(canonical_len(packet));
        write_canonical(packet, &mut out)?;
        Ok(out)
    }
}

/// Turn a table row that leads with its packet version into canonical bytes.
///
/// Returns `None` when the row is not version 3, the only version a device
/// table stores.
pub fn strip_version_and_prepend_device_id(device_id: i64, row: &[u8]) -> Option<Vec<u8>> {
    let (tag, rest) = row.split_first_chunk::<4>()?;
    if WireFormatVersion::try_from(i32::from_be_bytes(*tag)) != Ok(WireFormatVersion::V3) {
        return None;
    }
    let mut out = Vec::with_capacity(8 + rest.len());
    out.extend_from_slice(&device_id.to_be_bytes());
    out.extend_from_slice(rest);
    Some(out)
}

/// Bytes the canonical form of `packet` occupies.
pub fn canonical_len(packet: &Packet) -> usize {
    CANONICAL_HEADER_LEN + packet.primary.len() + 4 + packet.secondary_bytes().len()
}

pub(crate) fn write_canonical(packet: &Packet, out: &mut Vec<u8>) -> Result<()> {
    let primary_len = checked_len("primary", packet.primary.len(), MAX_PRIMARY_LEN)?;
    let secondary_len =
        checked_len("secondary", packet.secondary_bytes().len(), MAX_SECONDARY_LEN)?;

    out.extend_from_slice(&packet.source_id.to_be_bytes());
    out.extend_from_slice(&packet.parent_id.to_be_bytes());
    out.extend_from_slice(&packet.packet_type.to_be_bytes());
    out.extend_from_slice(&packet.packet_sub_type.to_be_bytes());
    out.extend_from_slice(&packet.metadata_sequence_number.to_be_bytes());
    out.extend_from_slice(&packet.data_description_version.to_be_bytes());
    out.extend_from_slice(&packet.timestamp_seconds.to_be_bytes());
    out.extend_from_slice(&packet.timestamp_nanoseconds.to_be_bytes());
    out.extend_from_slice(&packet.sequence_number.to_be_bytes());
    out.extend_from_slice(&primary_len.to_be_bytes());
    out.extend_from_slice(&packet.primary);
    out.extend_from_slice(&secondary_len.to_be_bytes());
    out.extend_from_slice(packet.secondary_bytes());
    Ok(())
}

fn checked_len(buffer: &'static str, len: usize, max: usize) -> Result<i32> {
    if len > max {
        return Err(PacketError::PacketTooLarge { buffer, len, max });
    }
    // max fits in i32
    Ok(len as i32)
}

/// Read one canonical body. Invalid lengths become empty buffers.
pub(crate) fn read_canonical<S: ByteSource + ?Sized>(source: &mut S) -> Result<Packet> {
    let mut packet = Packet::new(source.read_i64()?);
    packet.parent_id = source.read_i64()?;
    packet.packet_type = source.read_i32()?;
    packet.packet_sub_type = source.read_i64()?;
    packet.metadata_sequence_number = source.read_i64()?;
    packet.data_description_version = source.read_i64()?;
    packet.timestamp_seconds = source.read_i64()?;
    packet.timestamp_nanoseconds = source.read_i64()?;
    packet.sequence_number = source.read_i64()?;

    let primary_len =
        clamp_to_empty(source.read_i32()?, MAX_PRIMARY_LEN, "primary", source.bytes_consumed());
    source.before_payload();
    packet.primary = source.read_vec(primary_len)?;

    let secondary_len =
        clamp_to_empty(source.read_i32()?, MAX_SECONDARY_LEN, "secondary", source.bytes_consumed());
    source.before_payload();
    packet.secondary = Some(source.read_vec(secondary_len)?);

    Ok(packet)
}

fn clamp_to_empty(len: i32, max: usize, buffer: &str, offset: u64) -> usize {
    match usize::try_from(len) {
        Ok(n) if n <= max => n,
        _ => {
            warn!(
                "Invalid {} length {} before byte {}, reading an empty buffer",
                buffer, len, offset
            );
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_packet;

    #[test]
    fn canonical_round_trip() {
        let packet = sample_packet(101, 100, 42);
        let bytes = Version3Layout.packet_to_canonical_bytes(&packet).unwrap();
        assert_eq!(bytes.len(), canonical_len(&packet));
        assert_eq!(Version3Layout.packet_from_canonical_bytes(&bytes).unwrap(), packet);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let packet = sample_packet(101, 100, 1);
        let mut bytes = Version3Layout.packet_to_canonical_bytes(&packet).unwrap();
        bytes.extend_from_slice(&[0xAA; 24]);
        assert_eq!(Version3Layout.packet_from_canonical_bytes(&bytes).unwrap(), packet);
    }

    #[test]
    fn short_bytes_are_a_parse_error() {
        let err = Version3Layout.packet_from_canonical_bytes(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, PacketError::Parse { .. }));
    }

    #[test]
    fn version_is_swapped_for_device_id() {
        let packet = sample_packet(55, 100, 9);
        let canonical = Version3Layout.packet_to_canonical_bytes(&packet).unwrap();

        let mut row = 3i32.to_be_bytes().to_vec();
        row.extend_from_slice(&canonical[8..]);

        let rebuilt = strip_version_and_prepend_device_id(55, &row).unwrap();
        assert_eq!(rebuilt, canonical);
    }

    #[test]
    fn non_v3_rows_are_not_converted() {
        let mut row = 2i32.to_be_bytes().to_vec();
        row.extend_from_slice(&[0u8; 16]);
        assert!(strip_version_and_prepend_device_id(55, &row).is_none());
        assert!(strip_version_and_prepend_device_id(55, &[0, 0]).is_none());
    }

    #[test]
    fn oversized_buffers_are_refused() {
        let mut packet = sample_packet(1, 1, 1);
        packet.secondary = Some(vec![0u8; MAX_SECONDARY_LEN + 1]);
        let err = Version3Layout.packet_to_canonical_bytes(&packet).unwrap_err();
        assert!(matches!(err, PacketError::PacketTooLarge { buffer: "secondary", .. }));
    }
}
