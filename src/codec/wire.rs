//! Versioned packet wire codec.
//!
//! Every packet on the wire starts with a big-endian `i32` version tag. Three
//! layouts exist:
//!
//! | Version | Header | Buffers | Invalid length becomes |
//! |---|---|---|---|
//! | 1 | 6×i64 with millisecond timestamp | primary | 1 byte |
//! | 2 | i64, i32 packet type, 5×i64 with millisecond timestamp | primary, secondary | 1 byte |
//! | 3 | canonical layout | primary, secondary | empty |
//!
//! Length clamping does not skip the bytes a forged length claimed, so a
//! corrupt packet usually leaves the stream misaligned. The next decode then
//! sees an unknown tag, which the reader hands to the resynchronizer.

use super::canonical::{canonical_len, read_canonical, write_canonical};
use crate::io::ByteSource;
use crate::{MAX_PRIMARY_LEN, MAX_SECONDARY_LEN, Packet, Result, WireFormatVersion};
use std::io::Write;
use tracing::{trace, warn};

/// Result of reading one tag and, when it is known, the packet behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Packet(Packet),
    /// The tag was not a known version. Nothing past the tag was consumed.
    UnknownVersion(i32),
}

/// Decode one packet.
///
/// Fails with [`crate::PacketError::Truncated`] if the source ends mid-packet.
pub fn decode<S: ByteSource + ?Sized>(source: &mut S) -> Result<Decoded> {
    let tag = source.read_i32()?;
    match WireFormatVersion::try_from(tag) {
        Ok(version) => decode_body(version, source).map(Decoded::Packet),
        Err(tag) => Ok(Decoded::UnknownVersion(tag)),
    }
}

/// Decode the body that follows an already consumed version tag.
pub fn decode_body<S: ByteSource + ?Sized>(
    version: WireFormatVersion,
    source: &mut S,
) -> Result<Packet> {
    let packet = match version {
        WireFormatVersion::V1 => decode_v1(source)?,
        WireFormatVersion::V2 => decode_v2(source)?,
        WireFormatVersion::V3 => read_canonical(source)?,
    };
    trace!(
        "Decoded {} packet source={} seq={} at byte {}",
        version,
        packet.source_id,
        packet.sequence_number,
        source.bytes_consumed()
    );
    Ok(packet)
}

fn decode_v1<S: ByteSource + ?Sized>(source: &mut S) -> Result<Packet> {
    let mut packet = Packet::new(source.read_i64()?);
    packet.packet_sub_type = source.read_i64()?;
    packet.metadata_sequence_number = source.read_i64()?;
    packet.parent_id = source.read_i64()?;
    packet.set_timestamp_millis(source.read_i64()?);
    packet.sequence_number = source.read_i64()?;

    let len = clamp_to_one(source.read_i32()?, MAX_PRIMARY_LEN, "primary", source.bytes_consumed());
    source.before_payload();
    packet.primary = source.read_vec(len)?;
    Ok(packet)
}

fn decode_v2<S: ByteSource + ?Sized>(source: &mut S) -> Result<Packet> {
    let mut packet = Packet::new(source.read_i64()?);
    packet.packet_type = source.read_i32()?;
    packet.metadata_sequence_number = source.read_i64()?;
    packet.packet_sub_type = source.read_i64()?;
    packet.parent_id = source.read_i64()?;
    packet.set_timestamp_millis(source.read_i64()?);
    packet.sequence_number = source.read_i64()?;

    let len = clamp_to_one(source.read_i32()?, MAX_PRIMARY_LEN, "primary", source.bytes_consumed());
    source.before_payload();
    packet.primary = source.read_vec(len)?;

    // Only metadata packets (type 0) carried a real second buffer in v2
    let raw = source.read_i32()?;
    let len = if packet.packet_type != 0 {
        1
    } else {
        clamp_to_one(raw, MAX_SECONDARY_LEN, "secondary", source.bytes_consumed())
    };
    source.before_payload();
    packet.secondary = Some(source.read_vec(len)?);
    Ok(packet)
}

fn clamp_to_one(len: i32, max: usize, buffer: &str, offset: u64) -> usize {
    match usize::try_from(len) {
        Ok(n) if n <= max => n,
        _ => {
            warn!(
                "Invalid {} length {} before byte {}, reading a single byte",
                buffer, len, offset
            );
            1
        }
    }
}

/// Encode a packet as version 3, the only version ever written.
pub fn encode(packet: &Packet) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded_len(packet));
    out.extend_from_slice(&WireFormatVersion::CURRENT.tag().to_be_bytes());
    write_canonical(packet, &mut out)?;
    Ok(out)
}

/// Encode a packet straight into a writer.
pub fn encode_into<W: Write + ?Sized>(packet: &Packet, writer: &mut W) -> Result<()> {
    writer.write_all(&encode(packet)?)?;
    Ok(())
}

/// Bytes `encode` produces for `packet`.
pub fn encoded_len(packet: &Packet) -> usize {
    4 + canonical_len(packet)
}
