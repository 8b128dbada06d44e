//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use rusqlite::Connection;
use ssds_packets::Packet;
use std::path::Path;

/// A packet whose bytes never contain `00 00 00 01..03` inside its body.
pub fn packet(source_id: i64, parent_id: i64, sequence_number: i64) -> Packet {
    let mut packet = Packet::new(source_id);
    packet.parent_id = parent_id;
    packet.packet_type = 0;
    packet.packet_sub_type = 7;
    packet.metadata_sequence_number = 16;
    packet.data_description_version = 32;
    packet.timestamp_seconds = 1_700_000_000 + sequence_number;
    packet.timestamp_nanoseconds = 250_000_000;
    packet.sequence_number = sequence_number;
    packet.primary = format!("sample {sequence_number:>4}").into_bytes();
    packet.secondary = Some(b"meta".to_vec());
    packet
}

/// Create a SQLite database holding `count` packets for `device_id`.
pub fn device_database(path: &Path, device_id: i64, count: i64) -> Result<()> {
    let connection = Connection::open(path)?;
    connection.execute_batch(&format!(
        "CREATE TABLE `{device_id}` (
            ssdsPacketVersion INTEGER, parentID INTEGER, packetType INTEGER, packetSubType INTEGER,
            dataDescriptionID INTEGER, dataDescriptionVersion INTEGER, timestampSeconds INTEGER,
            timestampNanoseconds INTEGER, sequenceNumber INTEGER, bufferLen INTEGER,
            bufferBytes BLOB, bufferTwoLen INTEGER, bufferTwoBytes BLOB,
            latitude REAL, longitude REAL, depth REAL
        )"
    ))?;

    for seq in 0..count {
        let packet = packet(device_id, 100, seq);
        let secondary = packet.secondary_bytes();
        connection.execute(
            &format!(
                "INSERT INTO `{device_id}` VALUES \
                 (3, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 36.8, -121.9, 10.0)"
            ),
            rusqlite::params![
                packet.parent_id,
                packet.packet_type,
                packet.packet_sub_type,
                packet.metadata_sequence_number,
                packet.data_description_version,
                packet.timestamp_seconds,
                packet.timestamp_nanoseconds,
                packet.sequence_number,
                packet.primary.len() as i64,
                packet.primary,
                secondary.len() as i64,
                secondary,
            ],
        )?;
    }
    Ok(())
}
