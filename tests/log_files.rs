//! Packet logs written, damaged and read back through the public API.

mod common;

use anyhow::{Context, Result, ensure};
use common::packet;
use ssds_packets::codec::encode;
use ssds_packets::log::{LogKey, PacketLogReader, PacketLogStore, PacketLogWriter};
use std::path::Path;

fn reader(path: &Path) -> Result<PacketLogReader> {
    PacketLogReader::builder(path).open().context("open packet log")
}

#[test]
fn byte_offsets_resume_at_next_packet() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("101_16_7_100");
    let mut writer = PacketLogWriter::new(&path);
    let packets: Vec<_> = (10..15).map(|seq| packet(101, 100, seq)).collect();
    for packet in &packets {
        writer.append(packet)?;
    }

    let mut reader = reader(&path)?;
    let mut expected_offset = 0u64;
    for packet in packets.iter().take(3) {
        ensure!(
            reader.next_packet().as_ref() == Some(packet),
            "packet {} out of order",
            packet.sequence_number
        );
        expected_offset += encode(packet)?.len() as u64;
        ensure!(
            reader.bytes_consumed() == expected_offset,
            "offset {} != {}",
            reader.bytes_consumed(),
            expected_offset
        );
    }

    let resumed: Vec<_> =
        PacketLogReader::builder(path.as_path()).skip(expected_offset).open()?.collect();
    ensure!(resumed == packets[3..], "resumed at the wrong packet");
    Ok(())
}

#[test]
fn garbage_between_packets_is_skipped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("101_16_7_100");
    let first = packet(101, 100, 10);
    let second = packet(101, 100, 11);
    std::fs::write(&path, [encode(&first)?, vec![0xDE, 0xAD, 0xBE], encode(&second)?].concat())?;

    let packets: Vec<_> = reader(&path)?.collect();
    ensure!(packets == vec![first, second], "expected both packets, got {}", packets.len());
    Ok(())
}

#[test]
fn recovered_packet_must_match_log_name() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("101_16_7_999");
    let first = packet(101, 999, 10);
    let stranger = packet(101, 100, 11);
    std::fs::write(&path, [encode(&first)?, vec![0xDE, 0xAD, 0xBE], encode(&stranger)?].concat())?;

    let packets: Vec<_> = reader(&path)?.collect();
    ensure!(packets == vec![first], "packet for another parent was accepted");
    Ok(())
}

#[test]
fn partial_tail_ends_the_log() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("101_16_7_100");
    let first = packet(101, 100, 10);
    let second = encode(&packet(101, 100, 11))?;
    std::fs::write(&path, [encode(&first)?, second[..30].to_vec()].concat())?;

    let mut reader = reader(&path)?;
    ensure!(reader.next_packet() == Some(first), "first packet lost");
    ensure!(reader.next_packet().is_none(), "partial packet decoded");
    ensure!(!reader.has_next(), "reader still expects bytes");
    Ok(())
}

#[test]
fn store_keeps_one_log_per_stream() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut store = PacketLogStore::open(dir.path())?;

    let ctd: Vec<_> = (10..13).map(|seq| packet(101, 100, seq)).collect();
    let mut adcp = packet(202, 100, 10);
    adcp.packet_sub_type = 9;
    for packet in ctd.iter().chain(std::iter::once(&adcp)) {
        store.append(packet)?;
    }

    ensure!(dir.path().join("101_16_7_100").exists(), "ctd log missing");
    ensure!(dir.path().join("202_16_9_100").exists(), "adcp log missing");

    let read_back: Vec<_> = store.reader(&LogKey::for_packet(&ctd[0]))?.collect();
    ensure!(read_back == ctd, "ctd log does not round trip");
    Ok(())
}
