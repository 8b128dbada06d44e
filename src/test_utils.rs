//! Test utilities for building packets, raw wire bytes and fixture stores
//!
//! Shared by unit tests and the benchmarks. Values chosen here avoid the
//! bytes `00 00 00 01..03` anywhere inside a packet body, so the stream
//! resynchronizer never finds a false candidate inside a fixture.

#![cfg(any(test, feature = "benchmark"))]

use crate::io::StreamOpener;
use crate::{Packet, PacketError, Result};
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use url::Url;

/// A version 3 packet with fixed, resync-safe field values.
pub fn sample_packet(source_id: i64, parent_id: i64, sequence_number: i64) -> Packet {
    Packet {
        source_id,
        parent_id,
        packet_type: 0,
        packet_sub_type: 7,
        metadata_sequence_number: 16,
        data_description_version: 32,
        timestamp_seconds: 1_700_000_000,
        timestamp_nanoseconds: 250_000_000,
        sequence_number,
        primary: b"hello sensor".to_vec(),
        secondary: Some(b"meta".to_vec()),
    }
}

/// Raw wire bytes for any version, with optional forged length fields.
#[derive(Debug, Clone)]
pub struct PacketBytes {
    header: Vec<u8>,
    primary_len: i32,
    primary: Vec<u8>,
    secondary: Option<(i32, Vec<u8>)>,
}

impl PacketBytes {
    /// Version 3 bytes for `packet`, identical to `encode` until overridden.
    pub fn v3(packet: &Packet) -> Self {
        let mut header = Vec::new();
        header.extend_from_slice(&3i32.to_be_bytes());
        for value in [packet.source_id, packet.parent_id] {
            header.extend_from_slice(&value.to_be_bytes());
        }
        header.extend_from_slice(&packet.packet_type.to_be_bytes());
        for value in [
            packet.packet_sub_type,
            packet.metadata_sequence_number,
            packet.data_description_version,
            packet.timestamp_seconds,
            packet.timestamp_nanoseconds,
            packet.sequence_number,
        ] {
            header.extend_from_slice(&value.to_be_bytes());
        }
        let secondary = packet.secondary_bytes().to_vec();
        Self {
            header,
            primary_len: packet.primary.len() as i32,
            primary: packet.primary.clone(),
            secondary: Some((secondary.len() as i32, secondary)),
        }
    }

    /// Version 1 bytes.
    pub fn v1(
        source_id: i64,
        record_type: i64,
        metadata_sequence_number: i64,
        platform_id: i64,
        timestamp_millis: i64,
        sequence_number: i64,
        primary: &[u8],
    ) -> Self {
        let mut header = Vec::new();
        header.extend_from_slice(&1i32.to_be_bytes());
        for value in [
            source_id,
            record_type,
            metadata_sequence_number,
            platform_id,
            timestamp_millis,
            sequence_number,
        ] {
            header.extend_from_slice(&value.to_be_bytes());
        }
        Self {
            header,
            primary_len: primary.len() as i32,
            primary: primary.to_vec(),
            secondary: None,
        }
    }

    /// Version 2 bytes. `secondary_len` is written as given.
    #[allow(clippy::too_many_arguments)]
    pub fn v2(
        source_id: i64,
        packet_type: i32,
        metadata_sequence_number: i64,
        record_type: i64,
        platform_id: i64,
        timestamp_millis: i64,
        sequence_number: i64,
        primary: &[u8],
        secondary_len: i32,
        secondary: &[u8],
    ) -> Self {
        let mut header = Vec::new();
        header.extend_from_slice(&2i32.to_be_bytes());
        header.extend_from_slice(&source_id.to_be_bytes());
        header.extend_from_slice(&packet_type.to_be_bytes());
        for value in
            [metadata_sequence_number, record_type, platform_id, timestamp_millis, sequence_number]
        {
            header.extend_from_slice(&value.to_be_bytes());
        }
        Self {
            header,
            primary_len: primary.len() as i32,
            primary: primary.to_vec(),
            secondary: Some((secondary_len, secondary.to_vec())),
        }
    }

    pub fn primary_len(mut self, len: i32) -> Self {
        self.primary_len = len;
        self
    }

    pub fn secondary_len(mut self, len: i32) -> Self {
        if let Some((_, bytes)) = self.secondary.take() {
            self.secondary = Some((len, bytes));
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = self.header.clone();
        out.extend_from_slice(&self.primary_len.to_be_bytes());
        out.extend_from_slice(&self.primary);
        if let Some((len, bytes)) = &self.secondary {
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(bytes);
        }
        out
    }
}

/// Serves fixed bytes for known URLs, standing in for a remote producer.
#[derive(Debug, Default, Clone)]
pub struct StaticOpener {
    streams: HashMap<Url, Vec<u8>>,
}

impl StaticOpener {
    pub fn new(url: &Url, bytes: Vec<u8>) -> Self {
        let mut streams = HashMap::new();
        streams.insert(url.clone(), bytes);
        Self { streams }
    }
}

impl StreamOpener for StaticOpener {
    fn open(&self, url: &Url) -> Result<Box<dyn Read + Send>> {
        self.streams
            .get(url)
            .map(|bytes| Box::new(Cursor::new(bytes.clone())) as Box<dyn Read + Send>)
            .ok_or_else(|| PacketError::source_failed(url.as_str(), "no such stream"))
    }
}

/// A producer that stays connected and writes only what is pushed through
/// its sender. The stream ends when the sender is dropped.
#[derive(Debug)]
pub struct ChannelOpener {
    chunks: Mutex<Option<Receiver<Vec<u8>>>>,
}

impl ChannelOpener {
    pub fn new() -> (Self, Sender<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        (Self { chunks: Mutex::new(Some(rx)) }, tx)
    }
}

impl StreamOpener for ChannelOpener {
    fn open(&self, url: &Url) -> Result<Box<dyn Read + Send>> {
        let chunks = self.chunks.lock().ok().and_then(|mut slot| slot.take());
        match chunks {
            Some(chunks) => Ok(Box::new(ChannelReader { chunks, pending: Cursor::default() })),
            None => Err(PacketError::source_failed(url.as_str(), "channel already opened")),
        }
    }
}

struct ChannelReader {
    chunks: Receiver<Vec<u8>>,
    pending: Cursor<Vec<u8>>,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.pending.read(buf)?;
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }
            match self.chunks.recv() {
                Ok(chunk) => self.pending = Cursor::new(chunk),
                Err(_) => return Ok(0),
            }
        }
    }
}

/// Create a device table with every column a packet row carries.
pub fn create_device_table(
    connection: &rusqlite::Connection,
    device_id: i64,
) -> rusqlite::Result<()> {
    connection.execute_batch(&format!(
        "CREATE TABLE `{device_id}` (
            ssdsPacketVersion INTEGER, parentID INTEGER, packetType INTEGER,
            packetSubType INTEGER, dataDescriptionID INTEGER, dataDescriptionVersion INTEGER,
            timestampSeconds INTEGER, timestampNanoseconds INTEGER, sequenceNumber INTEGER,
            bufferLen INTEGER, bufferBytes BLOB, bufferTwoLen INTEGER, bufferTwoBytes BLOB,
            latitude REAL, longitude REAL, depth REAL
        )"
    ))
}

/// Insert `packet` as a version 3 row of the device's table.
pub fn insert_packet(
    connection: &rusqlite::Connection,
    device_id: i64,
    packet: &Packet,
) -> rusqlite::Result<()> {
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
    Ok(())
}

/// Install a tracing subscriber honouring `RUST_LOG`, once per process.
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
