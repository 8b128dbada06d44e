//! One packet log per device stream.
//!
//! Packets are routed to a log named after the identifiers that distinguish
//! a stream. The name doubles as the promise the reader checks recovered
//! packets against (see [`crate::TrackingKeys`]).

use super::{PacketLogReader, PacketLogWriter};
use crate::config::IoConfig;
use crate::{Packet, PacketError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identifiers that select a packet's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogKey {
    pub source_id: i64,
    pub metadata_sequence_number: i64,
    pub packet_sub_type: i64,
    pub parent_id: i64,
}

impl LogKey {
    pub fn for_packet(packet: &Packet) -> Self {
        Self {
            source_id: packet.source_id,
            metadata_sequence_number: packet.metadata_sequence_number,
            packet_sub_type: packet.packet_sub_type,
            parent_id: packet.parent_id,
        }
    }

    /// `source_metadata_subtype_parent`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.source_id, self.metadata_sequence_number, self.packet_sub_type, self.parent_id
        )
    }
}

/// Owns a writer per [`LogKey`] under one storage directory.
#[derive(Debug)]
pub struct PacketLogStore {
    directory: PathBuf,
    writers: HashMap<LogKey, PacketLogWriter>,
}

impl PacketLogStore {
    /// Use `directory` for logs, creating it if needed.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| PacketError::file_error(&directory, e))?;
        info!("Packet log store at {}", directory.display());
        Ok(Self { directory, writers: HashMap::new() })
    }

    /// Use the configured storage directory.
    pub fn from_config(config: &IoConfig) -> Result<Self> {
        let directory = config.storage_directory.clone().ok_or_else(|| PacketError::Config {
            details: "storage_directory is required for a packet log store".to_string(),
        })?;
        Self::open(directory)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, key: &LogKey) -> PathBuf {
        self.directory.join(key.file_name())
    }

    /// The writer for `key`, created on first use.
    pub fn writer_for(&mut self, key: LogKey) -> &mut PacketLogWriter {
        let path = self.path_for(&key);
        self.writers.entry(key).or_insert_with(|| {
            debug!("New packet log {}", path.display());
            PacketLogWriter::new(path)
        })
    }

    /// Append a packet to the log its identifiers select.
    pub fn append(&mut self, packet: &Packet) -> Result<&Path> {
        let writer = self.writer_for(LogKey::for_packet(packet));
        writer.append(packet)?;
        Ok(writer.path())
    }

    /// Keys with a writer in this store.
    pub fn keys(&self) -> impl Iterator<Item = &LogKey> {
        self.writers.keys()
    }

    /// Open a reader over the log for `key`.
    pub fn reader(&self, key: &LogKey) -> Result<PacketLogReader> {
        PacketLogReader::builder(self.path_for(key)).open()
    }
}
