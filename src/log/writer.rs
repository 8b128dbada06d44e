//! Append-only packet log writer.

use crate::codec::canonical::canonical_len;
use crate::codec::{CanonicalCodec, Version3Layout, encode};
use crate::{Packet, PacketError, Result, WireFormatVersion};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Appends version 3 packets to a log file.
///
/// Every append opens the file, writes one packet, flushes and closes it, so
/// a concurrent reader never sees more than one partial packet.
#[derive(Debug)]
pub struct PacketLogWriter {
    path: PathBuf,
    packets_written: u64,
}

impl PacketLogWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), packets_written: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Append one packet, creating the log if needed.
    pub fn append(&mut self, packet: &Packet) -> Result<()> {
        let bytes = encode(packet)?;
        self.write_all(&bytes)?;
        trace!("Appended packet seq={} to {}", packet.sequence_number, self.path.display());
        Ok(())
    }

    /// Append a packet already in canonical form.
    ///
    /// The bytes must hold exactly one canonical packet.
    pub fn append_canonical(&mut self, canonical: &[u8]) -> Result<()> {
        let packet = Version3Layout.packet_from_canonical_bytes(canonical)?;
        if canonical_len(&packet) != canonical.len() {
            return Err(PacketError::parse_error(
                "canonical bytes",
                format!("{} trailing bytes after packet", canonical.len() - canonical_len(&packet)),
            ));
        }

        let mut bytes = Vec::with_capacity(4 + canonical.len());
        bytes.extend_from_slice(&WireFormatVersion::CURRENT.tag().to_be_bytes());
        bytes.extend_from_slice(canonical);
        self.write_all(&bytes)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PacketError::file_error(&self.path, e))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes).map_err(|e| PacketError::file_error(&self.path, e))?;
        writer.flush().map_err(|e| PacketError::file_error(&self.path, e))?;
        self.packets_written += 1;
        Ok(())
    }
}
