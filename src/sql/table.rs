//! Packets read back from a device table.

use super::builder::{SqlDialect, build};
use super::cursor::{PageProvider, PagedCursor};
use super::query::QuerySpec;
use crate::codec::{CanonicalCodec, Version3Layout, strip_version_and_prepend_device_id};
use crate::config::IoConfig;
use crate::provider::PacketProvider;
use crate::{Packet, Result};
use tracing::{info, warn};

/// Enumerates the packets a [`QuerySpec`] selects from one device table.
///
/// Rows always use the full default projection so they line up with the
/// canonical layout: the leading packet version is replaced by the device
/// id, `dataDescriptionID` lands in the metadata sequence number and the
/// trailing location columns are ignored. Rows that are not version 3 are
/// skipped with a warning.
///
/// ```rust,no_run
/// use ssds_packets::sql::{PacketTableReader, QuerySpec, SqlDialect, SqlitePageProvider};
///
/// # fn main() -> ssds_packets::Result<()> {
/// let provider = SqlitePageProvider::new("packets.db");
/// let spec = QuerySpec::for_device(55).between_millis(1_000_000, 2_000_000);
/// let mut reader = PacketTableReader::open(provider, spec, &SqlDialect::default(), 50)?;
/// while let Some(packet) = reader.next_packet() {
///     println!("{} bytes at {}", packet.primary.len(), packet.timestamp_millis());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PacketTableReader<P, C = Version3Layout> {
    device_id: i64,
    cursor: PagedCursor<P>,
    codec: C,
    rows_skipped: u64,
}

impl<P: PageProvider> PacketTableReader<P> {
    pub fn open(
        provider: P,
        spec: QuerySpec,
        dialect: &SqlDialect,
        page_size: usize,
    ) -> Result<Self> {
        Self::with_codec(provider, spec, dialect, page_size, Version3Layout)
    }

    /// Open using the configured dialect and page size.
    pub fn from_config(provider: P, spec: QuerySpec, config: &IoConfig) -> Result<Self> {
        Self::open(provider, spec, &config.sql.dialect(), config.sql.page_size)
    }
}

impl<P: PageProvider, C: CanonicalCodec> PacketTableReader<P, C> {
    pub fn with_codec(
        provider: P,
        spec: QuerySpec,
        dialect: &SqlDialect,
        page_size: usize,
        codec: C,
    ) -> Result<Self> {
        let spec = spec.select_all();
        let sql = build(&spec, dialect)?;
        info!("Reading device {} with {}", spec.device_id(), sql);
        let cursor = PagedCursor::execute(provider, sql, spec.columns(), page_size)?;
        Ok(Self { device_id: spec.device_id(), cursor, codec, rows_skipped: 0 })
    }

    pub fn device_id(&self) -> i64 {
        self.device_id
    }

    pub fn sql(&self) -> &str {
        self.cursor.sql()
    }

    /// Rows dropped because they were not version 3 or failed to convert.
    pub fn rows_skipped(&self) -> u64 {
        self.rows_skipped
    }

    /// Whether the cursor holds another row. A row that later fails to
    /// convert can still make [`next_packet`](Self::next_packet) return `None`.
    pub fn has_next(&mut self) -> bool {
        self.cursor.has_next()
    }

    /// The next version 3 row in canonical form.
    pub fn next_canonical_bytes(&mut self) -> Option<Vec<u8>> {
        while let Some(row) = self.cursor.next_row() {
            match strip_version_and_prepend_device_id(self.device_id, &row) {
                Some(canonical) => return Some(canonical),
                None => {
                    self.rows_skipped += 1;
                    warn!(
                        "Skipping row {} of device {}: not a version 3 row",
                        self.cursor.global_index().unwrap_or_default(),
                        self.device_id
                    );
                }
            }
        }
        None
    }

    pub fn next_packet(&mut self) -> Option<Packet> {
        loop {
            let canonical = self.next_canonical_bytes()?;
            match self.codec.packet_from_canonical_bytes(&canonical) {
                Ok(packet) => return Some(packet),
                Err(e) => {
                    self.rows_skipped += 1;
                    warn!("Skipping unreadable row of device {}: {}", self.device_id, e);
                }
            }
        }
    }
}

impl<P: PageProvider, C: CanonicalCodec> PacketProvider for PacketTableReader<P, C> {
    fn has_next(&mut self) -> bool {
        PacketTableReader::has_next(self)
    }

    fn next_packet(&mut self) -> Option<Packet> {
        PacketTableReader::next_packet(self)
    }
}

impl<P: PageProvider, C: CanonicalCodec> Iterator for PacketTableReader<P, C> {
    type Item = Packet;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet()
    }
}
