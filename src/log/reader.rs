//! Lazy packet enumeration over a packet log.

use super::resync::{ExhaustReason, ResyncOutcome, Resynchronizer};
use crate::codec::{Decoded, decode};
use crate::config::IoConfig;
use crate::io::{ByteSource, ReadAheadPolicy, SourceHandle, SourceLocation, StreamOpener, UrlOpener};
use crate::provider::PacketProvider;
use crate::{Packet, Result, TrackingKeys};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Reads packets one at a time from a local or remote packet log.
///
/// Unknown version tags trigger resynchronization; end of input and
/// unrecoverable corruption both surface as `None` from
/// [`next_packet`](Self::next_packet).
///
/// ```rust,no_run
/// use ssds_packets::log::PacketLogReader;
///
/// # fn main() -> ssds_packets::Result<()> {
/// let mut reader = PacketLogReader::open("/data/packets/101_0_7_100")?;
/// for packet in &mut reader {
///     println!("{} bytes at {}", packet.primary.len(), packet.timestamp_seconds);
/// }
/// println!("resume from byte {}", reader.bytes_consumed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PacketLogReader {
    location: SourceLocation,
    source: Option<SourceHandle>,
    resync: Resynchronizer,
    packets_read: u64,
}

impl PacketLogReader {
    /// Open a path or URL from the start.
    pub fn open(location: impl AsRef<str>) -> Result<Self> {
        Self::builder(SourceLocation::parse(location.as_ref())).open()
    }

    /// Start configuring a reader for `location`.
    pub fn builder(location: impl Into<SourceLocation>) -> PacketLogReaderBuilder {
        PacketLogReaderBuilder {
            location: location.into(),
            skip: 0,
            opener: Arc::new(UrlOpener),
            policy: ReadAheadPolicy::default(),
            storage_directory: None,
        }
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn tracking_keys(&self) -> &TrackingKeys {
        self.resync.keys()
    }

    /// Absolute offset of the next unread byte. Reopening here resumes at
    /// the next packet.
    pub fn bytes_consumed(&self) -> u64 {
        self.source.as_ref().map(|source| source.bytes_consumed()).unwrap_or(0)
    }

    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }

    /// Whether another packet may be available.
    pub fn has_next(&mut self) -> bool {
        self.source.as_mut().is_some_and(|source| source.has_more())
    }

    /// Read the next packet, resynchronizing past corruption.
    ///
    /// Returns `None` at end of input or when no trustworthy packet could be
    /// recovered by this call.
    pub fn next_packet(&mut self) -> Option<Packet> {
        let source = self.source.as_mut()?;
        let offset = source.bytes_consumed();

        let packet = match decode(source) {
            Ok(Decoded::Packet(packet)) => packet,
            Ok(Decoded::UnknownVersion(tag)) => {
                warn!("Unknown version tag {:#010x} at byte {} of {}", tag, offset, self.location);
                match self.resync.recover(source, tag) {
                    ResyncOutcome::Recovered(packet) => packet,
                    ResyncOutcome::Exhausted(reason) => {
                        debug!("Resync of {} exhausted: {:?}", self.location, reason);
                        if reason == ExhaustReason::ReopenFailed {
                            self.source = None;
                        }
                        return None;
                    }
                }
            }
            Err(e) if e.is_end_of_stream() => {
                debug!("End of {} at byte {}: {}", self.location, offset, e);
                return None;
            }
            Err(e) => {
                error!("Failed to read {} at byte {}: {}", self.location, offset, e);
                return None;
            }
        };

        self.packets_read += 1;
        trace!(
            "Packet {} from {} (seq={})",
            self.packets_read, self.location, packet.sequence_number
        );
        Some(packet)
    }
}

impl PacketProvider for PacketLogReader {
    fn has_next(&mut self) -> bool {
        PacketLogReader::has_next(self)
    }

    fn next_packet(&mut self) -> Option<Packet> {
        PacketLogReader::next_packet(self)
    }
}

/// Yields every recoverable packet. A call that recovers nothing is retried
/// while bytes remain; every such call moves the source forward.
impl Iterator for PacketLogReader {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        while self.has_next() {
            if let Some(packet) = self.next_packet() {
                return Some(packet);
            }
        }
        None
    }
}

/// Options for opening a [`PacketLogReader`].
#[derive(Debug)]
pub struct PacketLogReaderBuilder {
    location: SourceLocation,
    skip: u64,
    opener: Arc<dyn StreamOpener>,
    policy: ReadAheadPolicy,
    storage_directory: Option<std::path::PathBuf>,
}

impl PacketLogReaderBuilder {
    /// Start reading at an absolute byte offset.
    pub fn skip(mut self, bytes: u64) -> Self {
        self.skip = bytes;
        self
    }

    /// Replace how URLs are opened.
    pub fn opener(mut self, opener: Arc<dyn StreamOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn read_ahead(mut self, policy: ReadAheadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Apply storage directory and stream policy from configuration.
    pub fn config(mut self, config: &IoConfig) -> Self {
        self.policy = config.stream.read_ahead_policy();
        self.storage_directory = config.storage_directory.clone();
        self
    }

    pub fn open(self) -> Result<PacketLogReader> {
        let location = self.location.with_local_copy(self.storage_directory.as_deref());
        let keys = location.tracking_keys();
        let source = SourceHandle::open(&location, self.skip, self.opener, self.policy)?;

        info!(
            "Reading packets from {} (seekable={}, source_id={:?}, parent_id={:?})",
            location,
            source.is_seekable(),
            keys.source_id,
            keys.parent_id
        );
        Ok(PacketLogReader {
            location,
            source: Some(source),
            resync: Resynchronizer::new(keys),
            packets_read: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::test_utils::{StaticOpener, sample_packet};
    use std::time::Duration;
    use url::Url;

    fn write_log(dir: &std::path::Path, name: &str, chunks: &[Vec<u8>]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, chunks.concat()).unwrap();
        path
    }

    #[test]
    fn reads_packets_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        let packets: Vec<_> = (10..13).map(|seq| sample_packet(101, 100, seq)).collect();
        let chunks: Vec<_> = packets.iter().map(|p| encode(p).unwrap()).collect();
        let path = write_log(dir.path(), "101_16_7_100", &chunks);

        let mut reader = PacketLogReader::builder(path.as_path()).open().unwrap();
        for expected in &packets {
            assert!(reader.has_next());
            assert_eq!(reader.next_packet().as_ref(), Some(expected));
        }
        assert!(!reader.has_next());
        assert_eq!(reader.next_packet(), None);
        assert_eq!(reader.packets_read(), 3);
    }

    #[test]
    fn resumes_from_reported_offset() {
        let dir = tempfile::tempdir().unwrap();
        let first = sample_packet(101, 100, 10);
        let second = sample_packet(101, 100, 11);
        let chunks = [encode(&first).unwrap(), encode(&second).unwrap()];
        let path = write_log(dir.path(), "101_16_7_100", &chunks);

        let mut reader = PacketLogReader::builder(path.as_path()).open().unwrap();
        reader.next_packet().unwrap();
        let offset = reader.bytes_consumed();
        assert_eq!(offset, encode(&first).unwrap().len() as u64);

        let mut resumed = PacketLogReader::builder(path.as_path()).skip(offset).open().unwrap();
        assert_eq!(resumed.next_packet(), Some(second));
    }

    #[test]
    fn iterator_skips_garbage_between_packets() {
        let dir = tempfile::tempdir().unwrap();
        let first = sample_packet(101, 100, 10);
        let second = sample_packet(101, 100, 11);
        let path = write_log(
            dir.path(),
            "101_16_7_100",
            &[encode(&first).unwrap(), vec![0xDE, 0xAD], encode(&second).unwrap()],
        );

        let reader = PacketLogReader::builder(path.as_path()).open().unwrap();
        let packets: Vec<_> = reader.collect();
        assert_eq!(packets, vec![first, second]);
    }

    #[test]
    fn stream_source_resyncs_by_reopening() {
        crate::test_utils::init_test_tracing();
        let url = Url::parse("http://dods.example.org/logs/101_16_7_100").unwrap();
        let stranger = sample_packet(200, 100, 41);
        let packet = sample_packet(101, 100, 42);
        let mut bytes = vec![0xFF, 0xFF];
        bytes.extend_from_slice(&encode(&stranger).unwrap());
        bytes.extend_from_slice(&encode(&packet).unwrap());

        let policy = ReadAheadPolicy {
            poll_interval: Duration::from_millis(20),
            poll_attempts: 50,
            ..Default::default()
        };
        let mut reader = PacketLogReader::builder(url.clone())
            .opener(Arc::new(StaticOpener::new(&url, bytes)))
            .read_ahead(policy)
            .open()
            .unwrap();

        assert!(reader.has_next());
        assert_eq!(reader.next_packet(), Some(packet));
        assert!(!reader.has_next());
    }

    #[test]
    fn local_copy_wins_over_url() {
        let dir = tempfile::tempdir().unwrap();
        let packet = sample_packet(101, 100, 42);
        write_log(dir.path(), "101_16_7_100", &[encode(&packet).unwrap()]);

        let config =
            IoConfig { storage_directory: Some(dir.path().to_path_buf()), ..Default::default() };
        let url = Url::parse("http://unreachable.invalid/logs/101_16_7_100").unwrap();
        let mut reader = PacketLogReader::builder(url).config(&config).open().unwrap();

        assert!(matches!(reader.location(), SourceLocation::Path(_)));
        assert_eq!(reader.next_packet(), Some(packet));
    }

    #[test]
    fn tracking_keys_come_from_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "101_16_7_100", &[]);
        let reader = PacketLogReader::builder(path.as_path()).open().unwrap();
        assert_eq!(reader.tracking_keys().source_id, Some(101));
        assert_eq!(reader.tracking_keys().parent_id, Some(100));
    }
}
