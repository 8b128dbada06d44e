//! Byte sources for packet logs.
//!
//! A packet log is either a local file, which can seek, or a remote byte
//! stream, which cannot. The codec and the resynchronizer only see the
//! [`ByteSource`] and [`Rewind`] traits; the polymorphism lives here.
//!
//! | Source | Skip | `has_more` |
//! |---|---|---|
//! | [`FileSource`] | seek | file length vs. bytes consumed |
//! | [`StreamSource`] | read and discard | bounded availability poll |
//! | [`MemorySource`] | index | remaining length |
//!
//! Every source counts the bytes it has handed out so a reader can report a
//! resumable offset and the resynchronizer can pick restart points.

mod counting;
mod file;
mod location;
mod memory;
mod stream;

pub use counting::CountingReader;
pub use file::FileSource;
pub use location::SourceLocation;
pub use memory::MemorySource;
pub use stream::{ReadAheadPolicy, StreamOpener, StreamSource, UrlOpener};

use crate::Result;
use std::sync::Arc;

/// A forward-only supply of bytes with exact accounting.
pub trait ByteSource {
    /// Fill `buf` completely, or fail with [`crate::PacketError::Truncated`].
    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Bytes consumed since offset zero of the underlying log, including any
    /// skipped prefix.
    fn bytes_consumed(&self) -> u64;

    /// Whether more bytes are expected. May block for a bounded time on
    /// stream sources.
    fn has_more(&mut self) -> bool;

    /// Called by the codec before each payload buffer is read.
    fn before_payload(&mut self) {}

    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact_into(&mut buf)?;
        Ok(buf[0])
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact_into(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_exact_into(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_into(&mut buf)?;
        Ok(buf)
    }
}

/// A source that can be closed and reopened at an absolute byte offset.
pub trait Rewind: ByteSource {
    /// Close the current handle and reopen positioned at `offset`.
    ///
    /// Afterwards `bytes_consumed()` equals `offset`.
    fn reopen_at(&mut self, offset: u64) -> Result<()>;
}

/// An open packet log, local or remote.
#[derive(Debug)]
pub enum SourceHandle {
    File(FileSource),
    Stream(StreamSource),
}

impl SourceHandle {
    /// Open `location`, skipping the first `skip` bytes.
    pub fn open(
        location: &SourceLocation,
        skip: u64,
        opener: Arc<dyn StreamOpener>,
        policy: ReadAheadPolicy,
    ) -> Result<Self> {
        match location {
            SourceLocation::Path(path) => Ok(SourceHandle::File(FileSource::open_at(path, skip)?)),
            SourceLocation::Url(url) => {
                Ok(SourceHandle::Stream(StreamSource::open_at(url.clone(), skip, opener, policy)?))
            }
        }
    }

    pub fn is_seekable(&self) -> bool {
        matches!(self, SourceHandle::File(_))
    }
}

impl ByteSource for SourceHandle {
    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        match self {
            SourceHandle::File(source) => source.read_exact_into(buf),
            SourceHandle::Stream(source) => source.read_exact_into(buf),
        }
    }

    fn bytes_consumed(&self) -> u64 {
        match self {
            SourceHandle::File(source) => source.bytes_consumed(),
            SourceHandle::Stream(source) => source.bytes_consumed(),
        }
    }

    fn has_more(&mut self) -> bool {
        match self {
            SourceHandle::File(source) => source.has_more(),
            SourceHandle::Stream(source) => source.has_more(),
        }
    }

    fn before_payload(&mut self) {
        match self {
            SourceHandle::File(source) => source.before_payload(),
            SourceHandle::Stream(source) => source.before_payload(),
        }
    }
}

impl Rewind for SourceHandle {
    fn reopen_at(&mut self, offset: u64) -> Result<()> {
        match self {
            SourceHandle::File(source) => source.reopen_at(offset),
            SourceHandle::Stream(source) => source.reopen_at(offset),
        }
    }
}
