//! In-memory byte source.

use super::{ByteSource, Rewind};
use crate::{PacketError, Result};

/// A seekable source over bytes already in memory.
///
/// Used for canonical byte arrays handed over by the table reader, and
/// anywhere a log has been buffered whole.
#[derive(Debug, Clone)]
pub struct MemorySource<B> {
    data: B,
    position: usize,
}

impl<B: AsRef<[u8]>> MemorySource<B> {
    pub fn new(data: B) -> Self {
        Self { data, position: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &[u8] {
        &self.data.as_ref()[self.position..]
    }
}

impl<B: AsRef<[u8]>> ByteSource for MemorySource<B> {
    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let available = self.remaining();
        if available.len() < buf.len() {
            let got = available.len();
            let offset = self.position as u64;
            self.position += got;
            return Err(PacketError::Truncated { offset, wanted: buf.len(), got });
        }
        buf.copy_from_slice(&available[..buf.len()]);
        self.position += buf.len();
        Ok(())
    }

    fn bytes_consumed(&self) -> u64 {
        self.position as u64
    }

    fn has_more(&mut self) -> bool {
        !self.remaining().is_empty()
    }
}

impl<B: AsRef<[u8]>> Rewind for MemorySource<B> {
    fn reopen_at(&mut self, offset: u64) -> Result<()> {
        self.position = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.data.as_ref().len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_integers() {
        let mut source = MemorySource::new(vec![0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 101]);
        assert_eq!(source.read_i32().unwrap(), 3);
        assert_eq!(source.read_i64().unwrap(), 101);
        assert_eq!(source.bytes_consumed(), 12);
        assert!(!source.has_more());
    }

    #[test]
    fn reopen_repositions_and_resets_count() {
        let mut source = MemorySource::new(&[1u8, 2, 3, 4][..]);
        source.read_vec(3).unwrap();
        source.reopen_at(1).unwrap();
        assert_eq!(source.bytes_consumed(), 1);
        assert_eq!(source.read_u8().unwrap(), 2);
    }

    #[test]
    fn short_buffer_is_truncated() {
        let mut source = MemorySource::new(vec![0u8; 2]);
        assert!(source.read_i32().unwrap_err().is_end_of_stream());
        assert_eq!(source.bytes_consumed(), 2);
    }
}
