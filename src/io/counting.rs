//! Byte counting wrapper over any `Read`.

use crate::{PacketError, Result};
use std::io::{ErrorKind, Read};

/// Wraps a reader and counts every byte it returns.
///
/// The count starts at the offset the inner reader was positioned at, so it
/// always names an absolute position in the log.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    consumed: u64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R, starting_offset: u64) -> Self {
        Self { inner, consumed: starting_offset }
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Fill `buf` completely.
    ///
    /// Bytes read before a short read are still counted, so the reported
    /// offset stays exact even when a field is truncated.
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(self.truncated(buf.len(), filled)),
                Ok(n) => {
                    filled += n;
                    self.consumed += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Err(self.truncated(buf.len(), filled));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn truncated(&self, wanted: usize, got: usize) -> PacketError {
        PacketError::Truncated { offset: self.consumed - got as u64, wanted, got }
    }
}
