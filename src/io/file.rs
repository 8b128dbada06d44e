//! Seekable file source.

use super::{ByteSource, CountingReader, Rewind};
use crate::{PacketError, Result};
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A packet log on the local filesystem.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    reader: CountingReader<BufReader<File>>,
}

impl FileSource {
    /// Open `path` and seek past the first `skip` bytes.
    pub fn open_at(path: impl AsRef<Path>, skip: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|e| PacketError::file_error(&path, e))?;
        if skip > 0 {
            file.seek(SeekFrom::Start(skip)).map_err(|e| PacketError::file_error(&path, e))?;
        }

        debug!("Opened packet log {} at offset {}", path.display(), skip);
        Ok(Self { path, reader: CountingReader::new(BufReader::new(file), skip) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.fill(buf)
    }

    fn bytes_consumed(&self) -> u64 {
        self.reader.consumed()
    }

    /// Compares against the current file length, so bytes appended by a
    /// concurrent writer become visible.
    fn has_more(&mut self) -> bool {
        match self.reader.get_ref().get_ref().metadata() {
            Ok(metadata) => metadata.len() > self.reader.consumed(),
            Err(e) => {
                debug!("Could not stat {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

impl Rewind for FileSource {
    fn reopen_at(&mut self, offset: u64) -> Result<()> {
        *self = FileSource::open_at(&self.path, offset)?;
        Ok(())
    }
}
