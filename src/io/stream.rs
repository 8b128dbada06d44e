//! Non-seekable stream source.
//!
//! Remote logs arrive through a plain `Read`. A pump thread moves chunks from
//! that reader into a bounded channel so the source can answer "how many bytes
//! are available right now" without blocking, which is what the bounded
//! `has_more` poll needs.

use super::{ByteSource, CountingReader, Rewind};
use crate::{PacketError, Result};
use std::fmt;
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

const PUMP_CHUNK_SIZE: usize = 8 * 1024;

/// Timing policy for reading from a producer that may still be writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadAheadPolicy {
    /// Delay between availability checks in `has_more`.
    pub poll_interval: Duration,
    /// Availability checks before `has_more` gives up.
    pub poll_attempts: u32,
    /// Pause before each payload read, giving a slow producer time to catch up.
    pub payload_backoff: Duration,
    /// Chunks buffered between the pump thread and the reader.
    pub channel_capacity: usize,
}

impl Default for ReadAheadPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            poll_attempts: 20,
            payload_backoff: Duration::ZERO,
            channel_capacity: 64,
        }
    }
}

/// Opens the raw byte stream behind a URL.
pub trait StreamOpener: Send + Sync + fmt::Debug {
    fn open(&self, url: &Url) -> Result<Box<dyn Read + Send>>;
}

/// Default opener: `file://` URLs, plus `http(s)://` with the `http` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlOpener;

impl StreamOpener for UrlOpener {
    fn open(&self, url: &Url) -> Result<Box<dyn Read + Send>> {
        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| {
                        PacketError::source_failed(url.as_str(), "not a local file path")
                    })?;
                let file = File::open(&path).map_err(|e| PacketError::file_error(path, e))?;
                Ok(Box::new(file))
            }
            #[cfg(feature = "http")]
            "http" | "https" => {
                let response = reqwest::blocking::get(url.clone())
                    .and_then(|response| response.error_for_status())
                    .map_err(|e| {
                        PacketError::source_failed_with_source(
                            url.as_str(),
                            "request failed",
                            Box::new(e),
                        )
                    })?;
                Ok(Box::new(response))
            }
            other => Err(PacketError::source_failed(
                url.as_str(),
                format!("unsupported scheme '{other}'"),
            )),
        }
    }
}

/// Reader side of the pump thread.
struct Pump {
    rx: Receiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    cursor: usize,
    closed: bool,
    thread: thread::JoinHandle<()>,
}

impl Pump {
    fn spawn(mut reader: Box<dyn Read + Send>, capacity: usize) -> io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let thread = thread::Builder::new()
            .name("packet-stream-pump".to_string())
            .spawn(move || pump_loop(&mut reader, tx))?;
        Ok(Self { rx, pending: Vec::new(), cursor: 0, closed: false, thread })
    }

    fn thread_running(&self) -> bool {
        !self.thread.is_finished()
    }

    fn buffered(&self) -> usize {
        self.pending.len() - self.cursor
    }

    fn push(&mut self, chunk: Vec<u8>) {
        if self.cursor == self.pending.len() {
            self.pending = chunk;
            self.cursor = 0;
        } else {
            self.pending.extend_from_slice(&chunk);
        }
    }

    /// Drain whatever the pump has delivered without blocking.
    fn available_now(&mut self) -> usize {
        while !self.closed {
            match self.rx.try_recv() {
                Ok(Ok(chunk)) => self.push(chunk),
                Ok(Err(e)) => {
                    warn!("Stream read failed: {}", e);
                    self.closed = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.closed = true,
            }
        }
        self.buffered()
    }

    /// Drop the channel so the pump thread stops at its next send. A thread
    /// blocked in `read` stays there until the producer writes or closes.
    fn close(&mut self) {
        let (_tx, rx) = mpsc::sync_channel(0);
        self.rx = rx;
        self.pending.clear();
        self.cursor = 0;
        self.closed = true;
    }
}

impl Read for Pump {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.buffered() == 0 {
            if self.closed {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Ok(chunk)) => self.push(chunk),
                Ok(Err(e)) => {
                    self.closed = true;
                    return Err(e);
                }
                Err(_) => {
                    self.closed = true;
                    return Ok(0);
                }
            }
        }
        let n = buf.len().min(self.buffered());
        buf[..n].copy_from_slice(&self.pending[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }
}

impl fmt::Debug for Pump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pump")
            .field("buffered", &self.buffered())
            .field("closed", &self.closed)
            .field("thread_running", &self.thread_running())
            .finish()
    }
}

fn pump_loop(reader: &mut Box<dyn Read + Send>, tx: SyncSender<io::Result<Vec<u8>>>) {
    let mut buf = vec![0u8; PUMP_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Ok(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
    trace!("Stream pump finished");
}

/// A packet log read from a URL.
///
/// A background thread reads the producer. Reopening starts a new thread and
/// abandons the old one, which exits on its next chunk or when the producer
/// closes. Against an idle producer each reopen therefore leaves one thread
/// parked in `read` until the producer writes again.
#[derive(Debug)]
pub struct StreamSource {
    url: Url,
    opener: Arc<dyn StreamOpener>,
    policy: ReadAheadPolicy,
    reader: CountingReader<Pump>,
}

impl StreamSource {
    /// Open `url` and discard the first `skip` bytes one at a time.
    pub fn open_at(
        url: Url,
        skip: u64,
        opener: Arc<dyn StreamOpener>,
        policy: ReadAheadPolicy,
    ) -> Result<Self> {
        let raw = opener.open(&url)?;
        let pump = Pump::spawn(raw, policy.channel_capacity).map_err(|e| {
            PacketError::source_failed_with_source(
                url.as_str(),
                "could not start stream pump",
                Box::new(e),
            )
        })?;
        let mut reader = CountingReader::new(pump, 0);

        let mut byte = [0u8; 1];
        for _ in 0..skip {
            reader.fill(&mut byte)?;
        }

        debug!("Opened packet stream {} at offset {}", url, skip);
        Ok(Self { url, opener, policy, reader })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn policy(&self) -> &ReadAheadPolicy {
        &self.policy
    }

    /// Bytes that can be read right now without blocking.
    pub fn available_now(&mut self) -> usize {
        self.reader.get_mut().available_now()
    }

    /// Polls availability up to `poll_attempts` times, `poll_interval` apart.
    ///
    /// Returns `Ok(false)` as soon as the producer has closed with nothing
    /// buffered, and [`PacketError::Timeout`] when every poll found the
    /// producer open but silent.
    pub fn try_has_more(&mut self) -> Result<bool> {
        let attempts = self.policy.poll_attempts.max(1);
        for attempt in 1..=attempts {
            if self.available_now() > 0 {
                return Ok(true);
            }
            if self.reader.get_ref().closed {
                return Ok(false);
            }
            if attempt < attempts {
                thread::sleep(self.policy.poll_interval);
            }
        }
        let duration = self.policy.poll_interval.saturating_mul(attempts - 1);
        Err(PacketError::Timeout { duration })
    }
}

impl ByteSource for StreamSource {
    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.fill(buf)
    }

    fn bytes_consumed(&self) -> u64 {
        self.reader.consumed()
    }

    /// See [`StreamSource::try_has_more`]; a timeout reads as no more data.
    fn has_more(&mut self) -> bool {
        match self.try_has_more() {
            Ok(more) => more,
            Err(e) => {
                debug!("No bytes from {}: {}", self.url, e);
                false
            }
        }
    }

    fn before_payload(&mut self) {
        if !self.policy.payload_backoff.is_zero() {
            thread::sleep(self.policy.payload_backoff);
        }
    }
}

impl Rewind for StreamSource {
    fn reopen_at(&mut self, offset: u64) -> Result<()> {
        self.reader.get_mut().close();
        let opener = Arc::clone(&self.opener);
        let reopened = StreamSource::open_at(self.url.clone(), offset, opener, self.policy)?;
        *self = reopened;
        Ok(())
    }
}
