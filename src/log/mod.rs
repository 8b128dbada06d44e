//! Packet log reading and writing.
//!
//! A packet log is a plain concatenation of encoded packets. Logs written by
//! this crate are version 3 throughout, but older logs may mix versions 1 and
//! 2, and any log may contain partial writes.
//!
//! - [`PacketLogReader`] enumerates packets, resynchronizing past corruption
//! - [`PacketLogWriter`] appends one packet per call
//! - [`PacketLogStore`] routes packets to a log per stream

mod reader;
mod resync;
mod store;
mod writer;

pub use reader::{PacketLogReader, PacketLogReaderBuilder};
pub use resync::{ExhaustReason, ResyncOutcome, Resynchronizer};
pub use store::{LogKey, PacketLogStore};
pub use writer::PacketLogWriter;
