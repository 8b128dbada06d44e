//! Packet stream engine for oceanographic instrument data.
//!
//! Instruments on moorings and vehicles emit timestamped packets. This crate
//! reads and writes them in the three historical wire formats, recovers from
//! corrupt or partially written logs, and pages packets back out of a
//! relational store.
//!
//! # Features
//!
//! - **Wire codec**: versions 1 to 3 decode; version 3 encodes
//! - **Resynchronization**: skips corruption in logs written by live producers
//! - **Local or remote logs**: files, or URLs polled while the producer writes
//! - **SQL retrieval**: typed queries, bounded-memory paging over SQLite
//! - **Async feed**: any reader as a tokio [`Stream`](futures::Stream)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ssds_packets::log::{PacketLogReader, PacketLogStore};
//!
//! # fn main() -> ssds_packets::Result<()> {
//! let mut store = PacketLogStore::open("/var/ssds/logs")?;
//! let mut packet = ssds_packets::Packet::new(101);
//! packet.parent_id = 100;
//! packet.set_timestamp_millis(1_700_000_000_000);
//! packet.primary = b"CTD 12.3 34.1".to_vec();
//! let path = store.append(&packet)?.to_path_buf();
//!
//! for packet in PacketLogReader::open(path.to_string_lossy())? {
//!     println!("{:?}", packet);
//! }
//! # Ok(())
//! # }
//! ```

// Core types and error handling
pub mod codec;
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Packet sources
pub mod feed;
pub mod io;
pub mod log;
pub mod provider;
pub mod sql;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::IoConfig;
pub use feed::PacketFeed;
pub use log::{PacketLogReader, PacketLogStore, PacketLogWriter};
pub use provider::PacketProvider;
pub use sql::{PacketTableReader, QuerySpec};
