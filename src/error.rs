//! Error types for packet stream processing.
//!
//! All errors implement `std::error::Error` and carry enough context to tell
//! which source, offset or statement was involved.
//!
//! ## Error Categories
//!
//! - **File / Source Errors**: a packet log or remote stream could not be opened or read
//! - **Truncated**: a source ended in the middle of a field
//! - **PacketTooLarge**: a packet cannot be written because a buffer exceeds its limit
//! - **Query Errors**: SQL execution failed, or a query could not be built
//! - **Parse Errors**: canonical bytes or configuration did not match the expected layout
//!
//! Corrupt length fields and unknown version tags are *not* errors. Lengths are
//! clamped where they are read, and unknown tags are handed to the stream
//! resynchronizer (see [`crate::log::Resynchronizer`]).
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use ssds_packets::PacketError;
//!
//! let error =
//!     PacketError::source_failed("http://dods.example.org/101_0_0_100", "connection refused");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for packet operations.
pub type Result<T, E = PacketError> = std::result::Result<T, E>;

/// Main error type for packet operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PacketError {
    #[error("Packet log error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open byte stream {location}: {reason}")]
    Source {
        location: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Source ended mid-field at byte {offset}: wanted {wanted} bytes, got {got}")]
    Truncated { offset: u64, wanted: usize, got: usize },

    #[error("Packet {buffer} buffer of {len} bytes exceeds the {max} byte limit")]
    PacketTooLarge { buffer: &'static str, len: usize, max: usize },

    #[error("Query failed: {sql}")]
    Query {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Configuration error: {details}")]
    Config { details: String },
}

impl PacketError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            PacketError::Source { .. } => true,
            PacketError::Timeout { .. } => true,
            PacketError::Query { .. } => true,
            PacketError::File { .. } => false,
            PacketError::Truncated { .. } => false,
            PacketError::PacketTooLarge { .. } => false,
            PacketError::InvalidQuery { .. } => false,
            PacketError::Parse { .. } => false,
            PacketError::Config { .. } => false,
        }
    }

    /// Returns true when the error only means the source has no more bytes.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, PacketError::Truncated { .. })
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PacketError::File { .. } => vec![
                "Check the packet log exists and is readable",
                "Verify the storage directory in the configuration",
            ],
            PacketError::Source { .. } => vec![
                "Check the stream URL is reachable",
                "Place a local copy in the configured storage directory",
                "Retry once the producer is back online",
            ],
            PacketError::Truncated { .. } => vec![
                "Wait for the writer to finish appending",
                "Resume from the last reported byte offset",
            ],
            PacketError::PacketTooLarge { .. } => {
                vec![
                    "Split the payload across packets",
                    "Check the packet was built from valid data",
                ]
            }
            PacketError::Query { .. } => vec![
                "Check the device table exists",
                "Verify the table delimiter matches the database dialect",
                "Retry the query",
            ],
            PacketError::InvalidQuery { .. } => vec![
                "Use a positive device id",
                "Configure last-N templates before requesting the last N packets",
            ],
            PacketError::Parse { .. } => {
                vec!["Verify source data integrity", "Check the bytes use the version 3 layout"]
            }
            PacketError::Timeout { .. } => {
                vec![
                    "Increase the poll interval or attempt count",
                    "Check the producer is still writing",
                ]
            }
            PacketError::Config { .. } => {
                vec![
                    "Check the YAML configuration file",
                    "Remove invalid keys to fall back to defaults",
                ]
            }
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PacketError::File { path: path.into(), source }
    }

    /// Helper constructor for stream open failures.
    pub fn source_failed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        PacketError::Source { location: location.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for stream open failures with source.
    pub fn source_failed_with_source(
        location: impl Into<String>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        PacketError::Source {
            location: location.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Helper constructor for SQL failures.
    pub fn query_failed(sql: impl Into<String>, source: rusqlite::Error) -> Self {
        PacketError::Query { sql: sql.into(), source }
    }

    /// Helper constructor for queries rejected before execution.
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        PacketError::InvalidQuery { reason: reason.into() }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        PacketError::Parse { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for PacketError {
    fn from(err: std::io::Error) -> Self {
        PacketError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
