//! Core types for device packet representation.
//!
//! - [`Packet`] is the record every reader yields, whatever its backing store
//! - [`WireFormatVersion`] names the three binary layouts a log may contain
//! - [`TrackingKeys`] are the identifiers a log's name promises, used to
//!   validate packets recovered after corruption

mod packet;
mod tracking;
mod version;

pub use packet::{MAX_PRIMARY_LEN, MAX_SECONDARY_LEN, Packet, UNKNOWN};
pub use tracking::TrackingKeys;
pub use version::WireFormatVersion;
