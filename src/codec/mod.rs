//! Binary packet encoding.
//!
//! - [`wire`] reads versions 1 to 3 from a byte source and writes version 3
//! - [`canonical`] is the version 3 body on its own, the form table rows and
//!   other producers exchange packets in

pub mod canonical;
pub mod wire;

pub use canonical::{CanonicalCodec, Version3Layout, strip_version_and_prepend_device_id};
pub use wire::{Decoded, decode, decode_body, encode, encode_into, encoded_len};
