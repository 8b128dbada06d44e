//! Wire format version tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version tag written at the start of every packet on the wire.
///
/// Versions 1 and 2 are read-only legacy layouts; version 3 is the only one
/// ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireFormatVersion {
    V1,
    V2,
    V3,
}

impl WireFormatVersion {
    /// The version used for every write.
    pub const CURRENT: WireFormatVersion = WireFormatVersion::V3;

    /// The tag value as it appears on the wire.
    pub fn tag(self) -> i32 {
        match self {
            WireFormatVersion::V1 => 1,
            WireFormatVersion::V2 => 2,
            WireFormatVersion::V3 => 3,
        }
    }
}

impl TryFrom<i32> for WireFormatVersion {
    type Error = i32;

    /// Returns the unrecognised tag on failure.
    fn try_from(tag: i32) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(WireFormatVersion::V1),
            2 => Ok(WireFormatVersion::V2),
            3 => Ok(WireFormatVersion::V3),
            other => Err(other),
        }
    }
}

impl fmt::Display for WireFormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for version in [WireFormatVersion::V1, WireFormatVersion::V2, WireFormatVersion::V3] {
            assert_eq!(WireFormatVersion::try_from(version.tag()), Ok(version));
        }
    }

    #[test]
    fn unknown_tags_are_returned() {
        assert_eq!(WireFormatVersion::try_from(0), Err(0));
        assert_eq!(WireFormatVersion::try_from(4), Err(4));
        assert_eq!(WireFormatVersion::try_from(-3), Err(-3));
    }
}
