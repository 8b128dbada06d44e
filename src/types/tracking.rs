//! Tracking keys parsed from packet log names.
//!
//! Logs are named `source_metadata_subtype_parent`, see
//! [`crate::log::LogKey::file_name`]. When a stream has to be resynchronized,
//! a recovered packet is only trusted if it carries the same source and
//! parent id as the log's name.

use crate::Packet;

/// Expected identifiers for packets read from a single log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingKeys {
    pub source_id: Option<i64>,
    pub parent_id: Option<i64>,
}

impl TrackingKeys {
    /// Parse keys from a file name or URL basename.
    ///
    /// Token 0 is the source id and token 3 the parent id. A missing or
    /// non-numeric token leaves that key unset.
    pub fn from_basename(name: &str) -> Self {
        let tokens: Vec<&str> = name.split('_').collect();
        let parse =
            |index: usize| tokens.get(index).and_then(|token| token.trim().parse::<i64>().ok());
        Self { source_id: parse(0), parent_id: parse(3) }
    }

    /// Whether both keys were recovered from the name.
    pub fn is_complete(&self) -> bool {
        self.source_id.is_some() && self.parent_id.is_some()
    }

    /// A resync candidate is accepted only when both keys are set and match.
    pub fn accepts(&self, packet: &Packet) -> bool {
        match (self.source_id, self.parent_id) {
            (Some(source_id), Some(parent_id)) => {
                packet.source_id == source_id && packet.parent_id == parent_id
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_and_parent_tokens() {
        let keys = TrackingKeys::from_basename("101_0_7_100");
        assert_eq!(keys.source_id, Some(101));
        assert_eq!(keys.parent_id, Some(100));
        assert!(keys.is_complete());
    }

    #[test]
    fn missing_tokens_stay_unset() {
        let keys = TrackingKeys::from_basename("101_x");
        assert_eq!(keys.source_id, Some(101));
        assert_eq!(keys.parent_id, None);

        let keys = TrackingKeys::from_basename("deployment.log");
        assert_eq!(keys, TrackingKeys::default());
    }

    #[test]
    fn non_numeric_tokens_stay_unset() {
        let keys = TrackingKeys::from_basename("abc_x_x_100");
        assert_eq!(keys.source_id, None);
        assert_eq!(keys.parent_id, Some(100));
    }

    #[test]
    fn accepts_requires_both_keys() {
        let mut packet = Packet::new(101);
        packet.parent_id = 100;

        assert!(TrackingKeys::from_basename("101_x_x_100").accepts(&packet));
        assert!(!TrackingKeys::from_basename("101_x_x_999").accepts(&packet));
        assert!(!TrackingKeys::from_basename("101_x").accepts(&packet));
    }
}
