//! Stream resynchronization.
//!
//! When a decode meets an unknown version tag, the stream has lost packet
//! alignment, usually because of a partial write or a clamped length. The
//! resynchronizer slides a four byte window forward one byte at a time until
//! the window reads as a known version, then trial-decodes a packet from that
//! point. A candidate is only accepted when it carries the source and parent
//! ids the log's name promises.
//!
//! A rejected candidate reopens the source just after the candidate's tag, so
//! the bytes the trial decode consumed are scanned again. Each restart point
//! must be strictly greater than the previous one, which bounds the scan.

use crate::codec::decode_body;
use crate::io::Rewind;
use crate::{Packet, TrackingKeys, WireFormatVersion};
use tracing::{debug, warn};

/// Why a resync attempt gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustReason {
    /// The source ran out while sliding or while trial-decoding.
    EndOfStream,
    /// A candidate's restart point did not advance past the previous one.
    NoProgress,
    /// The source could not be reopened at a restart point.
    ReopenFailed,
}

/// Outcome of one resync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResyncOutcome {
    Recovered(Packet),
    Exhausted(ExhaustReason),
}

/// Finds the next trustworthy packet boundary in a misaligned stream.
#[derive(Debug, Clone, Copy)]
pub struct Resynchronizer {
    keys: TrackingKeys,
}

impl Resynchronizer {
    pub fn new(keys: TrackingKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &TrackingKeys {
        &self.keys
    }

    /// Scan forward from an unknown version tag `tag` that was just read.
    pub fn recover<S: Rewind + ?Sized>(&self, source: &mut S, tag: i32) -> ResyncOutcome {
        if !self.keys.is_complete() {
            debug!("Resync without complete tracking keys, no candidate can be accepted");
        }

        let mut window = tag.to_be_bytes();
        let mut previous_restart = 0u64;
        let mut scanned = 0u64;

        loop {
            let next = match source.read_u8() {
                Ok(byte) => byte,
                Err(e) => {
                    debug!("Resync ran out of bytes after scanning {}: {}", scanned, e);
                    return ResyncOutcome::Exhausted(ExhaustReason::EndOfStream);
                }
            };
            scanned += 1;
            window = [window[1], window[2], window[3], next];

            let Ok(version) = WireFormatVersion::try_from(i32::from_be_bytes(window)) else {
                continue;
            };

            let restart = source.bytes_consumed();
            let trial_ended_stream = match decode_body(version, source) {
                Ok(packet) if self.keys.accepts(&packet) => {
                    warn!(
                        "Resynchronized on {} packet seq={} at byte {} after skipping {} bytes",
                        version,
                        packet.sequence_number,
                        restart - 4,
                        scanned
                    );
                    return ResyncOutcome::Recovered(packet);
                }
                Ok(packet) => {
                    debug!(
                        "Rejected {} candidate at byte {}: source={} parent={}",
                        version, restart, packet.source_id, packet.parent_id
                    );
                    false
                }
                Err(e) => {
                    debug!(
                        "Trial decode of {} candidate at byte {} failed: {}",
                        version, restart, e
                    );
                    true
                }
            };

            if restart <= previous_restart {
                warn!("Resync made no progress at byte {}, giving up", restart);
                return ResyncOutcome::Exhausted(ExhaustReason::NoProgress);
            }
            if let Err(e) = source.reopen_at(restart) {
                warn!("Could not reopen source at byte {}: {}", restart, e);
                return ResyncOutcome::Exhausted(ExhaustReason::ReopenFailed);
            }
            if trial_ended_stream {
                return ResyncOutcome::Exhausted(ExhaustReason::EndOfStream);
            }
            previous_restart = restart;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::io::{ByteSource, MemorySource};
    use crate::test_utils::sample_packet;

    fn keys(name: &str) -> Resynchronizer {
        Resynchronizer::new(TrackingKeys::from_basename(name))
    }

    /// Garbage followed by a packet, with the tag already read the way the
    /// reader would have read it.
    fn misaligned(garbage: &[u8], packet: &Packet) -> (MemorySource<Vec<u8>>, i32) {
        let mut bytes = garbage.to_vec();
        bytes.extend_from_slice(&encode(packet).unwrap());
        let mut source = MemorySource::new(bytes);
        let tag = source.read_i32().unwrap();
        (source, tag)
    }

    #[test]
    fn recovers_packet_after_garbage() {
        let packet = sample_packet(101, 100, 42);
        let (mut source, tag) = misaligned(&[0xDE, 0xAD, 0xBE], &packet);

        let outcome = keys("101_x_x_100").recover(&mut source, tag);
        assert_eq!(outcome, ResyncOutcome::Recovered(packet.clone()));
        assert_eq!(source.bytes_consumed(), 3 + encode(&packet).unwrap().len() as u64);
    }

    #[test]
    fn rejects_packet_with_wrong_parent() {
        let packet = sample_packet(101, 100, 42);
        let (mut source, tag) = misaligned(&[0xDE, 0xAD, 0xBE], &packet);

        let outcome = keys("101_x_x_999").recover(&mut source, tag);
        assert_eq!(outcome, ResyncOutcome::Exhausted(ExhaustReason::EndOfStream));
    }

    #[test]
    fn incomplete_keys_accept_nothing() {
        let packet = sample_packet(101, 100, 42);
        let (mut source, tag) = misaligned(&[0xDE, 0xAD, 0xBE], &packet);

        let outcome = keys("101_x").recover(&mut source, tag);
        assert!(matches!(outcome, ResyncOutcome::Exhausted(_)));
    }

    #[test]
    fn skips_rejected_candidate_to_reach_real_packet() {
        let stranger = sample_packet(200, 100, 42);
        let packet = sample_packet(101, 100, 43);

        let mut bytes = vec![0xFF, 0xFF];
        bytes.extend_from_slice(&encode(&stranger).unwrap());
        bytes.extend_from_slice(&encode(&packet).unwrap());
        let mut source = MemorySource::new(bytes);
        let tag = source.read_i32().unwrap();

        let outcome = keys("101_0_7_100").recover(&mut source, tag);
        assert_eq!(outcome, ResyncOutcome::Recovered(packet));
    }

    #[test]
    fn truncated_candidate_rewinds_to_restart_point() {
        let packet = sample_packet(101, 100, 42);
        let encoded = encode(&packet).unwrap();
        let mut bytes = vec![0xDE, 0xAD, 0xBE];
        bytes.extend_from_slice(&encoded[..encoded.len() - 2]);
        let mut source = MemorySource::new(bytes);
        let tag = source.read_i32().unwrap();

        let outcome = keys("101_x_x_100").recover(&mut source, tag);
        assert_eq!(outcome, ResyncOutcome::Exhausted(ExhaustReason::EndOfStream));
        assert_eq!(source.bytes_consumed(), 3 + 4);
    }

    #[test]
    fn empty_tail_is_end_of_stream() {
        let mut source = MemorySource::new(vec![0u8, 0, 0, 9]);
        let tag = source.read_i32().unwrap();
        let outcome = keys("101_x_x_100").recover(&mut source, tag);
        assert_eq!(outcome, ResyncOutcome::Exhausted(ExhaustReason::EndOfStream));
    }
}
