//! Provider trait for packet sources

use crate::Packet;

/// A pull-based source of packets.
///
/// Implemented by [`PacketLogReader`](crate::log::PacketLogReader) and
/// [`PacketTableReader`](crate::sql::PacketTableReader), so consumers and
/// [`PacketFeed`](crate::feed::PacketFeed) can treat logs and tables alike.
///
/// `has_next` answers "may there be more?", not "will `next_packet`
/// succeed?": a source that finds only corrupt data returns `None` from
/// `next_packet` after reporting `true`.
pub trait PacketProvider {
    fn has_next(&mut self) -> bool;

    /// The next packet, or `None` when none could be produced by this call.
    fn next_packet(&mut self) -> Option<Packet>;
}

impl<P: PacketProvider + ?Sized> PacketProvider for Box<P> {
    fn has_next(&mut self) -> bool {
        (**self).has_next()
    }

    fn next_packet(&mut self) -> Option<Packet> {
        (**self).next_packet()
    }
}
