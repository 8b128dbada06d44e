//! Async delivery of packets from a blocking provider.
//!
//! Readers in this crate block: file reads, stream polling and SQL pages all
//! happen on the calling thread. [`PacketFeed`] moves a provider onto tokio's
//! blocking pool and hands packets to async code over a bounded channel.

use crate::Packet;
use crate::provider::PacketProvider;
use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

/// Packets pulled from a provider on a blocking task.
///
/// Dropping the feed cancels the task once its current read returns.
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use ssds_packets::feed::PacketFeed;
/// use ssds_packets::log::PacketLogReader;
///
/// #[tokio::main]
/// async fn main() -> ssds_packets::Result<()> {
///     let reader = PacketLogReader::open("/data/packets/101_0_7_100")?;
///     let mut packets = PacketFeed::spawn(reader, 64).into_stream();
///     while let Some(packet) = packets.next().await {
///         println!("seq {}", packet.sequence_number);
///     }
///     Ok(())
/// }
/// ```
pub struct PacketFeed {
    packets: mpsc::Receiver<Packet>,
    cancel: CancellationToken,
    guard: DropGuard,
    task: JoinHandle<u64>,
}

impl PacketFeed {
    /// Start pulling from `provider`, buffering up to `capacity` packets.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<P>(provider: P, capacity: usize) -> Self
    where
        P: PacketProvider + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let task = tokio::task::spawn_blocking(move || Self::pump(provider, tx, task_cancel));

        Self { packets: rx, guard: cancel.clone().drop_guard(), cancel, task }
    }

    fn pump<P: PacketProvider>(
        mut provider: P,
        tx: mpsc::Sender<Packet>,
        cancel: CancellationToken,
    ) -> u64 {
        info!("Packet feed started");
        let mut delivered = 0u64;

        while !cancel.is_cancelled() && provider.has_next() {
            let Some(packet) = provider.next_packet() else {
                continue;
            };
            if tx.blocking_send(packet).is_err() {
                debug!("Feed receiver dropped, shutting down");
                break;
            }
            delivered += 1;
        }

        info!("Packet feed ended after {} packets", delivered);
        delivered
    }

    /// The next packet, or `None` once the provider is drained.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.packets.recv().await
    }

    /// Token that stops the feed when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop reading; packets already buffered can still be received.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the provider to drain and return how many packets were
    /// delivered. Unreceived packets are dropped.
    pub async fn finish(self) -> u64 {
        let PacketFeed { packets, task, guard, .. } = self;
        drop(packets);
        let delivered = task.await.unwrap_or_default();
        drop(guard);
        delivered
    }

    /// Receive packets as a [`Stream`]. The feed is cancelled when the
    /// stream is dropped.
    pub fn into_stream(self) -> PacketStream {
        PacketStream { inner: ReceiverStream::new(self.packets), _guard: self.guard }
    }
}

pin_project! {
    /// Stream returned by [`PacketFeed::into_stream`].
    pub struct PacketStream {
        #[pin]
        inner: ReceiverStream<Packet>,
        _guard: DropGuard,
    }
}

impl Stream for PacketStream {
    type Item = Packet;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Packet>> {
        self.project().inner.poll_next(cx)
    }
}
