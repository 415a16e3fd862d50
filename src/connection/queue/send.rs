use std::net::SocketAddr;
use std::sync::Arc;

use binary_util::interfaces::Writer;
use tokio::net::UdpSocket;

use crate::error::session::SessionError;
use crate::protocol::frame::{Frame, FramePacket, SplitMeta};
use crate::protocol::reliability::Reliability;
use crate::protocol::{CARRIER_OVERHEAD, FRAME_HEADROOM, ID_FRAME_SET};
use crate::rakcore_debug;
use crate::util::TriadCounter;

use super::RecoveryQueue;

/// How a stream should be encapsulated.
///
/// These mirror the legacy stream options: `message_index` gives every
/// chunk of a split stream reliability tier 2 and its own message index;
/// `order_channel` does the same for a single-chunk stream. Neither
/// assigns an order index; that is the observed behavior of the protocol
/// this engine interoperates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamOptions {
    pub message_index: bool,
    pub order_channel: bool,
}

impl StreamOptions {
    /// Reliable delivery for every chunk, split or not.
    pub fn reliable() -> Self {
        Self {
            message_index: true,
            order_channel: true,
        }
    }
}

/// The outbound half of the reliability engine.
///
/// Streams are chunked to the MTU, wrapped into frames, bin-packed into
/// carriers and cached under their sequence until the peer acknowledges
/// them. A NACK pulls the cached frames back out and sends them again
/// under fresh sequences.
#[derive(Debug)]
pub struct SendQueue {
    mtu: u16,

    /// Sequence for the next outgoing carrier.
    sequence: TriadCounter,
    /// Message index for the next reliable frame.
    message_index: TriadCounter,
    /// Split-group id for the next fragmented stream.
    split_id: u16,

    /// Frames waiting for the next flush.
    queue: Vec<Frame>,
    recovery: RecoveryQueue<Vec<Frame>>,

    socket: Arc<UdpSocket>,
    address: SocketAddr,
}

impl SendQueue {
    pub fn new(mtu: u16, socket: Arc<UdpSocket>, address: SocketAddr) -> Self {
        Self {
            mtu,
            sequence: TriadCounter::new(),
            message_index: TriadCounter::new(),
            split_id: 0,
            queue: Vec::new(),
            recovery: RecoveryQueue::new(),
            socket,
            address,
        }
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn set_mtu(&mut self, mtu: u16) {
        self.mtu = mtu;
    }

    fn chunk_stream(&self, stream: &[u8]) -> Vec<Vec<u8>> {
        if stream.is_empty() {
            return Vec::new();
        }
        let size = self.mtu.saturating_sub(FRAME_HEADROOM).max(1) as usize;
        stream.chunks(size).map(|chunk| chunk.to_vec()).collect()
    }

    /// Wraps chunks into frames, assigning split metadata and, when the
    /// options ask for it, reliability and message indices.
    fn encapsulate(&mut self, chunks: Vec<Vec<u8>>, options: StreamOptions) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(chunks.len());

        if chunks.len() > 1 {
            let count = chunks.len() as u32;
            let id = self.split_id;
            self.split_id = self.split_id.wrapping_add(1);

            for (index, chunk) in chunks.into_iter().enumerate() {
                let mut frame = Frame::new(Reliability::Unreliable, chunk);
                frame.split = Some(SplitMeta {
                    count,
                    id,
                    index: index as u32,
                });
                if options.message_index {
                    frame.reliability = Reliability::Reliable;
                    frame.message_index = Some(self.message_index.next());
                }
                frames.push(frame);
            }
        } else if let Some(chunk) = chunks.into_iter().next() {
            let mut frame = Frame::new(Reliability::Unreliable, chunk);
            if options.order_channel {
                frame.reliability = Reliability::Reliable;
                frame.message_index = Some(self.message_index.next());
            }
            frames.push(frame);
        }

        frames
    }

    /// Queues a stream to go out with the next flush.
    pub fn queue_stream(&mut self, stream: &[u8], options: StreamOptions) {
        let chunks = self.chunk_stream(stream);
        let frames = self.encapsulate(chunks, options);
        self.queue.extend(frames);
    }

    /// Encapsulates and transmits a stream immediately.
    pub async fn send_stream(
        &mut self,
        stream: &[u8],
        options: StreamOptions,
    ) -> Result<(), SessionError> {
        let chunks = self.chunk_stream(stream);
        let frames = self.encapsulate(chunks, options);
        self.send_frames(frames).await
    }

    /// Transmits everything queued since the last flush.
    pub async fn flush(&mut self) -> Result<(), SessionError> {
        if self.queue.is_empty() {
            return Ok(());
        }
        let frames = std::mem::take(&mut self.queue);
        self.send_frames(frames).await
    }

    /// Greedy bin-packing: frames are accumulated until the next one
    /// would push the carrier past the MTU (4 bytes of carrier framing
    /// accounted for), at which point the bin is sealed and sent and a
    /// new one starts with the frame that did not fit.
    pub async fn send_frames(&mut self, frames: Vec<Frame>) -> Result<(), SessionError> {
        if frames.is_empty() {
            return Ok(());
        }

        let mtu = self.mtu as usize;
        let mut bin: Vec<Frame> = Vec::new();
        let mut length = 0usize;

        for frame in frames {
            let frame_len = frame.len();
            if !bin.is_empty() && length + frame_len + CARRIER_OVERHEAD as usize >= mtu {
                let sealed = std::mem::take(&mut bin);
                self.send_carrier(sealed).await?;
                length = 0;
            }
            length += frame_len;
            bin.push(frame);
        }

        self.send_carrier(bin).await
    }

    async fn send_carrier(&mut self, frames: Vec<Frame>) -> Result<(), SessionError> {
        let sequence = self.sequence.next();
        let packet = FramePacket::new(sequence, frames);

        let body = packet.write_to_bytes()?;
        let mut datagram = Vec::with_capacity(body.as_slice().len() + 1);
        datagram.push(ID_FRAME_SET);
        datagram.extend_from_slice(body.as_slice());

        self.recovery.insert(sequence, packet.frames);
        self.send_raw(&datagram).await
    }

    /// Writes a finished datagram to the peer.
    pub async fn send_raw(&self, datagram: &[u8]) -> Result<(), SessionError> {
        self.socket.send_to(datagram, self.address).await?;
        rakcore_debug!(wire: "{} bytes to {}: {:?}", datagram.len(), self.address, datagram);
        Ok(())
    }

    /// The peer confirmed these sequences; forget their recovery entries.
    pub fn ack(&mut self, keys: &[u32]) {
        for key in keys {
            self.recovery.remove(*key);
        }
    }

    /// The peer missed these sequences; resend whatever is still cached.
    /// Retransmitted frames go out under fresh sequence numbers and are
    /// re-cached, so a second loss recovers the same way.
    pub async fn nack(&mut self, keys: &[u32]) -> Result<(), SessionError> {
        for key in keys {
            if let Some(frames) = self.recovery.remove(*key) {
                self.send_frames(frames).await?;
            }
        }
        Ok(())
    }

    /// Number of carriers awaiting acknowledgement.
    pub fn pending_recovery(&self) -> usize {
        self.recovery.len()
    }
}
