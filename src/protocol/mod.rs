//! Wire types for the RakNet protocol.
//!
//! This module contains everything that has a byte layout: the frame and
//! frame-set codecs, the range-encoded ACK sets, the offline and online
//! packet catalogues, and the small leaf types they are built from (triads,
//! the offline magic, inverted IPv4 addresses, fixed-length strings).
/// The range-encoded ACK/NACK set codec.
pub mod ack;
/// IPv4 endpoint encoding and the fixed system-address blob.
pub mod address;
/// Encapsulated frames and the sequenced frame-set carrier. This is also
/// called the "Datagram" or "EncapsulatedPacket" layer in other
/// implementations; the original reliability layer is documented
/// [here](https://github.com/facebookarchive/RakNet/blob/1a169895a900c9fc4841c556e16514182b75faf8/Source/ReliabilityLayer.cpp).
pub mod frame;
/// This is the constant added to all offline packets to identify them as RakNet packets.
pub(crate) mod magic;
/// The offline (pre-session) and online (in-session) packet catalogues.
pub mod packet;
pub mod reliability;
/// 24-bit integer codec and wrap-safe index arithmetic.
pub mod triad;
/// String leaf types used by the packet catalogue.
pub mod types;

pub use magic::*;

/// The offline handshake protocol version this engine speaks.
pub const PROTOCOL_VERSION: u8 = 9;

/// The maximum amount of fragments a single split group may declare.
/// This caps what a remote peer can make us buffer.
pub const MAX_FRAGS: u32 = 1024;
/// The maximum amount of ordered channels on a single connection.
/// This is a raknet limitation, and is not configurable.
pub const MAX_ORD_CHANS: u8 = 32;
/// Concurrent split groups allowed per session before the peer is
/// considered hostile and the session is closed.
pub const MAX_SPLIT_POOLS: usize = 64;
/// Split groups older than this are evicted on the session tick (ms).
pub const SPLIT_POOL_TTL_MS: u64 = 30_000;

/// Carrier framing cost: one tag byte plus the sequence triad.
pub const CARRIER_OVERHEAD: u16 = 4;
/// Headroom reserved when chunking a stream: the carrier overhead plus a
/// worst-case frame header.
pub const FRAME_HEADROOM: u16 = 34;
/// IP header + UDP header, assumed when inferring an MTU from the padded
/// open-connection request.
pub const UDP_OVERHEAD: u16 = 20 + 8;

/// The largest MTU a peer may negotiate.
pub const MTU_MAX: u16 = 2400;
/// The smallest MTU a peer may negotiate.
pub const MTU_MIN: u16 = 400;
/// MTU assumed before negotiation has happened.
pub const DEFAULT_MTU: u16 = 1400;

/// Tag byte for outgoing frame-set datagrams. Inbound dispatch accepts the
/// whole `0x80..=0x8D` range.
pub const ID_FRAME_SET: u8 = 0x84;
/// First byte of an unconnected ping datagram.
pub const ID_UNCONNECTED_PING: u8 = 0x01;
