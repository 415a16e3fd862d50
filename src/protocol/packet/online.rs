//! Online packets are sent inside encapsulated frames once the handshake
//! has reached the frame stage. They keep the connection alive and finish
//! the connection handshake.
use binary_util::BinaryIo;

use crate::protocol::address::{NetAddress, SystemAddresses};

/// All online packets, tagged by their id byte.
#[derive(BinaryIo, Clone, Debug)]
#[repr(u8)]
pub enum OnlinePacket {
    ConnectedPing(ConnectedPing) = 0x00,
    ConnectedPong(ConnectedPong) = 0x03,
    ConnectionRequest(ConnectionRequest) = 0x09,
    ServerHandshake(ServerHandshake) = 0x10,
    ClientHandshake(ClientHandshake) = 0x13,
    ClientDisconnect(ClientDisconnect) = 0x15,
}

/// Keep-alive probe; the peer answers with [`ConnectedPong`].
#[derive(Clone, Debug, BinaryIo)]
pub struct ConnectedPing {
    pub ping_time: i64,
}

/// Keep-alive answer, echoing the ping time.
#[derive(Clone, Debug, BinaryIo)]
pub struct ConnectedPong {
    pub ping_time: i64,
    pub pong_time: i64,
}

/// The client asks to establish the session proper.
#[derive(Clone, Debug, BinaryIo)]
pub struct ConnectionRequest {
    pub client_guid: u64,
    pub ping_time: i64,
    pub security: bool,
}

/// The server's answer to [`ConnectionRequest`].
#[derive(Clone, Debug, BinaryIo)]
pub struct ServerHandshake {
    pub client_address: NetAddress,
    pub system_index: u16,
    pub system_addresses: SystemAddresses,
    pub ping_time: i64,
    pub pong_time: i64,
}

/// The client's confirmation that the handshake is complete.
#[derive(Clone, Debug, BinaryIo)]
pub struct ClientHandshake {
    pub client_address: NetAddress,
    pub system_addresses: SystemAddresses,
    pub ping_time: i64,
    pub pong_time: i64,
}

/// The client is going away; the session can be dropped.
#[derive(Clone, Debug, BinaryIo)]
pub struct ClientDisconnect {}
