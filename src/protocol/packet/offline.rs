use binary_util::interfaces::{Reader, Writer};
use binary_util::io::{ByteReader, ByteWriter};
use binary_util::BinaryIo;

use crate::protocol::address::NetAddress;
use crate::protocol::types::FixedString;
use crate::protocol::Magic;
use crate::protocol::UDP_OVERHEAD;

/// All offline packets, tagged by their id byte.
#[derive(Clone, Debug, BinaryIo)]
#[repr(u8)]
pub enum OfflinePacket {
    UnconnectedPing(UnconnectedPing) = 0x01,
    UnconnectedPong(UnconnectedPong) = 0x1c,
    OpenConnectionRequest1(OpenConnectionRequest1) = 0x05,
    OpenConnectionReply1(OpenConnectionReply1) = 0x06,
    OpenConnectionRequest2(OpenConnectionRequest2) = 0x07,
    OpenConnectionReply2(OpenConnectionReply2) = 0x08,
    IncompatibleProtocolVersion(IncompatibleProtocolVersion) = 0x19,
}

/// Sent by anyone to discover servers; answered with [`UnconnectedPong`].
#[derive(Debug, Clone, BinaryIo)]
pub struct UnconnectedPing {
    pub ping_id: u64,
    pub magic: Magic,
}

/// The discovery answer, carrying the server GUID and name.
#[derive(Debug, Clone, BinaryIo)]
pub struct UnconnectedPong {
    pub ping_id: u64,
    pub server_guid: u64,
    pub magic: Magic,
    pub server_name: FixedString,
}

/// The first handshake packet. On the wire this is the magic, the protocol
/// version and then zero padding out to the MTU the client wants to probe;
/// the padded datagram length *is* the MTU signal, so reading recovers it
/// from the buffer size rather than from a field.
#[derive(Debug, Clone)]
pub struct OpenConnectionRequest1 {
    pub protocol: u8,
    pub mtu: u16,
}

impl Reader<OpenConnectionRequest1> for OpenConnectionRequest1 {
    fn read(buf: &mut ByteReader) -> std::io::Result<OpenConnectionRequest1> {
        let len = buf.as_slice().len();
        buf.read_struct::<Magic>()?;
        Ok(OpenConnectionRequest1 {
            protocol: buf.read_u8()?,
            // id byte + IP/UDP headers count towards the probed MTU
            mtu: (len + 1 + UDP_OVERHEAD as usize) as u16,
        })
    }
}

impl Writer for OpenConnectionRequest1 {
    fn write(&self, buf: &mut ByteWriter) -> std::io::Result<()> {
        buf.write_type::<Magic>(&Magic::new())?;
        buf.write_u8(self.protocol)?;

        // The id byte is already in the buffer (the enum wrapper wrote
        // it), so the padded datagram plus the IP/UDP headers lands
        // exactly on the probed MTU.
        let written = buf.as_slice().len() as u16;
        let padding = self.mtu.saturating_sub(written + UDP_OVERHEAD);
        for _ in 0..padding {
            buf.write_u8(0)?;
        }
        Ok(())
    }
}

/// Accepts the first handshake stage and proposes an MTU.
#[derive(Debug, Clone, BinaryIo)]
pub struct OpenConnectionReply1 {
    pub magic: Magic,
    pub server_guid: u64,
    pub security: bool,
    pub mtu: u16,
}

/// The second handshake stage: the client confirms the endpoint and MTU
/// and introduces its GUID.
#[derive(Debug, Clone, BinaryIo)]
pub struct OpenConnectionRequest2 {
    pub magic: Magic,
    pub address: NetAddress,
    pub mtu: u16,
    pub client_guid: u64,
}

/// Accepts the second handshake stage; frames may flow after this.
#[derive(Debug, Clone, BinaryIo)]
pub struct OpenConnectionReply2 {
    pub magic: Magic,
    pub server_guid: u64,
    pub client_address: NetAddress,
    pub mtu: u16,
    pub security: bool,
}

/// Rejection reply when the client speaks a different protocol version.
#[derive(Debug, Clone, BinaryIo)]
pub struct IncompatibleProtocolVersion {
    pub protocol: u8,
    pub magic: Magic,
    pub server_guid: u64,
}
