use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use binary_util::interfaces::{Reader, Writer};
use binary_util::io::{ByteReader, ByteWriter};

/// A single UDP endpoint as it appears on the wire: one version byte (only
/// 4 is accepted), the four address octets stored bitwise-inverted, and a
/// big-endian port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetAddress {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl NetAddress {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Converts a socket address. Returns `None` for IPv6 endpoints, which
    /// this wire format cannot express.
    pub fn from_socket(addr: SocketAddr) -> Option<Self> {
        match addr {
            SocketAddr::V4(v4) => Some(Self::new(*v4.ip(), v4.port())),
            SocketAddr::V6(_) => None,
        }
    }
}

impl From<SocketAddrV4> for NetAddress {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl From<NetAddress> for SocketAddr {
    fn from(addr: NetAddress) -> Self {
        SocketAddr::V4(SocketAddrV4::new(addr.ip, addr.port))
    }
}

impl Reader<NetAddress> for NetAddress {
    fn read(buf: &mut ByteReader) -> std::io::Result<Self> {
        let version = buf.read_u8()?;
        if version != 4 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Address version {} is not supported, only v4", version),
            ));
        }
        let mut octets = [0u8; 4];
        buf.read(&mut octets)?;
        let ip = Ipv4Addr::new(!octets[0], !octets[1], !octets[2], !octets[3]);
        let port = buf.read_u16()?;
        Ok(Self { ip, port })
    }
}

impl Writer for NetAddress {
    fn write(&self, buf: &mut ByteWriter) -> std::io::Result<()> {
        let octets = self.ip.octets();
        buf.write_u8(4)?;
        buf.write(&[!octets[0], !octets[1], !octets[2], !octets[3]])?;
        buf.write_u16(self.port)?;
        Ok(())
    }
}

/// The ten v4 address slots carried by the handshake packets: the first is
/// `128.255.255.254` (inverted form) with port 0, the remaining nine are
/// inverted all-zero. Nothing in the handshake reads their content, so the
/// blob is fixed.
const SYSTEM_ADDRESSES_BLOB: [u8; 70] = [
    4, 0x80, 0xff, 0xff, 0xfe, 0, 0, // slot 0
    4, 0xff, 0xff, 0xff, 0xff, 0, 0, // slots 1..=9
    4, 0xff, 0xff, 0xff, 0xff, 0, 0, //
    4, 0xff, 0xff, 0xff, 0xff, 0, 0, //
    4, 0xff, 0xff, 0xff, 0xff, 0, 0, //
    4, 0xff, 0xff, 0xff, 0xff, 0, 0, //
    4, 0xff, 0xff, 0xff, 0xff, 0, 0, //
    4, 0xff, 0xff, 0xff, 0xff, 0, 0, //
    4, 0xff, 0xff, 0xff, 0xff, 0, 0, //
    4, 0xff, 0xff, 0xff, 0xff, 0, 0, //
];

/// Marker type for the fixed system-address block.
#[derive(Debug, Clone, Default)]
pub struct SystemAddresses;

impl SystemAddresses {
    pub const WIRE_LEN: usize = SYSTEM_ADDRESSES_BLOB.len();
}

impl Reader<SystemAddresses> for SystemAddresses {
    fn read(buf: &mut ByteReader) -> std::io::Result<Self> {
        let mut skipped = [0u8; SYSTEM_ADDRESSES_BLOB.len()];
        buf.read(&mut skipped)?;
        Ok(SystemAddresses)
    }
}

impl Writer for SystemAddresses {
    fn write(&self, buf: &mut ByteWriter) -> std::io::Result<()> {
        buf.write(&SYSTEM_ADDRESSES_BLOB)?;
        Ok(())
    }
}
