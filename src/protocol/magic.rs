use std::io;

use binary_util::interfaces::{Reader, Writer};
use binary_util::io::{ByteReader, ByteWriter};

/// The fixed 16-byte sequence carried by every offline packet. Datagrams
/// without it are not RakNet traffic.
pub(crate) const MAGIC: [u8; 16] = [
    0x00, 0xff, 0xff, 0x0, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];

/// Zero-sized stand-in for the magic field of offline packet records.
/// Decoding consumes 16 bytes and succeeds only on the exact constant.
#[derive(Debug, Clone, Copy, Default)]
pub struct Magic;

impl Magic {
    pub fn new() -> Self {
        Magic
    }
}

impl Reader<Magic> for Magic {
    fn read(buf: &mut ByteReader) -> io::Result<Magic> {
        let mut seen = [0u8; 16];
        buf.read(&mut seen)?;

        if seen == MAGIC {
            Ok(Magic)
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "offline magic mismatch",
            ))
        }
    }
}

impl Writer for Magic {
    fn write(&self, buf: &mut ByteWriter) -> io::Result<()> {
        buf.write(&MAGIC).map(|_| ())
    }
}
