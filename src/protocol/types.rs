use binary_util::interfaces::{Reader, Writer};
use binary_util::io::{ByteReader, ByteWriter};

/// The old-style string wire type: a signed 16-bit big-endian length
/// followed by that many bytes. The unconnected pong carries the server
/// name in this form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FixedString(pub String);

impl Reader<FixedString> for FixedString {
    fn read(buf: &mut ByteReader) -> std::io::Result<Self> {
        let len = buf.read_i16()?;
        if len < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Negative string length",
            ));
        }
        let mut bytes = vec![0u8; len as usize];
        if len > 0 {
            buf.read(&mut bytes)?;
        }
        match String::from_utf8(bytes) {
            Ok(s) => Ok(FixedString(s)),
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "String is not valid utf-8",
            )),
        }
    }
}

impl Writer for FixedString {
    fn write(&self, buf: &mut ByteWriter) -> std::io::Result<()> {
        buf.write_i16(self.0.len() as i16)?;
        buf.write(self.0.as_bytes())?;
        Ok(())
    }
}

impl From<&str> for FixedString {
    fn from(s: &str) -> Self {
        FixedString(s.to_string())
    }
}

impl From<String> for FixedString {
    fn from(s: String) -> Self {
        FixedString(s)
    }
}

impl AsRef<str> for FixedString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
