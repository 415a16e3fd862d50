pub const ID_ACK: u8 = 0xc0;
pub const ID_NACK: u8 = 0xa0;

use std::io;

use binary_util::interfaces::{Reader, Writer};
use binary_util::io::{ByteReader, ByteWriter};

use super::triad;
use crate::rakcore_debug;

/// Decoded ranges longer than this are truncated; an unbounded range in a
/// hostile NACK would otherwise inflate into millions of keys.
pub const MAX_RANGE_SPAN: u32 = 512;

/// One record of an ACK set: either a single sequence or an inclusive run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Single(u32),
    Range(u32, u32),
}

/// A set of 24-bit sequence numbers, range-packed for the wire: a 16-bit
/// big-endian record count, then per record a tag byte (`0x00` range,
/// `0x01` singleton) and one or two little-endian triads.
///
/// The same codec serves ACK and NACK; the control byte ([`ID_ACK`] /
/// [`ID_NACK`]) is prepended by the sender and stripped by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AckSet {
    pub records: Vec<Record>,
}

impl AckSet {
    /// Packs a key set into records. Keys are sorted first; duplicates are
    /// dropped (a sign of a bad ack queue, so the first one warns).
    pub fn from_keys(mut keys: Vec<u32>) -> Self {
        let mut records = Vec::new();
        if keys.is_empty() {
            return Self { records };
        }
        keys.sort_unstable();

        let mut warned = false;
        let mut start = keys[0];
        let mut end = keys[0];

        for &key in &keys[1..] {
            if key == end {
                if !warned {
                    rakcore_debug!("Duplicate ack key {} while encoding", key);
                    warned = true;
                }
                continue;
            }
            if key == end + 1 {
                end = key;
                continue;
            }
            records.push(Self::run(start, end));
            start = key;
            end = key;
        }
        records.push(Self::run(start, end));

        Self { records }
    }

    fn run(start: u32, end: u32) -> Record {
        if start == end {
            Record::Single(start)
        } else {
            Record::Range(start, end)
        }
    }

    /// Flattens the records back into individual keys.
    pub fn keys(&self) -> Vec<u32> {
        let mut keys = Vec::new();
        for record in &self.records {
            match *record {
                Record::Single(key) => keys.push(key),
                Record::Range(start, end) => {
                    for key in start..=end {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Reader<AckSet> for AckSet {
    fn read(buf: &mut ByteReader) -> io::Result<AckSet> {
        let count = buf.read_u16()?;
        let mut records = Vec::with_capacity(count as usize);

        for _ in 0..count {
            match buf.read_u8()? {
                0x00 => {
                    let mut start = triad::read_le(buf)?;
                    let mut end = triad::read_le(buf)?;
                    if end < start {
                        std::mem::swap(&mut start, &mut end);
                    }
                    if end - start > MAX_RANGE_SPAN {
                        end = start + MAX_RANGE_SPAN;
                    }
                    records.push(Record::Range(start, end));
                }
                0x01 => {
                    records.push(Record::Single(triad::read_le(buf)?));
                }
                tag => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Unknown ack record tag {:#04x}", tag),
                    ));
                }
            }
        }

        Ok(AckSet { records })
    }
}

impl Writer for AckSet {
    fn write(&self, buf: &mut ByteWriter) -> io::Result<()> {
        buf.write_u16(self.records.len() as u16)?;
        for record in &self.records {
            match *record {
                Record::Single(key) => {
                    buf.write_u8(0x01)?;
                    triad::write_le(buf, key)?;
                }
                Record::Range(start, end) => {
                    buf.write_u8(0x00)?;
                    triad::write_le(buf, start)?;
                    triad::write_le(buf, end)?;
                }
            }
        }
        Ok(())
    }
}
