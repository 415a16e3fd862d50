use std::io;

use binary_util::interfaces::{Reader, Writer};
use binary_util::io::{ByteReader, ByteWriter};

use super::reliability::Reliability;
use super::triad;

/// Split bookkeeping for a fragmented frame: which group it belongs to and
/// where in the group it sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitMeta {
    /// The total number of fragments in the group.
    pub count: u32,
    /// The identifier shared by every fragment of the group.
    pub id: u16,
    /// The position of this fragment within the group.
    pub index: u32,
}

/// One encapsulated frame: a reliability tier, the indices that tier calls
/// for, optional split bookkeeping, and the payload.
///
/// The header layout is decided entirely by the tier and the split flag:
///
/// | tier  | header | if split |
/// |-------|--------|----------|
/// | 0, 5  | 3      | +10      |
/// | 1     | 7      | +10      |
/// | 2     | 6      | +10      |
/// | 3, 4  | 10     | +10      |
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub reliability: Reliability,
    /// Present on tiers 2, 3 and 4.
    pub message_index: Option<u32>,
    /// Present on tiers 1, 3 and 4.
    pub order_index: Option<u32>,
    /// Present on tiers 1, 3 and 4.
    pub order_channel: Option<u8>,
    pub split: Option<SplitMeta>,
    pub payload: Vec<u8>,
}

/// The split flag, bit 4 of the frame flag byte.
const FLAG_SPLIT: u8 = 0x10;

impl Frame {
    pub fn new(reliability: Reliability, payload: Vec<u8>) -> Self {
        Self {
            reliability,
            message_index: None,
            order_index: None,
            order_channel: None,
            split: None,
            payload,
        }
    }

    /// Encoded header length in bytes, per the tier table.
    pub fn header_len(&self) -> usize {
        let mut len = 3;
        if self.reliability.message_indexed() {
            len += 3;
        }
        if self.reliability.ordered() {
            len += 4;
        }
        if self.split.is_some() {
            len += 10;
        }
        len
    }

    /// Encoded length in bytes, header included.
    pub fn len(&self) -> usize {
        self.header_len() + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl Reader<Frame> for Frame {
    fn read(buf: &mut ByteReader) -> io::Result<Frame> {
        let flags = buf.read_u8()?;
        let reliability = match Reliability::from_flags(flags) {
            Some(r) => r,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Unknown reliability tier in flags {:#04x}", flags),
                ));
            }
        };

        // The length field counts bits; partial bytes round up.
        let bits = buf.read_u16()?;
        let length = ((bits as usize) + 7) >> 3;

        let message_index = if reliability.message_indexed() {
            Some(triad::read_le(buf)?)
        } else {
            None
        };

        let (order_index, order_channel) = if reliability.ordered() {
            (Some(triad::read_le(buf)?), Some(buf.read_u8()?))
        } else {
            (None, None)
        };

        let split = if flags & FLAG_SPLIT != 0 {
            Some(SplitMeta {
                count: buf.read_u32()?,
                id: buf.read_u16()?,
                index: buf.read_u32()?,
            })
        } else {
            None
        };

        let mut payload = vec![0u8; length];
        if length > 0 {
            buf.read(&mut payload)?;
        }

        Ok(Frame {
            reliability,
            message_index,
            order_index,
            order_channel,
            split,
            payload,
        })
    }
}

impl Writer for Frame {
    fn write(&self, buf: &mut ByteWriter) -> io::Result<()> {
        let mut flags = self.reliability.to_flags();
        if self.split.is_some() {
            flags |= FLAG_SPLIT;
        }
        buf.write_u8(flags)?;
        buf.write_u16((self.payload.len() as u16) << 3)?;

        if self.reliability.message_indexed() {
            triad::write_le(buf, self.message_index.unwrap_or_default())?;
        }
        if self.reliability.ordered() {
            triad::write_le(buf, self.order_index.unwrap_or_default())?;
            buf.write_u8(self.order_channel.unwrap_or_default())?;
        }
        if let Some(meta) = self.split {
            buf.write_u32(meta.count)?;
            buf.write_u16(meta.id)?;
            buf.write_u32(meta.index)?;
        }

        buf.write(&self.payload)?;
        Ok(())
    }
}

/// A carrier datagram: a little-endian sequence triad followed by frames
/// until the end of input. We ack and nack these by their sequence.
///
/// The outer tag byte is not part of this codec; dispatchers strip it
/// before decoding and senders prepend [`ID_FRAME_SET`].
///
/// [`ID_FRAME_SET`]: crate::protocol::ID_FRAME_SET
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FramePacket {
    pub sequence: u32,
    pub frames: Vec<Frame>,
}

impl FramePacket {
    pub fn new(sequence: u32, frames: Vec<Frame>) -> Self {
        Self { sequence, frames }
    }
}

impl Reader<FramePacket> for FramePacket {
    fn read(buf: &mut ByteReader) -> io::Result<FramePacket> {
        let sequence = triad::read_le(buf)?;
        let mut frames = Vec::new();

        while !buf.as_slice().is_empty() {
            let frame = Frame::read(buf)?;
            // A zero-length frame ends the list. Nukkit and MiNET emit this
            // terminator; it is not a delivered frame.
            if frame.payload.is_empty() {
                break;
            }
            frames.push(frame);
        }

        Ok(FramePacket { sequence, frames })
    }
}

impl Writer for FramePacket {
    fn write(&self, buf: &mut ByteWriter) -> io::Result<()> {
        triad::write_le(buf, self.sequence)?;
        for frame in &self.frames {
            frame.write(buf)?;
        }
        Ok(())
    }
}
