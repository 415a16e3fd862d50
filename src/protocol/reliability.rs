/// The reliability tier of an encapsulated frame, stored in the top three
/// bits of the frame's flag byte.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reliability {
    /// Fire and forget.
    Unreliable = 0,
    /// Unreliable, but carries an order index so stale data can be skipped.
    UnreliableSeq = 1,
    /// Reliable: carries a message index for dedup and reorder.
    Reliable = 2,
    /// Reliable **AND** ordered within a channel.
    ReliableOrd = 3,
    /// Reliable and sequenced within a channel.
    ReliableSeq = 4,
    /// Unreliable with a local ack receipt; carries no indices on the wire.
    UnreliableAckReceipt = 5,
}

impl Reliability {
    /// Extracts the tier from a frame flag byte. Tiers 6 and 7 are not
    /// part of this protocol and decode as `None`.
    pub fn from_flags(flags: u8) -> Option<Self> {
        match flags >> 5 {
            0 => Some(Reliability::Unreliable),
            1 => Some(Reliability::UnreliableSeq),
            2 => Some(Reliability::Reliable),
            3 => Some(Reliability::ReliableOrd),
            4 => Some(Reliability::ReliableSeq),
            5 => Some(Reliability::UnreliableAckReceipt),
            _ => None,
        }
    }

    pub fn to_flags(self) -> u8 {
        (self as u8) << 5
    }

    /// Whether frames of this tier are retransmitted when lost.
    pub fn is_reliable(self) -> bool {
        matches!(
            self,
            Self::Reliable | Self::ReliableOrd | Self::ReliableSeq
        )
    }

    /// Whether the frame carries a message index (tiers 2, 3 and 4).
    /// These frames are eligible for de-duplication and reordering.
    pub fn message_indexed(self) -> bool {
        matches!(
            self,
            Self::Reliable | Self::ReliableOrd | Self::ReliableSeq
        )
    }

    /// Whether the frame carries an order index and channel (tiers 1, 3
    /// and 4).
    pub fn ordered(self) -> bool {
        matches!(
            self,
            Self::UnreliableSeq | Self::ReliableOrd | Self::ReliableSeq
        )
    }

    /// Whether inbound frames of this tier are buffered per order channel
    /// until their index is contiguous. Tier 1 is unreliable and passes
    /// through undelayed.
    pub fn channel_buffered(self) -> bool {
        matches!(self, Self::ReliableOrd | Self::ReliableSeq)
    }
}
