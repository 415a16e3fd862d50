use std::collections::{HashMap, HashSet};

use crate::connection::controller::window::{Insertion, ReorderWindow};
use crate::protocol::frame::{Frame, FramePacket};
use crate::protocol::{MAX_FRAGS, MAX_ORD_CHANS, MAX_SPLIT_POOLS, SPLIT_POOL_TTL_MS};
use crate::rakcore_debug;
use crate::util::current_epoch;

use super::{SplitAssembly, SplitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// The carrier's sequence fell outside the window: an
    /// already-delivered duplicate or a far-future sequence.
    StaleSequence,
    /// The peer opened more concurrent split groups than we allow.
    PoolExhausted,
}

/// The inbound half of the reliability engine.
///
/// Carriers pass through the sequence window (which tracks gaps for NACK
/// generation), their frames through the message window (dedup and
/// reorder of reliable frames), split frames through the assembly pools,
/// and ordered frames through one window per order channel. Whatever
/// survives lands in `ready` for the session to hand to the application.
#[derive(Debug, Clone)]
pub struct RecvQueue {
    sequences: ReorderWindow<FramePacket>,
    messages: ReorderWindow<Frame>,
    order_channels: HashMap<u8, ReorderWindow<Vec<u8>>>,
    splits: HashMap<u16, SplitAssembly>,
    /// Sequences we owe the peer an ACK for.
    ack: HashSet<u32>,
    /// Sequences we believe the peer skipped.
    nack: HashSet<u32>,
    ready: Vec<Vec<u8>>,
}

impl RecvQueue {
    pub fn new() -> Self {
        Self {
            sequences: ReorderWindow::new(true),
            messages: ReorderWindow::new(false),
            order_channels: HashMap::new(),
            splits: HashMap::new(),
            ack: HashSet::new(),
            nack: HashSet::new(),
            ready: Vec::new(),
        }
    }

    /// Feeds one decoded carrier through the engine.
    pub fn insert(&mut self, packet: FramePacket) -> Result<(), RecvError> {
        self.ack.insert(packet.sequence);

        match self.sequences.put(packet.sequence, packet) {
            Insertion::Released(carriers) => {
                for carrier in carriers {
                    for frame in carrier.frames {
                        self.handle_frame(frame)?;
                    }
                }
            }
            Insertion::Deferred => {
                // The gap below this carrier is now known; queue it for
                // the next NACK.
                for gap in self.sequences.drain_missing() {
                    self.nack.insert(gap);
                }
            }
            Insertion::Rejected => return Err(RecvError::StaleSequence),
        }

        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame) -> Result<(), RecvError> {
        if let Some(index) = frame.message_index {
            match self.messages.put(index, frame) {
                Insertion::Released(frames) => {
                    for frame in frames {
                        self.deliver(frame)?;
                    }
                }
                Insertion::Deferred => {}
                Insertion::Rejected => {
                    rakcore_debug!("Dropped duplicate reliable frame {}", index);
                }
            }
            return Ok(());
        }
        self.deliver(frame)
    }

    fn deliver(&mut self, frame: Frame) -> Result<(), RecvError> {
        if let Some(meta) = frame.split {
            if meta.count > MAX_FRAGS {
                rakcore_debug!("Split count too large, rejected {}!", meta.count);
                return Ok(());
            }
            if !self.splits.contains_key(&meta.id) {
                if self.splits.len() >= MAX_SPLIT_POOLS {
                    return Err(RecvError::PoolExhausted);
                }
                self.splits
                    .insert(meta.id, SplitAssembly::new(meta.count, current_epoch()));
            }
            let outcome = match self.splits.get_mut(&meta.id) {
                Some(pool) => pool.insert(meta.index, frame.payload),
                None => return Ok(()),
            };
            match outcome {
                Ok(Some(assembled)) => {
                    self.splits.remove(&meta.id);
                    self.ready.push(assembled);
                }
                Ok(None) => {}
                Err(SplitError::IndexOutOfBounds) | Err(SplitError::DuplicateIndex) => {
                    rakcore_debug!("Dropped bad fragment {:?} of group {}", frame.split, meta.id);
                }
            }
            return Ok(());
        }

        if frame.reliability.channel_buffered() {
            if let Some(order) = frame.order_index {
                let channel = frame.order_channel.unwrap_or_default();
                if channel >= MAX_ORD_CHANS {
                    rakcore_debug!("Dropped frame on invalid order channel {}", channel);
                    return Ok(());
                }
                let window = self
                    .order_channels
                    .entry(channel)
                    .or_insert_with(|| ReorderWindow::new(false));
                if let Insertion::Released(payloads) = window.put(order, frame.payload) {
                    self.ready.extend(payloads);
                }
                return Ok(());
            }
        }

        self.ready.push(frame.payload);
        Ok(())
    }

    /// Takes the payloads assembled so far, in delivery order.
    pub fn flush_ready(&mut self) -> Vec<Vec<u8>> {
        self.ready.drain(..).collect()
    }

    /// Empties the ACK pool: every sequence received since the last drain.
    pub fn ack_drain(&mut self) -> Vec<u32> {
        self.ack.drain().collect()
    }

    /// Empties the NACK pool: every gap discovered since the last drain.
    pub fn nack_drain(&mut self) -> Vec<u32> {
        self.nack.drain().collect()
    }

    /// Evicts split groups that have been incomplete for longer than
    /// [`SPLIT_POOL_TTL_MS`]. A peer that never finishes a group would
    /// otherwise hold its slots forever.
    pub fn prune_splits(&mut self, now: u64) {
        self.splits.retain(|id, pool| {
            let keep = pool.age(now) < SPLIT_POOL_TTL_MS;
            if !keep {
                rakcore_debug!("Evicted stale split group {}", id);
            }
            keep
        });
    }
}

impl Default for RecvQueue {
    fn default() -> Self {
        Self::new()
    }
}
