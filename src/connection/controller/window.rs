use std::collections::HashSet;

use crate::protocol::triad;

/// Number of consecutive indices a window spans. Must divide 2²⁴ so that
/// slot indexing stays stable when the index space wraps.
pub const WINDOW_SIZE: u32 = 1024;

/// Outcome of offering an item to a [`ReorderWindow`].
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion<T> {
    /// The item completed a contiguous run starting at the old window
    /// start; the run is released in order, this item first.
    Released(Vec<T>),
    /// Stored ahead of its turn; nothing can be released yet.
    Deferred,
    /// Outside the window, or the slot is already taken: an
    /// already-delivered duplicate or an impossibly-far-ahead index.
    Rejected,
}

/// A bounded reorder buffer over the 24-bit index space.
///
/// The window covers exactly [`WINDOW_SIZE`] consecutive indices
/// `[start, end)` at all times; the slot for `start` is always empty,
/// because an item arriving there is released immediately together with
/// any run buffered behind it.
///
/// With missing-tracking enabled the window also records every index below
/// the highest one seen that has not arrived yet. Draining that set is how
/// the session builds its NACKs.
///
/// All index comparisons use wrap-safe 24-bit arithmetic; a session that
/// outlives 2²⁴ carriers keeps working.
#[derive(Debug, Clone)]
pub struct ReorderWindow<T> {
    start: u32,
    slots: Vec<Option<T>>,
    missing: Option<HashSet<u32>>,
}

impl<T> ReorderWindow<T> {
    pub fn new(track_missing: bool) -> Self {
        Self::starting_at(0, track_missing)
    }

    /// A window whose next expected index is `start`. Handy for resuming
    /// mid-stream and for exercising wrap behavior.
    pub fn starting_at(start: u32, track_missing: bool) -> Self {
        let mut slots = Vec::with_capacity(WINDOW_SIZE as usize);
        slots.resize_with(WINDOW_SIZE as usize, || None);
        Self {
            start: triad::mask(start),
            slots,
            missing: if track_missing {
                Some(HashSet::new())
            } else {
                None
            },
        }
    }

    /// The next expected index; the lowest index the window will accept.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// One past the highest index the window will accept.
    /// `distance(start, end)` is always [`WINDOW_SIZE`].
    pub fn end(&self) -> u32 {
        triad::mask(self.start.wrapping_add(WINDOW_SIZE))
    }

    fn slot(order: u32) -> usize {
        (order % WINDOW_SIZE) as usize
    }

    /// Offers `item` at position `order`.
    ///
    /// At the window start the item is released at once, pulling any
    /// buffered run behind it; inside the window it is stored; everything
    /// else is rejected. Gap discovery is folded into the store: indices
    /// between the window start and a newly stored item that have never
    /// been seen join the missing set.
    pub fn put(&mut self, order: u32, item: T) -> Insertion<T> {
        let order = triad::mask(order);

        if order == self.start {
            if let Some(missing) = self.missing.as_mut() {
                // The gap this index once was is now filled; a drained
                // NACK must not ask for it again.
                missing.remove(&order);
            }
            let mut released = vec![item];
            self.advance();
            while let Some(next) = self.slots[Self::slot(self.start)].take() {
                if let Some(missing) = self.missing.as_mut() {
                    missing.remove(&self.start);
                }
                released.push(next);
                self.advance();
            }
            return Insertion::Released(released);
        }

        if triad::distance(self.start, order) >= WINDOW_SIZE {
            return Insertion::Rejected;
        }

        let slot = Self::slot(order);
        if self.slots[slot].is_some() {
            // Same index arrived twice while buffered.
            return Insertion::Rejected;
        }
        self.slots[slot] = Some(item);

        if let Some(missing) = self.missing.as_mut() {
            missing.remove(&order);
            // Walk down from the new item looking for gaps nobody has
            // recorded yet; stop at the first known index.
            let mut gap = triad::mask(order.wrapping_sub(1));
            while triad::distance(self.start, gap) < WINDOW_SIZE {
                if missing.contains(&gap) || self.slots[Self::slot(gap)].is_some() {
                    break;
                }
                missing.insert(gap);
                gap = triad::mask(gap.wrapping_sub(1));
            }
        }

        Insertion::Deferred
    }

    fn advance(&mut self) {
        self.start = triad::succ(self.start);
    }

    /// Returns the missing set and empties it; callers are expected to
    /// turn the result into a NACK. Always empty when the window was
    /// created without tracking.
    pub fn drain_missing(&mut self) -> Vec<u32> {
        match self.missing.as_mut() {
            Some(missing) => missing.drain().collect(),
            None => Vec::new(),
        }
    }

    /// The current missing set, sorted, without draining it.
    pub fn missing(&self) -> Vec<u32> {
        let mut gaps: Vec<u32> = match self.missing.as_ref() {
            Some(missing) => missing.iter().copied().collect(),
            None => Vec::new(),
        };
        gaps.sort_unstable();
        gaps
    }
}
