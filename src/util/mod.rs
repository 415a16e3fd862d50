pub mod debug;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::triad;

/// Milliseconds since the unix epoch. Used for split-pool ages, session
/// timeouts and the ping/pong timestamps.
pub fn current_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A monotonic counter over the 24-bit index space.
///
/// Sequence numbers and message indices are triads on the wire, so the
/// counter wraps at 2²⁴ rather than at the integer boundary.
#[derive(Debug, Clone, Default)]
pub struct TriadCounter {
    next: u32,
}

impl TriadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value and advances the counter.
    pub fn next(&mut self) -> u32 {
        let value = self.next;
        self.next = triad::succ(value);
        value
    }

    /// The value the next call to [`TriadCounter::next`] will return.
    pub fn peek(&self) -> u32 {
        self.next
    }
}
