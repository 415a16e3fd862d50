//! Debug output, compiled out unless the matching feature is enabled.
//!
//! Lines are routed through a [`Channel`] so engine events and raw
//! datagram dumps can be switched on independently: the `debug` feature
//! enables [`Channel::Session`], `debug_buffers` enables
//! [`Channel::Wire`].

/// What a debug line is about. The channel picks the feature gate and
/// the tag the line is printed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Engine events: handshake progress, dropped input, faults.
    Session,
    /// Raw datagram traffic.
    Wire,
}

impl Channel {
    /// Whether lines on this channel are compiled in.
    pub fn enabled(self) -> bool {
        match self {
            Channel::Session => cfg!(feature = "debug"),
            Channel::Wire => cfg!(feature = "debug_buffers"),
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Channel::Session => "session",
            Channel::Wire => "wire",
        }
    }
}

/// Prints one debug line. Callers go through [`rakcore_debug!`], which
/// checks [`Channel::enabled`] first.
///
/// [`rakcore_debug!`]: crate::rakcore_debug
pub fn emit(channel: Channel, message: std::fmt::Arguments<'_>) {
    println!("[rak-core:{}] {}", channel.tag(), message);
}

/// Debug logging for the crate. The plain form goes to
/// [`Channel::Session`]; prefix the arguments with `wire:` to dump
/// datagram traffic on [`Channel::Wire`] instead.
///
/// [`Channel::Session`]: crate::util::debug::Channel::Session
/// [`Channel::Wire`]: crate::util::debug::Channel::Wire
#[macro_export]
macro_rules! rakcore_debug {
    (wire: $($t: tt)*) => {
        if $crate::util::debug::Channel::Wire.enabled() {
            $crate::util::debug::emit($crate::util::debug::Channel::Wire, format_args!($($t)*));
        }
    };
    ($($t: tt)*) => {
        if $crate::util::debug::Channel::Session.enabled() {
            $crate::util::debug::emit($crate::util::debug::Channel::Session, format_args!($($t)*));
        }
    };
}
