//! Error types, split by the area they occur in.
//!
//! Wire-level failures (short reads, bad tags, unknown reliability tiers)
//! stay `std::io::Error` at the codec boundary; the enums here cover the
//! session engine and the listener.
pub mod server;
pub mod session;
