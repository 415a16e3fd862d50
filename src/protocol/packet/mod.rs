//! The packet catalogue.
//!
//! Offline packets travel as bare datagrams before a session is
//! established; online packets travel inside encapsulated frames once the
//! reliability layer is up. Both enums encode their id byte through their
//! discriminant, so `read_from_slice` on the enum consumes the full
//! datagram (or frame payload) including the leading id.

/// The protocol used before a session exists: pings and the
/// open-connection handshake.
pub mod offline;

/// The protocol used inside established frames: connected pings, the
/// connection request handshake, disconnects.
pub mod online;
