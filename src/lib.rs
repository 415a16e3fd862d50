//! A reliability and ordering engine for RakNet-style UDP sessions.
//!
//! A raw UDP socket delivers datagrams out of order, with losses and
//! duplicates. This crate layers a session abstraction on top of it: payloads
//! of arbitrary size are fragmented to fit the negotiated MTU, carried in
//! sequenced frame sets, de-duplicated and re-ordered on arrival, and
//! recovered through the ACK/NACK protocol when a carrier goes missing.
//!
//! The [`Listener`] owns the socket and hands inbound traffic to one
//! [`Session`] per remote peer; each session is driven by a single task.
pub mod connection;
pub mod error;
pub mod protocol;
pub mod server;
pub mod util;

pub use connection::Session;
pub use server::Listener;
