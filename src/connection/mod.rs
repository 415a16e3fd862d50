pub mod controller;
/// Necessary queues for the session: the inbound and outbound halves of
/// the reliability engine, the recovery cache and split reassembly.
pub mod queue;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use binary_util::interfaces::{Reader, Writer};
use tokio::net::UdpSocket;

use crate::error::session::SessionError;
use crate::protocol::ack::{AckSet, ID_ACK, ID_NACK};
use crate::protocol::address::{NetAddress, SystemAddresses};
use crate::protocol::frame::FramePacket;
use crate::protocol::packet::offline::{
    IncompatibleProtocolVersion, OfflinePacket, OpenConnectionReply1, OpenConnectionReply2,
    OpenConnectionRequest1, OpenConnectionRequest2,
};
use crate::protocol::packet::online::{
    ClientHandshake, ConnectedPing, ConnectedPong, ConnectionRequest, OnlinePacket,
    ServerHandshake,
};
use crate::protocol::Magic;
use crate::protocol::{DEFAULT_MTU, MTU_MAX, MTU_MIN, PROTOCOL_VERSION};
use crate::rakcore_debug;
use crate::util::current_epoch;

use self::queue::{RecvError, RecvQueue, SendQueue, StreamOptions};
use self::state::SessionStatus;

/// A session that has not heard from its peer for this long (ms) is
/// closed on the next tick.
pub const SESSION_TIMEOUT_MS: u64 = 20_000;

/// An established session pings its peer this often (ms) to keep the
/// connection alive.
pub const PING_INTERVAL_MS: u64 = 3_000;

/// The per-peer reliability engine.
///
/// A session owns everything negotiated with one remote endpoint: the
/// handshake status, the MTU, the outbound queue with its recovery cache
/// and the inbound queue with its reorder windows. All mutation happens on
/// whichever single task drives [`Session::handle_datagram`] and
/// [`Session::tick`]; the only suspension points are the socket writes.
///
/// The same type serves both roles: a listener answers the handshake
/// requests it receives, while a connecting client calls
/// [`Session::initiate`] and the replies drive the same status machine
/// from the other side.
pub struct Session {
    /// The remote endpoint this session talks to.
    pub address: SocketAddr,
    status: SessionStatus,
    /// The peer's GUID, learned during the handshake.
    remote_guid: u64,
    /// Our own GUID, offered to the peer during the handshake.
    local_guid: u64,
    mtu: u16,
    start_time: u64,
    last_recv: u64,
    last_ping: u64,
    send: SendQueue,
    recv: RecvQueue,
}

impl Session {
    pub fn new(socket: Arc<UdpSocket>, address: SocketAddr, local_guid: u64) -> Self {
        let now = current_epoch();
        Self {
            address,
            status: SessionStatus::Fresh,
            remote_guid: 0,
            local_guid,
            mtu: DEFAULT_MTU,
            start_time: now,
            last_recv: now,
            last_ping: now,
            send: SendQueue::new(DEFAULT_MTU, socket, address),
            recv: RecvQueue::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn remote_guid(&self) -> u64 {
        self.remote_guid
    }

    /// Milliseconds since this session was created.
    pub fn uptime(&self) -> u64 {
        current_epoch().saturating_sub(self.start_time)
    }

    pub fn close(&mut self) {
        self.status = SessionStatus::Closed;
    }

    /// Client side: opens the handshake by probing the peer with the
    /// first open-connection request. The replies that come back drive
    /// the rest of the exchange through [`Session::handle_datagram`].
    pub async fn initiate(&mut self) -> Result<(), SessionError> {
        let request = OfflinePacket::OpenConnectionRequest1(OpenConnectionRequest1 {
            protocol: PROTOCOL_VERSION,
            mtu: self.mtu,
        });
        self.status = SessionStatus::HandshakeStage1;
        self.send_offline(request).await
    }

    /// Queues an application payload for the next tick's flush.
    pub fn queue_stream(&mut self, stream: &[u8], options: StreamOptions) {
        self.send.queue_stream(stream, options);
    }

    /// Encapsulates and transmits an application payload immediately.
    pub async fn send_stream(
        &mut self,
        stream: &[u8],
        options: StreamOptions,
    ) -> Result<(), SessionError> {
        self.send.send_stream(stream, options).await
    }

    /// Feeds one raw datagram from the socket through the engine and
    /// returns the application payloads it released, in order.
    ///
    /// Malformed datagrams are dropped here without escalation; only
    /// socket failures and resource faults surface as errors.
    pub async fn handle_datagram(&mut self, datagram: &[u8]) -> Result<Vec<Vec<u8>>, SessionError> {
        if self.status.is_closed() {
            return Err(SessionError::Closed);
        }
        if datagram.is_empty() {
            return Ok(Vec::new());
        }
        self.last_recv = current_epoch();

        match datagram[0] {
            0x80..=0x8d => self.handle_frame_set(&datagram[1..]).await,
            ID_ACK => {
                self.handle_ack(&datagram[1..]);
                Ok(Vec::new())
            }
            ID_NACK => {
                self.handle_nack(&datagram[1..]).await?;
                Ok(Vec::new())
            }
            _ => {
                self.handle_offline(datagram).await?;
                Ok(Vec::new())
            }
        }
    }

    /// Runs the periodic upkeep: ACK then NACK go out (both pools drain in
    /// the process, so nothing is re-sent next tick), the send queue is
    /// flushed, stale split groups are evicted and inactivity is checked.
    pub async fn tick(&mut self) -> Result<(), SessionError> {
        if self.status.is_closed() {
            return Ok(());
        }

        let now = current_epoch();
        if self.last_recv + SESSION_TIMEOUT_MS <= now {
            rakcore_debug!("[{}] Session timed out", self.address);
            self.status = SessionStatus::Closed;
            return Ok(());
        }

        self.recv.prune_splits(now);

        let acks = self.recv.ack_drain();
        if !acks.is_empty() {
            self.send_control(ID_ACK, acks).await?;
        }
        let nacks = self.recv.nack_drain();
        if !nacks.is_empty() {
            self.send_control(ID_NACK, nacks).await?;
        }

        if self.status.is_established() && self.last_ping + PING_INTERVAL_MS <= now {
            self.last_ping = now;
            let ping = OnlinePacket::ConnectedPing(ConnectedPing {
                ping_time: now as i64,
            });
            self.send_online(ping).await?;
        }

        self.send.flush().await
    }

    async fn send_control(&mut self, id: u8, keys: Vec<u32>) -> Result<(), SessionError> {
        let set = AckSet::from_keys(keys);
        let body = set.write_to_bytes()?;
        let mut datagram = Vec::with_capacity(body.as_slice().len() + 1);
        datagram.push(id);
        datagram.extend_from_slice(body.as_slice());
        self.send.send_raw(&datagram).await
    }

    async fn handle_frame_set(&mut self, body: &[u8]) -> Result<Vec<Vec<u8>>, SessionError> {
        let packet = match FramePacket::read_from_slice(body) {
            Ok(packet) => packet,
            Err(e) => {
                rakcore_debug!("[{}] Undecodable frame set: {}", self.address, e);
                return Ok(Vec::new());
            }
        };

        match self.recv.insert(packet) {
            Ok(()) => {}
            Err(RecvError::StaleSequence) => {
                // Duplicate carrier; the ACK pool still answers it.
                return Ok(Vec::new());
            }
            Err(RecvError::PoolExhausted) => {
                self.status = SessionStatus::Closed;
                return Err(SessionError::SplitPoolExhausted);
            }
        }

        let mut delivered = Vec::new();
        for payload in self.recv.flush_ready() {
            if let Some(payload) = self.handle_online(payload).await? {
                delivered.push(payload);
            }
        }
        Ok(delivered)
    }

    fn handle_ack(&mut self, body: &[u8]) {
        match AckSet::read_from_slice(body) {
            Ok(set) => self.send.ack(&set.keys()),
            Err(e) => rakcore_debug!("[{}] Undecodable ack: {}", self.address, e),
        }
    }

    async fn handle_nack(&mut self, body: &[u8]) -> Result<(), SessionError> {
        match AckSet::read_from_slice(body) {
            Ok(set) => self.send.nack(&set.keys()).await,
            Err(e) => {
                rakcore_debug!("[{}] Undecodable nack: {}", self.address, e);
                Ok(())
            }
        }
    }

    /// Handles a payload released by the inbound queue. Connection-control
    /// packets are consumed here; anything else belongs to the
    /// application and is returned.
    async fn handle_online(&mut self, payload: Vec<u8>) -> Result<Option<Vec<u8>>, SessionError> {
        let packet = match OnlinePacket::read_from_slice(&payload) {
            Ok(packet) => packet,
            Err(_) => return Ok(Some(payload)),
        };

        match packet {
            OnlinePacket::ConnectedPing(ping) => {
                let pong = OnlinePacket::ConnectedPong(ConnectedPong {
                    ping_time: ping.ping_time,
                    pong_time: current_epoch() as i64,
                });
                self.send_online(pong).await?;
            }
            OnlinePacket::ConnectionRequest(request) => {
                let client_address = match NetAddress::from_socket(self.address) {
                    Some(addr) => addr,
                    None => {
                        rakcore_debug!("[{}] Peer is not IPv4, dropping request", self.address);
                        return Ok(None);
                    }
                };
                self.remote_guid = request.client_guid;
                let handshake = OnlinePacket::ServerHandshake(ServerHandshake {
                    client_address,
                    system_index: 0,
                    system_addresses: SystemAddresses,
                    ping_time: request.ping_time,
                    pong_time: current_epoch() as i64,
                });
                self.send_online(handshake).await?;
                self.status = SessionStatus::Established;
            }
            OnlinePacket::ClientHandshake(_) => {
                // The peer confirmed the handshake; nothing to answer.
            }
            OnlinePacket::ConnectedPong(_) => {}
            OnlinePacket::ServerHandshake(handshake) => {
                // Client side: the peer accepted our connection request.
                let confirm = OnlinePacket::ClientHandshake(ClientHandshake {
                    client_address: handshake.client_address,
                    system_addresses: SystemAddresses,
                    ping_time: handshake.ping_time,
                    pong_time: current_epoch() as i64,
                });
                self.send_online(confirm).await?;
                self.status = SessionStatus::Established;
            }
            OnlinePacket::ClientDisconnect(_) => {
                rakcore_debug!("[{}] Peer disconnected", self.address);
                self.status = SessionStatus::Closed;
            }
        }
        Ok(None)
    }

    async fn send_online(&mut self, packet: OnlinePacket) -> Result<(), SessionError> {
        let body = packet.write_to_bytes()?;
        self.send
            .send_stream(
                body.as_slice(),
                StreamOptions {
                    message_index: false,
                    order_channel: true,
                },
            )
            .await
    }

    /// Handles the pre-frame handshake packets addressed to this session.
    async fn handle_offline(&mut self, datagram: &[u8]) -> Result<(), SessionError> {
        let packet = match OfflinePacket::read_from_slice(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                rakcore_debug!("[{}] Unknown datagram dropped: {}", self.address, e);
                return Ok(());
            }
        };

        match packet {
            OfflinePacket::OpenConnectionRequest1(request) => {
                if request.protocol != PROTOCOL_VERSION {
                    rakcore_debug!(
                        "[{}] Protocol version {} not supported",
                        self.address,
                        request.protocol
                    );
                    let reply = OfflinePacket::IncompatibleProtocolVersion(
                        IncompatibleProtocolVersion {
                            protocol: PROTOCOL_VERSION,
                            magic: Magic::new(),
                            server_guid: self.local_guid,
                        },
                    );
                    return self.send_offline(reply).await;
                }

                self.adopt_mtu(request.mtu);
                if self.status == SessionStatus::Fresh {
                    self.status = SessionStatus::HandshakeStage1;
                }
                let reply = OfflinePacket::OpenConnectionReply1(OpenConnectionReply1 {
                    magic: Magic::new(),
                    server_guid: self.local_guid,
                    security: false,
                    mtu: self.mtu,
                });
                self.send_offline(reply).await
            }
            OfflinePacket::OpenConnectionRequest2(request) => {
                let client_address = match NetAddress::from_socket(self.address) {
                    Some(addr) => addr,
                    None => {
                        rakcore_debug!("[{}] Peer is not IPv4, dropping request", self.address);
                        return Ok(());
                    }
                };
                self.adopt_mtu(request.mtu);
                self.remote_guid = request.client_guid;
                self.status = SessionStatus::HandshakeStage2;
                let reply = OfflinePacket::OpenConnectionReply2(OpenConnectionReply2 {
                    magic: Magic::new(),
                    server_guid: self.local_guid,
                    client_address,
                    mtu: self.mtu,
                    security: false,
                });
                self.send_offline(reply).await
            }
            OfflinePacket::OpenConnectionReply1(reply) => {
                // Client side: stage one accepted, confirm the endpoint
                // and MTU.
                let address = match NetAddress::from_socket(self.address) {
                    Some(addr) => addr,
                    None => {
                        rakcore_debug!("[{}] Peer is not IPv4, dropping reply", self.address);
                        return Ok(());
                    }
                };
                self.adopt_mtu(reply.mtu);
                self.remote_guid = reply.server_guid;
                self.status = SessionStatus::HandshakeStage2;
                let request = OfflinePacket::OpenConnectionRequest2(OpenConnectionRequest2 {
                    magic: Magic::new(),
                    address,
                    mtu: self.mtu,
                    client_guid: self.local_guid,
                });
                self.send_offline(request).await
            }
            OfflinePacket::OpenConnectionReply2(reply) => {
                // Client side: the offline stage is done; the connection
                // request rides inside the first frame.
                self.adopt_mtu(reply.mtu);
                let request = OnlinePacket::ConnectionRequest(ConnectionRequest {
                    client_guid: self.local_guid,
                    ping_time: current_epoch() as i64,
                    security: false,
                });
                self.send_online(request).await
            }
            OfflinePacket::IncompatibleProtocolVersion(reply) => {
                rakcore_debug!(
                    "[{}] Peer speaks protocol {}, closing",
                    self.address,
                    reply.protocol
                );
                self.status = SessionStatus::Closed;
                Ok(())
            }
            other => {
                rakcore_debug!("[{}] Ignored offline packet {:?}", self.address, other);
                Ok(())
            }
        }
    }

    async fn send_offline(&mut self, packet: OfflinePacket) -> Result<(), SessionError> {
        let body = packet.write_to_bytes()?;
        self.send.send_raw(body.as_slice()).await
    }

    fn adopt_mtu(&mut self, mtu: u16) {
        self.mtu = mtu.clamp(MTU_MIN, MTU_MAX);
        self.send.set_mtu(self.mtu);
    }
}
