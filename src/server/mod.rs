use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use binary_util::interfaces::{Reader, Writer};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::time::{interval, Duration};

use crate::connection::Session;
use crate::error::server::ServerError;
use crate::protocol::packet::offline::{OfflinePacket, UnconnectedPing, UnconnectedPong};
use crate::protocol::types::FixedString;
use crate::protocol::Magic;
use crate::protocol::ID_UNCONNECTED_PING;
use crate::rakcore_debug;

/// Cadence of the session upkeep loop (ms).
const TICK_INTERVAL_MS: u64 = 50;

/// Buffered application payloads before the dispatch loop backpressures.
const INCOMING_CAPACITY: usize = 256;

/// Largest datagram the dispatch loop will accept.
const RECV_BUFFER_LEN: usize = 2048;

/// Owns the UDP socket and fans datagrams out to per-peer [`Session`]s.
///
/// One task runs the whole dispatch loop, so every session is mutated by
/// exactly one logical writer; sessions share nothing but the socket,
/// which the kernel keeps safe for concurrent sends.
pub struct Listener {
    /// The local address the socket ended up bound to.
    pub address: SocketAddr,
    guid: u64,
    closed: Arc<AtomicBool>,
    incoming: Receiver<(SocketAddr, Vec<u8>)>,
}

impl Listener {
    /// Binds the socket and spawns the dispatch loop. `server_name` is
    /// what unconnected pings are answered with.
    pub async fn bind(address: SocketAddr, server_name: &str) -> Result<Self, ServerError> {
        let socket = match UdpSocket::bind(address).await {
            Ok(socket) => Arc::new(socket),
            Err(_) => return Err(ServerError::AddrBindErr),
        };
        let local = match socket.local_addr() {
            Ok(addr) => addr,
            Err(_) => return Err(ServerError::AddrBindErr),
        };

        let guid: u64 = rand::random();
        let closed = Arc::new(AtomicBool::new(false));
        let (incoming_tx, incoming_rx) = channel(INCOMING_CAPACITY);

        tokio::spawn(Self::run(
            socket,
            guid,
            server_name.to_string(),
            incoming_tx,
            closed.clone(),
        ));

        Ok(Self {
            address: local,
            guid,
            closed,
            incoming: incoming_rx,
        })
    }

    pub fn guid(&self) -> u64 {
        self.guid
    }

    /// The next application payload delivered by any session, with the
    /// peer it came from. Returns `None` once the listener is closed and
    /// drained.
    pub async fn recv(&mut self) -> Option<(SocketAddr, Vec<u8>)> {
        self.incoming.recv().await
    }

    /// Stops the dispatch loop. Sessions are dropped; no farewell packets
    /// are sent and nothing unacknowledged is retried.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    async fn run(
        socket: Arc<UdpSocket>,
        guid: u64,
        server_name: String,
        incoming: Sender<(SocketAddr, Vec<u8>)>,
        closed: Arc<AtomicBool>,
    ) {
        let mut sessions: HashMap<SocketAddr, Session> = HashMap::new();
        let mut ticker = interval(Duration::from_millis(TICK_INTERVAL_MS));
        let mut buf = [0u8; RECV_BUFFER_LEN];

        loop {
            if closed.load(Ordering::Relaxed) {
                break;
            }

            tokio::select! {
                received = socket.recv_from(&mut buf) => {
                    let (len, address) = match received {
                        Ok(pair) => pair,
                        Err(e) => {
                            rakcore_debug!("Socket recv failed: {}", e);
                            continue;
                        }
                    };
                    let datagram = &buf[..len];
                    if datagram.is_empty() {
                        continue;
                    }

                    // Unconnected pings are stateless; answer them without
                    // creating a session.
                    if datagram[0] == ID_UNCONNECTED_PING {
                        Self::pong(&socket, guid, &server_name, address, datagram).await;
                        continue;
                    }

                    let session = sessions
                        .entry(address)
                        .or_insert_with(|| Session::new(socket.clone(), address, guid));

                    match session.handle_datagram(datagram).await {
                        Ok(payloads) => {
                            for payload in payloads {
                                if incoming.send((address, payload)).await.is_err() {
                                    closed.store(true, Ordering::Relaxed);
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            rakcore_debug!("[{}] Session fault: {:?}", address, e);
                        }
                    }

                    if sessions
                        .get(&address)
                        .map(|s| s.status().is_closed())
                        .unwrap_or(false)
                    {
                        sessions.remove(&address);
                    }
                }
                _ = ticker.tick() => {
                    for session in sessions.values_mut() {
                        if let Err(e) = session.tick().await {
                            rakcore_debug!("[{}] Tick fault: {:?}", session.address, e);
                        }
                    }
                    sessions.retain(|_, session| !session.status().is_closed());
                }
            }
        }
    }

    async fn pong(
        socket: &Arc<UdpSocket>,
        guid: u64,
        server_name: &str,
        address: SocketAddr,
        datagram: &[u8],
    ) {
        let ping = match UnconnectedPing::read_from_slice(&datagram[1..]) {
            Ok(ping) => ping,
            Err(e) => {
                rakcore_debug!("[{}] Undecodable ping: {}", address, e);
                return;
            }
        };

        let pong = OfflinePacket::UnconnectedPong(UnconnectedPong {
            ping_id: ping.ping_id,
            server_guid: guid,
            magic: Magic::new(),
            server_name: FixedString::from(server_name),
        });
        if let Ok(body) = pong.write_to_bytes() {
            if let Err(e) = socket.send_to(body.as_slice(), address).await {
                rakcore_debug!("[{}] Failed to answer ping: {}", address, e);
            }
        }
    }
}
