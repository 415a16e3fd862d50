use std::net::Ipv4Addr;
use std::sync::Arc;

use binary_util::interfaces::{Reader, Writer};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration};

use rak_core::connection::queue::{RecvQueue, StreamOptions};
use rak_core::connection::state::SessionStatus;
use rak_core::protocol::ack::{AckSet, ID_ACK, ID_NACK};
use rak_core::protocol::address::NetAddress;
use rak_core::protocol::frame::{Frame, FramePacket};
use rak_core::protocol::packet::offline::{
    OfflinePacket, OpenConnectionReply1, OpenConnectionReply2, OpenConnectionRequest1,
    OpenConnectionRequest2,
};
use rak_core::protocol::packet::online::{
    ClientDisconnect, ConnectedPing, ConnectedPong, ConnectionRequest, OnlinePacket,
};
use rak_core::protocol::reliability::Reliability;
use rak_core::protocol::{Magic, ID_FRAME_SET, PROTOCOL_VERSION};
use rak_core::Session;

async fn pair() -> (Session, UdpSocket) {
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_addr = peer.local_addr().unwrap();
    let session = Session::new(Arc::new(socket), peer_addr, 0x00bd_c0de);
    (session, peer)
}

async fn recv_datagram(peer: &UdpSocket) -> Vec<u8> {
    let mut buf = [0u8; 2048];
    let (len, _) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
        .await
        .expect("timed out waiting for a datagram")
        .expect("socket error");
    buf[..len].to_vec()
}

async fn silent(peer: &UdpSocket) -> bool {
    let mut buf = [0u8; 2048];
    timeout(Duration::from_millis(200), peer.recv_from(&mut buf))
        .await
        .is_err()
}

fn carrier(sequence: u32, frame: Frame) -> Vec<u8> {
    let packet = FramePacket::new(sequence, vec![frame]);
    let body = packet.write_to_bytes().unwrap();
    let mut out = vec![ID_FRAME_SET];
    out.extend_from_slice(body.as_slice());
    out
}

fn control(id: u8, keys: Vec<u32>) -> Vec<u8> {
    let body = AckSet::from_keys(keys).write_to_bytes().unwrap();
    let mut out = vec![id];
    out.extend_from_slice(body.as_slice());
    out
}

fn online_frame(message_index: u32, packet: &OnlinePacket) -> Frame {
    let mut frame = Frame::new(
        Reliability::Reliable,
        packet.write_to_bytes().unwrap().as_slice().to_vec(),
    );
    frame.message_index = Some(message_index);
    frame
}

#[tokio::test]
async fn split_stream_reassembles_on_the_peer() {
    let (mut session, peer) = pair().await;

    let payload: Vec<u8> = (0..4000u32).map(|i| (i % 251) as u8).collect();
    session
        .send_stream(
            &payload,
            StreamOptions {
                message_index: true,
                order_channel: false,
            },
        )
        .await
        .unwrap();

    let mut assembler = RecvQueue::new();
    let mut assembled = None;
    while assembled.is_none() {
        let datagram = recv_datagram(&peer).await;
        assert!(matches!(datagram[0], 0x80..=0x8d));
        let packet = FramePacket::read_from_slice(&datagram[1..]).unwrap();
        assert!(packet.frames.iter().all(|f| f.len() + 4 <= session.mtu() as usize));
        assembler.insert(packet).unwrap();

        let mut ready = assembler.flush_ready();
        if !ready.is_empty() {
            assembled = Some(ready.remove(0));
        }
    }

    assert_eq!(assembled.unwrap(), payload);
}

#[tokio::test]
async fn nack_triggers_exactly_one_retransmit() {
    let (mut session, peer) = pair().await;

    session
        .send_stream(
            b"hello world",
            StreamOptions {
                message_index: false,
                order_channel: true,
            },
        )
        .await
        .unwrap();

    let first = recv_datagram(&peer).await;
    let original = FramePacket::read_from_slice(&first[1..]).unwrap();
    assert_eq!(original.sequence, 0);

    // the peer claims it never saw sequence 0
    session
        .handle_datagram(&control(ID_NACK, vec![0]))
        .await
        .unwrap();
    let second = recv_datagram(&peer).await;
    let resent = FramePacket::read_from_slice(&second[1..]).unwrap();
    assert_eq!(resent.sequence, 1);
    assert_eq!(resent.frames, original.frames);

    // the recovery entry was consumed; the same nack recovers nothing
    session
        .handle_datagram(&control(ID_NACK, vec![0]))
        .await
        .unwrap();
    assert!(silent(&peer).await);

    // a nack for a sequence that never existed is ignored too
    session
        .handle_datagram(&control(ID_NACK, vec![99]))
        .await
        .unwrap();
    assert!(silent(&peer).await);
}

#[tokio::test]
async fn ack_clears_the_recovery_cache() {
    let (mut session, peer) = pair().await;

    session
        .send_stream(
            b"payload",
            StreamOptions {
                message_index: false,
                order_channel: true,
            },
        )
        .await
        .unwrap();
    let _ = recv_datagram(&peer).await;

    session
        .handle_datagram(&control(ID_ACK, vec![0]))
        .await
        .unwrap();

    // acknowledged carriers are gone; a later nack cannot resurrect them
    session
        .handle_datagram(&control(ID_NACK, vec![0]))
        .await
        .unwrap();
    assert!(silent(&peer).await);
}

#[tokio::test]
async fn sequence_gaps_are_nacked_and_recovered() {
    let (mut session, peer) = pair().await;

    let delivered = session
        .handle_datagram(&carrier(
            0,
            Frame::new(Reliability::Unreliable, vec![0xfe, 1]),
        ))
        .await
        .unwrap();
    assert_eq!(delivered, vec![vec![0xfe, 1]]);

    // sequence 1 goes missing
    let delivered = session
        .handle_datagram(&carrier(
            2,
            Frame::new(Reliability::Unreliable, vec![0xfe, 2]),
        ))
        .await
        .unwrap();
    assert!(delivered.is_empty());

    session.tick().await.unwrap();

    let ack = recv_datagram(&peer).await;
    assert_eq!(ack[0], ID_ACK);
    let mut acked = AckSet::read_from_slice(&ack[1..]).unwrap().keys();
    acked.sort_unstable();
    assert_eq!(acked, vec![0, 2]);

    let nack = recv_datagram(&peer).await;
    assert_eq!(nack[0], ID_NACK);
    assert_eq!(AckSet::read_from_slice(&nack[1..]).unwrap().keys(), vec![1]);

    // the retransmit arrives; both buffered payloads release in order
    let delivered = session
        .handle_datagram(&carrier(
            1,
            Frame::new(Reliability::Unreliable, vec![0xfe, 3]),
        ))
        .await
        .unwrap();
    assert_eq!(delivered, vec![vec![0xfe, 3], vec![0xfe, 2]]);

    // pools were cleared on send: the next tick acks only the new arrival
    session.tick().await.unwrap();
    let ack = recv_datagram(&peer).await;
    assert_eq!(ack[0], ID_ACK);
    assert_eq!(AckSet::read_from_slice(&ack[1..]).unwrap().keys(), vec![1]);
    assert!(silent(&peer).await);
}

#[tokio::test]
async fn handshake_walks_the_status_machine() {
    let (mut session, peer) = pair().await;
    assert_eq!(session.status(), SessionStatus::Fresh);

    // stage 1: protocol version + padded MTU probe
    let request = OfflinePacket::OpenConnectionRequest1(OpenConnectionRequest1 {
        protocol: PROTOCOL_VERSION,
        mtu: 576,
    });
    session
        .handle_datagram(request.write_to_bytes().unwrap().as_slice())
        .await
        .unwrap();
    assert_eq!(session.status(), SessionStatus::HandshakeStage1);
    assert_eq!(session.mtu(), 576);

    let reply = recv_datagram(&peer).await;
    assert_eq!(reply[0], 0x06);
    let reply = OpenConnectionReply1::read_from_slice(&reply[1..]).unwrap();
    assert_eq!(reply.mtu, 576);
    assert_eq!(reply.server_guid, 0x00bd_c0de);

    // stage 2: endpoint + GUID exchange
    let request = OfflinePacket::OpenConnectionRequest2(OpenConnectionRequest2 {
        magic: Magic::new(),
        address: NetAddress::new(Ipv4Addr::LOCALHOST, 19132),
        mtu: 576,
        client_guid: 7,
    });
    session
        .handle_datagram(request.write_to_bytes().unwrap().as_slice())
        .await
        .unwrap();
    assert_eq!(session.status(), SessionStatus::HandshakeStage2);
    assert_eq!(session.remote_guid(), 7);

    let reply = recv_datagram(&peer).await;
    assert_eq!(reply[0], 0x08);
    let reply = OpenConnectionReply2::read_from_slice(&reply[1..]).unwrap();
    assert_eq!(reply.mtu, 576);
    assert_eq!(
        reply.client_address.port,
        peer.local_addr().unwrap().port()
    );

    // the connection request rides inside a frame and is answered with a
    // server handshake
    let request = OnlinePacket::ConnectionRequest(ConnectionRequest {
        client_guid: 7,
        ping_time: 11,
        security: false,
    });
    let delivered = session
        .handle_datagram(&carrier(0, online_frame(0, &request)))
        .await
        .unwrap();
    assert!(delivered.is_empty());
    assert_eq!(session.status(), SessionStatus::Established);

    let handshake = recv_datagram(&peer).await;
    assert!(matches!(handshake[0], 0x80..=0x8d));
    let packet = FramePacket::read_from_slice(&handshake[1..]).unwrap();
    assert_eq!(packet.frames[0].payload[0], 0x10);
}

#[tokio::test]
async fn version_mismatch_is_rejected() {
    let (mut session, peer) = pair().await;

    let request = OfflinePacket::OpenConnectionRequest1(OpenConnectionRequest1 {
        protocol: PROTOCOL_VERSION + 1,
        mtu: 576,
    });
    session
        .handle_datagram(request.write_to_bytes().unwrap().as_slice())
        .await
        .unwrap();

    let reply = recv_datagram(&peer).await;
    assert_eq!(reply[0], 0x19);
    assert_eq!(session.status(), SessionStatus::Fresh);
}

#[tokio::test]
async fn connected_ping_is_answered() {
    let (mut session, peer) = pair().await;

    let ping = OnlinePacket::ConnectedPing(ConnectedPing { ping_time: 42 });
    let delivered = session
        .handle_datagram(&carrier(0, online_frame(0, &ping)))
        .await
        .unwrap();
    assert!(delivered.is_empty());

    let datagram = recv_datagram(&peer).await;
    assert!(matches!(datagram[0], 0x80..=0x8d));
    let packet = FramePacket::read_from_slice(&datagram[1..]).unwrap();
    let payload = &packet.frames[0].payload;
    assert_eq!(payload[0], 0x03);
    let pong = ConnectedPong::read_from_slice(&payload[1..]).unwrap();
    assert_eq!(pong.ping_time, 42);
}

#[tokio::test]
async fn disconnect_closes_the_session() {
    let (mut session, _peer) = pair().await;

    let goodbye = OnlinePacket::ClientDisconnect(ClientDisconnect {});
    session
        .handle_datagram(&carrier(0, online_frame(0, &goodbye)))
        .await
        .unwrap();
    assert_eq!(session.status(), SessionStatus::Closed);

    // a closed session refuses further traffic
    let result = session
        .handle_datagram(&carrier(
            1,
            Frame::new(Reliability::Unreliable, vec![0xfe]),
        ))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn two_sessions_handshake_and_exchange_payloads() {
    let client_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let server_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let client_addr = client_socket.local_addr().unwrap();
    let server_addr = server_socket.local_addr().unwrap();

    let mut client = Session::new(client_socket.clone(), server_addr, 111);
    let mut server = Session::new(server_socket.clone(), client_addr, 222);

    client.initiate().await.unwrap();

    // Pump datagrams between the two engines until the handshake settles.
    let mut delivered_to_server: Vec<Vec<u8>> = Vec::new();
    let mut buf = [0u8; 2048];
    for _ in 0..16 {
        while let Ok(Ok((len, _))) =
            timeout(Duration::from_millis(100), server_socket.recv_from(&mut buf)).await
        {
            let payloads = server.handle_datagram(&buf[..len]).await.unwrap();
            delivered_to_server.extend(payloads);
        }
        while let Ok(Ok((len, _))) =
            timeout(Duration::from_millis(100), client_socket.recv_from(&mut buf)).await
        {
            client.handle_datagram(&buf[..len]).await.unwrap();
        }
        if client.status().is_established() && server.status().is_established() {
            break;
        }
    }

    assert_eq!(client.status(), SessionStatus::Established);
    assert_eq!(server.status(), SessionStatus::Established);
    assert_eq!(client.remote_guid(), 222);
    assert_eq!(server.remote_guid(), 111);
    assert_eq!(client.mtu(), server.mtu());
    // the handshake itself never surfaces as application data
    assert!(delivered_to_server.is_empty());

    // Application data flows through the established pair.
    client
        .send_stream(
            &[0xfe, 0x01, 0x02, 0x03],
            StreamOptions {
                message_index: false,
                order_channel: true,
            },
        )
        .await
        .unwrap();
    let (len, _) = timeout(Duration::from_secs(2), server_socket.recv_from(&mut buf))
        .await
        .expect("no data carrier")
        .unwrap();
    let payloads = server.handle_datagram(&buf[..len]).await.unwrap();
    assert_eq!(payloads, vec![vec![0xfe, 0x01, 0x02, 0x03]]);
}

#[tokio::test]
async fn queued_streams_flush_on_tick() {
    let (mut session, peer) = pair().await;

    session.queue_stream(
        b"queued payload",
        StreamOptions {
            message_index: false,
            order_channel: true,
        },
    );
    assert!(silent(&peer).await);

    session.tick().await.unwrap();
    let datagram = recv_datagram(&peer).await;
    assert!(matches!(datagram[0], 0x80..=0x8d));
    let packet = FramePacket::read_from_slice(&datagram[1..]).unwrap();
    assert_eq!(packet.frames[0].payload, b"queued payload".to_vec());
}
