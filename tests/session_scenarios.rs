//! End-to-end session scenarios against a scripted in-memory RTMP server

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::timeout;

use rtmp_session::amf::{AmfObject, AmfValue};
use rtmp_session::client::{
    ClientConfig, CloseReason, Publisher, SessionEvent, SessionManager, StaticLicense,
};
use rtmp_session::error::{Error, ErrorKind};
use rtmp_session::media::h264::{avc_payload, AvcPacketType};
use rtmp_session::media::{MediaFrame, SequenceHeader};
use rtmp_session::mux::{Demuxer, Muxer};
use rtmp_session::protocol::constants::*;
use rtmp_session::protocol::{ChunkEncoder, Command, Message, RtmpMessage, UserControlEvent};
use rtmp_session::session::SessionState;

const SPS: &[u8] = &[0x67, 0x64, 0x00, 0x1F, 0xAC, 0xD9];
const PPS: &[u8] = &[0x68, 0xEF, 0x38];

/// Minimal server side of one RTMP connection
struct ScriptedServer {
    stream: DuplexStream,
    demuxer: Demuxer,
    muxer: Muxer,
    received: Vec<Message>,
}

impl ScriptedServer {
    async fn accept(mut stream: DuplexStream) -> Self {
        let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
        stream.read_exact(&mut c0c1).await.unwrap();
        assert_eq!(c0c1[0], RTMP_VERSION);

        let mut response = vec![RTMP_VERSION];
        response.extend_from_slice(&[0u8; HANDSHAKE_SIZE]);
        response.extend_from_slice(&c0c1[1..]);
        stream.write_all(&response).await.unwrap();

        let mut c2 = vec![0u8; HANDSHAKE_SIZE];
        stream.read_exact(&mut c2).await.unwrap();

        Self {
            stream,
            demuxer: Demuxer::new(),
            muxer: Muxer::new(),
            received: Vec::new(),
        }
    }

    async fn next_message(&mut self) -> Option<Message> {
        loop {
            if let Some(message) = self.demuxer.next_message().unwrap() {
                self.received.push(message.clone());
                return Some(message);
            }
            let n = self.stream.read_buf(self.demuxer.buffer_mut()).await.ok()?;
            if n == 0 {
                return None;
            }
        }
    }

    async fn expect_command(&mut self, name: &str) -> Command {
        loop {
            let message = self
                .next_message()
                .await
                .unwrap_or_else(|| panic!("connection closed waiting for {}", name));
            if let Ok(RtmpMessage::Command(command)) = RtmpMessage::from_message(&message) {
                if command.name == name {
                    return command;
                }
            }
        }
    }

    /// Read until the client hangs up
    async fn drain(mut self) -> Vec<Message> {
        while self.next_message().await.is_some() {}
        self.received
    }

    async fn send(&mut self, message: Message) {
        let mut buf = bytes::BytesMut::new();
        self.muxer.write(&message, &mut buf).unwrap();
        self.stream.write_all(&buf).await.unwrap();
    }

    async fn reply(&mut self, name: &str, transaction_id: f64, object: AmfValue, args: Vec<AmfValue>) {
        let command = Command {
            name: name.into(),
            transaction_id,
            command_object: object,
            arguments: args,
            stream_id: 0,
        };
        self.send(command.into_message()).await;
    }

    async fn accept_connect(&mut self) {
        let connect = self.expect_command(CMD_CONNECT).await;
        assert_eq!(connect.transaction_id, 1.0);
        let info = AmfObject::new()
            .with("level", "status")
            .with("code", NC_CONNECT_SUCCESS);
        self.reply(
            CMD_RESULT,
            1.0,
            AmfValue::Object(AmfObject::new().with("fmsVer", "FMS/3,0,1,123")),
            vec![AmfValue::Object(info)],
        )
        .await;
    }

    async fn accept_create_stream(&mut self) {
        let create = self.expect_command(CMD_CREATE_STREAM).await;
        self.reply(CMD_RESULT, create.transaction_id, AmfValue::Null, vec![AmfValue::Number(1.0)])
            .await;
    }

    async fn on_status(&mut self, level: &str, code: &str) {
        let info = AmfObject::new()
            .with("level", level)
            .with("code", code)
            .with("description", code);
        let command = Command {
            name: CMD_ON_STATUS.into(),
            transaction_id: 0.0,
            command_object: AmfValue::Null,
            arguments: vec![AmfValue::Object(info)],
            stream_id: 1,
        };
        self.send(command.into_message()).await;
    }
}

fn config(url: &str) -> ClientConfig {
    ClientConfig::publish(url)
        .license(StaticLicense::unrestricted())
        .stats_interval(None)
        .command_timeout(Duration::from_secs(5))
        .shutdown_timeout(Duration::from_secs(3))
}

async fn wait_for_state(session: &SessionManager, target: SessionState) {
    let mut state = session.subscribe_state();
    timeout(Duration::from_secs(5), async {
        while *state.borrow_and_update() != target {
            state.changed().await.unwrap();
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never reached {:?}", target));
}

async fn collect_events(session: &SessionManager) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_secs(5), session.next_event()).await {
        events.push(event);
    }
    events
}

fn commands(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match RtmpMessage::from_message(m).ok()? {
            RtmpMessage::Command(c) => Some(c.name),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_publish_sequence_header_then_frames() {
    let (client, server) = tokio::io::duplex(256 * 1024);

    let server = tokio::spawn(async move {
        let mut server = ScriptedServer::accept(server).await;
        server.accept_connect().await;
        server.accept_create_stream().await;
        let publish = server.expect_command(CMD_PUBLISH).await;
        assert_eq!(publish.stream_id, 1);
        assert_eq!(publish.arguments[1].as_str(), Some("live"));
        server.on_status("status", NS_PUBLISH_START).await;

        let mut media = Vec::new();
        while media.len() < 101 {
            let message = server.next_message().await.expect("media");
            if message.is_media() {
                media.push(message);
            }
        }
        (media, server.drain().await)
    });

    let session = SessionManager::connect_with_stream(config("rtmp://localhost/live/test"), client)
        .await
        .unwrap();
    session.start_publish().unwrap();
    session
        .send_sequence_header(
            SequenceHeader::from_parameter_sets(Bytes::from_static(SPS), Bytes::from_static(PPS)).unwrap(),
        )
        .unwrap();
    wait_for_state(&session, SessionState::Publishing).await;

    for i in 0..100u32 {
        let frame = MediaFrame::h264(i * 33, i == 0, Bytes::from(vec![0xAB; 300]));
        session.send_frame(frame).unwrap();
    }

    // Let the writer drain the queue before stopping
    let drained = timeout(Duration::from_secs(5), async {
        while session.stats().video_frames < 100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "frames were not all sent");
    session.stop().await.unwrap();
    let (media, _) = server.await.unwrap();

    assert_eq!(media.len(), 101);
    assert_eq!(media[0].type_id, MSG_VIDEO);
    assert_eq!(&media[0].payload[..2], &[0x17, 0x00]);
    for (i, message) in media[1..].iter().enumerate() {
        assert_eq!(message.type_id, MSG_VIDEO);
        assert_eq!(message.stream_id, 1);
        assert_eq!(message.timestamp, i as u32 * 33);
        assert_eq!(message.payload.len(), 305);
        assert_eq!(message.payload[1], 0x01);
    }

    let events = collect_events(&session).await;
    assert_eq!(
        events.last(),
        Some(&SessionEvent::SessionClosed(CloseReason::UserRequested))
    );
}

#[tokio::test]
async fn test_ping_answered_and_teardown_commands() {
    let (client, server) = tokio::io::duplex(64 * 1024);

    let server = tokio::spawn(async move {
        let mut server = ScriptedServer::accept(server).await;
        server.accept_connect().await;
        server
            .send(RtmpMessage::UserControl(UserControlEvent::PingRequest(123)).into_message(0, 0))
            .await;
        server.accept_create_stream().await;
        server.expect_command(CMD_PUBLISH).await;
        server.on_status("status", NS_PUBLISH_START).await;
        server.drain().await
    });

    let session = SessionManager::connect_with_stream(config("rtmp://localhost/live/test"), client)
        .await
        .unwrap();
    session.start_publish().unwrap();
    wait_for_state(&session, SessionState::Publishing).await;
    session.stop().await.unwrap();

    let received = server.await.unwrap();
    let pong = received.iter().any(|m| {
        RtmpMessage::from_message(m).ok()
            == Some(RtmpMessage::UserControl(UserControlEvent::PingResponse(123)))
    });
    assert!(pong, "no PingResponse");

    let names = commands(&received);
    assert_eq!(
        names,
        vec![
            CMD_CONNECT,
            CMD_RELEASE_STREAM,
            CMD_FC_PUBLISH,
            CMD_CREATE_STREAM,
            CMD_PUBLISH,
            CMD_FC_UNPUBLISH,
            CMD_CLOSE_STREAM,
            CMD_DELETE_STREAM,
        ]
    );
}

#[tokio::test]
async fn test_connect_error_never_creates_stream() {
    let (client, server) = tokio::io::duplex(64 * 1024);

    let server = tokio::spawn(async move {
        let mut server = ScriptedServer::accept(server).await;
        server.expect_command(CMD_CONNECT).await;
        let info = AmfObject::new()
            .with("level", "error")
            .with("code", "NetConnection.Connect.Rejected")
            .with("description", "Connection rejected");
        server
            .reply(CMD_ERROR, 1.0, AmfValue::Null, vec![AmfValue::Object(info)])
            .await;
        server.drain().await
    });

    let session = SessionManager::connect_with_stream(config("rtmp://localhost/live/test"), client)
        .await
        .unwrap();
    session.start_publish().unwrap();

    let events = collect_events(&session).await;
    let errors: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Error { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        SessionEvent::Error { kind: ErrorKind::ConnectFailed, .. }
    ));

    let tail: Vec<_> = events
        .iter()
        .skip_while(|e| !matches!(e, SessionEvent::Error { .. }))
        .cloned()
        .collect();
    assert_eq!(
        tail[1..],
        [
            SessionEvent::StateChanged(SessionState::Disconnected),
            SessionEvent::SessionClosed(CloseReason::Rejected(ErrorKind::ConnectFailed)),
        ]
    );
    assert_eq!(session.state(), SessionState::Disconnected);

    let received = server.await.unwrap();
    assert!(!commands(&received).iter().any(|c| c == CMD_CREATE_STREAM));
}

#[tokio::test]
async fn test_play_reassembles_byte_at_a_time() {
    let (client, server) = tokio::io::duplex(64 * 1024);

    let server = tokio::spawn(async move {
        let mut server = ScriptedServer::accept(server).await;
        server.accept_connect().await;
        server.accept_create_stream().await;
        let play = server.expect_command(CMD_PLAY).await;
        assert_eq!(play.stream_id, 1);

        let buffer_length = server.received.iter().any(|m| {
            matches!(
                RtmpMessage::from_message(m),
                Ok(RtmpMessage::UserControl(UserControlEvent::SetBufferLength { stream_id: 1, .. }))
            )
        });
        assert!(buffer_length, "SetBufferLength must precede play");

        // Dropped: arrives before Play.Start
        server
            .send(Message::new(MSG_VIDEO, 0, 1, avc_payload(true, AvcPacketType::Nalu, 0, &[1, 2, 3])))
            .await;
        server.on_status("status", NS_PLAY_START).await;

        let record = rtmp_session::media::AvcConfig::from_parameter_sets(
            Bytes::from_static(SPS),
            Bytes::from_static(PPS),
        )
        .unwrap()
        .to_record();
        server
            .send(Message::new(MSG_VIDEO, 0, 1, avc_payload(true, AvcPacketType::SequenceHeader, 0, &record)))
            .await;

        let frame = Message::new(MSG_VIDEO, 40, 1, avc_payload(true, AvcPacketType::Nalu, 0, &[0x5A; 300]));
        let bytes = ChunkEncoder::new().encode(&frame, CSID_VIDEO).unwrap();
        for byte in bytes.iter() {
            server.stream.write_all(&[*byte]).await.unwrap();
            server.stream.flush().await.unwrap();
            tokio::task::yield_now().await;
        }
        server.on_status("status", NS_PLAY_STOP).await;
        server.drain().await
    });

    let play = ClientConfig::play("rtmp://localhost/live/test")
        .license(StaticLicense::unrestricted())
        .stats_interval(None);
    let session = SessionManager::connect_with_stream(play, client).await.unwrap();
    session.start_play().unwrap();

    let mut frames = Vec::new();
    let mut configured = false;
    while let Ok(Some(event)) = timeout(Duration::from_secs(5), session.next_event()).await {
        match event {
            SessionEvent::CodecConfigured(_) => {
                assert!(frames.is_empty());
                configured = true;
            }
            SessionEvent::FrameReceived(frame) => frames.push(frame),
            SessionEvent::StreamEnded => break,
            _ => {}
        }
    }

    assert!(configured);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data.len(), 300);
    assert_eq!(frames[0].timestamp, 40);
    assert!(frames[0].keyframe);

    session.stop().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn test_stop_discards_queued_frames() {
    let (client, server) = tokio::io::duplex(64 * 1024);

    let server = tokio::spawn(async move {
        let mut server = ScriptedServer::accept(server).await;
        server.accept_connect().await;
        server.accept_create_stream().await;
        server.expect_command(CMD_PUBLISH).await;
        // No Publish.Start: media stays queued
        server.drain().await
    });

    let session = SessionManager::connect_with_stream(config("rtmp://localhost/live/test"), client)
        .await
        .unwrap();
    session.start_publish().unwrap();
    session
        .send_sequence_header(
            SequenceHeader::from_parameter_sets(Bytes::from_static(SPS), Bytes::from_static(PPS)).unwrap(),
        )
        .unwrap();
    wait_for_state(&session, SessionState::Publishing).await;
    for i in 0..5u32 {
        session
            .send_frame(MediaFrame::h264(i * 33, i == 0, Bytes::from_static(&[1, 2, 3])))
            .unwrap();
    }

    let started = std::time::Instant::now();
    session.stop().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));

    let events = collect_events(&session).await;
    assert_eq!(
        events.last(),
        Some(&SessionEvent::SessionClosed(CloseReason::UserRequested))
    );
    let closed = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::SessionClosed(_)))
        .count();
    assert_eq!(closed, 1);
    assert_eq!(session.stats().dropped_frames, 5);

    assert!(matches!(
        session.send_frame(MediaFrame::h264(500, false, Bytes::from_static(&[1]))),
        Err(Error::NotPublishing)
    ));

    let received = server.await.unwrap();
    assert!(!received.iter().any(|m| m.is_media()));
}

#[tokio::test]
async fn test_caller_misuse_is_synchronous() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let server = tokio::spawn(async move {
        let mut server = ScriptedServer::accept(server).await;
        server.accept_connect().await;
        server.drain().await
    });

    let session = SessionManager::connect_with_stream(config("rtmp://localhost/live/test"), client)
        .await
        .unwrap();
    assert!(matches!(session.start_play(), Err(Error::NotPlaying)));
    assert!(matches!(
        session.send_frame(MediaFrame::h264(0, true, Bytes::from_static(&[1]))),
        Err(Error::NotPublishing)
    ));
    assert!(matches!(session.pause(true), Err(Error::NotPlaying)));
    assert!(session.set_chunk_size_preference(0).is_err());
    assert!(session.state().is_active());

    session.stop().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn test_license_checked_before_io() {
    let unlicensed = ClientConfig::publish("rtmp://127.0.0.1:1/live/test");
    let result = SessionManager::connect(unlicensed).await;
    assert!(matches!(result, Err(Error::LicenseRequired)));

    let (client, _server) = tokio::io::duplex(1024);
    let result = SessionManager::connect_with_stream(
        ClientConfig::publish("rtmp://localhost/live/test").license(StaticLicense::new("")),
        client,
    )
    .await;
    assert!(matches!(result, Err(Error::LicenseRequired)));
}

/// The last three events of a session that failed with `kind`
fn assert_failed_with(events: &[SessionEvent], kind: ErrorKind) {
    assert!(events.len() >= 3, "too few events: {:?}", events);
    let tail = &events[events.len() - 3..];
    assert!(
        matches!(&tail[0], SessionEvent::Error { kind: k, .. } if *k == kind),
        "expected {:?} error, got {:?}",
        kind,
        tail[0]
    );
    assert_eq!(tail[1], SessionEvent::StateChanged(SessionState::Disconnected));
    assert_eq!(tail[2], SessionEvent::SessionClosed(CloseReason::Error(kind)));
    let closed = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::SessionClosed(_)))
        .count();
    assert_eq!(closed, 1);
}

#[tokio::test]
async fn test_handshake_timeout() {
    let (client, _server) = tokio::io::duplex(64 * 1024);
    let config = config("rtmp://localhost/live/test").connect_timeout(Duration::from_millis(100));
    let session = SessionManager::connect_with_stream(config, client).await.unwrap();

    let events = collect_events(&session).await;
    assert_eq!(events[0], SessionEvent::StateChanged(SessionState::Connecting));
    assert_failed_with(&events, ErrorKind::HandshakeTimeout);
    assert!(matches!(
        events[events.len() - 3],
        SessionEvent::Error { timed_out: true, .. }
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(matches!(session.start_publish(), Err(Error::NotPublishing)));
}

#[tokio::test]
async fn test_bad_handshake_version_is_an_event() {
    let (client, mut server) = tokio::io::duplex(64 * 1024);
    let server = tokio::spawn(async move {
        let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
        server.read_exact(&mut c0c1).await.unwrap();
        let mut response = vec![1u8];
        response.extend_from_slice(&[0u8; 2 * HANDSHAKE_SIZE]);
        server.write_all(&response).await.unwrap();
        server
    });

    let session = SessionManager::connect_with_stream(config("rtmp://localhost/live/test"), client)
        .await
        .unwrap();
    let events = collect_events(&session).await;
    assert_failed_with(&events, ErrorKind::Handshake);
    assert!(matches!(
        events[events.len() - 3],
        SessionEvent::Error { timed_out: false, .. }
    ));
    drop(server.await.unwrap());
}

#[tokio::test]
async fn test_refused_tcp_connect_is_an_event() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let url = format!("rtmp://127.0.0.1:{}/live/test", port);
    let session = SessionManager::connect(config(&url)).await.unwrap();
    let events = collect_events(&session).await;
    assert_failed_with(&events, ErrorKind::Transport);
}

#[tokio::test]
async fn test_stop_while_handshaking() {
    let (client, _server) = tokio::io::duplex(64 * 1024);
    let session = SessionManager::connect_with_stream(config("rtmp://localhost/live/test"), client)
        .await
        .unwrap();
    session.stop().await.unwrap();

    let events = collect_events(&session).await;
    assert_eq!(
        events.last(),
        Some(&SessionEvent::SessionClosed(CloseReason::UserRequested))
    );
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::Error { .. })));
}

#[tokio::test]
async fn test_network_timeout_status_codes() {
    let (client, _server) = tokio::io::duplex(64 * 1024);
    let cfg = config("rtmp://localhost/live/test").connect_timeout(Duration::from_millis(100));
    let session = SessionManager::connect_with_stream(cfg, client).await.unwrap();
    let publisher = Publisher::from_session(session).unwrap();

    let mut codes = Vec::new();
    while let Some((_, status)) = publisher.next_status().await {
        codes.extend(status.map(|s| s.code()));
    }
    assert_eq!(codes, vec![2000, 2006, 2007]);

    // connect sent, never answered
    let (client, server) = tokio::io::duplex(64 * 1024);
    let server = tokio::spawn(async move {
        let mut server = ScriptedServer::accept(server).await;
        server.expect_command(CMD_CONNECT).await;
        server.drain().await
    });
    let cfg = config("rtmp://localhost/live/test").command_timeout(Duration::from_millis(200));
    let session = SessionManager::connect_with_stream(cfg, client).await.unwrap();
    let publisher = Publisher::from_session(session).unwrap();

    let mut codes = Vec::new();
    while let Some((event, status)) = publisher.next_status().await {
        if let SessionEvent::Error { kind, timed_out, .. } = &event {
            assert_eq!(*kind, ErrorKind::ConnectFailed);
            assert!(timed_out);
        }
        codes.extend(status.map(|s| s.code()));
    }
    assert_eq!(codes, vec![2000, 2006, 2007]);
    server.await.unwrap();
}

#[tokio::test]
async fn test_publish_rejected() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let server = tokio::spawn(async move {
        let mut server = ScriptedServer::accept(server).await;
        server.accept_connect().await;
        server.accept_create_stream().await;
        server.expect_command(CMD_PUBLISH).await;
        server.on_status("error", "NetStream.Publish.BadName").await;
        server.drain().await
    });

    let session = SessionManager::connect_with_stream(config("rtmp://localhost/live/test"), client)
        .await
        .unwrap();
    session.start_publish().unwrap();

    let events = collect_events(&session).await;
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Error { kind: ErrorKind::PublishRejected, message, .. } if message.contains("BadName")
    )));
    assert_eq!(
        events.last(),
        Some(&SessionEvent::SessionClosed(CloseReason::Rejected(ErrorKind::PublishRejected)))
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_peer_close_ends_session() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let server = tokio::spawn(async move {
        let mut server = ScriptedServer::accept(server).await;
        server.accept_connect().await;
        let window = server.next_message().await.unwrap();
        assert_eq!(window.type_id, MSG_WINDOW_ACK_SIZE);
        // Dropping the server closes the connection
    });

    let session = SessionManager::connect_with_stream(config("rtmp://localhost/live/test"), client)
        .await
        .unwrap();
    server.await.unwrap();

    let events = collect_events(&session).await;
    assert!(events.contains(&SessionEvent::StateChanged(SessionState::Connected)));
    assert_eq!(
        events.last(),
        Some(&SessionEvent::SessionClosed(CloseReason::PeerClosed))
    );
}

const HEVC_VPS: &[u8] = &[0x40, 0x01, 0x0C, 0x01, 0xFF, 0xFF];
const HEVC_SPS: &[u8] = &[
    0x42, 0x01, 0x01, 0x01, 0x60, 0x00, 0x00, 0x03, 0x00, 0x90, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03,
    0x00, 0x5D, 0xA0,
];
const HEVC_PPS: &[u8] = &[0x44, 0x01, 0xC1, 0x72];

fn hevc_header() -> SequenceHeader {
    SequenceHeader::from_hevc_parameter_sets(
        Bytes::from_static(HEVC_VPS),
        Bytes::from_static(HEVC_SPS),
        Bytes::from_static(HEVC_PPS),
    )
    .unwrap()
}

#[tokio::test]
async fn test_publish_h265_over_enhanced_rtmp() {
    let (client, server) = tokio::io::duplex(256 * 1024);

    let server = tokio::spawn(async move {
        let mut server = ScriptedServer::accept(server).await;
        let connect = server.expect_command(CMD_CONNECT).await;
        let offered = connect
            .command_object
            .as_object()
            .and_then(|o| o.get("fourCcList"))
            .and_then(|v| v.as_array())
            .map(|list| list.iter().filter_map(|v| v.as_str().map(String::from)).collect::<Vec<_>>());
        let info = AmfObject::new()
            .with("level", "status")
            .with("code", NC_CONNECT_SUCCESS);
        server
            .reply(
                CMD_RESULT,
                1.0,
                AmfValue::Object(AmfObject::new().with("fmsVer", "FMS/3,0,1,123")),
                vec![AmfValue::Object(info)],
            )
            .await;
        server.accept_create_stream().await;
        server.expect_command(CMD_PUBLISH).await;
        server.on_status("status", NS_PUBLISH_START).await;

        let mut media = Vec::new();
        while media.len() < 3 {
            let message = server.next_message().await.expect("media");
            if message.is_media() {
                media.push(message);
            }
        }
        server.drain().await;
        (offered, media)
    });

    let session = SessionManager::connect_with_stream(
        config("rtmp://localhost/live/test").enhanced_rtmp(true),
        client,
    )
    .await
    .unwrap();
    session.start_publish().unwrap();
    let header = hevc_header();
    session.send_sequence_header(header.clone()).unwrap();
    wait_for_state(&session, SessionState::Publishing).await;

    session
        .send_frame(MediaFrame::h265(1000, true, Bytes::from(vec![0x26; 64])).with_composition_time(33))
        .unwrap();
    session
        .send_frame(MediaFrame::h265(1033, false, Bytes::from(vec![0x02; 64])))
        .unwrap();

    let sent = timeout(Duration::from_secs(5), async {
        while session.stats().video_frames < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(sent.is_ok(), "frames were not all sent");
    session.stop().await.unwrap();
    let (offered, media) = server.await.unwrap();

    assert_eq!(offered, Some(vec!["hvc1".to_string()]));

    assert_eq!(&media[0].payload[..5], b"\x90hvc1");
    assert_eq!(&media[0].payload[5..], &header.data[..]);

    assert_eq!(media[1].timestamp, 0);
    assert_eq!(&media[1].payload[..8], &[0x91, b'h', b'v', b'c', b'1', 0x00, 0x00, 0x21]);
    assert_eq!(media[1].payload.len(), 8 + 64);

    assert_eq!(media[2].timestamp, 33);
    assert_eq!(media[2].payload[0], 0xA3);
    assert_eq!(media[2].payload.len(), 5 + 64);
}

#[tokio::test]
async fn test_play_h265_over_enhanced_rtmp() {
    use rtmp_session::media::enhanced::ex_video_payload;
    use rtmp_session::media::{Codec, CodecConfig, VideoPacketType, HEVC_FOURCC};

    let (client, server) = tokio::io::duplex(64 * 1024);
    let record = hevc_header().data;

    let server = tokio::spawn(async move {
        let mut server = ScriptedServer::accept(server).await;
        server.accept_connect().await;
        server.accept_create_stream().await;
        server.expect_command(CMD_PLAY).await;
        server.on_status("status", NS_PLAY_START).await;

        let start = ex_video_payload(true, VideoPacketType::SequenceStart, HEVC_FOURCC, 0, &record);
        server.send(Message::new(MSG_VIDEO, 0, 1, start)).await;
        let key = ex_video_payload(true, VideoPacketType::CodedFrames, HEVC_FOURCC, 66, &[0x26; 200]);
        server.send(Message::new(MSG_VIDEO, 40, 1, key)).await;
        let inter = ex_video_payload(false, VideoPacketType::CodedFrames, HEVC_FOURCC, 0, &[0x02; 50]);
        server.send(Message::new(MSG_VIDEO, 73, 1, inter)).await;
        server.on_status("status", NS_PLAY_STOP).await;
        server.drain().await
    });

    let play = ClientConfig::play("rtmp://localhost/live/test")
        .license(StaticLicense::unrestricted())
        .stats_interval(None);
    let session = SessionManager::connect_with_stream(play, client).await.unwrap();
    session.start_play().unwrap();

    let mut hevc_config = None;
    let mut frames = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_secs(5), session.next_event()).await {
        match event {
            SessionEvent::CodecConfigured(CodecConfig::Hevc(hevc)) => hevc_config = Some(hevc),
            SessionEvent::FrameReceived(frame) => frames.push(frame),
            SessionEvent::StreamEnded => break,
            _ => {}
        }
    }

    let hevc_config = hevc_config.expect("HEVC configuration");
    assert_eq!(hevc_config.profile_name(), "Main");
    assert_eq!(hevc_config.level_string(), "3.1");
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.codec == Codec::H265));
    assert!(frames[0].keyframe);
    assert_eq!(frames[0].composition_time, 66);
    assert_eq!(frames[0].data.len(), 200);
    assert_eq!(frames[1].timestamp, 73);
    assert!(!frames[1].keyframe);

    session.stop().await.unwrap();
    server.await.unwrap();
}
