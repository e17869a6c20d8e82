//! RTMP client handshake
//!
//! ```text
//! Client                                   Server
//!   |------- C0 (1 byte: version) --------->|
//!   |------- C1 (1536 bytes: time+random) ->|
//!   |<------ S0 (1 byte: version) ----------|
//!   |<------ S1 (1536 bytes: time+random) --|
//!   |<------ S2 (1536 bytes: echo C1) ------|
//!   |------- C2 (1536 bytes: echo S1) ----->|
//! ```
//!
//! Simple handshake only. S2 is not checked against C1; servers differ too
//! much in what they echo.
//!
//! Reference: RTMP Specification Section 5.2

use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, HandshakeError, Result};
use crate::protocol::constants::{HANDSHAKE_SIZE, RTMP_VERSION};

/// Client handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    C0C1Sent,
    S0S1S2Received,
    C2Sent,
    Established,
}

/// Sans-IO client handshake
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
    c1: Option<Box<[u8; HANDSHAKE_SIZE]>>,
    s1: Option<Box<[u8; HANDSHAKE_SIZE]>>,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Idle,
            c1: None,
            s1: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Bytes the server must send before [`process_response`](Self::process_response)
    pub fn response_len() -> usize {
        1 + HANDSHAKE_SIZE * 2
    }

    /// Build C0 + C1
    pub fn start(&mut self) -> Result<Bytes> {
        if self.state != HandshakeState::Idle {
            return Err(HandshakeError::InvalidState.into());
        }

        let c1 = generate_c1();
        let mut buf = BytesMut::with_capacity(1 + HANDSHAKE_SIZE);
        buf.put_u8(RTMP_VERSION);
        buf.put_slice(&c1[..]);

        self.c1 = Some(c1);
        self.state = HandshakeState::C0C1Sent;
        Ok(buf.freeze())
    }

    /// Consume S0 + S1 + S2 and return C2
    pub fn process_response(&mut self, data: &[u8]) -> Result<Bytes> {
        if self.state != HandshakeState::C0C1Sent {
            return Err(HandshakeError::InvalidState.into());
        }
        if data.len() < Self::response_len() {
            return Err(HandshakeError::ConnectionClosed.into());
        }

        // Some servers answer with 6 or 8 (encrypted variants) in S0 while
        // still speaking the plain protocol; anything below 3 is not RTMP.
        let version = data[0];
        if version < RTMP_VERSION {
            return Err(HandshakeError::InvalidVersion(version).into());
        }

        let mut s1 = Box::new([0u8; HANDSHAKE_SIZE]);
        s1.copy_from_slice(&data[1..1 + HANDSHAKE_SIZE]);
        self.state = HandshakeState::S0S1S2Received;

        let c2 = generate_echo(&s1);
        self.s1 = Some(s1);
        Ok(Bytes::copy_from_slice(&c2[..]))
    }

    /// Record that C2 has been written
    pub fn c2_sent(&mut self) -> Result<()> {
        if self.state != HandshakeState::S0S1S2Received {
            return Err(HandshakeError::InvalidState.into());
        }
        self.state = HandshakeState::C2Sent;
        Ok(())
    }

    /// Mark the handshake complete once C2 is flushed
    pub fn establish(&mut self) -> Result<()> {
        if self.state != HandshakeState::C2Sent {
            return Err(HandshakeError::InvalidState.into());
        }
        self.state = HandshakeState::Established;
        Ok(())
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the client handshake on `stream`
///
/// Every read is bounded by `read_timeout`; a timeout is reported as
/// [`HandshakeError::Timeout`]. There is no retry.
pub async fn perform_client_handshake<S>(stream: &mut S, read_timeout: Duration) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut handshake = Handshake::new();

    let c0c1 = handshake.start()?;
    stream.write_all(&c0c1).await?;
    stream.flush().await?;
    tracing::debug!(state = ?handshake.state(), "Sent C0C1");

    let mut response = vec![0u8; Handshake::response_len()];
    match tokio::time::timeout(read_timeout, stream.read_exact(&mut response)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(HandshakeError::ConnectionClosed.into());
        }
        Ok(Err(e)) => return Err(Error::Io(e)),
        Err(_) => return Err(HandshakeError::Timeout.into()),
    }

    let c2 = handshake.process_response(&response)?;
    stream.write_all(&c2).await?;
    handshake.c2_sent()?;
    stream.flush().await?;
    handshake.establish()?;

    tracing::debug!("Handshake complete");
    Ok(())
}

fn now_millis() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

/// C1: time(4) + zero(4) + random(1528)
fn generate_c1() -> Box<[u8; HANDSHAKE_SIZE]> {
    let mut packet = Box::new([0u8; HANDSHAKE_SIZE]);
    packet[0..4].copy_from_slice(&now_millis().to_be_bytes());
    rand::rng().fill(&mut packet[8..]);
    packet
}

/// C2: S1's time, our read time, S1's random bytes
fn generate_echo(s1: &[u8; HANDSHAKE_SIZE]) -> Box<[u8; HANDSHAKE_SIZE]> {
    let mut echo = Box::new(*s1);
    echo[4..8].copy_from_slice(&now_millis().to_be_bytes());
    echo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_response(version: u8) -> Vec<u8> {
        let mut data = vec![version];
        let mut s1 = vec![0u8; HANDSHAKE_SIZE];
        for (i, b) in s1.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        data.extend_from_slice(&s1);
        data.extend_from_slice(&[0u8; HANDSHAKE_SIZE]);
        data
    }

    #[test]
    fn test_state_progression() {
        let mut hs = Handshake::new();
        assert_eq!(hs.state(), HandshakeState::Idle);

        let c0c1 = hs.start().unwrap();
        assert_eq!(c0c1.len(), 1 + HANDSHAKE_SIZE);
        assert_eq!(c0c1[0], RTMP_VERSION);
        assert_eq!(&c0c1[5..9], &[0, 0, 0, 0]);
        assert_eq!(hs.state(), HandshakeState::C0C1Sent);

        let response = server_response(3);
        let c2 = hs.process_response(&response).unwrap();
        assert_eq!(hs.state(), HandshakeState::S0S1S2Received);
        assert_eq!(c2.len(), HANDSHAKE_SIZE);
        // S1 time and random bytes are echoed
        assert_eq!(&c2[0..4], &response[1..5]);
        assert_eq!(&c2[8..], &response[9..1 + HANDSHAKE_SIZE]);

        hs.c2_sent().unwrap();
        hs.establish().unwrap();
        assert_eq!(hs.state(), HandshakeState::Established);
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let mut hs = Handshake::new();
        assert!(hs.process_response(&server_response(3)).is_err());
        assert!(hs.establish().is_err());
        hs.start().unwrap();
        assert!(hs.start().is_err());
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut hs = Handshake::new();
        hs.start().unwrap();
        let err = hs.process_response(&server_response(1)).unwrap_err();
        assert!(matches!(err, Error::Handshake(HandshakeError::InvalidVersion(1))));
    }

    #[tokio::test]
    async fn test_perform_against_scripted_server() {
        let (mut client, mut server) = tokio::io::duplex(8192);

        let server_task = tokio::spawn(async move {
            let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
            server.read_exact(&mut c0c1).await.unwrap();
            server.write_all(&server_response(3)).await.unwrap();
            let mut c2 = vec![0u8; HANDSHAKE_SIZE];
            server.read_exact(&mut c2).await.unwrap();
            c2
        });

        perform_client_handshake(&mut client, Duration::from_secs(1))
            .await
            .unwrap();
        let c2 = server_task.await.unwrap();
        assert_eq!(&c2[8..], &server_response(3)[9..1 + HANDSHAKE_SIZE]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_server_times_out() {
        let (mut client, _server) = tokio::io::duplex(8192);
        let err = perform_client_handshake(&mut client, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::HandshakeTimeout);
    }

    #[tokio::test]
    async fn test_closed_server_is_handshake_error() {
        let (mut client, server) = tokio::io::duplex(8192);
        drop(server);
        let err = perform_client_handshake(&mut client, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
