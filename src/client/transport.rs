//! TCP and TLS transports
//!
//! Both end up as a boxed [`AsyncStream`] so the session has one code path
//! for `rtmp://`, `rtmps://` and in-memory test streams.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_native_tls::TlsConnector;

use crate::client::config::{ClientConfig, ParsedUrl};
use crate::error::{Error, Result};

/// Any byte stream a session can run over
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type BoxedStream = Box<dyn AsyncStream>;

/// Open the socket for `url`, wrapping it in TLS for `rtmps://`
pub async fn open(config: &ClientConfig, url: &ParsedUrl) -> Result<BoxedStream> {
    let addr = url.address();
    tracing::debug!(addr = %addr, tls = url.tls, "Connecting");

    let socket = timeout(config.connect_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(Error::Io)?;

    if config.tcp_nodelay {
        socket.set_nodelay(true)?;
    }

    if !url.tls {
        return Ok(Box::new(socket));
    }

    let connector = TlsConnector::from(native_tls::TlsConnector::new()?);
    let host = url.host.trim_start_matches('[').trim_end_matches(']');
    let stream = timeout(config.connect_timeout, connector.connect(host, socket))
        .await
        .map_err(|_| Error::Timeout)??;
    tracing::debug!(host = host, "TLS established");
    Ok(Box::new(stream))
}
