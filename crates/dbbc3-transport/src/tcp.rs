//! TCP transport to the DBBC3 control software.
//!
//! The control software listens on a single TCP port (4000 by default) and
//! serves one client at a time. [`TcpTransport`] implements the
//! [`Transport`] trait over that connection and tracks its
//! [`ConnectionState`].
//!
//! # Example
//!
//! ```no_run
//! use dbbc3_transport::TcpTransport;
//! use dbbc3_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> dbbc3_core::Result<()> {
//! let mut transport = TcpTransport::connect("192.168.0.60:4000").await?;
//! transport.send(b"version\0").await?;
//!
//! let mut buf = [0u8; 2048];
//! let n = transport.receive(&mut buf, Duration::from_secs(2)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use dbbc3_core::error::{Error, Result};
use dbbc3_core::transport::{ConnectionState, Transport};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default connection timeout.
///
/// Reloading firmware can keep the control software busy for a long time
/// before it accepts a connection, hence the generous value.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(120);

/// TCP transport for DBBC3 communication.
#[derive(Debug)]
pub struct TcpTransport {
    /// The underlying TCP stream, `None` when not connected.
    stream: Option<TcpStream>,
    /// The address string for logging/debugging.
    addr: String,
    state: ConnectionState,
}

impl TcpTransport {
    /// Create an unconnected transport for `addr` (`host:port`).
    ///
    /// Call [`open`](TcpTransport::open) to establish the connection.
    pub fn new(addr: &str) -> Self {
        Self {
            stream: None,
            addr: addr.to_string(),
            state: ConnectionState::Disconnected,
        }
    }

    /// Connect to a TCP endpoint using the default timeout.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to a TCP endpoint with a specified timeout.
    ///
    /// Both refusal and an expired timeout are reported as
    /// [`Error::Connection`].
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        let mut transport = Self::new(addr);
        transport.open(timeout).await?;
        Ok(transport)
    }

    /// Establish the connection. Does nothing if already connected.
    pub async fn open(&mut self, timeout: Duration) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        tracing::debug!(
            addr = %self.addr,
            timeout_ms = timeout.as_millis(),
            "Connecting to DBBC3"
        );
        self.state = ConnectionState::Connecting;

        let result = tokio::time::timeout(timeout, TcpStream::connect(&self.addr)).await;
        let stream = match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::error!(addr = %self.addr, error = %e, "TCP connection failed");
                self.state = ConnectionState::Faulted;
                return Err(map_connect_error(e, &self.addr));
            }
            Err(_) => {
                tracing::error!(addr = %self.addr, "TCP connection timed out");
                self.state = ConnectionState::Faulted;
                return Err(Error::Connection(format!(
                    "connection to {} timed out after {} ms",
                    self.addr,
                    timeout.as_millis()
                )));
            }
        };

        // Commands are short and every exchange waits for its reply.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(
                addr = %self.addr,
                error = %e,
                "Failed to set TCP_NODELAY (continuing anyway)"
            );
        }

        tracing::info!(addr = %self.addr, "TCP connection established");
        self.stream = Some(stream);
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// Wrap an existing `TcpStream`, e.g. one accepted in a test.
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        tracing::debug!(addr = %addr, "Wrapping existing TCP stream");
        Self {
            stream: Some(stream),
            addr,
            state: ConnectionState::Connected,
        }
    }

    /// Get the address string this transport connects to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn fault(&mut self, e: std::io::Error) -> Error {
        let err = map_io_error(e);
        if matches!(err, Error::ConnectionLost) {
            self.state = ConnectionState::Faulted;
        }
        err
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(addr = %self.addr, bytes = data.len(), data = ?data, "Sending data");

        let written = match stream.write_all(data).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::error!(addr = %self.addr, error = %e, "Failed to send data");
            return Err(self.fault(e));
        }

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let result = tokio::time::timeout(timeout, stream.read(buf)).await;

        match result {
            Ok(Ok(0)) => {
                tracing::warn!(addr = %self.addr, "Peer closed connection (0 bytes read)");
                self.state = ConnectionState::Faulted;
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(addr = %self.addr, bytes = n, data = ?&buf[..n], "Received data");
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(addr = %self.addr, error = %e, "Failed to receive data");
                Err(self.fault(e))
            }
            Err(_) => {
                tracing::trace!(
                    addr = %self.addr,
                    timeout_ms = timeout.as_millis(),
                    "Timeout waiting for data"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(addr = %self.addr, "Closing TCP connection");
            if let Err(e) = stream.shutdown().await {
                tracing::warn!(
                    addr = %self.addr,
                    error = %e,
                    "Failed to shutdown TCP stream (continuing anyway)"
                );
            }
            tracing::info!(addr = %self.addr, "TCP connection closed");
        }
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some() && self.state == ConnectionState::Connected
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

/// Map a connection-time I/O error to [`Error::Connection`].
fn map_connect_error(e: std::io::Error, addr: &str) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            Error::Connection(format!("connection refused: {addr}"))
        }
        _ => Error::Connection(format!("failed to connect to {addr}: {e}")),
    }
}

/// Map a data-path I/O error to the appropriate [`Error`] variant.
fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::ConnectionAborted => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn test_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn connect_send_receive() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let n = stream.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"version\0");
            stream
                .write_all(b"version/ OCT_D,120,October 19th 2021;")
                .await
                .unwrap();
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        assert_eq!(transport.state(), ConnectionState::Connected);

        transport.send(b"version\0").await.unwrap();
        let mut buf = [0u8; 256];
        let n = transport
            .receive(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(buf[..n].starts_with(b"version/ OCT_D"));

        transport.close().await.unwrap();
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut transport = TcpTransport::new(&addr);
        let err = transport
            .open(Duration::from_secs(2))
            .await
            .unwrap_err();
        match &err {
            Error::Connection(msg) => assert!(msg.contains("connection refused"), "{msg}"),
            other => panic!("expected Connection error, got: {other:?}"),
        }
        assert_eq!(transport.state(), ConnectionState::Faulted);
    }

    #[tokio::test]
    async fn connect_timeout_is_connection_error() {
        // TEST-NET-1 is black-holed on most networks.
        let result =
            TcpTransport::connect_with_timeout("192.0.2.1:4000", Duration::from_millis(100)).await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn receive_timeout_keeps_connection() {
        let (listener, addr) = test_listener().await;
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        let mut buf = [0u8; 64];
        let result = transport.receive(&mut buf, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert!(transport.is_connected());

        transport.close().await.unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn peer_close_faults_transport() {
        let (listener, addr) = test_listener().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        server.await.unwrap();

        let mut buf = [0u8; 64];
        let result = transport.receive(&mut buf, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(Error::ConnectionLost)));
        assert_eq!(transport.state(), ConnectionState::Faulted);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (listener, addr) = test_listener().await;
        let server = tokio::spawn(async move {
            let _ = listener.accept().await.unwrap();
        });
        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(matches!(transport.send(b"x\0").await, Err(Error::NotConnected)));
        server.await.unwrap();
    }
}
