//! Transport trait for device communication.
//!
//! The [`Transport`] trait abstracts over the link to the DBBC3 control
//! software. The TCP implementation lives in `dbbc3-transport`; the
//! `dbbc3-test-harness` crate provides a scripted mock so that sessions and
//! command sets can be tested without hardware.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Lifecycle state of a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection, either never opened or closed.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The link is up.
    Connected,
    /// The link failed; the transport must be closed and reopened.
    Faulted,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

/// Asynchronous byte-level transport to the device.
///
/// Framing of commands and responses is handled by the session that
/// consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the device.
    ///
    /// Implementations should not return until all bytes have been written.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes into the provided buffer.
    ///
    /// Waits up to `timeout` for data to arrive; returns
    /// [`Error::Timeout`](crate::error::Error::Timeout) if nothing arrives
    /// within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Closed;

    #[async_trait]
    impl Transport for Closed {
        async fn send(&mut self, _data: &[u8]) -> Result<()> {
            Err(Error::NotConnected)
        }
        async fn receive(&mut self, _buf: &mut [u8], _timeout: Duration) -> Result<usize> {
            Err(Error::NotConnected)
        }
        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
        fn is_connected(&self) -> bool {
            false
        }
    }

    #[test]
    fn default_state_follows_is_connected() {
        assert_eq!(Closed.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::Faulted.to_string(), "faulted");
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }

    #[tokio::test]
    async fn trait_object_is_usable() {
        let mut t: Box<dyn Transport> = Box::new(Closed);
        assert!(matches!(t.send(b"version\0").await, Err(Error::NotConnected)));
        t.close().await.unwrap();
    }
}
