//! UDP multicast receiver for DBBC3 telemetry.
//!
//! The device broadcasts one status datagram per second to a multicast
//! group (224.0.0.255:25000 by default). [`MulticastSocket`] binds the
//! port, joins the group, and receives datagrams with a timeout. It is
//! datagram-oriented and therefore does not implement
//! [`Transport`](dbbc3_core::Transport).
//!
//! # Example
//!
//! ```no_run
//! use dbbc3_transport::MulticastSocket;
//! use std::net::Ipv4Addr;
//! use std::time::Duration;
//!
//! # async fn example() -> dbbc3_core::Result<()> {
//! let socket = MulticastSocket::join(Ipv4Addr::new(224, 0, 0, 255), 25000, Ipv4Addr::UNSPECIFIED).await?;
//! let mut buf = vec![0u8; 16384];
//! let (n, src) = socket.recv_from(&mut buf, Duration::from_secs(10)).await?;
//! println!("{n} bytes from {src}");
//! # Ok(())
//! # }
//! ```

use dbbc3_core::error::{Error, Result};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

/// Default telemetry multicast group.
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 255);

/// Default telemetry port.
pub const DEFAULT_PORT: u16 = 25000;

/// A UDP socket subscribed to the telemetry group.
#[derive(Debug)]
pub struct MulticastSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
    group: Ipv4Addr,
    interface: Ipv4Addr,
}

impl MulticastSocket {
    /// Bind `0.0.0.0:port` and join `group` on `interface`.
    ///
    /// When `group` is not a multicast address (e.g. a loopback address in
    /// tests) the socket binds to it directly and no membership is added.
    pub async fn join(group: Ipv4Addr, port: u16, interface: Ipv4Addr) -> Result<Self> {
        let bind_addr = if group.is_multicast() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
        } else {
            SocketAddr::from((group, port))
        };

        tracing::debug!(addr = %bind_addr, group = %group, "Binding telemetry socket");

        let socket = UdpSocket::bind(bind_addr).await.map_err(|e| {
            tracing::error!(addr = %bind_addr, error = %e, "Failed to bind UDP socket");
            Error::Io(e)
        })?;

        if group.is_multicast() {
            socket.join_multicast_v4(group, interface).map_err(|e| {
                tracing::error!(group = %group, interface = %interface, error = %e, "Failed to join multicast group");
                Error::Io(e)
            })?;
        }

        let local_addr = socket.local_addr().map_err(Error::Io)?;
        tracing::info!(local_addr = %local_addr, group = %group, "Telemetry socket ready");

        Ok(Self {
            socket,
            local_addr,
            group,
            interface,
        })
    }

    /// Get the local address this socket is bound to.
    ///
    /// Useful when binding to port 0 in tests.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn group(&self) -> Ipv4Addr {
        self.group
    }

    /// The interface the membership was added on.
    pub fn interface(&self) -> Ipv4Addr {
        self.interface
    }

    /// Drop the membership added by [`join`](Self::join).
    ///
    /// Membership is keyed by group and interface, so this leaves on the
    /// interface that was joined.
    fn leave(&self) -> std::io::Result<()> {
        if self.group.is_multicast() {
            self.socket.leave_multicast_v4(self.group, self.interface)?;
        }
        Ok(())
    }

    /// Receive one datagram with timeout. Returns `(bytes_read, source_addr)`.
    ///
    /// Bytes beyond `buf.len()` are discarded, as usual for UDP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no datagram arrives within `timeout`.
    pub async fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> Result<(usize, SocketAddr)> {
        match tokio::time::timeout(timeout, self.socket.recv_from(buf)).await {
            Ok(Ok((n, src))) => {
                tracing::trace!(local = %self.local_addr, remote = %src, bytes = n, "Received datagram");
                Ok((n, src))
            }
            Ok(Err(e)) => {
                tracing::error!(local = %self.local_addr, error = %e, "Failed to receive datagram");
                Err(Error::Io(e))
            }
            Err(_) => {
                tracing::trace!(
                    local = %self.local_addr,
                    timeout_ms = timeout.as_millis(),
                    "Timeout waiting for datagram"
                );
                Err(Error::Timeout)
            }
        }
    }
}

impl Drop for MulticastSocket {
    fn drop(&mut self) {
        if let Err(e) = self.leave() {
            tracing::debug!(group = %self.group, interface = %self.interface, error = %e, "Failed to leave multicast group");
        }
    }
}
