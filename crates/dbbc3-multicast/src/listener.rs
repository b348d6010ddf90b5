//! Background receiver for the telemetry multicast.
//!
//! [`MulticastListener::start`] joins the group and spawns a task that
//! receives one datagram at a time, decodes it, and publishes the result
//! into a [`Mailbox`]. The task shares nothing with command traffic; it
//! runs until [`MulticastListener::stop`] is called or the listener is
//! dropped.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use dbbc3_core::error::{Error, Result};
use dbbc3_transport::MulticastSocket;
use dbbc3_transport::udp::{DEFAULT_GROUP, DEFAULT_PORT};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::decoder::{DecoderRegistry, FrameDecoder};
use crate::mailbox::{Mailbox, MissedFramePolicy, SnapshotReceiver};
use crate::snapshot::Snapshot;

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Multicast group (default 224.0.0.255). A unicast address is bound
    /// directly, which is what tests use.
    pub group: Ipv4Addr,
    /// UDP port (default 25000).
    pub port: u16,
    /// Interface to join the group on (default: any).
    pub interface: Ipv4Addr,
    /// Receive buffer size (default 16384 bytes).
    pub buffer_size: usize,
    /// How long the loop waits for a datagram before logging silence
    /// (default 10 s). The loop keeps running either way.
    pub receive_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP,
            port: DEFAULT_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            buffer_size: 16384,
            receive_timeout: Duration::from_secs(10),
        }
    }
}

/// Handle to the running receive loop.
#[derive(Debug)]
pub struct MulticastListener {
    mailbox: Mailbox,
    cancel: CancellationToken,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MulticastListener {
    /// Join the group and start receiving with the standard layouts.
    pub async fn start(config: ListenerConfig) -> Result<Self> {
        Self::start_with_registry(config, DecoderRegistry::standard()).await
    }

    pub async fn start_with_registry(
        config: ListenerConfig,
        registry: DecoderRegistry,
    ) -> Result<Self> {
        if config.buffer_size == 0 {
            return Err(Error::InvalidParameter(
                "listener buffer size must be positive".into(),
            ));
        }
        let socket = MulticastSocket::join(config.group, config.port, config.interface).await?;
        let local_addr = socket.local_addr();
        let cancel = CancellationToken::new();
        let mailbox = Mailbox::with_cancel(cancel.clone());

        let task = tokio::spawn(receive_loop(
            socket,
            config,
            FrameDecoder::new(registry),
            mailbox.clone(),
            cancel.clone(),
        ));

        info!(local_addr = %local_addr, "Telemetry listener started");
        Ok(Self {
            mailbox,
            cancel,
            local_addr,
            task,
        })
    }

    /// A receiver that returns snapshots decoded from now on.
    pub fn subscribe(&self, policy: MissedFramePolicy) -> SnapshotReceiver {
        self.mailbox.subscribe(policy)
    }

    /// The most recent snapshot, without waiting.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.mailbox.latest()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of datagrams published so far, failures included.
    pub fn frames(&self) -> u64 {
        self.mailbox.sequence()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Stop the receive loop. Receivers fail with
    /// [`Error::NotConnected`] afterwards.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!(local_addr = %self.local_addr, "Stopping telemetry listener");
            self.cancel.cancel();
        }
    }
}

impl Drop for MulticastListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn receive_loop(
    socket: MulticastSocket,
    config: ListenerConfig,
    mut decoder: FrameDecoder,
    mailbox: Mailbox,
    cancel: CancellationToken,
) {
    let mut buf = BytesMut::zeroed(config.buffer_size);

    loop {
        let received = tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf, config.receive_timeout) => received,
        };

        match received {
            Ok((n, src)) => match decoder.decode(&buf[..n]) {
                Ok(snapshot) => {
                    debug!(
                        src = %src,
                        bytes = n,
                        mode = %snapshot.mode(),
                        version = snapshot.major_version(),
                        "Telemetry snapshot decoded"
                    );
                    mailbox.publish(snapshot);
                }
                Err(e) => {
                    warn!(src = %src, bytes = n, error = %e, "Failed to decode telemetry datagram");
                    mailbox.publish_failure(&e);
                }
            },
            Err(Error::Timeout) => {
                debug!(
                    timeout_ms = config.receive_timeout.as_millis(),
                    "No telemetry received"
                );
            }
            Err(e) => {
                warn!(error = %e, "Telemetry receive failed");
                // Avoid spinning on a persistent socket error.
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }

    info!(local_addr = %socket.local_addr(), "Telemetry listener stopped");
}
