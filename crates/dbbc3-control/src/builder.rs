//! SessionBuilder -- fluent builder for connecting a [`Session`].
//!
//! Separates configuration from construction so that callers can set the
//! port, board count and timeouts before the TCP connection is made. On
//! build the device is identified with `version` and the matching command
//! set is resolved; a device that cannot be identified never yields a
//! session.
//!
//! # Example
//!
//! ```no_run
//! use dbbc3_control::SessionBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> dbbc3_core::Result<()> {
//! let session = SessionBuilder::new("dbbc3.example.org")
//!     .board_count(4)
//!     .read_timeout(Duration::from_secs(10))
//!     .connect()
//!     .await?;
//! println!("{}", session.firmware());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use dbbc3_core::error::{Error, Result};
use dbbc3_core::transport::Transport;
use dbbc3_core::{BoardTable, FirmwareInfo, Mode, ModeVersion};
use dbbc3_transport::TcpTransport;
use dbbc3_transport::tcp::DEFAULT_CONNECT_TIMEOUT;
use tracing::info;

use crate::grammar::common::parse_version;
use crate::registry::CommandSetRegistry;
use crate::session::{Session, SessionConfig, exchange};

/// Default TCP port of the DBBC3 control software.
pub const DEFAULT_PORT: u16 = 4000;

/// Fluent builder for [`Session`].
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    host: String,
    port: u16,
    board_count: usize,
    connect_timeout: Duration,
    config: SessionConfig,
    expected_mode: Option<Mode>,
    expected_version: Option<u32>,
    registry: CommandSetRegistry,
}

impl SessionBuilder {
    /// Create a builder for the device at `host`.
    pub fn new(host: &str) -> Self {
        SessionBuilder {
            host: host.to_string(),
            port: DEFAULT_PORT,
            board_count: dbbc3_core::MAX_BOARDS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            config: SessionConfig::default(),
            expected_mode: None,
            expected_version: None,
            registry: CommandSetRegistry::standard(),
        }
    }

    /// Set the TCP port (default: 4000).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the number of installed core boards, 1-8 (default: 8).
    pub fn board_count(mut self, count: usize) -> Self {
        self.board_count = count;
        self
    }

    /// Set the TCP connect timeout (default: 120s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the wait for the first byte of a response (default: 5s).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the quiet interval that ends an unterminated response
    /// (default: 50ms).
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.config.drain_timeout = timeout;
        self
    }

    /// Reject a device running any other mode.
    pub fn expected_mode(mut self, mode: Mode) -> Self {
        self.expected_mode = Some(mode);
        self
    }

    /// Reject a device running any other major version.
    pub fn expected_version(mut self, version: u32) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// Replace the standard command-set registry.
    pub fn registry(mut self, registry: CommandSetRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// `host:port` this builder connects to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect over TCP and identify the device.
    pub async fn connect(self) -> Result<Session> {
        let transport = TcpTransport::connect_with_timeout(&self.addr(), self.connect_timeout).await?;
        self.build_with_transport(Box::new(transport)).await
    }

    /// Build a [`Session`] with a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` from
    /// `dbbc3-test-harness`). On any failure the transport is closed.
    pub async fn build_with_transport(self, mut transport: Box<dyn Transport>) -> Result<Session> {
        match self.identify(transport.as_mut()).await {
            Ok((firmware, boards, raw)) => {
                let command_set = match self.registry.resolve(firmware.mode_version) {
                    Ok(set) => set,
                    Err(e) => {
                        let _ = transport.close().await;
                        return Err(e);
                    }
                };
                info!(
                    addr = %self.addr(),
                    mode = %firmware.mode(),
                    version = firmware.version(),
                    release = %firmware.release_string,
                    floor = %command_set.floor(),
                    "Connected to DBBC3"
                );
                Ok(Session::new(
                    transport,
                    command_set,
                    firmware,
                    boards,
                    self.config,
                    raw,
                ))
            }
            Err(e) => {
                let _ = transport.close().await;
                Err(e)
            }
        }
    }

    async fn identify(
        &self,
        transport: &mut dyn Transport,
    ) -> Result<(FirmwareInfo, BoardTable, String)> {
        let boards = BoardTable::new(self.board_count)?;
        let raw = exchange(transport, "version", &self.config).await?;
        let firmware = parse_version(&raw)?;

        let mode_mismatch = self.expected_mode.is_some_and(|m| m != firmware.mode());
        let version_mismatch = self
            .expected_version
            .is_some_and(|v| v != firmware.version());
        if mode_mismatch || version_mismatch {
            let expected = ModeVersion::new(
                self.expected_mode.unwrap_or(firmware.mode()),
                self.expected_version.unwrap_or(firmware.version()),
            );
            tracing::warn!(
                expected = %expected,
                actual = %firmware.mode_version,
                "Device runs unexpected firmware"
            );
            return Err(Error::UnsupportedVersion {
                mode: firmware.mode().to_string(),
                version: firmware.version(),
            });
        }
        Ok((firmware, boards, raw))
    }
}
