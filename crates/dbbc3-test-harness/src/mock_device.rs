//! Scripted TCP peer standing in for the DBBC3 control software.
//!
//! [`MockDevice`] listens on a random localhost port. Once started it
//! accepts a single connection and processes expectations in order: it
//! reads one NUL-terminated command, checks it against the next
//! expectation, and writes the scripted reply.
//!
//! # Example
//!
//! ```
//! use dbbc3_test_harness::MockDevice;
//!
//! # async fn example() -> dbbc3_core::Result<()> {
//! let mut device = MockDevice::new().await?;
//! device.expect("version", "version/ DDC_V,124,October 01 2019;");
//! let addr = device.addr().to_string();
//! device.start();
//! // ... connect a session to `addr` ...
//! # Ok(())
//! # }
//! ```

use dbbc3_core::error::{Error, Result};
use std::collections::VecDeque;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct DeviceExpectation {
    command: String,
    reply: Vec<u8>,
}

/// A scripted single-client TCP device.
pub struct MockDevice {
    addr: String,
    listener: Option<TcpListener>,
    expectations: VecDeque<DeviceExpectation>,
    handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockDevice {
    /// Bind a listener on a random localhost port.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Connection(format!("failed to bind mock device: {e}")))?;
        let addr = listener.local_addr().map_err(Error::Io)?.to_string();
        Ok(Self {
            addr,
            listener: Some(listener),
            expectations: VecDeque::new(),
            handle: None,
        })
    }

    /// Expect `command` (without terminator) and answer with `reply`.
    pub fn expect(&mut self, command: &str, reply: &str) {
        self.expectations.push_back(DeviceExpectation {
            command: command.to_string(),
            reply: reply.as_bytes().to_vec(),
        });
    }

    /// `host:port` of the listener.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Start serving in a background task.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let expectations: Vec<DeviceExpectation> = self.expectations.drain(..).collect();

        self.handle = Some(tokio::spawn(async move {
            let (mut stream, peer) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {e}"))?;
            tracing::debug!(peer = %peer, "Mock device accepted connection");

            for (i, expectation) in expectations.iter().enumerate() {
                let command = read_command(&mut stream)
                    .await
                    .map_err(|e| format!("expectation {i}: {e}"))?;
                if command != expectation.command {
                    return Err(format!(
                        "expectation {i}: command mismatch: expected {:?}, got {:?}",
                        expectation.command, command
                    ));
                }
                stream
                    .write_all(&expectation.reply)
                    .await
                    .map_err(|e| format!("expectation {i}: write error: {e}"))?;
                stream
                    .flush()
                    .await
                    .map_err(|e| format!("expectation {i}: flush error: {e}"))?;
            }

            // Hold the link open until the client hangs up.
            let mut rest = [0u8; 64];
            while let Ok(n) = stream.read(&mut rest).await {
                if n == 0 {
                    break;
                }
            }
            Ok(())
        }));
    }

    /// Wait for the server task and report any script mismatch.
    pub async fn wait(self) -> std::result::Result<(), String> {
        match self.handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("mock device task panicked: {e}"))?,
            None => Err("mock device was never started".into()),
        }
    }
}

async fn read_command(stream: &mut TcpStream) -> std::result::Result<String, String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream
            .read(&mut byte)
            .await
            .map_err(|e| format!("read error: {e}"))?;
        if n == 0 {
            return Err(format!(
                "client disconnected mid-command after {:?}",
                String::from_utf8_lossy(&bytes)
            ));
        }
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    String::from_utf8(bytes).map_err(|e| format!("command is not UTF-8: {e}"))
}
