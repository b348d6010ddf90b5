//! Mock transport for deterministic testing of sessions and command sets.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! command/response pairs. Commands are matched including their NUL
//! terminator, exactly as a session puts them on the wire.
//!
//! # Example
//!
//! ```
//! use dbbc3_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! mock.expect_command("version", "version/ OCT_D,120,October 19th 2021;");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dbbc3_core::error::{Error, Result};
use dbbc3_core::transport::{ConnectionState, Transport};

#[derive(Debug, Clone)]
enum Reply {
    Bytes(Vec<u8>),
    /// Arrives only after the first read has timed out.
    Late(Vec<u8>),
    ConnectionLost,
}

#[derive(Debug, Clone)]
struct Expectation {
    request: Vec<u8>,
    reply: Reply,
}

/// Shared record of everything sent through a [`MockTransport`].
pub type SentLog = Arc<Mutex<Vec<Vec<u8>>>>;

/// A mock [`Transport`] for testing without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation; the
/// corresponding response is then returned by the next `receive()` call.
/// Once a response has been fully read, further `receive()` calls time out
/// immediately, which is what a session sees when the device goes quiet.
///
/// A late reply (see [`expect_late_reply`](Self::expect_late_reply)) lands
/// in an inbox that is read before anything else, like bytes left in a
/// socket buffer.
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    pending: Option<Reply>,
    inbox: Vec<u8>,
    cursor: usize,
    state: ConnectionState,
    sent_log: SentLog,
    response_delay: Duration,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending: None,
            inbox: Vec::new(),
            cursor: 0,
            state: ConnectionState::Connected,
            sent_log: Arc::new(Mutex::new(Vec::new())),
            response_delay: Duration::ZERO,
        }
    }

    /// Add an expected raw request/response pair.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            reply: Reply::Bytes(response.to_vec()),
        });
    }

    /// Expect `command` (the NUL terminator is appended) and answer with
    /// `response`.
    pub fn expect_command(&mut self, command: &str, response: &str) {
        self.expect(&terminated(command), response.as_bytes());
    }

    /// Expect `command` and then drop the link instead of answering.
    pub fn expect_connection_lost(&mut self, command: &str) {
        self.expectations.push_back(Expectation {
            request: terminated(command),
            reply: Reply::ConnectionLost,
        });
    }

    /// Expect `command` and answer only after the reader has given up:
    /// the first `receive()` times out and `response` then sits unread
    /// until the next `receive()`, whichever command that belongs to.
    pub fn expect_late_reply(&mut self, command: &str, response: &str) {
        self.expectations.push_back(Expectation {
            request: terminated(command),
            reply: Reply::Late(response.as_bytes().to_vec()),
        });
    }

    /// Delay every response by `delay`, to keep a command outstanding.
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Handle to the log of sent data; stays valid after the mock is boxed.
    pub fn sent_log(&self) -> SentLog {
        Arc::clone(&self.sent_log)
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the connected state of the mock transport.
    pub fn set_connected(&mut self, connected: bool) {
        self.state = if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn terminated(command: &str) -> Vec<u8> {
    let mut bytes = command.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }

        if let Ok(mut log) = self.sent_log.lock() {
            log.push(data.to_vec());
        }

        let Some(expectation) = self.expectations.pop_front() else {
            return Err(Error::Unsupported(format!(
                "no more expectations in mock transport (got {:?})",
                String::from_utf8_lossy(data)
            )));
        };
        if data != expectation.request.as_slice() {
            return Err(Error::InvalidParameter(format!(
                "unexpected send data: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            )));
        }
        self.pending = Some(expectation.reply);
        self.cursor = 0;
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if self.state != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }

        if !self.inbox.is_empty() {
            let n = self.inbox.len().min(buf.len());
            buf[..n].copy_from_slice(&self.inbox[..n]);
            self.inbox.drain(..n);
            return Ok(n);
        }

        match self.pending.take() {
            Some(Reply::Late(response)) => {
                self.inbox = response;
                Err(Error::Timeout)
            }
            Some(Reply::ConnectionLost) => {
                self.state = ConnectionState::Faulted;
                Err(Error::ConnectionLost)
            }
            Some(Reply::Bytes(response)) => {
                if self.cursor == 0 && !self.response_delay.is_zero() {
                    tokio::time::sleep(self.response_delay).await;
                }
                let remaining = &response[self.cursor..];
                if remaining.is_empty() {
                    self.cursor = 0;
                    return Err(Error::Timeout);
                }
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                self.cursor += n;
                if self.cursor < response.len() {
                    self.pending = Some(Reply::Bytes(response));
                } else {
                    self.cursor = 0;
                }
                Ok(n)
            }
            None => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.state = ConnectionState::Disconnected;
        self.pending = None;
        self.inbox.clear();
        self.cursor = 0;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}
