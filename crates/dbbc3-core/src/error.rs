//! Error types for DBBC3 control.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, response parse
//! failures, telemetry decode failures, and version/registry mismatches are
//! all captured here.

/// The error type for all DBBC3 operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The link to the device could not be established or maintained.
    #[error("connection error: {0}")]
    Connection(String),

    /// No response or snapshot arrived within the allotted window.
    ///
    /// The link may still be usable after a timeout.
    #[error("timeout waiting for response")]
    Timeout,

    /// A command response did not match the grammar of the active command set.
    #[error("parse error: {message} (raw response: {raw:?})")]
    Parse {
        /// What was wrong with the response.
        message: String,
        /// The offending response text.
        raw: String,
    },

    /// A telemetry datagram was structurally malformed.
    #[error("decode error: {message} ({} raw bytes)", .raw.len())]
    Decode {
        /// What was wrong with the payload.
        message: String,
        /// The offending payload.
        raw: Vec<u8>,
    },

    /// No registry entry covers the device's mode and version.
    #[error("unsupported version: no entry for mode {mode} version {version}")]
    UnsupportedVersion {
        /// Mode tag as reported by the device.
        mode: String,
        /// Major version as reported by the device.
        version: u32,
    },

    /// The requested validation check does not exist for the active mode.
    #[error("check {check} is not supported in {family} mode")]
    UnsupportedCheck {
        /// The check that was requested.
        check: String,
        /// The command-set family of the session.
        family: String,
    },

    /// The command is not part of the active command set.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Another command is already outstanding on this session.
    #[error("concurrent access: a command is already outstanding on this session")]
    ConcurrentAccess,

    /// An invalid parameter was passed to a command.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the device has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// Telemetry frames were skipped between two polls.
    #[error("missed {missed} telemetry frame(s) since the last poll")]
    MissedFrames {
        /// Number of frames that were overwritten unread.
        missed: u64,
    },

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::Parse`] from a message and the raw response text.
    pub fn parse(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
            raw: raw.into(),
        }
    }

    /// Build a [`Error::Decode`] from a message and the raw payload.
    pub fn decode(message: impl Into<String>, raw: &[u8]) -> Self {
        Error::Decode {
            message: message.into(),
            raw: raw.to_vec(),
        }
    }

    /// Whether this error means the link itself is gone.
    ///
    /// Sessions move to the faulted state when a command fails with one of
    /// these.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::ConnectionLost | Error::NotConnected | Error::Io(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
