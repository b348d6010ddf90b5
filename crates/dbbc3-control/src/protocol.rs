//! DBBC3 command framing.
//!
//! The control software accepts one ASCII command at a time, terminated by a
//! single NUL byte, and answers with free-form text. Newer releases terminate
//! the answer with NUL as well; older ones simply stop sending, so the
//! session treats a quiet line after some data as the end of the response.
//!
//! # Command format
//!
//! ```text
//! <command>[=<arg>[,<arg>...]]\0
//! ```
//!
//! # Response format
//!
//! ```text
//! <command>/ <payload>;\0
//! ```
//!
//! Multi-line answers (e.g. `core3h=1,core3_power`) separate lines with
//! `\n`, sometimes `\r\n`.

use bytes::{BufMut, BytesMut};
use dbbc3_core::error::{Error, Result};

/// Command/response terminator byte.
pub const TERMINATOR: u8 = 0;

/// Result of attempting to decode a response from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A terminated response was found.
    Response {
        /// Response text with the terminator and surrounding whitespace removed.
        text: String,
        /// Number of bytes consumed, including the terminator.
        consumed: usize,
    },

    /// No terminator yet.
    Incomplete,
}

/// Encode a command into raw bytes ready for transmission.
///
/// ```
/// use dbbc3_control::protocol::encode_command;
///
/// assert_eq!(encode_command("version"), b"version\0");
/// assert_eq!(encode_command("dbbcifa=2,agc"), b"dbbcifa=2,agc\0");
/// ```
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(command.len() + 1);
    buf.put_slice(command.as_bytes());
    buf.put_u8(TERMINATOR);
    buf.to_vec()
}

/// Attempt to decode one NUL-terminated response from `buf`.
///
/// Returns [`Error::Parse`] if the terminated body is not valid UTF-8.
pub fn decode_response(buf: &[u8]) -> Result<DecodeResult> {
    let Some(term_pos) = buf.iter().position(|&b| b == TERMINATOR) else {
        return Ok(DecodeResult::Incomplete);
    };
    let text = decode_text(&buf[..term_pos])?;
    Ok(DecodeResult::Response {
        text,
        consumed: term_pos + 1,
    })
}

/// Decode a response that ended by going quiet rather than with a NUL.
pub fn decode_unterminated(buf: &[u8]) -> Result<String> {
    decode_text(buf)
}

fn decode_text(body: &[u8]) -> Result<String> {
    match std::str::from_utf8(body) {
        Ok(s) => Ok(s.trim().to_string()),
        Err(e) => Err(Error::parse(
            format!("response is not valid UTF-8: {e}"),
            String::from_utf8_lossy(body).into_owned(),
        )),
    }
}

/// Split a response into trimmed, non-empty lines.
pub fn lines(response: &str) -> impl Iterator<Item = &str> {
    response.lines().map(str::trim).filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_appends_nul() {
        assert_eq!(encode_command("checkphase"), b"checkphase\0");
        assert_eq!(encode_command(""), b"\0");
    }

    #[test]
    fn decode_terminated() {
        let buf = b"version/ DDC_V,124,October 01 2019;\0";
        match decode_response(buf).unwrap() {
            DecodeResult::Response { text, consumed } => {
                assert_eq!(text, "version/ DDC_V,124,October 01 2019;");
                assert_eq!(consumed, buf.len());
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn decode_strips_whitespace() {
        match decode_response(b"\r\nStopped\r\n\0trailing").unwrap() {
            DecodeResult::Response { text, consumed } => {
                assert_eq!(text, "Stopped");
                assert_eq!(consumed, 12);
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn decode_incomplete() {
        assert_eq!(
            decode_response(b"dbbcifa/ 2,30").unwrap(),
            DecodeResult::Incomplete
        );
        assert_eq!(decode_response(b"").unwrap(), DecodeResult::Incomplete);
    }

    #[test]
    fn invalid_utf8_is_parse_error() {
        let err = decode_response(b"abc\xff\0").unwrap_err();
        match err {
            Error::Parse { raw, .. } => assert!(raw.starts_with("abc")),
            other => panic!("expected Parse, got {other:?}"),
        }
        assert!(decode_unterminated(b"\xfe\xff").is_err());
    }

    #[test]
    fn unterminated_text() {
        assert_eq!(decode_unterminated(b"  Reset done \n").unwrap(), "Reset done");
    }

    #[test]
    fn lines_skip_blanks() {
        let all: Vec<&str> = lines("a\r\n\r\n  b \nc").collect();
        assert_eq!(all, vec!["a", "b", "c"]);
    }
}
