//! Command grammars by family.
//!
//! - [`common`] -- commands every mode understands
//! - [`core3h`] -- formatter registers, VSI input, VDIF and 10GbE setup
//! - [`adb3l`] -- sampler resets and trims
//! - [`ddc`] -- DDC-family BBC, DSC, and PPS commands
//! - [`oct`] -- OCT-family filter taps
//!
//! The helpers here pull fields out of replies of the form
//! `<command>/ a,b,c;` and build [`Error::Parse`] values that carry the
//! full reply text.

pub mod adb3l;
pub mod common;
pub mod core3h;
pub mod ddc;
pub mod oct;

use std::str::FromStr;

use dbbc3_core::error::{Error, Result};

use crate::protocol;

/// The reply of a single-exchange command.
pub(crate) fn reply(replies: &[String]) -> Result<&str> {
    replies
        .last()
        .map(String::as_str)
        .ok_or_else(|| Error::parse("no reply collected", ""))
}

/// Payload following `prefix` on the first line that starts with it, with
/// the trailing `;` removed.
pub(crate) fn payload<'a>(raw: &'a str, prefix: &str) -> Result<&'a str> {
    protocol::lines(raw)
        .find_map(|line| line.strip_prefix(prefix))
        .map(|rest| rest.trim().trim_end_matches(';').trim())
        .ok_or_else(|| Error::parse(format!("expected a {prefix} reply"), raw))
}

/// Comma-separated fields of a payload.
pub(crate) fn fields(payload: &str) -> Vec<&str> {
    payload.split(',').map(str::trim).collect()
}

/// Parse one field, naming it in the error.
pub(crate) fn number<T: FromStr>(field: &str, what: &str, raw: &str) -> Result<T> {
    field
        .trim()
        .parse()
        .map_err(|_| Error::parse(format!("invalid {what} {field:?}"), raw))
}

/// Value after the first `:` of a line, without a trailing `;`.
pub(crate) fn after_colon<'a>(line: &'a str, raw: &str) -> Result<&'a str> {
    line.split_once(':')
        .map(|(_, v)| v.trim().trim_end_matches(';').trim())
        .ok_or_else(|| Error::parse(format!("expected ':' in {line:?}"), raw))
}

pub(crate) fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

pub(crate) fn check_range(name: &str, value: i64, min: i64, max: i64) -> Result<i64> {
    if value < min || value > max {
        return Err(Error::InvalidParameter(format!(
            "{name} must be in the range {min}-{max}, got {value}"
        )));
    }
    Ok(value)
}

/// Parse delay entries like `[1]: 39 ns, [2] 39 ns`.
pub(crate) fn pps_entries(payload: &str, raw: &str) -> Result<Vec<u32>> {
    payload
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(|entry| {
            let (_, rest) = entry
                .split_once(']')
                .ok_or_else(|| Error::parse(format!("malformed PPS entry {entry:?}"), raw))?;
            let value = rest.trim_start_matches(':').trim();
            let value = value.strip_suffix("ns").unwrap_or(value);
            number(value, "PPS delay", raw)
        })
        .collect()
}
