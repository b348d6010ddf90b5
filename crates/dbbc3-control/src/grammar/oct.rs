//! OCT-family commands: polyphase filter taps.

use dbbc3_core::error::Result;

use super::common::dec_text;
use crate::commandset::{Call, CommandSpec};

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("tap", enc_tap, dec_text),
        CommandSpec::new("tap2", enc_tap2, dec_text),
    ]
}

/// Parameters: filter file, scaling (default 1).
fn tap(name: &str, call: &Call) -> Result<Vec<String>> {
    let file = call.text(0)?;
    let scaling = call.opt_int(1)?.unwrap_or(1);
    Ok(vec![format!("{name}={},{file},{scaling}", call.number()?)])
}

fn enc_tap(call: &Call) -> Result<Vec<String>> {
    tap("tap", call)
}

fn enc_tap2(call: &Call) -> Result<Vec<String>> {
    tap("tap2", call)
}
