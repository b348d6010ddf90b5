//! ADB3L sampler maintenance: resets, built-in self test and the per-sampler
//! delay, offset and gain trims. Replies are informational.

use dbbc3_core::error::Result;

use super::check_range;
use super::common::dec_text;
use crate::commandset::{Call, CommandSpec};

/// Trim values restored when none is given.
pub const DEFAULT_DELAY: i64 = 512;
pub const DEFAULT_OFFSET: i64 = 128;
pub const DEFAULT_GAIN: i64 = 128;

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("adb3l_reset", enc_reset, dec_text),
        CommandSpec::new("adb3l_reseth", enc_reseth, dec_text),
        CommandSpec::new("adb3l_resets", enc_resets, dec_text),
        CommandSpec::new("adb3l_biston", enc_biston, dec_text),
        CommandSpec::new("adb3l_bistoff", enc_bistoff, dec_text),
        CommandSpec::new("adb3l_sda_on", enc_sda_on, dec_text),
        CommandSpec::new("adb3l_delay", enc_delay, dec_text),
        CommandSpec::new("adb3l_offset", enc_offset, dec_text),
        CommandSpec::new("adb3l_gain", enc_gain, dec_text),
    ]
}

fn sampler(call: &Call, index: usize) -> Result<i64> {
    check_range("sampler", call.int(index)?, 0, 3)
}

/// Reset every sampler.
fn enc_reset(_: &Call) -> Result<Vec<String>> {
    Ok(vec!["adb3l=reset".into()])
}

/// Reset every sampler, keeping the current trims.
fn enc_reseth(_: &Call) -> Result<Vec<String>> {
    Ok(vec!["adb3l=reseth".into()])
}

/// Parameter: sampler; all samplers of the board without one.
fn enc_resets(call: &Call) -> Result<Vec<String>> {
    let board = call.number()?;
    Ok(vec![match call.opt_int(0)? {
        Some(_) => format!("adb3l=resets={board},{}", sampler(call, 0)?),
        None => format!("adb3l=resets={board}"),
    }])
}

fn enc_biston(call: &Call) -> Result<Vec<String>> {
    Ok(vec![format!("adb3l=biston={}", call.number()?)])
}

fn enc_bistoff(call: &Call) -> Result<Vec<String>> {
    Ok(vec![format!("adb3l=bistoff={}", call.number()?)])
}

/// Parameter: sampler.
fn enc_sda_on(call: &Call) -> Result<Vec<String>> {
    Ok(vec![format!(
        "adb3l=SDA_on={},{}",
        call.number()?,
        sampler(call, 0)?
    )])
}

/// `adb3l=<what>=N,sampler,value` with the value range checked.
fn trim(call: &Call, what: &str, default: i64, max: i64) -> Result<Vec<String>> {
    let sampler = sampler(call, 0)?;
    let value = check_range(what, call.opt_int(1)?.unwrap_or(default), 0, max)?;
    Ok(vec![format!(
        "adb3l={what}={},{sampler},{value}",
        call.number()?
    )])
}

/// Parameters: sampler, delay (0-1023, default 512).
fn enc_delay(call: &Call) -> Result<Vec<String>> {
    trim(call, "delay", DEFAULT_DELAY, 1023)
}

/// Parameters: sampler, offset (0-255, default 128).
fn enc_offset(call: &Call) -> Result<Vec<String>> {
    trim(call, "offset", DEFAULT_OFFSET, 255)
}

/// Parameters: sampler, gain (0-255, default 128).
fn enc_gain(call: &Call) -> Result<Vec<String>> {
    trim(call, "gain", DEFAULT_GAIN, 255)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commandset::Args;
    use dbbc3_core::{BoardTable, Error};

    fn encode(name: &str, args: Args) -> Result<Vec<String>> {
        let spec = commands().into_iter().find(|s| s.name == name).unwrap();
        (spec.encode)(&Call::new(args, BoardTable::default()).unwrap())
    }

    #[test]
    fn resets() {
        assert_eq!(encode("adb3l_reset", Args::none()).unwrap(), vec!["adb3l=reset"]);
        assert_eq!(encode("adb3l_reseth", Args::none()).unwrap(), vec!["adb3l=reseth"]);
        assert_eq!(
            encode("adb3l_resets", Args::for_board('B')).unwrap(),
            vec!["adb3l=resets=2"]
        );
        assert_eq!(
            encode("adb3l_resets", Args::for_board('B').int(3)).unwrap(),
            vec!["adb3l=resets=2,3"]
        );
        assert!(encode("adb3l_resets", Args::none()).is_err());
    }

    #[test]
    fn self_test_and_sda() {
        assert_eq!(
            encode("adb3l_biston", Args::for_board('H')).unwrap(),
            vec!["adb3l=biston=8"]
        );
        assert_eq!(
            encode("adb3l_bistoff", Args::for_board(0usize)).unwrap(),
            vec!["adb3l=bistoff=1"]
        );
        assert_eq!(
            encode("adb3l_sda_on", Args::for_board('A').int(2)).unwrap(),
            vec!["adb3l=SDA_on=1,2"]
        );
    }

    #[test]
    fn trims_default_and_range() {
        assert_eq!(
            encode("adb3l_delay", Args::for_board('A').int(0)).unwrap(),
            vec!["adb3l=delay=1,0,512"]
        );
        assert_eq!(
            encode("adb3l_delay", Args::for_board('A').int(1).int(1023)).unwrap(),
            vec!["adb3l=delay=1,1,1023"]
        );
        assert_eq!(
            encode("adb3l_gain", Args::for_board('C').int(3)).unwrap(),
            vec!["adb3l=gain=3,3,128"]
        );
        assert!(matches!(
            encode("adb3l_offset", Args::for_board('A').int(0).int(256)),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            encode("adb3l_gain", Args::for_board('A').int(4)),
            Err(Error::InvalidParameter(_))
        ));
    }
}
