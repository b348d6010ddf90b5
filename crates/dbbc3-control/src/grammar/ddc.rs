//! DDC-family commands: baseband converters, DSC statistics, PPS delays.

use dbbc3_core::error::{Error, Result};

use super::common::{dec_correlation, dec_text};
use super::{check_range, fields, number, on_off, payload, pps_entries, reply};
use crate::commandset::{Call, CommandSpec};
use crate::protocol::lines;
use crate::response::{BbcGain, BbcStatistics, GainMode, LevelCount, Response};

/// Highest BBC number.
pub const MAX_BBC: i64 = 128;

/// Highest BBC frequency in MHz.
pub const MAX_BBC_FREQUENCY: f64 = 4096.0;

/// DDC_V fixes the BBC bandwidth.
pub const FIXED_BANDWIDTH_MHZ: u32 = 32;

/// Entries in an all-board `pps_delay` reply.
const PPS_SLOTS: usize = 8;

/// Grammar shared by every DDC floor. `pps_delay` here is the all-board form.
pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("dbbc", enc_dbbc, dec_text),
        CommandSpec::new("dbbcgain", enc_dbbcgain, dec_dbbcgain),
        CommandSpec::new("dbbcstat", enc_dbbcstat, dec_dbbcstat),
        CommandSpec::new("dbbctp", enc_dbbctp, dec_text),
        CommandSpec::new("cont_cal", enc_cont_cal, dec_text),
        CommandSpec::new("dsc_tp", enc_dsc_tp, dec_dsc_tp),
        CommandSpec::new("dsc_corr", enc_dsc_corr, dec_correlation),
        CommandSpec::new("dsc_bstat", enc_dsc_bstat, dec_dsc_bstat),
        CommandSpec::new("mag_thr", enc_mag_thr, dec_text),
        CommandSpec::new("pps_delay", enc_pps_delay, dec_pps_delay),
        CommandSpec::new("core3hread", enc_core3hread, dec_core3hread),
        CommandSpec::new("core3hwrite", enc_core3hwrite, dec_text),
    ]
}

/// `pps_delay` accepting an optional board (DDC_V 124 and later).
pub fn pps_delay_per_board() -> CommandSpec {
    CommandSpec::new("pps_delay", enc_pps_delay_board, dec_pps_delay_board)
}

fn bbc(call: &Call) -> Result<i64> {
    check_range("BBC", call.int(0)?, 1, MAX_BBC)
}

// ---------------------------------------------------------------
// BBC
// ---------------------------------------------------------------

/// Parameters: bbc, frequency (MHz), IF label (`a`-`h`), tpint (s).
///
/// Without a frequency the current settings are queried.
fn enc_dbbc(call: &Call) -> Result<Vec<String>> {
    let bbc = bbc(call)?;
    let mut cmd = format!("dbbc{bbc:02}");
    let Some(freq) = call.opt_float(1)? else {
        return Ok(vec![cmd]);
    };
    if !(0.0..=MAX_BBC_FREQUENCY).contains(&freq) {
        return Err(Error::InvalidParameter(format!(
            "dbbc: frequency must be in the range 0-{MAX_BBC_FREQUENCY} MHz, got {freq}"
        )));
    }
    let label = call
        .opt_text(2)?
        .ok_or_else(|| Error::InvalidParameter("dbbc: an IF label is required".into()))?
        .to_lowercase();
    if label.len() != 1 || !"abcdefgh".contains(label.as_str()) {
        return Err(Error::InvalidParameter(
            "dbbc: IF label must be one of abcdefgh".into(),
        ));
    }
    cmd.push_str(&format!("={freq:.6},{label}"));
    if let Some(tpint) = call.opt_int(3)? {
        let tpint = check_range("dbbc tpint", tpint, 1, 60)?;
        cmd.push_str(&format!(",{FIXED_BANDWIDTH_MHZ},{tpint}"));
    }
    Ok(vec![cmd])
}

/// Parameters: bbc, mode (`agc` or `man`), then target for `agc` or the
/// USB/LSB gains for `man`.
fn enc_dbbcgain(call: &Call) -> Result<Vec<String>> {
    let bbc = bbc(call)?;
    let mut cmd = format!("dbbcgain={bbc}");
    match call.opt_text(1)? {
        None => {}
        Some("agc") => {
            cmd.push_str(",agc");
            if let Some(target) = call.opt_int(2)? {
                cmd.push_str(&format!(",{}", check_range("target", target, 0, i64::MAX)?));
            }
        }
        Some("man") => match call.opt_int(2)? {
            Some(usb) => {
                cmd.push_str(&format!(",{}", check_range("gainU", usb, 0, 255)?));
                if let Some(lsb) = call.opt_int(3)? {
                    cmd.push_str(&format!(",{}", check_range("gainL", lsb, 0, 255)?));
                }
            }
            None => cmd.push_str(",man"),
        },
        Some(other) => {
            return Err(Error::InvalidParameter(format!(
                "dbbcgain: mode must be agc or man, got {other:?}"
            )));
        }
    }
    Ok(vec![cmd])
}

/// `dbbcgain/ 1,83,74,agc,15000;` or `dbbcgain/ 1,83,74,man;`.
fn dec_dbbcgain(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let f = fields(payload(raw, "dbbcgain/")?);
    if f.len() < 4 {
        return Err(Error::parse("expected bbc,gainU,gainL,mode", raw));
    }
    let mode = match (f[3], f.get(4)) {
        ("agc", Some(target)) => GainMode::Agc {
            target: number(target, "target", raw)?,
        },
        ("agc", None) => return Err(Error::parse("agc reply without target", raw)),
        ("man", _) => GainMode::Manual,
        (other, _) => return Err(Error::parse(format!("unknown gain mode {other:?}"), raw)),
    };
    Ok(Response::BbcGain(BbcGain {
        bbc: number(f[0], "BBC", raw)?,
        gain_usb: number(f[1], "USB gain", raw)?,
        gain_lsb: number(f[2], "LSB gain", raw)?,
        mode,
    }))
}

fn enc_dbbcstat(call: &Call) -> Result<Vec<String>> {
    let bbc = bbc(call)?;
    Ok(vec![format!("dbbcstat={bbc},s"), format!("dbbcstat={bbc},m")])
}

/// One reply per statistic, e.g. `dbbcstat/ 16,S,34.67,34.53;`.
fn dec_dbbcstat(_: &Call, replies: &[String]) -> Result<Response> {
    let [sign, magnitude] = replies else {
        return Err(Error::parse(
            "expected sign and magnitude replies",
            replies.join("\n"),
        ));
    };
    let pair = |raw: &str, kind: &str| -> Result<(f64, f64)> {
        let f = fields(payload(raw, "dbbcstat/")?);
        if f.len() < 4 || f[1] != kind {
            return Err(Error::parse(format!("expected {kind} statistics"), raw));
        }
        Ok((
            number(f[2], "USB statistic", raw)?,
            number(f[3], "LSB statistic", raw)?,
        ))
    };
    Ok(Response::BbcStatistics(BbcStatistics {
        sign: pair(sign.as_str(), "S")?,
        magnitude: pair(magnitude.as_str(), "M")?,
    }))
}

fn enc_dbbctp(call: &Call) -> Result<Vec<String>> {
    Ok(vec![format!("dbbctp{}", call.letter()?)])
}

fn enc_cont_cal(call: &Call) -> Result<Vec<String>> {
    Ok(vec![format!("cont_cal={}", on_off(call.flag(0)?))])
}

fn enc_mag_thr(call: &Call) -> Result<Vec<String>> {
    let bbc = bbc(call)?;
    Ok(vec![format!("mag_thr={bbc},{}", call.int(1)?)])
}

// ---------------------------------------------------------------
// DSC
// ---------------------------------------------------------------

fn enc_dsc_tp(call: &Call) -> Result<Vec<String>> {
    Ok(vec![format!("dsc_tp={}", call.number()?)])
}

/// Lines like `TP[2][0] = 69948`.
fn dec_dsc_tp(call: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let prefix = format!("TP[{}][", call.number()?);
    let values = lines(raw)
        .filter(|l| l.starts_with(&prefix))
        .map(|l| {
            let (_, v) = l
                .split_once('=')
                .ok_or_else(|| Error::parse("malformed TP line", raw))?;
            number(v.trim_end_matches(';'), "total power", raw)
        })
        .collect::<Result<Vec<u64>>>()?;
    if values.is_empty() {
        return Err(Error::parse("no total power values in reply", raw));
    }
    Ok(Response::Values(values))
}

fn enc_dsc_corr(call: &Call) -> Result<Vec<String>> {
    Ok(vec![format!("dsc_corr={}", call.number()?)])
}

fn enc_dsc_bstat(call: &Call) -> Result<Vec<String>> {
    let sampler = check_range("sampler", call.int(0)?, 0, 3)?;
    Ok(vec![format!("dsc_bstat={}, {sampler}", call.number()?)])
}

/// Lines like `[11] =   1454,   9%`, reported for levels 11, 10, 01, 00.
fn dec_dsc_bstat(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let mut levels = [None; 4];
    for line in lines(raw) {
        let line = line.trim_end_matches(';');
        let Some((level, rest)) = line
            .strip_prefix('[')
            .and_then(|l| l.split_once(']'))
        else {
            continue;
        };
        let slot = match level {
            "11" => 0,
            "10" => 1,
            "01" => 2,
            "00" => 3,
            _ => continue,
        };
        let rest = rest.trim().trim_start_matches('=');
        let Some((count, percent)) = rest.split_once(',') else {
            return Err(Error::parse(format!("malformed level line {line:?}"), raw));
        };
        levels[slot] = Some(LevelCount {
            count: number(count, "level count", raw)?,
            percent: number(percent.trim().trim_end_matches('%'), "level percentage", raw)?,
        });
    }
    match levels {
        [Some(a), Some(b), Some(c), Some(d)] => Ok(Response::LevelCounts([a, b, c, d])),
        _ => Err(Error::parse("expected levels 11, 10, 01 and 00", raw)),
    }
}

// ---------------------------------------------------------------
// PPS
// ---------------------------------------------------------------

fn enc_pps_delay(_: &Call) -> Result<Vec<String>> {
    Ok(vec!["pps_delay".into()])
}

/// `pps_delay/ [1]: 39 ns, [2] 39 ns, ...;` always lists eight slots; only
/// the first board-count entries are returned.
fn dec_pps_delay(call: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let mut delays = pps_entries(payload(raw, "pps_delay/")?, raw)?;
    let boards = call.boards().count();
    if delays.len() < boards.min(PPS_SLOTS) {
        return Err(Error::parse(
            format!("expected {PPS_SLOTS} PPS delays, got {}", delays.len()),
            raw,
        ));
    }
    delays.truncate(boards);
    Ok(Response::PpsDelays(delays))
}

fn enc_pps_delay_board(call: &Call) -> Result<Vec<String>> {
    if call.has_board() {
        Ok(vec![format!("pps_delay={}", call.number()?)])
    } else {
        enc_pps_delay(call)
    }
}

/// With a board: `pps_delay[1]/ [1]: 43 ns, [5] 43 ns;`, one entry per
/// PPS block of that board.
fn dec_pps_delay_board(call: &Call, replies: &[String]) -> Result<Response> {
    if !call.has_board() {
        return dec_pps_delay(call, replies);
    }
    let raw = reply(replies)?;
    let prefix = format!("pps_delay[{}]/", call.number()?);
    let delays = pps_entries(payload(raw, &prefix)?, raw)?;
    if delays.is_empty() {
        return Err(Error::parse("no PPS block delays in reply", raw));
    }
    Ok(Response::PpsDelays(delays))
}

// ---------------------------------------------------------------
// core3h registers
// ---------------------------------------------------------------

fn register_address(call: &Call) -> Result<String> {
    Ok(format!(
        "{},{},{},{}",
        call.number()?,
        call.int(0)?,
        call.int(1)?,
        call.int(2)?
    ))
}

/// Parameters: block, bbc, register (all one-based).
fn enc_core3hread(call: &Call) -> Result<Vec<String>> {
    Ok(vec![format!("core3hread={}", register_address(call)?)])
}

/// `core3hread/ Core3H[1],Block[1],BBC[5000],Reg[1] = 00000077;`
fn dec_core3hread(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let body = payload(raw, "core3hread/")?;
    let (_, value) = body
        .rsplit_once('=')
        .ok_or_else(|| Error::parse("no register value in reply", raw))?;
    let value = u32::from_str_radix(value.trim(), 16)
        .map_err(|_| Error::parse(format!("invalid register value {value:?}"), raw))?;
    Ok(Response::Register(value))
}

/// Parameters: block, bbc, register, value.
fn enc_core3hwrite(call: &Call) -> Result<Vec<String>> {
    Ok(vec![format!(
        "core3hwrite={},{}",
        register_address(call)?,
        call.int(3)?
    )])
}
