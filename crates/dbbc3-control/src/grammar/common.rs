//! Commands common to every mode and version.

use chrono::NaiveDateTime;
use dbbc3_core::error::{Error, Result};
use dbbc3_core::{FirmwareInfo, vdif};

use super::{after_colon, check_range, fields, number, on_off, payload, reply};
use crate::commandset::{Call, CommandSpec};
use crate::protocol::lines;
use crate::response::{
    AgcMode, CalibrationLoop, IfInput, IfSettings, PhaseCheck, Response, SynthFrequency,
    TimesyncResult,
};

/// Outputs per core3h board.
pub const CORE3H_OUTPUTS: usize = 4;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("version", enc_version, dec_version),
        CommandSpec::new("time", enc_time, dec_text),
        CommandSpec::new("dbbcif", enc_dbbcif, dec_dbbcif),
        CommandSpec::new("reconfigure", enc_reconfigure, dec_text),
        CommandSpec::new("checkphase", enc_checkphase, dec_checkphase),
        CommandSpec::new("synth_lock", enc_synth_lock, dec_synth_lock),
        CommandSpec::new("synth_freq", enc_synth_freq, dec_synth_freq),
        CommandSpec::new("enableloop", enc_enableloop, dec_text),
        CommandSpec::new("disableloop", enc_disableloop, dec_text),
        CommandSpec::new("enablecal", enc_enablecal, dec_enablecal),
        CommandSpec::new("core3h_version", enc_core3h_version, dec_text),
        CommandSpec::new("core3h_sysstat", enc_core3h_sysstat, dec_text),
        CommandSpec::new("core3h_time", enc_core3h_time, dec_core3h_time),
        CommandSpec::new("core3h_timesync", enc_core3h_timesync, dec_core3h_timesync),
        CommandSpec::new("core3h_reset", enc_core3h_reset, dec_core3h_reset),
        CommandSpec::new("core3h_reboot", enc_core3h_reboot, dec_core3h_reboot),
        CommandSpec::new("core3h_start", enc_core3h_start, dec_core3h_start),
        CommandSpec::new("core3h_stop", enc_core3h_stop, dec_core3h_stop),
        CommandSpec::new("core3h_core3_power", enc_core3_power, dec_core3_power),
        CommandSpec::new("core3h_core3_bstat", enc_core3_bstat, dec_core3_bstat),
        CommandSpec::new("core3h_core3_corr", enc_core3_corr, dec_correlation),
    ]
}

pub(crate) fn dec_text(_: &Call, replies: &[String]) -> Result<Response> {
    Ok(Response::Text(replies.join("\n")))
}

// ---------------------------------------------------------------
// General
// ---------------------------------------------------------------

fn enc_version(_: &Call) -> Result<Vec<String>> {
    Ok(vec!["version".into()])
}

/// Parse a `version` reply, e.g. `version/ DDC_V,124,February 18th 2020;`.
pub fn parse_version(raw: &str) -> Result<FirmwareInfo> {
    let body = payload(raw, "version/")?;
    let mut parts = body.splitn(3, ',');
    let (Some(mode), Some(major), Some(release)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::parse("expected mode,major,release", raw));
    };
    FirmwareInfo::from_fields(mode, major, release).map_err(|e| match e {
        Error::UnsupportedVersion { .. } => e,
        other => Error::parse(other.to_string(), raw),
    })
}

fn dec_version(_: &Call, replies: &[String]) -> Result<Response> {
    Ok(Response::Firmware(parse_version(reply(replies)?)?))
}

fn enc_time(_: &Call) -> Result<Vec<String>> {
    Ok(vec!["time".into()])
}

fn enc_reconfigure(_: &Call) -> Result<Vec<String>> {
    Ok(vec!["reconfigure".into()])
}

fn enc_enableloop(_: &Call) -> Result<Vec<String>> {
    Ok(vec!["enableloop".into()])
}

fn enc_disableloop(_: &Call) -> Result<Vec<String>> {
    Ok(vec!["disableloop".into()])
}

/// `dbbcif{b}` query, or `dbbcif{b}=type,mode[,1,target]` to set.
///
/// Parameters: input type (1 or 2), mode (`agc`, `man`, or 0-63), target.
fn enc_dbbcif(call: &Call) -> Result<Vec<String>> {
    let mut cmd = format!("dbbcif{}", call.letter()?);
    if let Some(input) = call.opt_int(0)? {
        if input != 1 && input != 2 {
            return Err(Error::InvalidParameter(
                "dbbcif: input type must be 1 or 2".into(),
            ));
        }
        let mode = call.opt_text(1)?.unwrap_or("agc");
        if mode != "agc" && mode != "man" {
            let step: i64 = mode.parse().map_err(|_| {
                Error::InvalidParameter("dbbcif: mode must be agc, man or 0-63".into())
            })?;
            check_range("dbbcif attenuation", step, 0, 63)?;
        }
        cmd.push_str(&format!("={input},{mode}"));
        if let Some(target) = call.opt_int(2)? {
            cmd.push_str(&format!(",1,{target}"));
        }
    }
    Ok(vec![cmd])
}

fn parse_agc_mode(field: &str, raw: &str) -> Result<AgcMode> {
    match field {
        "agc" => Ok(AgcMode::Agc),
        "man" => Ok(AgcMode::Manual),
        step => Ok(AgcMode::Fixed(number(step, "attenuation step", raw)?)),
    }
}

fn dec_dbbcif(call: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let prefix = format!("dbbcif{}/", call.letter()?);
    let f = fields(payload(raw, &prefix)?);
    // type, attenuation, mode, filter, count, target
    if f.len() < 6 {
        return Err(Error::parse(
            format!("expected 6 dbbcif fields, got {}", f.len()),
            raw,
        ));
    }
    let input = match f[0] {
        "1" => IfInput::Direct,
        "2" => IfInput::DownConverted,
        other => return Err(Error::parse(format!("invalid IF input type {other:?}"), raw)),
    };
    Ok(Response::If(IfSettings {
        input,
        attenuation: number(f[1], "attenuation", raw)?,
        mode: parse_agc_mode(f[2], raw)?,
        count: number(f[4], "count", raw)?,
        target: number(f[5], "target", raw)?,
    }))
}

fn enc_checkphase(_: &Call) -> Result<Vec<String>> {
    Ok(vec!["checkphase".into()])
}

fn dec_checkphase(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    Ok(Response::Phase(PhaseCheck {
        in_sync: !raw.contains("out of sync"),
        report: raw.trim().to_string(),
    }))
}

// ---------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------

fn enc_synth_lock(call: &Call) -> Result<Vec<String>> {
    let (synth, _) = call.synth()?;
    Ok(vec![format!("synth={synth},lock")])
}

fn dec_synth_lock(call: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let (_, source) = call.synth()?;
    let locked = format!("S{source} locked");
    let unlocked = format!("S{source} not locked");
    for line in lines(raw) {
        if line.starts_with(&unlocked) {
            return Ok(Response::Flag(false));
        }
        if line.starts_with(&locked) {
            return Ok(Response::Flag(true));
        }
    }
    Err(Error::parse(
        format!(
            "cannot determine lock state of the synthesizer serving board {}",
            call.board()?
        ),
        raw,
    ))
}

fn enc_synth_freq(call: &Call) -> Result<Vec<String>> {
    let (synth, source) = call.synth()?;
    Ok(vec![
        format!("synth={synth},source {source}"),
        format!("synth={synth},cw"),
    ])
}

/// The synthesizer reports half the LO frequency, e.g.
/// `F 2262 MHz; // Act 2262 MHz`.
fn dec_synth_freq(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let line = lines(raw)
        .find(|l| l.contains("MHz"))
        .ok_or_else(|| Error::parse("no synthesizer frequency in reply", raw))?;
    let tok: Vec<&str> = line.split_whitespace().collect();
    if tok.len() < 6 {
        return Err(Error::parse("truncated synthesizer frequency line", raw));
    }
    let target: u32 = number(tok[1], "target frequency", raw)?;
    let actual: u32 = number(tok[5], "actual frequency", raw)?;
    let double = |half: u32| {
        half.checked_mul(2)
            .ok_or_else(|| Error::parse("synthesizer frequency out of range", raw))
    };
    Ok(Response::SynthFrequency(SynthFrequency {
        target: double(target)?,
        actual: double(actual)?,
    }))
}

// ---------------------------------------------------------------
// Calibration loop
// ---------------------------------------------------------------

fn requested_calibration(call: &Call) -> Result<CalibrationLoop> {
    let defaults = CalibrationLoop::default();
    Ok(CalibrationLoop {
        threshold: call.opt_flag(0)?.unwrap_or(defaults.threshold),
        gain: call.opt_flag(1)?.unwrap_or(defaults.gain),
        offset: call.opt_flag(2)?.unwrap_or(defaults.offset),
    })
}

fn enc_enablecal(call: &Call) -> Result<Vec<String>> {
    let req = requested_calibration(call)?;
    Ok(vec![format!(
        "enablecal={},{},{}",
        on_off(req.threshold),
        on_off(req.gain),
        on_off(req.offset)
    )])
}

/// Reply lists `threshold=ON`, `gain=OFF`, `offset=OFF`; each must match
/// what was requested.
fn dec_enablecal(call: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let req = requested_calibration(call)?;
    let reported: Vec<(String, String)> = lines(raw)
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_lowercase()))
        .collect();
    if reported.is_empty() {
        return Err(Error::parse(
            "the settings of the calibration loop could not be determined",
            raw,
        ));
    }
    let confirm = |key: &str, requested: bool| -> Result<bool> {
        let value = reported
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| Error::parse(format!("no {key} setting reported"), raw))?;
        if value != on_off(requested) {
            return Err(Error::parse(
                format!("requested {key}={}, but received {key}={value}", on_off(requested)),
                raw,
            ));
        }
        Ok(requested)
    };
    Ok(Response::Calibration(CalibrationLoop {
        threshold: confirm("threshold", req.threshold)?,
        gain: confirm("gain", req.gain)?,
        offset: confirm("offset", req.offset)?,
    }))
}

// ---------------------------------------------------------------
// core3h
// ---------------------------------------------------------------

pub(crate) fn core3h(call: &Call, sub: &str) -> Result<Vec<String>> {
    Ok(vec![format!("core3h={},{sub}", call.number()?)])
}

fn enc_core3h_version(call: &Call) -> Result<Vec<String>> {
    core3h(call, "version")
}

fn enc_core3h_sysstat(call: &Call) -> Result<Vec<String>> {
    core3h(call, "sysstat")
}

fn enc_core3h_time(call: &Call) -> Result<Vec<String>> {
    core3h(call, "time")
}

/// First line that is a bare `%Y-%m-%dT%H:%M:%S` timestamp.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    lines(raw).find_map(|l| NaiveDateTime::parse_from_str(l, TIME_FORMAT).ok())
}

fn dec_core3h_time(_: &Call, replies: &[String]) -> Result<Response> {
    Ok(Response::Timestamp(parse_timestamp(reply(replies)?)))
}

fn enc_core3h_timesync(call: &Call) -> Result<Vec<String>> {
    core3h(call, "timesync")
}

/// Reply on success:
///
/// ```text
/// halfYearsSince2000 = 38
/// seconds = 3920060
/// daysSince2000 = 6940
/// Time synchronization succeeded!
/// ```
fn dec_core3h_timesync(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    if !raw.contains("succeeded") {
        return Ok(Response::Timesync(TimesyncResult {
            success: false,
            timestamp: None,
        }));
    }
    let mut half_years = None;
    let mut seconds = None;
    for line in lines(raw) {
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "halfYearsSince2000" => half_years = Some(number::<u32>(value, "epoch", raw)?),
                "seconds" => seconds = Some(number::<u64>(value, "seconds", raw)?),
                _ => {}
            }
        }
    }
    let timestamp = match (half_years, seconds) {
        (Some(hy), Some(s)) => vdif::timestamp(hy, s),
        _ => None,
    };
    Ok(Response::Timesync(TimesyncResult {
        success: true,
        timestamp,
    }))
}

fn enc_core3h_reset(call: &Call) -> Result<Vec<String>> {
    let sub = if call.opt_flag(0)?.unwrap_or(false) {
        "reset keepsync"
    } else {
        "reset"
    };
    core3h(call, sub)
}

fn dec_core3h_reset(_: &Call, replies: &[String]) -> Result<Response> {
    Ok(Response::Flag(reply(replies)?.contains("Reset done")))
}

fn enc_core3h_reboot(call: &Call) -> Result<Vec<String>> {
    core3h(call, "reboot")
}

fn dec_core3h_reboot(_: &Call, replies: &[String]) -> Result<Response> {
    Ok(Response::Flag(!reply(replies)?.contains("not connected")))
}

/// Parameters: format (`vdif`, `raw`, or up to four joined by `+`, default
/// `vdif`), force.
fn enc_core3h_start(call: &Call) -> Result<Vec<String>> {
    let format = call.opt_text(0)?.unwrap_or("vdif");
    let formats: Vec<&str> = format.split('+').collect();
    if formats.len() > CORE3H_OUTPUTS {
        return Err(Error::InvalidParameter(format!(
            "core3h_start: too many output formats, the maximum is {CORE3H_OUTPUTS}"
        )));
    }
    if let Some(bad) = formats.iter().find(|f| !matches!(**f, "vdif" | "raw")) {
        return Err(Error::InvalidParameter(format!(
            "core3h_start: unknown output format {bad:?}"
        )));
    }
    let mut sub = format!("start {format}");
    if call.opt_flag(1)?.unwrap_or(false) {
        sub.push_str(" force");
    }
    core3h(call, &sub)
}

/// Lines like `Output 0 format selected: vdif`.
fn dec_core3h_start(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let mut outputs = vec![None; CORE3H_OUTPUTS];
    for line in lines(raw) {
        let Some(rest) = line.strip_prefix("Output") else {
            continue;
        };
        let Some((index, format)) = rest.split_once("format selected:") else {
            continue;
        };
        let index: usize = number(index, "output index", raw)?;
        if let Some(slot) = outputs.get_mut(index) {
            *slot = Some(format.trim().to_string());
        }
    }
    Ok(Response::OutputFormats(outputs))
}

fn enc_core3h_stop(call: &Call) -> Result<Vec<String>> {
    core3h(call, "stop")
}

fn dec_core3h_stop(_: &Call, replies: &[String]) -> Result<Response> {
    Ok(Response::Flag(reply(replies)?.contains("Stopped")))
}

fn enc_core3_power(call: &Call) -> Result<Vec<String>> {
    core3h(call, "core3_power")
}

fn four(values: Vec<u64>, what: &str, raw: &str) -> Result<[u64; 4]> {
    <[u64; 4]>::try_from(values)
        .map_err(|v| Error::parse(format!("expected 4 {what} values, got {}", v.len()), raw))
}

/// Lines like `Power at sampler 0 = 65053929`.
fn dec_core3_power(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    if raw.contains("not connected") {
        return Ok(Response::SamplerValues(None));
    }
    let values = lines(raw)
        .filter(|l| l.starts_with("Power at sampler"))
        .map(|l| {
            let (_, v) = l
                .split_once('=')
                .ok_or_else(|| Error::parse("malformed power line", raw))?;
            number(v, "sampler power", raw)
        })
        .collect::<Result<Vec<u64>>>()?;
    Ok(Response::SamplerValues(Some(four(values, "sampler power", raw)?)))
}

fn enc_core3_bstat(call: &Call) -> Result<Vec<String>> {
    let sampler = check_range("sampler", call.int(0)?, 0, 3)?;
    core3h(call, &format!("core3_bstat {sampler}"))
}

/// Lines like `P("11") = 9.64% (6171370)`; the count is in parentheses.
fn dec_core3_bstat(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    if raw.contains("not connected") {
        return Ok(Response::SamplerValues(None));
    }
    let values = lines(raw)
        .filter(|l| l.starts_with("P(\""))
        .map(|l| {
            let count = l
                .rsplit_once('(')
                .map(|(_, c)| c.trim_end_matches([')', ';']))
                .ok_or_else(|| Error::parse("malformed bit statistics line", raw))?;
            number(count, "level count", raw)
        })
        .collect::<Result<Vec<u64>>>()?;
    Ok(Response::SamplerValues(Some(four(values, "level count", raw)?)))
}

fn enc_core3_corr(call: &Call) -> Result<Vec<String>> {
    core3h(call, "core3_corr")
}

/// Lines containing `0-1`, `1-2`, and `2-3`, value after the colon.
pub(crate) fn dec_correlation(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let mut corr = [None; 3];
    for line in lines(raw) {
        let slot = if line.contains("0-1") {
            0
        } else if line.contains("1-2") {
            1
        } else if line.contains("2-3") {
            2
        } else {
            continue;
        };
        corr[slot] = Some(number::<i64>(after_colon(line, raw)?, "correlation", raw)?);
    }
    match corr {
        [Some(a), Some(b), Some(c)] => Ok(Response::Correlation([a, b, c])),
        _ => Err(Error::parse("expected correlations 0-1, 1-2 and 2-3", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commandset::Args;
    use chrono::NaiveDate;
    use dbbc3_core::{BoardTable, Mode};

    fn call(args: Args) -> Call {
        Call::new(args, BoardTable::default()).unwrap()
    }

    fn spec(name: &str) -> CommandSpec {
        commands().into_iter().find(|s| s.name == name).unwrap()
    }

    fn encode(name: &str, args: Args) -> Result<Vec<String>> {
        (spec(name).encode)(&call(args))
    }

    fn decode(name: &str, args: Args, replies: &[&str]) -> Result<Response> {
        let replies: Vec<String> = replies.iter().map(|s| s.to_string()).collect();
        (spec(name).decode)(&call(args), &replies)
    }

    #[test]
    fn version_with_ordinal_date() {
        let fw = parse_version("version/ DDC_V,124,February 18th 2020;").unwrap();
        assert_eq!(fw.mode(), Mode::DdcV);
        assert_eq!(fw.version(), 124);
        assert_eq!(fw.minor_version(), 200218);
        let fw = parse_version("version/ OCT_D,110,July 03 2019").unwrap();
        assert_eq!(fw.mode(), Mode::OctD);
    }

    #[test]
    fn version_errors() {
        assert!(matches!(
            parse_version("version/ garbage"),
            Err(Error::Parse { .. })
        ));
        assert!(matches!(
            parse_version("version/ FOO,120,July 03 2019;"),
            Err(Error::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            parse_version("version/ DDC_V,12x,July 03 2019;"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn dbbcif_query_and_set() {
        assert_eq!(encode("dbbcif", Args::for_board('B')).unwrap(), vec!["dbbcifb"]);
        assert_eq!(
            encode("dbbcif", Args::for_board(0usize).int(2).text("agc").int(32000)).unwrap(),
            vec!["dbbcifa=2,agc,1,32000"]
        );
        assert_eq!(
            encode("dbbcif", Args::for_board(0usize).int(1).text("40")).unwrap(),
            vec!["dbbcifa=1,40"]
        );
        assert!(encode("dbbcif", Args::for_board(0usize).int(3)).is_err());
        assert!(encode("dbbcif", Args::for_board(0usize).int(2).text("64")).is_err());
        assert!(encode("dbbcif", Args::for_board(0usize).int(2).text("auto")).is_err());
    }

    #[test]
    fn dbbcif_decode() {
        let r = decode(
            "dbbcif",
            Args::for_board('A'),
            &["dbbcifa/ 2,30,agc,1,32010,32000;"],
        )
        .unwrap();
        assert_eq!(
            r,
            Response::If(IfSettings {
                input: IfInput::DownConverted,
                attenuation: 30,
                mode: AgcMode::Agc,
                count: 32010,
                target: 32000,
            })
        );
        let r = decode("dbbcif", Args::for_board('A'), &["dbbcifa/ 1,20,12,1,100,32000;"]);
        match r.unwrap() {
            Response::If(s) => assert_eq!(s.mode, AgcMode::Fixed(12)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            decode("dbbcif", Args::for_board('A'), &["dbbcifa/ 2,30;"]),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn checkphase_out_of_sync() {
        assert_eq!(
            decode("checkphase", Args::none(), &["checkphase/ sampler phases ok;"]).unwrap(),
            Response::Phase(PhaseCheck {
                in_sync: true,
                report: "checkphase/ sampler phases ok;".into(),
            })
        );
        assert_eq!(
            decode(
                "checkphase",
                Args::none(),
                &["checkphase/ Board B sampler 2 out of sync;\r\n"]
            )
            .unwrap(),
            Response::Phase(PhaseCheck {
                in_sync: false,
                report: "checkphase/ Board B sampler 2 out of sync;".into(),
            })
        );
    }

    #[test]
    fn synth_lock_per_source() {
        assert_eq!(encode("synth_lock", Args::for_board('C')).unwrap(), vec!["synth=2,lock"]);
        let reply = "lock\nS1 locked\nS2 not locked\n-2->";
        assert_eq!(
            decode("synth_lock", Args::for_board('C'), &[reply]).unwrap(),
            Response::Flag(true)
        );
        assert_eq!(
            decode("synth_lock", Args::for_board('D'), &[reply]).unwrap(),
            Response::Flag(false)
        );
        assert!(matches!(
            decode("synth_lock", Args::for_board('A'), &["synth/ error"]),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn synth_freq_is_doubled() {
        assert_eq!(
            encode("synth_freq", Args::for_board('B')).unwrap(),
            vec!["synth=1,source 2", "synth=1,cw"]
        );
        let r = decode(
            "synth_freq",
            Args::for_board('B'),
            &["source 2", "cw\r\nF 4524 MHz; // Act 4524 MHz\r\n\r-2->"],
        )
        .unwrap();
        assert_eq!(
            r,
            Response::SynthFrequency(SynthFrequency {
                target: 9048,
                actual: 9048,
            })
        );
        assert!(decode("synth_freq", Args::for_board('B'), &["", "cw"]).is_err());
    }

    #[test]
    fn synth_freq_beyond_u32_is_parse_error() {
        let r = decode(
            "synth_freq",
            Args::for_board('A'),
            &["source 1", "cw\nF 3000000000 MHz; // Act 3000000000 MHz"],
        );
        match r {
            Err(Error::Parse { message, .. }) => assert!(message.contains("out of range"), "{message}"),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn enablecal_confirms_request() {
        assert_eq!(
            encode("enablecal", Args::none()).unwrap(),
            vec!["enablecal=on,off,off"]
        );
        let ok = "Calibration enabled:\nthreshold=ON\ngain=OFF\noffset=OFF";
        assert_eq!(
            decode("enablecal", Args::none(), &[ok]).unwrap(),
            Response::Calibration(CalibrationLoop::default())
        );
        let err = decode("enablecal", Args::none().flag(true).flag(true), &[ok]).unwrap_err();
        match err {
            Error::Parse { message, .. } => assert!(message.contains("gain"), "{message}"),
            other => panic!("expected Parse, got {other:?}"),
        }
        assert!(decode("enablecal", Args::none(), &["enablecal/ ;"]).is_err());
    }

    #[test]
    fn core3h_time() {
        assert_eq!(encode("core3h_time", Args::for_board('A')).unwrap(), vec!["core3h=1,time"]);
        let r = decode(
            "core3h_time",
            Args::for_board('A'),
            &["core3h/ time\n2019-02-21T15:09:21\n"],
        )
        .unwrap();
        let expected = NaiveDate::from_ymd_opt(2019, 2, 21)
            .unwrap()
            .and_hms_opt(15, 9, 21)
            .unwrap();
        assert_eq!(r, Response::Timestamp(Some(expected)));
        assert_eq!(
            decode("core3h_time", Args::for_board('A'), &["no time"]).unwrap(),
            Response::Timestamp(None)
        );
    }

    #[test]
    fn core3h_timesync() {
        let reply = "halfYearsSince2000 = 38\nseconds = 3920060\ndaysSince2000 = 6940\nTime synchronization succeeded!";
        let expected = NaiveDate::from_ymd_opt(2019, 2, 15)
            .unwrap()
            .and_hms_opt(8, 54, 20)
            .unwrap();
        assert_eq!(
            decode("core3h_timesync", Args::for_board('A'), &[reply]).unwrap(),
            Response::Timesync(TimesyncResult {
                success: true,
                timestamp: Some(expected),
            })
        );
        assert_eq!(
            decode("core3h_timesync", Args::for_board('A'), &["failed"]).unwrap(),
            Response::Timesync(TimesyncResult {
                success: false,
                timestamp: None,
            })
        );
    }

    #[test]
    fn core3h_reset_keepsync() {
        assert_eq!(encode("core3h_reset", Args::for_board('B')).unwrap(), vec!["core3h=2,reset"]);
        assert_eq!(
            encode("core3h_reset", Args::for_board('B').flag(true)).unwrap(),
            vec!["core3h=2,reset keepsync"]
        );
        assert_eq!(
            decode("core3h_reset", Args::for_board('B'), &["Reset done"]).unwrap(),
            Response::Flag(true)
        );
    }

    #[test]
    fn core3h_start_formats() {
        assert_eq!(
            encode("core3h_start", Args::for_board('A')).unwrap(),
            vec!["core3h=1,start vdif"]
        );
        assert_eq!(
            encode("core3h_start", Args::for_board('A').text("vdif+raw").flag(true)).unwrap(),
            vec!["core3h=1,start vdif+raw force"]
        );
        assert!(encode("core3h_start", Args::for_board('A').text("vdif+raw+vdif+raw+raw")).is_err());
        assert!(encode("core3h_start", Args::for_board('A').text("mark5b")).is_err());

        let reply = "  Output 0 format selected: vdif\n  Output 1 format selected: raw";
        assert_eq!(
            decode("core3h_start", Args::for_board('A'), &[reply]).unwrap(),
            Response::OutputFormats(vec![Some("vdif".into()), Some("raw".into()), None, None])
        );
    }

    #[test]
    fn core3h_stop() {
        assert_eq!(
            decode("core3h_stop", Args::for_board('A'), &["Stopped"]).unwrap(),
            Response::Flag(true)
        );
        assert_eq!(
            decode("core3h_stop", Args::for_board('A'), &["error"]).unwrap(),
            Response::Flag(false)
        );
    }

    #[test]
    fn core3_power() {
        let reply = "CORE3 input bit statistics:\nPower at sampler 0 = 65053929\nPower at sampler 1 = 99624764\nPower at sampler 2 = 77772775\nPower at sampler 3 = 110169325";
        assert_eq!(
            decode("core3h_core3_power", Args::for_board('A'), &[reply]).unwrap(),
            Response::SamplerValues(Some([65053929, 99624764, 77772775, 110169325]))
        );
        assert_eq!(
            decode("core3h_core3_power", Args::for_board('A'), &["core3 not connected"]).unwrap(),
            Response::SamplerValues(None)
        );
        assert!(decode(
            "core3h_core3_power",
            Args::for_board('A'),
            &["Power at sampler 0 = 1"]
        )
        .is_err());
    }

    #[test]
    fn core3_bstat() {
        assert_eq!(
            encode("core3h_core3_bstat", Args::for_board('A').int(2)).unwrap(),
            vec!["core3h=1,core3_bstat 2"]
        );
        assert!(encode("core3h_core3_bstat", Args::for_board('A').int(4)).is_err());
        let reply = "P(\"11\") = 9.64% (6171370)\nP(\"10\") = 41.70% (26691866)\nP(\"01\") = 40.36% (25836378)\nP(\"00\") = 8.28% (5300386)";
        assert_eq!(
            decode("core3h_core3_bstat", Args::for_board('A').int(0), &[reply]).unwrap(),
            Response::SamplerValues(Some([6171370, 26691866, 25836378, 5300386]))
        );
    }

    #[test]
    fn core3_corr() {
        let reply = "Correlation board 1:\n[0-1]: 157322344\n[1-2]: 155710069\n[2-3]: 158944035;";
        assert_eq!(
            decode("core3h_core3_corr", Args::for_board('A'), &[reply]).unwrap(),
            Response::Correlation([157322344, 155710069, 158944035])
        );
        assert!(decode("core3h_core3_corr", Args::for_board('A'), &["[0-1]: 1"]).is_err());
    }

    #[test]
    fn board_required() {
        assert!(matches!(
            encode("core3h_stop", Args::none()),
            Err(Error::InvalidParameter(_))
        ));
    }
}
