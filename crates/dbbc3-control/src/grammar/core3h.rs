//! Formatter (core3h) configuration shared by every mode: device registers,
//! VSI input, VDIF framing and the 10GbE outputs.
//!
//! All commands here take a board and go out as `core3h=N,<sub>`.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddrV4};

use dbbc3_core::error::{Error, Result};

use super::common::{core3h, dec_text};
use super::{after_colon, check_range, number, on_off, reply};
use crate::commandset::{Call, CommandSpec, Param};
use crate::protocol::lines;
use crate::response::{
    ArpEntry, Core3Mode, Destination, InputSource, Response, TenGbInfo, TvgMode, VdifFrame,
    VsiSampleRate,
};

/// Device addressed by the register commands unless one is given.
pub const DEFAULT_DEVICE: &str = "core3";

/// UDP port used when a destination is given without one.
pub const DEFAULT_DESTINATION_PORT: u16 = 46227;

const TVG_MODES: [&str; 4] = ["all-0", "all-1", "vsi-h", "cnt"];
const CORE3_MODES: [&str; 4] = ["independent", "half_merged", "merged", "pfb"];
const TENGB_KEYS: [&str; 5] = ["ip", "mac", "nm", "port", "gateway"];
const CHANNEL_WIDTHS: [i64; 7] = [1, 2, 4, 8, 16, 32, 64];
const CHANNEL_COUNTS: [i64; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("core3h_regread", enc_regread, dec_regread),
        CommandSpec::new("core3h_regread_dec", enc_regread_dec, dec_regread_dec),
        CommandSpec::new("core3h_regwrite", enc_regwrite, dec_modified),
        CommandSpec::new("core3h_regupdate", enc_regupdate, dec_modified),
        CommandSpec::new("core3h_vsi_samplerate", enc_vsi_samplerate, dec_vsi_samplerate),
        CommandSpec::new("core3h_vsi_bitmask", enc_vsi_bitmask, dec_vsi_bitmask),
        CommandSpec::new("core3h_vsi_swap", enc_vsi_swap, dec_text),
        CommandSpec::new("core3h_inputselect", enc_inputselect, dec_inputselect),
        CommandSpec::new("core3h_splitmode", enc_splitmode, dec_splitmode),
        CommandSpec::new("core3h_tvg_mode", enc_tvg_mode, dec_tvg_mode),
        CommandSpec::new("core3h_vdif_frame", enc_vdif_frame, dec_vdif_frame),
        CommandSpec::new("core3h_vdif_station", enc_vdif_station, dec_vdif_station),
        CommandSpec::new("core3h_vdif_enc", enc_vdif_enc, dec_vdif_enc),
        CommandSpec::new("core3h_vdif_userdata", enc_vdif_userdata, dec_vdif_userdata),
        CommandSpec::new("core3h_destination", enc_destination, dec_destination),
        CommandSpec::new("core3h_tengbinfo", enc_tengbinfo, dec_tengbinfo),
        CommandSpec::new("core3h_tengbcfg", enc_tengbcfg, dec_text),
        CommandSpec::new("core3h_tengbarp", enc_tengbarp, dec_text),
        CommandSpec::new("core3h_arp", enc_arp, dec_arp),
        CommandSpec::new("core3h_output", enc_output, dec_text),
        CommandSpec::new("core3h_core3_init", enc_core3_init, dec_core3_init),
        CommandSpec::new("core3h_core3_mode", enc_core3_mode, dec_core3_mode),
        CommandSpec::new("core3h_devices", enc_devices, dec_devices),
        CommandSpec::new("core3h_sysstat_fs", enc_sysstat_fs, dec_text),
        CommandSpec::new("core3h_mode_fs", enc_mode_fs, dec_text),
        CommandSpec::new("core3h_status_fs", enc_status_fs, dec_text),
    ]
}

/// A parameter that must fit a 32-bit register word.
fn word(call: &Call, index: usize, name: &str) -> Result<u32> {
    let value = check_range(name, call.int(index)?, 0, i64::from(u32::MAX))?;
    Ok(value as u32)
}

fn hex_word(field: &str) -> Option<u32> {
    let field = field.trim();
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);
    u32::from_str_radix(digits, 16).ok()
}

/// `Failed` in a reply means the device refused the requested setting.
fn refused(raw: &str, what: &str) -> Result<()> {
    if raw.contains("Failed") {
        return Err(Error::InvalidParameter(format!(
            "{what} rejected by the device: {}",
            raw.trim()
        )));
    }
    Ok(())
}

fn is_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

// ---------------------------------------------------------------
// Device registers
// ---------------------------------------------------------------

/// Parameters: register, device (default `core3`).
fn register_target(call: &Call) -> Result<(i64, &str)> {
    let register = check_range("register", call.int(0)?, 0, i64::from(u32::MAX))?;
    Ok((register, call.opt_text(1)?.unwrap_or(DEFAULT_DEVICE)))
}

fn enc_regread(call: &Call) -> Result<Vec<String>> {
    let (register, device) = register_target(call)?;
    core3h(call, &format!("regread {device} {register}"))
}

/// `0xBFBFBFBF / 0b1011...1111 / -1077952577`: hex, binary and signed
/// decimal renderings of the same word.
fn dec_regread(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    lines(raw)
        .map(|l| l.split('/').collect::<Vec<_>>())
        .find(|f| f.len() == 3)
        .and_then(|f| hex_word(f[0]))
        .map(Response::Register)
        .ok_or_else(|| Error::parse("no register value in reply", raw))
}

fn enc_regread_dec(call: &Call) -> Result<Vec<String>> {
    let (register, device) = register_target(call)?;
    core3h(call, &format!("regread_dec {device} {register}"))
}

/// The value is the last line that is a bare decimal number; negative
/// values are the signed reading of the word.
fn dec_regread_dec(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let value = lines(raw)
        .filter_map(|l| l.trim_end_matches(';').parse::<i64>().ok())
        .last()
        .ok_or_else(|| Error::parse("no register value in reply", raw))?;
    let word = match i32::try_from(value) {
        Ok(signed) if signed < 0 => signed as u32,
        _ => u32::try_from(value)
            .map_err(|_| Error::parse(format!("register value {value} exceeds 32 bits"), raw))?,
    };
    Ok(Response::Register(word))
}

/// Parameters: device, register, value.
fn enc_regwrite(call: &Call) -> Result<Vec<String>> {
    let device = call.text(0)?;
    let register = check_range("register", call.int(1)?, 0, i64::from(u32::MAX))?;
    let value = word(call, 2, "register value")?;
    core3h(call, &format!("regwrite {device} {register} {value:#x}"))
}

/// Parameters: device, register, value, bitmask.
fn enc_regupdate(call: &Call) -> Result<Vec<String>> {
    let device = call.text(0)?;
    let register = check_range("register", call.int(1)?, 0, i64::from(u32::MAX))?;
    let value = word(call, 2, "register value")?;
    let mask = word(call, 3, "bitmask")?;
    core3h(
        call,
        &format!("regupdate {device} {register} {value:#x} {mask:#x}"),
    )
}

/// True when the register changed.
fn dec_modified(_: &Call, replies: &[String]) -> Result<Response> {
    Ok(Response::Flag(!reply(replies)?.contains("unmodified")))
}

// ---------------------------------------------------------------
// VSI input
// ---------------------------------------------------------------

/// Parameters: sample rate (Hz), decimation (1-255, default 1). Without a
/// rate the current setting is queried.
fn enc_vsi_samplerate(call: &Call) -> Result<Vec<String>> {
    let Some(rate) = call.opt_int(0)? else {
        return core3h(call, "vsi_samplerate");
    };
    let rate = check_range("sample rate", rate, 1, i64::MAX)?;
    let decimation = check_range("decimation", call.opt_int(1)?.unwrap_or(1), 1, 255)?;
    core3h(call, &format!("vsi_samplerate {rate} {decimation}"))
}

/// `VSI sample rate : 64000000 Hz`, or `... : 1280000 Hz / 2` when
/// decimating.
fn dec_vsi_samplerate(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    refused(raw, "VSI sample rate")?;
    let line = lines(raw)
        .find(|l| l.contains("VSI sample rate"))
        .ok_or_else(|| Error::parse("no VSI sample rate in reply", raw))?;
    let value = after_colon(line, raw)?;
    let (rate, decimation) = match value.split_once('/') {
        Some((rate, decimation)) => (rate, Some(decimation)),
        None => (value, None),
    };
    let rate = rate.trim().trim_end_matches("Hz").trim();
    Ok(Response::SampleRate(VsiSampleRate {
        sample_rate: number(rate, "sample rate", raw)?,
        decimation: match decimation {
            Some(d) => number(d, "decimation", raw)?,
            None => 1,
        },
    }))
}

fn enc_vsi_bitmask(call: &Call) -> Result<Vec<String>> {
    core3h(call, "vsi_bitmask")
}

/// `VSI input bitmask : 0xFFFFFFFF 0xFFFFFFFF`, one mask per VSI input.
fn dec_vsi_bitmask(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let line = lines(raw)
        .find(|l| l.contains("bitmask"))
        .ok_or_else(|| Error::parse("no VSI bitmask in reply", raw))?;
    let masks = after_colon(line, raw)?
        .split_whitespace()
        .map(|m| {
            hex_word(m)
                .map(u64::from)
                .ok_or_else(|| Error::parse(format!("invalid bitmask {m:?}"), raw))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Response::Values(masks))
}

/// Parameters: none (query), `reset`, or the two VSI inputs to swap.
fn enc_vsi_swap(call: &Call) -> Result<Vec<String>> {
    match call.params().first() {
        None => core3h(call, "vsi_swap"),
        Some(Param::Text(t)) if t == "reset" => core3h(call, "vsi_swap reset"),
        Some(_) => {
            let first = check_range("first VSI input", call.int(0)?, 1, 8)?;
            let second = check_range("second VSI input", call.int(1)?, 1, 8)?;
            core3h(call, &format!("vsi_swap {first} {second}"))
        }
    }
}

/// Parameter: source, e.g. `tvg` or `vsi1-2`.
fn enc_inputselect(call: &Call) -> Result<Vec<String>> {
    let source: InputSource = call.text(0)?.parse()?;
    core3h(call, &format!("inputselect {source}"))
}

/// `Input selected: vsi1`
fn dec_inputselect(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    refused(raw, "input source")?;
    let selected = lines(raw)
        .find_map(|l| l.strip_prefix("Input selected:"))
        .ok_or_else(|| Error::parse("no selected input in reply", raw))?;
    let source = selected
        .trim()
        .trim_end_matches(';')
        .parse()
        .map_err(|_| Error::parse(format!("unknown input source {selected:?}"), raw))?;
    Ok(Response::Input(source))
}

/// Parameter: on.
fn enc_splitmode(call: &Call) -> Result<Vec<String>> {
    core3h(call, &format!("splitmode {}", on_off(call.flag(0)?)))
}

fn dec_splitmode(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let state = if raw.contains("Split mode: on") {
        Some(true)
    } else if raw.contains("Split mode: off") {
        Some(false)
    } else {
        None
    };
    Ok(Response::Switch(state))
}

/// Parameter: mode (`all-0`, `all-1`, `vsi-h`, `cnt`); none to query.
fn enc_tvg_mode(call: &Call) -> Result<Vec<String>> {
    match call.opt_text(0)? {
        None => core3h(call, "tvg_mode"),
        Some(mode) if TVG_MODES.contains(&mode) => core3h(call, &format!("tvg_mode {mode}")),
        Some(mode) => Err(Error::InvalidParameter(format!(
            "unknown TVG mode {mode:?}, expected one of {TVG_MODES:?}"
        ))),
    }
}

fn dec_tvg_mode(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    refused(raw, "TVG mode")?;
    let mode = if raw.contains("VSI-H") {
        Some(TvgMode::VsiH)
    } else if raw.contains("8-bit counters") {
        Some(TvgMode::Counter)
    } else if raw.contains("all bits 0") {
        Some(TvgMode::AllZero)
    } else if raw.contains("all bits 1") {
        Some(TvgMode::AllOne)
    } else {
        None
    };
    Ok(Response::Tvg(mode))
}

// ---------------------------------------------------------------
// VDIF
// ---------------------------------------------------------------

/// Parameters: channel width (bits), channels per frame, payload size
/// (bytes). All optional, but a width needs a channel count.
fn enc_vdif_frame(call: &Call) -> Result<Vec<String>> {
    let Some(width) = call.opt_int(0)? else {
        return core3h(call, "vdif_frame");
    };
    if !CHANNEL_WIDTHS.contains(&width) {
        return Err(Error::InvalidParameter(format!(
            "channel width must be one of {CHANNEL_WIDTHS:?}, got {width}"
        )));
    }
    let channels = call.opt_int(1)?.ok_or_else(|| {
        Error::InvalidParameter("vdif_frame: a channel width needs a channel count".into())
    })?;
    if !CHANNEL_COUNTS.contains(&channels) {
        return Err(Error::InvalidParameter(format!(
            "channel count must be one of {CHANNEL_COUNTS:?}, got {channels}"
        )));
    }
    let mut sub = format!("vdif_frame {width} {channels}");
    if let Some(payload) = call.opt_int(2)? {
        let payload = check_range("payload size", payload, 1, i64::from(u32::MAX))?;
        sub.push_str(&format!(" {payload}"));
    }
    core3h(call, &sub)
}

/// Key/value lines such as
///
/// ```text
/// channel width (in bits)        : 2
/// => number of frames per second : 27 (16bit@54000Hz)
/// ```
fn dec_vdif_frame(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    if raw.contains("Failed") {
        return Ok(Response::VdifFrame(None));
    }
    let mut frame = VdifFrame {
        compatible: !raw.contains("current frame setup is not compatible"),
        ..VdifFrame::default()
    };
    let mut seen = false;
    for line in lines(raw) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        // Counts may be followed by a rate, e.g. `27 (16bit@54000Hz)`.
        let value = value.split_whitespace().next().unwrap_or("");
        if key.contains("channel width") {
            frame.channel_width = number(value, "channel width", raw)?;
        } else if key.contains("number of channels") {
            frame.channels = number(value, "channel count", raw)?;
        } else if key.contains("payload size") {
            frame.payload_size = number(value, "payload size", raw)?;
        } else if key.contains("frame size") {
            frame.frame_size = number(value, "frame size", raw)?;
        } else if key.contains("frames per second") {
            frame.frames_per_second = Some(number(value, "frames per second", raw)?);
        } else if key.contains("number of data threads") {
            frame.threads = Some(number(value, "thread count", raw)?);
        } else if key.contains("frames per thread") {
            frame.frames_per_thread = Some(number(value, "frames per thread", raw)?);
        } else {
            continue;
        }
        seen = true;
    }
    if !seen {
        return Err(Error::parse("no VDIF frame properties in reply", raw));
    }
    Ok(Response::VdifFrame(Some(frame)))
}

/// Parameter: two-letter station code; none to query.
fn enc_vdif_station(call: &Call) -> Result<Vec<String>> {
    match call.opt_text(0)? {
        None => core3h(call, "vdif_station"),
        Some(id) if !id.is_empty() && id.chars().count() <= 2 => {
            core3h(call, &format!("vdif_station {id}"))
        }
        Some(id) => Err(Error::InvalidParameter(format!(
            "station ID must be a one or two letter code, got {id:?}"
        ))),
    }
}

/// `VDIF station ID : 'NA'`
fn dec_vdif_station(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let line = lines(raw)
        .find(|l| l.contains("VDIF station ID"))
        .ok_or_else(|| Error::parse("no station ID in reply", raw))?;
    Ok(Response::Text(after_colon(line, raw)?.replace('\'', "")))
}

fn enc_vdif_enc(call: &Call) -> Result<Vec<String>> {
    core3h(call, "vdif_enc")
}

fn dec_vdif_enc(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let words = || {
        raw.split(|c: char| c.is_whitespace() || c == ':' || c == ';')
            .map(str::to_ascii_lowercase)
    };
    let state = if words().any(|w| w == "on") {
        Some(true)
    } else if words().any(|w| w == "off") {
        Some(false)
    } else {
        None
    };
    Ok(Response::Switch(state))
}

/// Parameters: none to query, or all four user data words. Setting is
/// followed by a query so the reply reflects what the device holds.
fn enc_vdif_userdata(call: &Call) -> Result<Vec<String>> {
    if call.params().is_empty() {
        return core3h(call, "vdif_userdata");
    }
    let words = (0..4)
        .map(|i| word(call, i, "user data word").map(|w| format!("{w:#010x}")))
        .collect::<Result<Vec<_>>>()?;
    let mut cmds = core3h(call, &format!("vdif_userdata {}", words.join(" ")))?;
    cmds.extend(core3h(call, "vdif_userdata")?);
    Ok(cmds)
}

/// One `0x...` line per word.
fn dec_vdif_userdata(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let words = lines(raw)
        .filter(|l| l.starts_with("0x"))
        .map(|l| hex_word(l).ok_or_else(|| Error::parse(format!("invalid user data {l:?}"), raw)))
        .collect::<Result<Vec<_>>>()?;
    let words: [u32; 4] = words
        .try_into()
        .map_err(|w: Vec<u32>| Error::parse(format!("expected 4 user data words, got {}", w.len()), raw))?;
    Ok(Response::UserData(words))
}

// ---------------------------------------------------------------
// Network
// ---------------------------------------------------------------

/// Parameters: output, target (an IPv4 address or `none`), port
/// (default 46227), thread. Without a target the destination is queried;
/// with one it is set and then queried.
fn enc_destination(call: &Call) -> Result<Vec<String>> {
    let output = check_range("output", call.int(0)?, 0, 3)?;
    let query = core3h(call, &format!("destination {output}"))?;
    let Some(target) = call.opt_text(1)? else {
        return Ok(query);
    };
    let thread = match call.opt_int(3)? {
        Some(t) => format!(" {}", check_range("thread", t, 0, i64::from(u16::MAX))?),
        None => String::new(),
    };
    let address = if target == "none" {
        "none".to_string()
    } else {
        let ip: Ipv4Addr = target
            .parse()
            .map_err(|_| Error::InvalidParameter(format!("invalid IPv4 address {target:?}")))?;
        let port = match call.opt_int(2)? {
            Some(p) => check_range("port", p, 1, i64::from(u16::MAX))?,
            None => i64::from(DEFAULT_DESTINATION_PORT),
        };
        format!("{ip}:{port}")
    };
    let mut cmds = core3h(call, &format!("destination {output} {address}{thread}"))?;
    cmds.extend(query);
    Ok(cmds)
}

/// ```text
/// Output 1 destination: 192.168.1.3:46227
/// Data thread [0] -> 192.168.1.100:46338
/// ```
fn dec_destination(call: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let mut destination = Destination {
        output: u32::try_from(call.int(0)?).unwrap_or_default(),
        ..Destination::default()
    };
    for line in lines(raw) {
        if let Some(rest) = line.strip_prefix("Output") {
            let Some((output, target)) = rest.split_once("destination:") else {
                continue;
            };
            destination.output = number(output, "output", raw)?;
            let target = target.trim().trim_end_matches(';');
            destination.address = if target == "none" {
                None
            } else {
                Some(socket_addr(target, raw)?)
            };
        } else if let Some(rest) = line.strip_prefix("Data thread") {
            let (thread, target) = rest
                .split_once("->")
                .ok_or_else(|| Error::parse(format!("malformed thread line {line:?}"), raw))?;
            let thread = thread.trim().trim_start_matches('[').trim_end_matches(']');
            destination
                .threads
                .insert(number(thread, "thread", raw)?, socket_addr(target, raw)?);
        }
    }
    Ok(Response::Destination(destination))
}

fn socket_addr(text: &str, raw: &str) -> Result<SocketAddrV4> {
    text.trim()
        .parse()
        .map_err(|_| Error::parse(format!("invalid destination {text:?}"), raw))
}

/// Parameter: ethernet device, e.g. `eth0`.
fn enc_tengbinfo(call: &Call) -> Result<Vec<String>> {
    core3h(call, &format!("tengbinfo {}", call.text(0)?))
}

/// `Key : value` lines, then an ARP table of `MAC IP` rows.
fn dec_tengbinfo(call: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    if raw.contains("not found") {
        return Err(Error::InvalidParameter(format!(
            "unknown ethernet device {:?}",
            call.text(0)?
        )));
    }
    let mut info = TenGbInfo::default();
    for line in lines(raw) {
        let tok: Vec<&str> = line.split(':').collect();
        if tok.len() == 2 || tok[0].contains("MAC address") {
            if tok[0].contains("Configuration information") {
                continue;
            }
            let key = tok[0]
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .replacen(' ', "_", 1)
                .replace('.', "")
                .to_lowercase();
            let value = tok[1..].join(":").trim().to_string();
            if !value.is_empty() {
                info.settings.insert(key, value);
            }
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        if let [mac, ip] = cols[..] {
            if let (true, Ok(ip)) = (is_mac(mac), ip.parse()) {
                info.arp_cache.push(ArpEntry {
                    mac: mac.to_string(),
                    ip,
                });
            }
        }
    }
    Ok(Response::TenGbInfo(info))
}

/// Parameters: device, key (`ip`, `mac`, `nm`, `port`, `gateway`), value.
fn enc_tengbcfg(call: &Call) -> Result<Vec<String>> {
    let device = call.text(0)?;
    let key = call.text(1)?;
    if !TENGB_KEYS.contains(&key) {
        return Err(Error::InvalidParameter(format!(
            "unknown 10GbE setting {key:?}, expected one of {TENGB_KEYS:?}"
        )));
    }
    core3h(call, &format!("tengbcfg {device} {key}={}", call.text(2)?))
}

/// Parameters: device, ARP entry id, MAC address.
fn enc_tengbarp(call: &Call) -> Result<Vec<String>> {
    let device = call.text(0)?;
    let id = check_range("ARP entry", call.int(1)?, 0, 255)?;
    let mac = call.text(2)?;
    if !is_mac(mac) {
        return Err(Error::InvalidParameter(format!(
            "invalid MAC address {mac:?}, expected xx:xx:xx:xx:xx:xx"
        )));
    }
    core3h(call, &format!("tengbarp {device} {id} {mac}"))
}

/// Parameter: on; none to query.
fn enc_arp(call: &Call) -> Result<Vec<String>> {
    match call.opt_flag(0)? {
        Some(on) => core3h(call, &format!("arp {}", on_off(on))),
        None => core3h(call, "arp"),
    }
}

/// `ARP requests: off (during data transfer)`
fn dec_arp(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let state = lines(raw)
        .find_map(|l| l.strip_prefix("ARP requests:"))
        .and_then(|v| match v.split_whitespace().next() {
            Some("on") => Some(true),
            Some("off") => Some(false),
            _ => None,
        });
    Ok(Response::Switch(state))
}

// ---------------------------------------------------------------
// Board state
// ---------------------------------------------------------------

/// Parameters: output, frame.
fn enc_output(call: &Call) -> Result<Vec<String>> {
    let output = check_range("output", call.int(0)?, 0, 3)?;
    let frame = check_range("frame", call.opt_int(1)?.unwrap_or(0), 0, i64::MAX)?;
    core3h(call, &format!("output {output} {frame}"))
}

fn enc_core3_init(call: &Call) -> Result<Vec<String>> {
    core3h(call, "core3_init")
}

fn dec_core3_init(_: &Call, replies: &[String]) -> Result<Response> {
    Ok(Response::Flag(reply(replies)?.contains("Reset done")))
}

/// Parameter: mode; none to query.
fn enc_core3_mode(call: &Call) -> Result<Vec<String>> {
    match call.opt_text(0)? {
        None => core3h(call, "core3_mode"),
        Some(mode) if CORE3_MODES.contains(&mode) => core3h(call, &format!("core3_mode {mode}")),
        Some(mode) => Err(Error::InvalidParameter(format!(
            "unknown core3 mode {mode:?}, expected one of {CORE3_MODES:?}"
        ))),
    }
}

fn dec_core3_mode(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let mode = lines(raw).fold(None, |mode, line| {
        if line.contains("data from all samplers is merged") {
            Some(Core3Mode::Merged)
        } else if line.contains("data from two samplers is merged") {
            Some(Core3Mode::HalfMerged)
        } else if line.contains("data from each sampler is sent to a different output") {
            Some(Core3Mode::Independent)
        } else if line.contains("data from pfb") {
            Some(Core3Mode::Pfb)
        } else {
            mode
        }
    });
    Ok(Response::Core3Mode(mode))
}

fn enc_devices(call: &Call) -> Result<Vec<String>> {
    core3h(call, "devices")
}

/// `<address range> -> <device>` lines.
fn dec_devices(_: &Call, replies: &[String]) -> Result<Response> {
    let raw = reply(replies)?;
    let devices: BTreeMap<String, String> = lines(raw)
        .filter_map(|l| l.split_once("->"))
        .map(|(value, name)| (name.trim().to_string(), value.trim().to_string()))
        .collect();
    Ok(Response::Devices(devices))
}

fn enc_sysstat_fs(call: &Call) -> Result<Vec<String>> {
    core3h(call, "sysstat_fs")
}

fn enc_mode_fs(call: &Call) -> Result<Vec<String>> {
    core3h(call, "mode_fs")
}

fn enc_status_fs(call: &Call) -> Result<Vec<String>> {
    core3h(call, "status_fs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commandset::Args;
    use dbbc3_core::BoardTable;

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
    fn regread_takes_hex_field() {
        assert_eq!(
            encode("core3h_regread", Args::for_board('B').int(3)).unwrap(),
            vec!["core3h=2,regread core3 3"]
        );
        assert_eq!(
            encode("core3h_regread", Args::for_board('A').int(0).text("tengbe0")).unwrap(),
            vec!["core3h=1,regread tengbe0 0"]
        );
        let reply = "regread core3 3\n0xBFBFBFBF / 0b10111111101111111011111110111111 / -1077952577\n";
        assert_eq!(
            decode("core3h_regread", Args::for_board('A').int(3), &[reply]).unwrap(),
            Response::Register(0xBFBF_BFBF)
        );
        assert!(matches!(
            decode("core3h_regread", Args::for_board('A').int(3), &["Failed"]),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn regread_dec_signed_word() {
        let reply = "regread_dec core3 3\n\n-1077952577\n";
        assert_eq!(
            decode("core3h_regread_dec", Args::for_board('A').int(3), &[reply]).unwrap(),
            Response::Register(0xBFBF_BFBF)
        );
        assert_eq!(
            decode("core3h_regread_dec", Args::for_board('A').int(3), &["x\n119"]).unwrap(),
            Response::Register(119)
        );
    }

    #[test]
    fn regwrite_and_update_report_change() {
        assert_eq!(
            encode("core3h_regwrite", Args::for_board('A').text("core3").int(2).int(255)).unwrap(),
            vec!["core3h=1,regwrite core3 2 0xff"]
        );
        assert_eq!(
            encode(
                "core3h_regupdate",
                Args::for_board('A').text("core3").int(2).int(0x10).int(0xf0)
            )
            .unwrap(),
            vec!["core3h=1,regupdate core3 2 0x10 0xf0"]
        );
        assert!(
            encode("core3h_regwrite", Args::for_board('A').text("core3").int(2).int(-1)).is_err()
        );
        let args = || Args::for_board('A').text("core3").int(2).int(1);
        assert_eq!(
            decode("core3h_regwrite", args(), &["register unmodified"]).unwrap(),
            Response::Flag(false)
        );
        assert_eq!(
            decode("core3h_regwrite", args(), &["0x00000001"]).unwrap(),
            Response::Flag(true)
        );
    }

    #[test]
    fn vsi_samplerate_with_decimation() {
        assert_eq!(
            encode("core3h_vsi_samplerate", Args::for_board('A')).unwrap(),
            vec!["core3h=1,vsi_samplerate"]
        );
        assert_eq!(
            encode("core3h_vsi_samplerate", Args::for_board('A').int(128_000_000).int(2)).unwrap(),
            vec!["core3h=1,vsi_samplerate 128000000 2"]
        );
        assert!(matches!(
            encode("core3h_vsi_samplerate", Args::for_board('A').int(64_000_000).int(256)),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(
            decode(
                "core3h_vsi_samplerate",
                Args::for_board('A'),
                &["VSI sample rate : 64000000 Hz"]
            )
            .unwrap(),
            Response::SampleRate(VsiSampleRate {
                sample_rate: 64_000_000,
                decimation: 1,
            })
        );
        assert_eq!(
            decode(
                "core3h_vsi_samplerate",
                Args::for_board('A'),
                &["VSI sample rate : 1280000 Hz / 2"]
            )
            .unwrap(),
            Response::SampleRate(VsiSampleRate {
                sample_rate: 1_280_000,
                decimation: 2,
            })
        );
        assert!(matches!(
            decode("core3h_vsi_samplerate", Args::for_board('A'), &["Failed"]),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn vsi_bitmask_per_input() {
        assert_eq!(
            decode(
                "core3h_vsi_bitmask",
                Args::for_board('A'),
                &["VSI input bitmask : 0xFFFFFFFF 0x0000FFFF"]
            )
            .unwrap(),
            Response::Values(vec![0xFFFF_FFFF, 0xFFFF])
        );
    }

    #[test]
    fn vsi_swap_forms() {
        assert_eq!(
            encode("core3h_vsi_swap", Args::for_board('A')).unwrap(),
            vec!["core3h=1,vsi_swap"]
        );
        assert_eq!(
            encode("core3h_vsi_swap", Args::for_board('A').text("reset")).unwrap(),
            vec!["core3h=1,vsi_swap reset"]
        );
        assert_eq!(
            encode("core3h_vsi_swap", Args::for_board('A').int(1).int(2)).unwrap(),
            vec!["core3h=1,vsi_swap 1 2"]
        );
        assert!(encode("core3h_vsi_swap", Args::for_board('A').int(1)).is_err());
    }

    #[test]
    fn inputselect_sources() {
        assert_eq!(
            encode("core3h_inputselect", Args::for_board('C').text("vsi1-2")).unwrap(),
            vec!["core3h=3,inputselect vsi1-2"]
        );
        assert!(matches!(
            encode("core3h_inputselect", Args::for_board('A').text("vsi3")),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(
            decode(
                "core3h_inputselect",
                Args::for_board('A').text("tvg"),
                &["Input selected: tvg"]
            )
            .unwrap(),
            Response::Input(InputSource::Tvg)
        );
        assert!(matches!(
            decode(
                "core3h_inputselect",
                Args::for_board('A').text("tvg"),
                &["Failed: unknown source"]
            ),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn splitmode_and_arp_switches() {
        assert_eq!(
            encode("core3h_splitmode", Args::for_board('A').flag(true)).unwrap(),
            vec!["core3h=1,splitmode on"]
        );
        assert_eq!(
            decode("core3h_splitmode", Args::for_board('A').flag(true), &["Split mode: on"])
                .unwrap(),
            Response::Switch(Some(true))
        );
        assert_eq!(
            decode("core3h_splitmode", Args::for_board('A').flag(true), &["?"]).unwrap(),
            Response::Switch(None)
        );
        assert_eq!(
            encode("core3h_arp", Args::for_board('A')).unwrap(),
            vec!["core3h=1,arp"]
        );
        assert_eq!(
            decode(
                "core3h_arp",
                Args::for_board('A'),
                &["  ARP requests: off (during data transfer)"]
            )
            .unwrap(),
            Response::Switch(Some(false))
        );
    }

    #[test]
    fn tvg_mode_phrases() {
        assert!(matches!(
            encode("core3h_tvg_mode", Args::for_board('A').text("random")),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(
            decode(
                "core3h_tvg_mode",
                Args::for_board('A'),
                &["TVG mode: four 8-bit counters"]
            )
            .unwrap(),
            Response::Tvg(Some(TvgMode::Counter))
        );
        assert_eq!(
            decode("core3h_tvg_mode", Args::for_board('A'), &["TVG mode: VSI-H"]).unwrap(),
            Response::Tvg(Some(TvgMode::VsiH))
        );
    }

    #[test]
    fn vdif_frame_properties() {
        assert_eq!(
            encode("core3h_vdif_frame", Args::for_board('A').int(2).int(16).int(8192)).unwrap(),
            vec!["core3h=1,vdif_frame 2 16 8192"]
        );
        assert!(matches!(
            encode("core3h_vdif_frame", Args::for_board('A').int(2)),
            Err(Error::InvalidParameter(_))
        ));
        assert!(encode("core3h_vdif_frame", Args::for_board('A').int(3).int(16)).is_err());

        let reply = "VDIF Frame properties:\n\
            channel width (in bits)        : 2\n\
            number of channels per frame   : 16\n\
            payload size (in bytes)        : 8192\n\
            => frame size (in bytes)       : 8224\n\
            => number of frames per second : 27 (16bit@54000Hz)\n\
            => number of data threads      : 1\n\
            => number of frames per thread : 27 (16bit@54000Hz)\n";
        assert_eq!(
            decode("core3h_vdif_frame", Args::for_board('A'), &[reply]).unwrap(),
            Response::VdifFrame(Some(VdifFrame {
                compatible: true,
                channel_width: 2,
                channels: 16,
                payload_size: 8192,
                frame_size: 8224,
                frames_per_second: Some(27),
                threads: Some(1),
                frames_per_thread: Some(27),
            }))
        );

        let warned = format!("{reply}WARNING: current frame setup is not compatible with selected input!");
        match decode("core3h_vdif_frame", Args::for_board('A'), &[&warned]).unwrap() {
            Response::VdifFrame(Some(frame)) => assert!(!frame.compatible),
            other => panic!("expected a frame, got {other:?}"),
        }
        assert_eq!(
            decode("core3h_vdif_frame", Args::for_board('A'), &["Failed"]).unwrap(),
            Response::VdifFrame(None)
        );
    }

    #[test]
    fn vdif_station_code() {
        assert!(encode("core3h_vdif_station", Args::for_board('A').text("EFF")).is_err());
        assert_eq!(
            encode("core3h_vdif_station", Args::for_board('A').text("Ef")).unwrap(),
            vec!["core3h=1,vdif_station Ef"]
        );
        assert_eq!(
            decode(
                "core3h_vdif_station",
                Args::for_board('A'),
                &["VDIF station ID : 'NA'"]
            )
            .unwrap(),
            Response::Text("NA".into())
        );
    }

    #[test]
    fn vdif_userdata_set_then_read() {
        assert_eq!(
            encode(
                "core3h_vdif_userdata",
                Args::for_board('A').int(0x0200_0000).int(0).int(0).int(0xFF)
            )
            .unwrap(),
            vec![
                "core3h=1,vdif_userdata 0x02000000 0x00000000 0x00000000 0x000000ff",
                "core3h=1,vdif_userdata",
            ]
        );
        let reply = "VDIF user data:\n0x02000000\n0x00000000\n0x00000000\n0x000000FF\n";
        assert_eq!(
            decode("core3h_vdif_userdata", Args::for_board('A'), &["", reply]).unwrap(),
            Response::UserData([0x0200_0000, 0, 0, 0xFF])
        );
        assert!(decode("core3h_vdif_userdata", Args::for_board('A'), &["0x1\n0x2"]).is_err());
    }

    #[test]
    fn destination_set_and_query() {
        assert_eq!(
            encode("core3h_destination", Args::for_board('A').int(1)).unwrap(),
            vec!["core3h=1,destination 1"]
        );
        assert_eq!(
            encode("core3h_destination", Args::for_board('A').int(0).text("192.168.1.3")).unwrap(),
            vec!["core3h=1,destination 0 192.168.1.3:46227", "core3h=1,destination 0"]
        );
        assert_eq!(
            encode("core3h_destination", Args::for_board('A').int(0).text("none").int(0).int(2))
                .unwrap(),
            vec!["core3h=1,destination 0 none 2", "core3h=1,destination 0"]
        );
        assert!(matches!(
            encode("core3h_destination", Args::for_board('A').int(0).text("host")),
            Err(Error::InvalidParameter(_))
        ));

        let reply = "Output 1 destination: 192.168.1.3:46227\n\
            Data thread [0] -> 192.168.1.100:46338\n\
            Data thread [3] -> 192.168.1.101:46338\n";
        let Response::Destination(d) =
            decode("core3h_destination", Args::for_board('A').int(1), &[reply]).unwrap()
        else {
            panic!("expected a destination");
        };
        assert_eq!(d.output, 1);
        assert_eq!(d.address, Some("192.168.1.3:46227".parse().unwrap()));
        assert_eq!(d.threads.len(), 2);
        assert_eq!(d.threads[&3], "192.168.1.101:46338".parse().unwrap());

        let Response::Destination(d) = decode(
            "core3h_destination",
            Args::for_board('A').int(2),
            &["Output 2 destination: none"],
        )
        .unwrap() else {
            panic!("expected a destination");
        };
        assert_eq!((d.output, d.address), (2, None));
    }

    #[test]
    fn tengbinfo_settings_and_arp() {
        let reply = "Configuration information for eth0:\n\
            MAC address : ba:dc:af:e4:be:e0\n\
            IP address  : 192.168.1.20\n\
            Dest. port  : 46227\n\
            ARP cache:\n\
            MAC               IP\n\
              BA:DC:AF:E4:BE:E2 192.168.1.1\n";
        let Response::TenGbInfo(info) =
            decode("core3h_tengbinfo", Args::for_board('A').text("eth0"), &[reply]).unwrap()
        else {
            panic!("expected 10GbE info");
        };
        assert_eq!(info.get("mac_address"), Some("ba:dc:af:e4:be:e0"));
        assert_eq!(info.get("ip_address"), Some("192.168.1.20"));
        assert_eq!(info.get("dest_port"), Some("46227"));
        assert_eq!(
            info.arp_cache,
            vec![ArpEntry {
                mac: "BA:DC:AF:E4:BE:E2".into(),
                ip: Ipv4Addr::new(192, 168, 1, 1),
            }]
        );
        assert!(matches!(
            decode(
                "core3h_tengbinfo",
                Args::for_board('A').text("eth9"),
                &["device eth9 not found"]
            ),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn tengb_settings_are_checked() {
        assert_eq!(
            encode(
                "core3h_tengbcfg",
                Args::for_board('A').text("eth0").text("ip").text("192.168.1.20")
            )
            .unwrap(),
            vec!["core3h=1,tengbcfg eth0 ip=192.168.1.20"]
        );
        assert!(
            encode("core3h_tengbcfg", Args::for_board('A').text("eth0").text("mtu").text("9000"))
                .is_err()
        );
        assert_eq!(
            encode(
                "core3h_tengbarp",
                Args::for_board('A').text("eth0").int(1).text("ba:dc:af:e4:be:e2")
            )
            .unwrap(),
            vec!["core3h=1,tengbarp eth0 1 ba:dc:af:e4:be:e2"]
        );
        assert!(matches!(
            encode("core3h_tengbarp", Args::for_board('A').text("eth0").int(1).text("ba:dc")),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn core3_mode_phrases() {
        assert_eq!(
            encode("core3h_core3_mode", Args::for_board('A').text("half_merged")).unwrap(),
            vec!["core3h=1,core3_mode half_merged"]
        );
        assert!(encode("core3h_core3_mode", Args::for_board('A').text("split")).is_err());
        assert_eq!(
            decode(
                "core3h_core3_mode",
                Args::for_board('A'),
                &["core3 mode: data from two samplers is merged"]
            )
            .unwrap(),
            Response::Core3Mode(Some(Core3Mode::HalfMerged))
        );
        assert_eq!(
            decode("core3h_core3_mode", Args::for_board('A'), &["?"]).unwrap(),
            Response::Core3Mode(None)
        );
    }

    #[test]
    fn core3_init_and_devices() {
        assert_eq!(
            decode("core3h_core3_init", Args::for_board('A'), &["...\nReset done"]).unwrap(),
            Response::Flag(true)
        );
        let reply = "0x00000000-0x0000FFFF -> core3\n0x00010000-0x0001FFFF -> tengbe0\n";
        let Response::Devices(devices) =
            decode("core3h_devices", Args::for_board('A'), &[reply]).unwrap()
        else {
            panic!("expected devices");
        };
        assert_eq!(devices["tengbe0"], "0x00010000-0x0001FFFF");
        assert_eq!(devices.len(), 2);
    }
}
