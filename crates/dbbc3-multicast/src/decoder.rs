//! Telemetry datagram decoding.
//!
//! Every datagram starts with a 32-byte header `MODE,MAJOR,Month DDth YYYY`
//! padded with NUL. The rest of the payload follows a mode-dependent
//! [`Layout`], chosen through a version-floor registry in the same way the
//! command sets are:
//!
//! | Mode  | Floor | Layout | Length |
//! |-------|-------|--------|--------|
//! | OCT_D | 120   | [`Layout::Oct`] | 962 bytes |
//! | DDC_U | 125   | [`Layout::Ddc`] | 6208 bytes |
//!
//! All integers are little-endian.

use bytes::Buf;
use dbbc3_core::error::{Error, Result};
use dbbc3_core::{FirmwareInfo, FloorRegistry, MAX_BOARDS, Mode, ModeVersion, SAMPLERS_PER_BOARD};

use crate::snapshot::{
    BbcState, BoardState, Core3hState, FilterState, IfState, LevelStats, SamplerState, Snapshot,
    SynthState, mask_bits,
};

/// Length of the NUL-padded version header.
pub const HEADER_LEN: usize = 32;

/// Number of BBC records in a DDC datagram.
pub const BBC_COUNT: usize = 128;

/// BBC frequencies are reported in units of 1/524288 MHz.
const BBC_FREQUENCY_SCALE: f64 = 524_288.0;

const IF_SECTIONS_LEN: usize = 2 * MAX_BOARDS * 8;

/// Field layout of a telemetry datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// OCT_D: board masks, GCoMo, down-converter, ADB3L with offsets,
    /// core3h with VDIF time and filter statistics.
    Oct,
    /// DDC: GCoMo, down-converter, ADB3L with level statistics, core3h
    /// with total power, and 128 BBC records.
    Ddc,
}

impl Layout {
    /// Minimum payload length, header included.
    pub const fn payload_len(self) -> usize {
        match self {
            Layout::Oct => HEADER_LEN + 2 + IF_SECTIONS_LEN + MAX_BOARDS * 48 + MAX_BOARDS * 52,
            Layout::Ddc => {
                HEADER_LEN + IF_SECTIONS_LEN + MAX_BOARDS * 92 + MAX_BOARDS * 24 + BBC_COUNT * 40
            }
        }
    }

    /// Decode `payload`, whose header has already been parsed into
    /// `firmware`.
    pub fn decode(self, firmware: FirmwareInfo, payload: &[u8]) -> Result<Snapshot> {
        if payload.len() < self.payload_len() {
            return Err(Error::decode(
                format!(
                    "{} payload too short: {} bytes, layout needs {}",
                    firmware.mode_version,
                    payload.len(),
                    self.payload_len()
                ),
                payload,
            ));
        }
        let body = &payload[HEADER_LEN..];
        let snapshot = match self {
            Layout::Oct => decode_oct(firmware, body),
            Layout::Ddc => decode_ddc(firmware, body),
        };
        snapshot.map_err(|message| Error::decode(message, payload))
    }
}

/// Parse the version header of a datagram.
///
/// An unknown mode tag yields [`Error::UnsupportedVersion`]; anything else
/// that is wrong with the header yields [`Error::Decode`].
pub fn parse_header(payload: &[u8]) -> Result<FirmwareInfo> {
    if payload.len() < HEADER_LEN {
        return Err(Error::decode(
            format!("datagram too short for header: {} bytes", payload.len()),
            payload,
        ));
    }
    let header = &payload[..HEADER_LEN];
    let end = header.iter().position(|&b| b == 0).unwrap_or(HEADER_LEN);
    let text = std::str::from_utf8(&header[..end])
        .map_err(|_| Error::decode("header is not valid UTF-8", payload))?;
    let mut parts = text.splitn(3, ',');
    let (Some(mode), Some(major), Some(release)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::decode(format!("malformed header {text:?}"), payload));
    };
    FirmwareInfo::from_fields(mode, major, release).map_err(|e| match e {
        Error::UnsupportedVersion { .. } => e,
        other => Error::decode(format!("malformed header {text:?}: {other}"), payload),
    })
}

/// Layouts keyed by version floor.
#[derive(Debug, Clone, Default)]
pub struct DecoderRegistry {
    floors: FloorRegistry<Layout>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every layout this crate implements.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register(Mode::OctD, 120, Layout::Oct)
            .expect("standard floors are distinct");
        registry
            .register(Mode::DdcU, 125, Layout::Ddc)
            .expect("standard floors are distinct");
        registry
    }

    pub fn register(&mut self, mode: Mode, min_version: u32, layout: Layout) -> Result<()> {
        self.floors.register(mode, min_version, layout)
    }

    /// Layout serving `actual`, with the matched floor.
    pub fn resolve(&self, actual: ModeVersion) -> Result<(ModeVersion, Layout)> {
        let (floor, layout) = self.floors.resolve(actual)?;
        Ok((floor, *layout))
    }

    /// Decode one complete datagram.
    pub fn decode(&self, payload: &[u8]) -> Result<Snapshot> {
        let firmware = parse_header(payload)?;
        let (_, layout) = self.resolve(firmware.mode_version)?;
        layout.decode(firmware, payload)
    }
}

/// Decode one datagram with the standard registry.
pub fn decode(payload: &[u8]) -> Result<Snapshot> {
    DecoderRegistry::standard().decode(payload)
}

/// Decoder that remembers the last resolved layout.
///
/// The device only changes mode on reconfiguration, so consecutive
/// datagrams almost always share a header.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    registry: DecoderRegistry,
    cached: Option<(ModeVersion, Layout)>,
}

impl FrameDecoder {
    pub fn new(registry: DecoderRegistry) -> Self {
        Self {
            registry,
            cached: None,
        }
    }

    pub fn decode(&mut self, payload: &[u8]) -> Result<Snapshot> {
        let firmware = parse_header(payload)?;
        let actual = firmware.mode_version;
        let layout = match self.cached {
            Some((cached, layout)) if cached == actual => layout,
            _ => {
                let (floor, layout) = self.registry.resolve(actual)?;
                tracing::debug!(actual = %actual, floor = %floor, layout = ?layout, "Resolved telemetry layout");
                self.cached = Some((actual, layout));
                layout
            }
        };
        layout.decode(firmware, payload)
    }
}

// ---------------------------------------------------------------
// Sections
// ---------------------------------------------------------------

type Decoded<T> = std::result::Result<T, String>;

fn read_u32s<const N: usize>(buf: &mut impl Buf) -> [u32; N] {
    let mut out = [0u32; N];
    for v in &mut out {
        *v = buf.get_u32_le();
    }
    out
}

/// GCoMo then down-converter, eight boards each.
fn read_if_sections(buf: &mut impl Buf) -> Vec<(IfState, SynthState)> {
    let mut ifs = Vec::with_capacity(MAX_BOARDS);
    for _ in 0..MAX_BOARDS {
        let agc = buf.get_u8() != 0;
        buf.advance(1);
        ifs.push(IfState {
            agc,
            attenuation: buf.get_u16_le(),
            count: buf.get_u16_le(),
            target: buf.get_u16_le(),
        });
    }
    ifs.into_iter()
        .map(|if_state| {
            let synth = SynthState {
                status: buf.get_u16_le(),
                locked: buf.get_u16_le() == 1,
                attenuation: buf.get_u16_le(),
                frequency: f64::from(buf.get_u16_le()),
            };
            (if_state, synth)
        })
        .collect()
}

fn into_boards(boards: Vec<Option<BoardState>>) -> Decoded<[Option<BoardState>; MAX_BOARDS]> {
    boards
        .try_into()
        .map_err(|b: Vec<_>| format!("expected {MAX_BOARDS} boards, decoded {}", b.len()))
}

fn decode_oct(firmware: FirmwareInfo, mut buf: &[u8]) -> Decoded<Snapshot> {
    let board_present = mask_bits(buf.get_u8());
    let board_active = mask_bits(buf.get_u8());
    let ifs = read_if_sections(&mut buf);

    let mut adb3l = Vec::with_capacity(MAX_BOARDS);
    for _ in 0..MAX_BOARDS {
        let power: [u32; SAMPLERS_PER_BOARD] = read_u32s(&mut buf);
        let offset: [u32; SAMPLERS_PER_BOARD] = read_u32s(&mut buf);
        let delay_corr: [u32; 3] = read_u32s(&mut buf);
        buf.advance(4);
        adb3l.push((power, offset, delay_corr));
    }

    let mut core3h = Vec::with_capacity(MAX_BOARDS);
    for _ in 0..MAX_BOARDS {
        let state = Core3hState::Oct {
            vdif_seconds: buf.get_u32_le(),
            vdif_epoch: buf.get_u32_le(),
            pps_delay: buf.get_u32_le(),
        };
        let power: [u32; 2] = read_u32s(&mut buf);
        let stats: [[u32; 4]; 2] = [read_u32s(&mut buf), read_u32s(&mut buf)];
        let filters = power
            .iter()
            .zip(stats)
            .map(|(&power, counts)| FilterState {
                power,
                stats: LevelStats::new(counts),
            })
            .collect::<Vec<_>>();
        core3h.push((state, filters));
    }

    let boards = ifs
        .into_iter()
        .zip(adb3l)
        .zip(core3h)
        .enumerate()
        .map(|(i, (((if_state, synth), (power, offset, delay_corr)), (core3h, filters)))| {
            board_present[i].then(|| BoardState {
                if_state,
                synth,
                samplers: std::array::from_fn(|s| SamplerState {
                    power: power[s],
                    offset: Some(offset[s]),
                    stats: None,
                }),
                delay_corr,
                core3h,
                filters,
                bbcs: Vec::new(),
            })
        })
        .collect();

    Ok(Snapshot {
        firmware,
        board_present,
        board_active,
        boards: into_boards(boards)?,
    })
}

/// Board fed by BBC `index` (zero-based): eight BBCs per board in each
/// half of the table.
pub fn bbc_board(index: usize) -> usize {
    (index % (BBC_COUNT / 2)) / 8
}

fn decode_ddc(firmware: FirmwareInfo, mut buf: &[u8]) -> Decoded<Snapshot> {
    let ifs = read_if_sections(&mut buf);

    let mut adb3l = Vec::with_capacity(MAX_BOARDS);
    for _ in 0..MAX_BOARDS {
        let power: [u32; SAMPLERS_PER_BOARD] = read_u32s(&mut buf);
        let mut stats = [LevelStats::new([0; 4]); SAMPLERS_PER_BOARD];
        for s in &mut stats {
            *s = LevelStats::new(read_u32s(&mut buf));
        }
        let delay_corr: [u32; 3] = read_u32s(&mut buf);
        adb3l.push((power, stats, delay_corr));
    }

    let mut core3h = Vec::with_capacity(MAX_BOARDS);
    for _ in 0..MAX_BOARDS {
        core3h.push(Core3hState::Ddc {
            time: buf.get_u32_le(),
            pps_delay: buf.get_u32_le(),
            tp_on: buf.get_u32_le(),
            tp_off: buf.get_u32_le(),
            tsys: buf.get_u32_le(),
            sefd: buf.get_u32_le(),
        });
    }

    let mut bbcs: Vec<Vec<BbcState>> = vec![Vec::new(); MAX_BOARDS];
    for index in 0..BBC_COUNT {
        let frequency = f64::from(buf.get_u32_le()) / BBC_FREQUENCY_SCALE;
        let bandwidth = buf.get_u8();
        let agc_status = buf.get_u8();
        let gain_usb = buf.get_u8();
        let gain_lsb = buf.get_u8();
        let [power_on_usb, power_on_lsb, power_off_usb, power_off_lsb] = read_u32s(&mut buf);
        let mut counts = [0u32; 4];
        for c in &mut counts {
            *c = u32::from(buf.get_u16_le());
        }
        bbcs[bbc_board(index)].push(BbcState {
            number: index + 1,
            frequency,
            bandwidth,
            agc_status,
            gain_usb,
            gain_lsb,
            power_on_usb,
            power_on_lsb,
            power_off_usb,
            power_off_lsb,
            stats: LevelStats::new(counts),
            tsys_usb: buf.get_u16_le(),
            tsys_lsb: buf.get_u16_le(),
            sefd_usb: buf.get_u16_le(),
            sefd_lsb: buf.get_u16_le(),
        });
    }

    let boards = ifs
        .into_iter()
        .zip(adb3l)
        .zip(core3h)
        .zip(bbcs)
        .map(|((((if_state, synth), (power, stats, delay_corr)), core3h), bbcs)| {
            Some(BoardState {
                if_state,
                synth,
                samplers: std::array::from_fn(|s| SamplerState {
                    power: power[s],
                    offset: None,
                    stats: Some(stats[s]),
                }),
                delay_corr,
                core3h,
                filters: Vec::new(),
                bbcs,
            })
        })
        .collect();

    // The DDC layout carries no masks.
    Ok(Snapshot {
        firmware,
        board_present: [true; MAX_BOARDS],
        board_active: [true; MAX_BOARDS],
        boards: into_boards(boards)?,
    })
}
