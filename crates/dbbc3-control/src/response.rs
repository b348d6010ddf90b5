//! Structured values decoded from command responses.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

use chrono::NaiveDateTime;
use dbbc3_core::FirmwareInfo;
use dbbc3_core::error::Error;

/// Gain control setting of a GCoMo IF module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgcMode {
    /// Automatic gain control towards the target level.
    Agc,
    /// Manual, retaining the last AGC attenuation.
    Manual,
    /// Fixed attenuation step (0-63, 0.5 dB each).
    Fixed(u8),
}

impl AgcMode {
    pub fn is_agc(&self) -> bool {
        matches!(self, AgcMode::Agc)
    }
}

impl std::fmt::Display for AgcMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgcMode::Agc => f.write_str("agc"),
            AgcMode::Manual => f.write_str("man"),
            AgcMode::Fixed(step) => write!(f, "{step}"),
        }
    }
}

/// IF input type of a GCoMo module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfInput {
    /// IF fed on the top pin, bypassing down-conversion.
    Direct,
    /// IF after down-conversion by the GCoMo.
    DownConverted,
}

impl IfInput {
    pub fn code(&self) -> u8 {
        match self {
            IfInput::Direct => 1,
            IfInput::DownConverted => 2,
        }
    }
}

/// Reported state of `dbbcif`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfSettings {
    pub input: IfInput,
    pub attenuation: u32,
    pub mode: AgcMode,
    /// Current IF level in counts.
    pub count: u32,
    /// AGC target level in counts.
    pub target: u32,
}

/// Synthesizer tuning in MHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthFrequency {
    pub target: u32,
    pub actual: u32,
}

/// Calibration loop switches as confirmed by `enablecal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationLoop {
    pub threshold: bool,
    pub gain: bool,
    pub offset: bool,
}

impl Default for CalibrationLoop {
    fn default() -> Self {
        Self {
            threshold: true,
            gain: false,
            offset: false,
        }
    }
}

/// Outcome of `core3h_timesync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimesyncResult {
    pub success: bool,
    pub timestamp: Option<NaiveDateTime>,
}

/// BBC gain control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainMode {
    Agc { target: u32 },
    Manual,
}

/// Reported state of `dbbcgain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BbcGain {
    pub bbc: u32,
    pub gain_usb: u32,
    pub gain_lsb: u32,
    pub mode: GainMode,
}

/// Sign and magnitude statistics of one BBC, `(USB, LSB)` percentages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BbcStatistics {
    pub sign: (f64, f64),
    pub magnitude: (f64, f64),
}

/// One level of the DSC 2-bit statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelCount {
    pub count: u64,
    pub percent: u32,
}

/// Outcome of `checkphase`, with the reply that names failing samplers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseCheck {
    pub in_sync: bool,
    pub report: String,
}

/// VSI input sample rate of a core3h board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VsiSampleRate {
    /// Samples per second before decimation.
    pub sample_rate: u64,
    pub decimation: u32,
}

/// Data source feeding the core3h formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// Test vector generator.
    Tvg,
    Vsi1,
    Vsi2,
    Vsi1To2,
    Vsi1To4,
    Vsi1To8,
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputSource::Tvg => "tvg",
            InputSource::Vsi1 => "vsi1",
            InputSource::Vsi2 => "vsi2",
            InputSource::Vsi1To2 => "vsi1-2",
            InputSource::Vsi1To4 => "vsi1-2-3-4",
            InputSource::Vsi1To8 => "vsi1-2-3-4-5-6-7-8",
        })
    }
}

impl FromStr for InputSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tvg" => Ok(InputSource::Tvg),
            "vsi1" => Ok(InputSource::Vsi1),
            "vsi2" => Ok(InputSource::Vsi2),
            "vsi1-2" => Ok(InputSource::Vsi1To2),
            "vsi1-2-3-4" => Ok(InputSource::Vsi1To4),
            "vsi1-2-3-4-5-6-7-8" => Ok(InputSource::Vsi1To8),
            other => Err(Error::InvalidParameter(format!("unknown input source {other:?}"))),
        }
    }
}

/// Pattern produced by the test vector generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvgMode {
    AllZero,
    AllOne,
    /// VSI-H test vector.
    VsiH,
    /// 8-bit counters.
    Counter,
}

impl fmt::Display for TvgMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TvgMode::AllZero => "all-0",
            TvgMode::AllOne => "all-1",
            TvgMode::VsiH => "vsi-h",
            TvgMode::Counter => "cnt",
        })
    }
}

/// How sampler data is routed to the core3h outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Core3Mode {
    /// Each sampler goes to its own output.
    Independent,
    /// Pairs of samplers are merged.
    HalfMerged,
    /// All samplers are merged into one stream.
    Merged,
    /// Polyphase filterbank output.
    Pfb,
}

impl fmt::Display for Core3Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Core3Mode::Independent => "independent",
            Core3Mode::HalfMerged => "half_merged",
            Core3Mode::Merged => "merged",
            Core3Mode::Pfb => "pfb",
        })
    }
}

/// VDIF frame layout reported by `core3h_vdif_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VdifFrame {
    /// False when the layout does not fit the selected input.
    pub compatible: bool,
    /// Bits per channel.
    pub channel_width: u32,
    pub channels: u32,
    /// Payload bytes, without the header.
    pub payload_size: u32,
    pub frame_size: u32,
    pub frames_per_second: Option<u64>,
    pub threads: Option<u32>,
    pub frames_per_thread: Option<u64>,
}

/// Where one core3h output sends its frames.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Destination {
    pub output: u32,
    /// `None` when the output is disabled.
    pub address: Option<SocketAddrV4>,
    /// Per-thread overrides, by thread id.
    pub threads: BTreeMap<u32, SocketAddrV4>,
}

/// One ARP cache entry of a 10GbE device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpEntry {
    pub mac: String,
    pub ip: Ipv4Addr,
}

/// Configuration of a 10GbE device as reported by `core3h_tengbinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TenGbInfo {
    /// Keys are lowercase with the first space replaced by `_`, e.g.
    /// `mac_address` or `ip_address`.
    pub settings: BTreeMap<String, String>,
    pub arp_cache: Vec<ArpEntry>,
}

impl TenGbInfo {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// A decoded command response.
///
/// Each command set maps a command name to the decoder producing one of
/// these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Firmware(FirmwareInfo),
    If(IfSettings),
    /// Boolean outcome: lock state, phase sync, reset/stop success.
    Flag(bool),
    SynthFrequency(SynthFrequency),
    Calibration(CalibrationLoop),
    Timestamp(Option<NaiveDateTime>),
    Timesync(TimesyncResult),
    /// Per-output data format after `core3h_start`.
    OutputFormats(Vec<Option<String>>),
    /// Four per-sampler values, `None` when the board is not connected.
    SamplerValues(Option<[u64; 4]>),
    /// Cross-correlation of sampler pairs 0-1, 1-2, 2-3.
    Correlation([i64; 3]),
    BbcGain(BbcGain),
    BbcStatistics(BbcStatistics),
    /// Levels `11`, `10`, `01`, `00` in that order.
    LevelCounts([LevelCount; 4]),
    Values(Vec<u64>),
    /// PPS delays in nanoseconds.
    PpsDelays(Vec<u32>),
    Register(u32),
    Phase(PhaseCheck),
    /// On/off setting; `None` when the reply names neither.
    Switch(Option<bool>),
    SampleRate(VsiSampleRate),
    Input(InputSource),
    Tvg(Option<TvgMode>),
    Core3Mode(Option<Core3Mode>),
    /// `None` when the device rejected the layout.
    VdifFrame(Option<VdifFrame>),
    /// The four VDIF user data words.
    UserData([u32; 4]),
    Destination(Destination),
    TenGbInfo(TenGbInfo),
    /// Device name to address range.
    Devices(BTreeMap<String, String>),
    /// Free-form reply for commands whose output is informational.
    Text(String),
}
