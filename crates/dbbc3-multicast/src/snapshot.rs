//! Decoded telemetry values.
//!
//! A [`Snapshot`] is one complete datagram. Boards that the device reports
//! as not installed carry no [`BoardState`] at all.

use chrono::NaiveDateTime;
use dbbc3_core::{FirmwareInfo, MAX_BOARDS, Mode, SAMPLERS_PER_BOARD, vdif};

/// Counts of the four 2-bit levels and their share of the total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelStats {
    pub counts: [u32; 4],
    /// Percentages of the total; all zero when the total is zero.
    pub percent: [f64; 4],
}

impl LevelStats {
    pub fn new(counts: [u32; 4]) -> Self {
        let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
        let percent = counts.map(|c| {
            if total == 0 {
                0.0
            } else {
                f64::from(c) * 100.0 / total as f64
            }
        });
        Self { counts, percent }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }
}

/// GCoMo (IF conditioning) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfState {
    /// Automatic gain control active; otherwise manual.
    pub agc: bool,
    pub attenuation: u16,
    pub count: u16,
    pub target: u16,
}

/// Down-converter synthesizer state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthState {
    pub status: u16,
    pub locked: bool,
    pub attenuation: u16,
    /// LO frequency in MHz.
    pub frequency: f64,
}

/// One of the four samplers of a board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerState {
    pub power: u32,
    /// Sampler offset (OCT layout only).
    pub offset: Option<u32>,
    /// 2-bit level statistics (DDC layout only).
    pub stats: Option<LevelStats>,
}

/// A polyphase filter output of an OCT board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterState {
    pub power: u32,
    pub stats: LevelStats,
}

/// core3h timing and total-power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Core3hState {
    Oct {
        vdif_seconds: u32,
        vdif_epoch: u32,
        pps_delay: u32,
    },
    Ddc {
        time: u32,
        pps_delay: u32,
        tp_on: u32,
        tp_off: u32,
        tsys: u32,
        sefd: u32,
    },
}

impl Core3hState {
    /// PPS delay in nanoseconds.
    pub fn pps_delay(&self) -> u32 {
        match self {
            Core3hState::Oct { pps_delay, .. } | Core3hState::Ddc { pps_delay, .. } => *pps_delay,
        }
    }

    /// VDIF time of the board, OCT layout only.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Core3hState::Oct {
                vdif_seconds,
                vdif_epoch,
                ..
            } => vdif::timestamp(*vdif_epoch, u64::from(*vdif_seconds)),
            Core3hState::Ddc { .. } => None,
        }
    }
}

/// One baseband converter of a DDC system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BbcState {
    /// BBC number, 1-128.
    pub number: usize,
    /// Tuning frequency in MHz.
    pub frequency: f64,
    pub bandwidth: u8,
    pub agc_status: u8,
    pub gain_usb: u8,
    pub gain_lsb: u8,
    pub power_on_usb: u32,
    pub power_on_lsb: u32,
    pub power_off_usb: u32,
    pub power_off_lsb: u32,
    pub stats: LevelStats,
    pub tsys_usb: u16,
    pub tsys_lsb: u16,
    pub sefd_usb: u16,
    pub sefd_lsb: u16,
}

/// Everything reported for one installed board.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardState {
    pub if_state: IfState,
    pub synth: SynthState,
    pub samplers: [SamplerState; SAMPLERS_PER_BOARD],
    pub delay_corr: [u32; 3],
    pub core3h: Core3hState,
    /// Filter outputs (OCT), empty for DDC.
    pub filters: Vec<FilterState>,
    /// BBCs fed by this board (DDC), empty for OCT.
    pub bbcs: Vec<BbcState>,
}

/// One decoded telemetry datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub firmware: FirmwareInfo,
    pub board_present: [bool; MAX_BOARDS],
    pub board_active: [bool; MAX_BOARDS],
    pub boards: [Option<BoardState>; MAX_BOARDS],
}

impl Snapshot {
    pub fn mode(&self) -> Mode {
        self.firmware.mode()
    }

    pub fn major_version(&self) -> u32 {
        self.firmware.version()
    }

    /// Release date as `YYMMDD`.
    pub fn minor_version(&self) -> u32 {
        self.firmware.minor_version()
    }

    pub fn minor_version_string(&self) -> &str {
        &self.firmware.release_string
    }

    /// State of board `index`, `None` if not installed or out of range.
    pub fn board(&self, index: usize) -> Option<&BoardState> {
        self.boards.get(index)?.as_ref()
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.board_active.get(index).copied().unwrap_or(false)
    }

    /// Installed boards with their indices.
    pub fn present_boards(&self) -> impl Iterator<Item = (usize, &BoardState)> {
        self.boards
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (i, b)))
    }
}

/// Unpack a board bit mask, bit `i` = board `i`.
pub(crate) fn mask_bits(mask: u8) -> [bool; MAX_BOARDS] {
    std::array::from_fn(|i| (mask >> i) & 1 == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn level_percentages() {
        let stats = LevelStats::new([16, 34, 34, 16]);
        assert_eq!(stats.total(), 100);
        assert_eq!(stats.percent, [16.0, 34.0, 34.0, 16.0]);
    }

    #[test]
    fn zero_total_gives_zero_percent() {
        assert_eq!(LevelStats::new([0; 4]).percent, [0.0; 4]);
    }

    #[test]
    fn mask_unpacking() {
        assert_eq!(
            mask_bits(0b0000_0101),
            [true, false, true, false, false, false, false, false]
        );
        assert_eq!(mask_bits(0xFF), [true; 8]);
    }

    #[test]
    fn oct_timestamp() {
        let state = Core3hState::Oct {
            vdif_seconds: 3_920_060,
            vdif_epoch: 38,
            pps_delay: 39,
        };
        let expected = NaiveDate::from_ymd_opt(2019, 2, 15)
            .unwrap()
            .and_hms_opt(8, 54, 20)
            .unwrap();
        assert_eq!(state.timestamp(), Some(expected));
        assert_eq!(state.pps_delay(), 39);
    }
}
