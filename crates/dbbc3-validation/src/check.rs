//! The checks and the version-dependent sets they come in.
//!
//! | Mode  | Floor | Checks |
//! |-------|-------|--------|
//! | DDC_V | 123   | common + `pps` |
//! | DDC_V | 124   | common + `pps`, `pps_blocks` |
//! | DDC_U | 125   | as DDC_V 124 |
//! | OCT_D | 110   | common + `bit_statistics` |
//!
//! The common checks are timesync, synthesizer lock and frequency, IF
//! level, sampler power, offsets and phases.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use dbbc3_core::error::{Error, Result};
use dbbc3_core::{BoardRef, Family, FloorRegistry, Mode, ModeVersion};

/// Where a telemetry-based check takes its snapshot from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The most recent snapshot, without waiting.
    Latest,
    /// Wait up to the given time for a snapshot newer than the last one
    /// consumed.
    Fresh(Duration),
}

/// One check, with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Timesync(BoardRef),
    SynthesizerLock(BoardRef),
    SynthesizerFrequency(BoardRef),
    IfLevel(BoardRef),
    SamplerPower(BoardRef),
    SamplerOffsets(BoardRef),
    SamplerPhases,
    Pps,
    PpsBlocks(BoardRef),
    BitStatistics(BoardRef, Freshness),
}

impl Check {
    pub fn kind(&self) -> CheckKind {
        match self {
            Check::Timesync(_) => CheckKind::Timesync,
            Check::SynthesizerLock(_) => CheckKind::SynthesizerLock,
            Check::SynthesizerFrequency(_) => CheckKind::SynthesizerFrequency,
            Check::IfLevel(_) => CheckKind::IfLevel,
            Check::SamplerPower(_) => CheckKind::SamplerPower,
            Check::SamplerOffsets(_) => CheckKind::SamplerOffsets,
            Check::SamplerPhases => CheckKind::SamplerPhases,
            Check::Pps => CheckKind::Pps,
            Check::PpsBlocks(_) => CheckKind::PpsBlocks,
            Check::BitStatistics(..) => CheckKind::BitStatistics,
        }
    }

    /// Build a check of `kind`. Board-less kinds ignore `board`.
    pub fn new(kind: CheckKind, board: impl Into<BoardRef>, freshness: Freshness) -> Self {
        let board = board.into();
        match kind {
            CheckKind::Timesync => Check::Timesync(board),
            CheckKind::SynthesizerLock => Check::SynthesizerLock(board),
            CheckKind::SynthesizerFrequency => Check::SynthesizerFrequency(board),
            CheckKind::IfLevel => Check::IfLevel(board),
            CheckKind::SamplerPower => Check::SamplerPower(board),
            CheckKind::SamplerOffsets => Check::SamplerOffsets(board),
            CheckKind::SamplerPhases => Check::SamplerPhases,
            CheckKind::Pps => Check::Pps,
            CheckKind::PpsBlocks => Check::PpsBlocks(board),
            CheckKind::BitStatistics => Check::BitStatistics(board, freshness),
        }
    }

    pub fn board(&self) -> Option<BoardRef> {
        match *self {
            Check::Timesync(b)
            | Check::SynthesizerLock(b)
            | Check::SynthesizerFrequency(b)
            | Check::IfLevel(b)
            | Check::SamplerPower(b)
            | Check::SamplerOffsets(b)
            | Check::PpsBlocks(b)
            | Check::BitStatistics(b, _) => Some(b),
            Check::SamplerPhases | Check::Pps => None,
        }
    }
}

/// A check without its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Timesync,
    SynthesizerLock,
    SynthesizerFrequency,
    IfLevel,
    SamplerPower,
    SamplerOffsets,
    SamplerPhases,
    Pps,
    PpsBlocks,
    BitStatistics,
}

impl CheckKind {
    pub const ALL: [CheckKind; 10] = [
        CheckKind::Timesync,
        CheckKind::SynthesizerLock,
        CheckKind::SynthesizerFrequency,
        CheckKind::IfLevel,
        CheckKind::SamplerPower,
        CheckKind::SamplerOffsets,
        CheckKind::SamplerPhases,
        CheckKind::Pps,
        CheckKind::PpsBlocks,
        CheckKind::BitStatistics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Timesync => "timesync",
            CheckKind::SynthesizerLock => "synthesizer_lock",
            CheckKind::SynthesizerFrequency => "synthesizer_frequency",
            CheckKind::IfLevel => "if_level",
            CheckKind::SamplerPower => "sampler_power",
            CheckKind::SamplerOffsets => "sampler_offsets",
            CheckKind::SamplerPhases => "sampler_phases",
            CheckKind::Pps => "pps",
            CheckKind::PpsBlocks => "pps_blocks",
            CheckKind::BitStatistics => "bit_statistics",
        }
    }

    /// Whether the check addresses a single board.
    pub fn needs_board(&self) -> bool {
        !matches!(self, CheckKind::SamplerPhases | CheckKind::Pps)
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = Error;

    /// Accepts the snake_case name, with `-` allowed for `_`.
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase().replace('-', "_");
        CheckKind::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown check {s:?}")))
    }
}

const COMMON: [CheckKind; 7] = [
    CheckKind::Timesync,
    CheckKind::SynthesizerLock,
    CheckKind::SynthesizerFrequency,
    CheckKind::IfLevel,
    CheckKind::SamplerPower,
    CheckKind::SamplerOffsets,
    CheckKind::SamplerPhases,
];

/// The checks available for one version floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSet {
    floor: ModeVersion,
    kinds: Vec<CheckKind>,
}

impl CheckSet {
    pub fn new(floor: ModeVersion, kinds: impl IntoIterator<Item = CheckKind>) -> Self {
        Self {
            floor,
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn floor(&self) -> ModeVersion {
        self.floor
    }

    pub fn family(&self) -> Family {
        self.floor.mode.family()
    }

    pub fn supports(&self, kind: CheckKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn kinds(&self) -> &[CheckKind] {
        &self.kinds
    }

    /// Fail with [`Error::UnsupportedCheck`] unless `kind` is in the set.
    pub fn require(&self, kind: CheckKind) -> Result<()> {
        if self.supports(kind) {
            Ok(())
        } else {
            Err(Error::UnsupportedCheck {
                check: kind.to_string(),
                family: self.family().to_string(),
            })
        }
    }
}

/// Builds the check set for a floor.
pub type CheckSetFactory = fn(ModeVersion) -> CheckSet;

/// Check sets keyed by version floor.
#[derive(Debug, Clone, Default)]
pub struct CheckSetRegistry {
    floors: FloorRegistry<CheckSetFactory>,
}

impl CheckSetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every floor this crate implements.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let entries: [(Mode, u32, CheckSetFactory); 4] = [
            (Mode::DdcV, 123, ddc),
            (Mode::DdcV, 124, ddc_with_blocks),
            (Mode::DdcU, 125, ddc_with_blocks),
            (Mode::OctD, 110, oct),
        ];
        for (mode, min_version, factory) in entries {
            registry
                .register(mode, min_version, factory)
                .expect("standard floors are distinct");
        }
        registry
    }

    pub fn register(
        &mut self,
        mode: Mode,
        min_version: u32,
        factory: CheckSetFactory,
    ) -> Result<()> {
        self.floors.register(mode, min_version, factory)
    }

    /// The check set for a running device.
    pub fn resolve(&self, actual: ModeVersion) -> Result<CheckSet> {
        let (floor, factory) = self.floors.resolve(actual)?;
        Ok(factory(floor))
    }
}

fn ddc(floor: ModeVersion) -> CheckSet {
    CheckSet::new(floor, COMMON.into_iter().chain([CheckKind::Pps]))
}

fn ddc_with_blocks(floor: ModeVersion) -> CheckSet {
    CheckSet::new(
        floor,
        COMMON
            .into_iter()
            .chain([CheckKind::Pps, CheckKind::PpsBlocks]),
    )
}

fn oct(floor: ModeVersion) -> CheckSet {
    CheckSet::new(floor, COMMON.into_iter().chain([CheckKind::BitStatistics]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_select_check_sets() {
        let registry = CheckSetRegistry::standard();

        let set = registry.resolve(ModeVersion::new(Mode::DdcV, 123)).unwrap();
        assert!(set.supports(CheckKind::Pps));
        assert!(!set.supports(CheckKind::PpsBlocks));

        let set = registry.resolve(ModeVersion::new(Mode::DdcV, 130)).unwrap();
        assert_eq!(set.floor().version, 124);
        assert!(set.supports(CheckKind::PpsBlocks));

        let set = registry.resolve(ModeVersion::new(Mode::OctD, 120)).unwrap();
        assert_eq!(set.family(), Family::Oct);
        assert!(set.supports(CheckKind::BitStatistics));
        assert!(!set.supports(CheckKind::Pps));

        assert!(matches!(
            registry.resolve(ModeVersion::new(Mode::DdcU, 124)),
            Err(Error::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn standard_floors_are_taken() {
        let mut registry = CheckSetRegistry::standard();
        for (mode, version) in [(Mode::DdcV, 123), (Mode::DdcV, 124), (Mode::DdcU, 125), (Mode::OctD, 110)] {
            assert!(matches!(
                registry.register(mode, version, oct),
                Err(Error::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn unsupported_check_names_family() {
        let set = CheckSetRegistry::standard()
            .resolve(ModeVersion::new(Mode::OctD, 120))
            .unwrap();
        match set.require(CheckKind::Pps) {
            Err(Error::UnsupportedCheck { check, family }) => {
                assert_eq!(check, "pps");
                assert_eq!(family, "OCT");
            }
            other => panic!("expected UnsupportedCheck, got {other:?}"),
        }
    }

    #[test]
    fn kind_names() {
        assert_eq!("synth-lock".parse::<CheckKind>().ok(), None);
        assert_eq!(
            "synthesizer-lock".parse::<CheckKind>().unwrap(),
            CheckKind::SynthesizerLock
        );
        assert_eq!("PPS".parse::<CheckKind>().unwrap(), CheckKind::Pps);
        for kind in CheckKind::ALL {
            assert_eq!(kind.as_str().parse::<CheckKind>().unwrap(), kind);
        }
    }

    #[test]
    fn check_from_kind() {
        let check = Check::new(CheckKind::IfLevel, 'b', Freshness::Latest);
        assert_eq!(check, Check::IfLevel(BoardRef::Letter('b')));
        assert_eq!(
            Check::new(CheckKind::Pps, 0usize, Freshness::Latest).board(),
            None
        );
    }
}
