//! Command-set registry.
//!
//! Maps `(mode, minimum version)` floors to command-set constructors and
//! picks, for a running device, the floor with the greatest minimum version
//! not above the device's version within the same mode.
//!
//! | Mode  | Floor | Grammar |
//! |-------|-------|---------|
//! | DDC_V | 123   | shared + DDC, `dbbc` bandwidth fixed to 32 MHz |
//! | DDC_V | 124   | as 123, plus per-board `pps_delay=N` |
//! | DDC_U | 125   | as DDC_V 124 |
//! | OCT_D | 110   | shared + `tap`, `tap2` |
//!
//! The shared grammar is common + core3h + adb3l.

use dbbc3_core::error::Result;
use dbbc3_core::{FloorRegistry, Mode, ModeVersion};

use crate::commandset::{CommandSet, CommandSpec};
use crate::grammar::{adb3l, common, core3h, ddc, oct};

/// Builds the command set for a floor.
pub type CommandSetFactory = fn(ModeVersion) -> CommandSet;

/// Registry of command sets keyed by version floor.
#[derive(Debug, Clone, Default)]
pub struct CommandSetRegistry {
    floors: FloorRegistry<CommandSetFactory>,
}

impl CommandSetRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every floor this crate implements.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let entries: [(Mode, u32, CommandSetFactory); 4] = [
            (Mode::DdcV, 123, ddc_v_123),
            (Mode::DdcV, 124, ddc_v_124),
            (Mode::DdcU, 125, ddc_v_124),
            (Mode::OctD, 110, oct_d_110),
        ];
        for (mode, min_version, factory) in entries {
            registry
                .register(mode, min_version, factory)
                .expect("standard floors are distinct");
        }
        registry
    }

    /// Add a floor. Each `(mode, min_version)` may be registered once.
    pub fn register(
        &mut self,
        mode: Mode,
        min_version: u32,
        factory: CommandSetFactory,
    ) -> Result<()> {
        self.floors.register(mode, min_version, factory)
    }

    /// Build the command set serving `actual`.
    ///
    /// Fails with [`Error::UnsupportedVersion`](dbbc3_core::Error::UnsupportedVersion)
    /// when no floor of that mode is at or below `actual.version`.
    pub fn resolve(&self, actual: ModeVersion) -> Result<CommandSet> {
        let (floor, factory) = self.floors.resolve(actual)?;
        tracing::debug!(actual = %actual, floor = %floor, "Resolved command set");
        Ok(factory(floor))
    }

    pub fn floors(&self) -> Vec<ModeVersion> {
        self.floors.floors().collect()
    }
}

/// Commands every floor carries before its family grammar.
fn shared() -> impl Iterator<Item = CommandSpec> {
    common::commands()
        .into_iter()
        .chain(core3h::commands())
        .chain(adb3l::commands())
}

fn ddc_v_123(floor: ModeVersion) -> CommandSet {
    CommandSet::new(floor, shared().chain(ddc::commands()))
}

fn ddc_v_124(floor: ModeVersion) -> CommandSet {
    CommandSet::new(
        floor,
        shared()
            .chain(ddc::commands())
            .chain([ddc::pps_delay_per_board()]),
    )
}

fn oct_d_110(floor: ModeVersion) -> CommandSet {
    CommandSet::new(floor, shared().chain(oct::commands()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commandset::{Args, Call};
    use dbbc3_core::{BoardTable, Error, Family};

    fn resolve(mode: Mode, version: u32) -> Result<CommandSet> {
        CommandSetRegistry::standard().resolve(ModeVersion::new(mode, version))
    }

    #[test]
    fn standard_floors() {
        let floors = CommandSetRegistry::standard().floors();
        assert_eq!(floors.len(), 4);
        assert!(floors.contains(&ModeVersion::new(Mode::DdcU, 125)));
    }

    #[test]
    fn standard_floors_reject_reregistration() {
        let mut registry = CommandSetRegistry::standard();
        assert!(matches!(
            registry.register(Mode::OctD, 110, ddc_v_123),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(registry.floors().len(), 4);
    }

    #[test]
    fn ddc_v_floor_selection() {
        assert_eq!(resolve(Mode::DdcV, 123).unwrap().floor().version, 123);
        assert_eq!(resolve(Mode::DdcV, 124).unwrap().floor().version, 124);
        assert_eq!(resolve(Mode::DdcV, 130).unwrap().floor().version, 124);
        assert!(matches!(
            resolve(Mode::DdcV, 122),
            Err(Error::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn ddc_u_uses_ddc_v_124_grammar() {
        let set = resolve(Mode::DdcU, 126).unwrap();
        assert_eq!(set.floor(), ModeVersion::new(Mode::DdcU, 125));
        assert_eq!(set.family(), Family::Ddc);
        let reference = resolve(Mode::DdcV, 124).unwrap();
        assert_eq!(set.names(), reference.names());
    }

    #[test]
    fn oct_has_taps_but_no_bbcs() {
        let set = resolve(Mode::OctD, 120).unwrap();
        assert_eq!(set.floor(), ModeVersion::new(Mode::OctD, 110));
        assert!(set.supports("tap"));
        assert!(set.supports("tap2"));
        assert!(set.supports("dbbcif"));
        assert!(!set.supports("dbbc"));
        assert!(!set.supports("pps_delay"));
    }

    #[test]
    fn every_floor_has_formatter_and_sampler_commands() {
        for (mode, version) in [(Mode::DdcV, 123), (Mode::DdcU, 125), (Mode::OctD, 110)] {
            let set = resolve(mode, version).unwrap();
            for name in ["core3h_regread", "core3h_vdif_frame", "core3h_destination", "adb3l_gain"] {
                assert!(set.supports(name), "{name} missing at {}", set.floor());
            }
        }
    }

    #[test]
    fn per_board_pps_only_from_124() {
        let call = Call::new(Args::for_board('B'), BoardTable::default()).unwrap();
        let v123 = resolve(Mode::DdcV, 123).unwrap();
        let v124 = resolve(Mode::DdcV, 124).unwrap();
        assert_eq!(
            (v123.get("pps_delay").unwrap().encode)(&call).unwrap(),
            vec!["pps_delay"]
        );
        assert_eq!(
            (v124.get("pps_delay").unwrap().encode)(&call).unwrap(),
            vec!["pps_delay=2"]
        );
    }

    #[test]
    fn unregistered_modes() {
        assert!(resolve(Mode::DdcL, 200).is_err());
        assert!(resolve(Mode::OctS, 200).is_err());
        assert!(resolve(Mode::DdcU, 124).is_err());
    }

    #[test]
    fn custom_registry() {
        let mut registry = CommandSetRegistry::new();
        registry.register(Mode::OctS, 100, oct_d_110).unwrap();
        assert!(registry.register(Mode::OctS, 100, oct_d_110).is_err());
        let set = registry
            .resolve(ModeVersion::new(Mode::OctS, 101))
            .unwrap();
        assert!(set.supports("tap"));
    }
}
