//! Command control of the DBBC3 over its TCP text protocol.
//!
//! This crate provides:
//!
//! - **Framing** ([`protocol`]) -- NUL-terminated commands and responses,
//!   including responses that end by going quiet.
//! - **Command sets** ([`commandset`], [`grammar`]) -- per-firmware tables of
//!   named commands, each an encoder from arguments to request lines and a
//!   decoder from replies to a [`Response`].
//! - **Registry** ([`registry`]) -- picks the command set for the firmware
//!   mode and major version the device reports.
//! - **Session** ([`session`], [`builder`]) -- the connection itself, with a
//!   typed method for every command.
//!
//! # Example
//!
//! ```
//! use dbbc3_control::protocol::encode_command;
//! use dbbc3_control::grammar::common::parse_version;
//!
//! assert_eq!(encode_command("checkphase"), b"checkphase\0");
//!
//! let fw = parse_version("version/ DDC_V,124,February 18th 2020;").unwrap();
//! assert_eq!(fw.version(), 124);
//! assert_eq!(fw.minor_version(), 200218);
//! ```

pub mod builder;
pub mod commandset;
pub mod grammar;
pub mod protocol;
pub mod registry;
pub mod response;
pub mod session;

pub use builder::SessionBuilder;
pub use commandset::{Args, Call, CommandSet, CommandSpec, Param};
pub use registry::CommandSetRegistry;
pub use response::{
    AgcMode, ArpEntry, BbcGain, BbcStatistics, CalibrationLoop, Core3Mode, Destination, GainMode,
    IfInput, IfSettings, InputSource, LevelCount, PhaseCheck, Response, SynthFrequency, TenGbInfo,
    TimesyncResult, TvgMode, VdifFrame, VsiSampleRate,
};
pub use session::{Session, SessionConfig};
