//! dbbc3-core: Core traits, types, and error definitions for DBBC3 control.
//!
//! This crate holds the pieces shared by the command-set engine, the
//! multicast decoder, and the validation engine.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`ModeVersion`] / [`FirmwareInfo`] -- what the device is running
//! - [`FloorRegistry`] -- version-floor selection
//! - [`BoardTable`] -- board index/letter translation
//! - [`vdif`] -- VDIF epoch arithmetic shared by commands and telemetry
//! - [`Error`] / [`Result`] -- error handling

pub mod board;
pub mod error;
pub mod registry;
pub mod transport;
pub mod vdif;
pub mod version;

pub use board::{BoardRef, BoardTable, MAX_BOARDS, SAMPLERS_PER_BOARD};
pub use error::{Error, Result};
pub use registry::FloorRegistry;
pub use transport::{ConnectionState, Transport};
pub use version::{Family, FirmwareInfo, Mode, ModeVersion, parse_release_date};
