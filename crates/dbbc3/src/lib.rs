//! # dbbc3 -- Control and monitoring for the DBBC3 VLBI backend
//!
//! `dbbc3` is an asynchronous Rust client for the DBBC3 digital baseband
//! converter. It talks to the DBBC3 control software over its single-client
//! TCP command port, decodes the once-per-second multicast telemetry, and
//! checks the health of a running system.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dbbc3::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> dbbc3::Result<()> {
//!     let session = SessionBuilder::new("192.168.0.60").board_count(4).connect().await?;
//!     println!("running {}", session.firmware());
//!
//!     let locked = session.synth_lock('A').await?;
//!     println!("synthesizer A locked: {locked}");
//!
//!     session.disconnect().await
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate               | Purpose                                              |
//! |---------------------|------------------------------------------------------|
//! | `dbbc3-core`        | Errors, [`Transport`], versions, boards, floor registry |
//! | `dbbc3-transport`   | TCP command transport, multicast socket             |
//! | `dbbc3-control`     | Command sets per firmware floor, [`Session`]        |
//! | `dbbc3-multicast`   | Telemetry decoder, mailbox and listener             |
//! | `dbbc3-validation`  | Health checks and reports                           |
//! | **`dbbc3`**         | This facade crate -- re-exports everything          |
//!
//! ## Feature Flags
//!
//! | Feature      | Enables                                   | Default |
//! |--------------|-------------------------------------------|---------|
//! | `multicast`  | [`multicast`] module (telemetry)          | yes     |
//! | `validation` | [`validation`] module (implies multicast) | yes     |
//! | `full`       | Everything                                | no      |

pub use dbbc3_core::*;

pub use dbbc3_control::{
    AgcMode, Args, ArpEntry, BbcGain, BbcStatistics, CalibrationLoop, CommandSet,
    CommandSetRegistry, CommandSpec, Core3Mode, Destination, GainMode, IfInput, IfSettings,
    InputSource, LevelCount, PhaseCheck, Response, Session, SessionBuilder, SessionConfig,
    SynthFrequency, TenGbInfo, TimesyncResult, TvgMode, VdifFrame, VsiSampleRate,
};

/// Transport implementations.
pub mod transport {
    pub use dbbc3_transport::*;
}

/// Command sets, grammars and the command session.
pub mod control {
    pub use dbbc3_control::*;
}

/// Multicast telemetry.
///
/// Provides [`MulticastListener`](multicast::MulticastListener), which
/// decodes each datagram into a [`Snapshot`](multicast::Snapshot) and keeps
/// the newest one in a single-slot mailbox.
#[cfg(feature = "multicast")]
pub mod multicast {
    pub use dbbc3_multicast::*;
}

/// Health checks.
///
/// Provides [`ValidationEngine`](validation::ValidationEngine), which runs
/// mode-specific checks against a session and collects them into a
/// [`Report`](validation::Report).
#[cfg(feature = "validation")]
pub mod validation {
    pub use dbbc3_validation::*;
}
