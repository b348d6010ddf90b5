//! dbbc3-multicast: the DBBC3 telemetry stream.
//!
//! The control software broadcasts the complete device state once per
//! second as a UDP multicast datagram. This crate decodes those datagrams
//! into [`Snapshot`]s and keeps the newest one available to any number of
//! readers.
//!
//! ```no_run
//! use dbbc3_multicast::{ListenerConfig, MissedFramePolicy, MulticastListener};
//!
//! # async fn example() -> dbbc3_core::Result<()> {
//! let listener = MulticastListener::start(ListenerConfig::default()).await?;
//! let mut rx = listener.subscribe(MissedFramePolicy::Skip);
//! let snapshot = rx.poll().await?;
//! println!("{} {}", snapshot.mode(), snapshot.major_version());
//! listener.stop();
//! # Ok(())
//! # }
//! ```

pub mod decoder;
pub mod listener;
pub mod mailbox;
pub mod snapshot;

pub use decoder::{DecoderRegistry, FrameDecoder, Layout, bbc_board, decode, parse_header};
pub use listener::{ListenerConfig, MulticastListener};
pub use mailbox::{Mailbox, MissedFramePolicy, SnapshotReceiver};
pub use snapshot::{
    BbcState, BoardState, Core3hState, FilterState, IfState, LevelStats, SamplerState, Snapshot,
    SynthState,
};
