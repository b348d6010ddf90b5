//! Single-slot snapshot mailbox.
//!
//! The listener publishes every decoded datagram, or the failure to decode
//! it, into one slot. Publishing replaces the slot atomically and never
//! blocks; a value that nobody read is simply overwritten. Each
//! [`SnapshotReceiver`] remembers the sequence number of the last value it
//! consumed, so a poll only ever returns something newer.

use std::sync::Arc;
use std::time::Duration;

use dbbc3_core::error::{Error, Result};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::snapshot::Snapshot;

/// What a poll does when frames were overwritten since the previous poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissedFramePolicy {
    /// Return the newest frame.
    Skip,
    /// Fail with [`Error::MissedFrames`]; the newest frame is consumed.
    Error,
}

/// A failure published in place of a snapshot.
#[derive(Debug, Clone, PartialEq)]
enum Failure {
    Decode { message: String, raw: Vec<u8> },
    UnsupportedVersion { mode: String, version: u32 },
}

impl Failure {
    fn from_error(e: &Error) -> Self {
        match e {
            Error::Decode { message, raw } => Failure::Decode {
                message: message.clone(),
                raw: raw.clone(),
            },
            Error::UnsupportedVersion { mode, version } => Failure::UnsupportedVersion {
                mode: mode.clone(),
                version: *version,
            },
            other => Failure::Decode {
                message: other.to_string(),
                raw: Vec::new(),
            },
        }
    }

    fn to_error(&self) -> Error {
        match self {
            Failure::Decode { message, raw } => Error::decode(message.clone(), raw),
            Failure::UnsupportedVersion { mode, version } => Error::UnsupportedVersion {
                mode: mode.clone(),
                version: *version,
            },
        }
    }
}

type Frame = std::result::Result<Arc<Snapshot>, Failure>;

#[derive(Debug, Clone, Default)]
struct Slot {
    seq: u64,
    frame: Option<Frame>,
    last_good: Option<Arc<Snapshot>>,
}

/// The writing side of the mailbox.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: Arc<watch::Sender<Slot>>,
    cancel: CancellationToken,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::with_cancel(CancellationToken::new())
    }

    /// A mailbox whose receivers stop when `cancel` fires.
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        let (tx, _) = watch::channel(Slot::default());
        Self {
            tx: Arc::new(tx),
            cancel,
        }
    }

    /// Replace the slot with `snapshot`.
    pub fn publish(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        self.tx.send_modify(|slot| {
            slot.seq += 1;
            slot.last_good = Some(Arc::clone(&snapshot));
            slot.frame = Some(Ok(snapshot));
        });
    }

    /// Replace the slot with a decode failure.
    pub fn publish_failure(&self, error: &Error) {
        let failure = Failure::from_error(error);
        self.tx.send_modify(|slot| {
            slot.seq += 1;
            slot.frame = Some(Err(failure));
        });
    }

    /// Number of values published so far.
    pub fn sequence(&self) -> u64 {
        self.tx.borrow().seq
    }

    /// The most recent successfully decoded snapshot.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.tx.borrow().last_good.clone()
    }

    /// A receiver that sees values published from now on.
    pub fn subscribe(&self, policy: MissedFramePolicy) -> SnapshotReceiver {
        let rx = self.tx.subscribe();
        let last_seq = rx.borrow().seq;
        SnapshotReceiver {
            rx,
            last_seq,
            policy,
            cancel: self.cancel.clone(),
        }
    }

    /// Stop all receivers; further polls fail with
    /// [`Error::NotConnected`].
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// The reading side of the mailbox.
#[derive(Debug)]
pub struct SnapshotReceiver {
    rx: watch::Receiver<Slot>,
    last_seq: u64,
    policy: MissedFramePolicy,
    cancel: CancellationToken,
}

impl SnapshotReceiver {
    /// Wait for a value newer than the one returned by the previous poll.
    ///
    /// A published decode failure is returned as its error and counts as
    /// consumed.
    pub async fn poll(&mut self) -> Result<Arc<Snapshot>> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::NotConnected);
            }
            if let Some(result) = self.take() {
                return result;
            }
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Err(Error::NotConnected),
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        return Err(Error::NotConnected);
                    }
                }
            }
        }
    }

    /// [`poll`](Self::poll) bounded by `timeout`.
    pub async fn poll_timeout(&mut self, timeout: Duration) -> Result<Arc<Snapshot>> {
        match tokio::time::timeout(timeout, self.poll()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(
                    timeout_ms = timeout.as_millis(),
                    "No telemetry snapshot within timeout"
                );
                Err(Error::Timeout)
            }
        }
    }

    /// The most recent snapshot, without waiting and without consuming it.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.rx.borrow().last_good.clone()
    }

    pub fn policy(&self) -> MissedFramePolicy {
        self.policy
    }

    /// Sequence number of the last value consumed.
    pub fn last_sequence(&self) -> u64 {
        self.last_seq
    }

    fn take(&mut self) -> Option<Result<Arc<Snapshot>>> {
        let slot = self.rx.borrow_and_update();
        if slot.seq <= self.last_seq {
            return None;
        }
        let missed = slot.seq - self.last_seq - 1;
        self.last_seq = slot.seq;
        if missed > 0 {
            tracing::warn!(missed, seq = slot.seq, "Telemetry frames overwritten before poll");
            if self.policy == MissedFramePolicy::Error {
                return Some(Err(Error::MissedFrames { missed }));
            }
        }
        let frame = slot.frame.as_ref()?;
        Some(frame.clone().map_err(|failure| failure.to_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbbc3_core::{FirmwareInfo, MAX_BOARDS};

    fn snapshot(release: &str) -> Snapshot {
        Snapshot {
            firmware: FirmwareInfo::from_fields("OCT_D", "120", release).unwrap(),
            board_present: [false; MAX_BOARDS],
            board_active: [false; MAX_BOARDS],
            boards: Default::default(),
        }
    }

    #[tokio::test]
    async fn overwrite_keeps_newest() {
        let mailbox = Mailbox::new();
        let mut rx = mailbox.subscribe(MissedFramePolicy::Skip);
        mailbox.publish(snapshot("July 01 2021"));
        mailbox.publish(snapshot("July 02 2021"));
        let snap = rx.poll().await.unwrap();
        assert_eq!(snap.minor_version(), 210702);
        assert_eq!(rx.last_sequence(), 2);
    }

    #[tokio::test]
    async fn second_poll_waits_for_new_value() {
        let mailbox = Mailbox::new();
        let mut rx = mailbox.subscribe(MissedFramePolicy::Skip);
        mailbox.publish(snapshot("July 01 2021"));
        rx.poll().await.unwrap();
        let again = rx.poll_timeout(Duration::from_millis(50)).await;
        assert!(matches!(again, Err(Error::Timeout)));
        // Non-consuming view is still there.
        assert_eq!(rx.latest().unwrap().minor_version(), 210701);
    }

    #[tokio::test]
    async fn poll_wakes_on_publish() {
        let mailbox = Mailbox::new();
        let mut rx = mailbox.subscribe(MissedFramePolicy::Skip);
        let writer = mailbox.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.publish(snapshot("July 03 2021"));
        });
        let snap = rx.poll_timeout(Duration::from_secs(2)).await.unwrap();
        assert_eq!(snap.minor_version(), 210703);
    }

    #[tokio::test]
    async fn missed_frames_policy_error() {
        let mailbox = Mailbox::new();
        let mut rx = mailbox.subscribe(MissedFramePolicy::Error);
        mailbox.publish(snapshot("July 01 2021"));
        rx.poll().await.unwrap();

        for day in ["July 02 2021", "July 03 2021", "July 04 2021"] {
            mailbox.publish(snapshot(day));
        }
        assert!(matches!(
            rx.poll().await,
            Err(Error::MissedFrames { missed: 2 })
        ));
        // The newest frame was consumed by the failed poll.
        assert!(rx.poll_timeout(Duration::from_millis(20)).await.is_err());
        mailbox.publish(snapshot("July 05 2021"));
        assert_eq!(rx.poll().await.unwrap().minor_version(), 210705);
    }

    #[tokio::test]
    async fn failures_are_delivered_once() {
        let mailbox = Mailbox::new();
        let mut rx = mailbox.subscribe(MissedFramePolicy::Skip);
        mailbox.publish(snapshot("July 01 2021"));
        mailbox.publish_failure(&Error::decode("payload too short", &[1, 2]));
        match rx.poll().await {
            Err(Error::Decode { raw, .. }) => assert_eq!(raw, vec![1, 2]),
            other => panic!("expected Decode, got {other:?}"),
        }
        // A failure does not hide the last good snapshot.
        assert_eq!(mailbox.latest().unwrap().minor_version(), 210701);
        assert!(rx.poll_timeout(Duration::from_millis(20)).await.is_err());
    }

    #[tokio::test]
    async fn subscribers_are_independent() {
        let mailbox = Mailbox::new();
        let mut a = mailbox.subscribe(MissedFramePolicy::Skip);
        let mut b = mailbox.subscribe(MissedFramePolicy::Skip);
        mailbox.publish(snapshot("July 01 2021"));
        assert!(a.poll().await.is_ok());
        assert!(b.poll().await.is_ok());
    }

    #[tokio::test]
    async fn close_stops_receivers() {
        let mailbox = Mailbox::new();
        let mut rx = mailbox.subscribe(MissedFramePolicy::Skip);
        let closer = mailbox.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close();
        });
        assert!(matches!(rx.poll().await, Err(Error::NotConnected)));
        assert!(matches!(rx.poll().await, Err(Error::NotConnected)));
    }
}
