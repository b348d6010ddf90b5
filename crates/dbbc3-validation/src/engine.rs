//! Runs checks against a live session.
//!
//! The engine fetches the values a check needs through the [`Session`] (and,
//! for telemetry-based checks, a [`SnapshotReceiver`]) and hands them to the
//! matching rule. Transport, parse and decode failures while fetching are
//! returned as errors; only problems with the device itself become items.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use dbbc3_control::Session;
use dbbc3_core::error::Result;
use dbbc3_core::{BoardRef, SAMPLERS_PER_BOARD};
use dbbc3_multicast::{Snapshot, SnapshotReceiver};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::check::{Check, CheckKind, CheckSet, CheckSetRegistry, Freshness};
use crate::config::ValidationConfig;
use crate::report::{Item, Report};
use crate::rules;

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Validation checks bound to one session.
pub struct ValidationEngine<'a> {
    session: &'a Session,
    config: ValidationConfig,
    checks: CheckSet,
    snapshots: Option<Mutex<SnapshotReceiver>>,
    clock: Clock,
}

impl fmt::Debug for ValidationEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("checks", &self.checks)
            .field("config", &self.config)
            .field("telemetry", &self.snapshots.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> ValidationEngine<'a> {
    /// An engine with the standard check sets.
    pub fn new(session: &'a Session, config: ValidationConfig) -> Result<Self> {
        Self::with_registry(session, config, &CheckSetRegistry::standard())
    }

    /// An engine whose check set is resolved from `registry`.
    pub fn with_registry(
        session: &'a Session,
        config: ValidationConfig,
        registry: &CheckSetRegistry,
    ) -> Result<Self> {
        let checks = registry.resolve(session.firmware().mode_version)?;
        debug!(
            floor = %checks.floor(),
            family = %checks.family(),
            checks = checks.kinds().len(),
            "Check set resolved"
        );
        Ok(Self {
            session,
            config,
            checks,
            snapshots: None,
            clock: Box::new(|| Utc::now().naive_utc()),
        })
    }

    /// Take telemetry for snapshot-based checks from `rx`.
    pub fn with_snapshots(mut self, rx: SnapshotReceiver) -> Self {
        self.snapshots = Some(Mutex::new(rx));
        self
    }

    /// Replace the UTC clock used by the timesync check.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn check_set(&self) -> &CheckSet {
        &self.checks
    }

    pub fn supports(&self, kind: CheckKind) -> bool {
        self.checks.supports(kind)
    }

    /// Run one check.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedCheck`](dbbc3_core::Error::UnsupportedCheck) if the
    /// check does not exist for the session's mode; any error raised while
    /// talking to the device or reading telemetry.
    pub async fn run(&self, check: Check) -> Result<Item> {
        self.checks.require(check.kind())?;
        let item = match check {
            Check::Timesync(b) => self.timesync(b).await?,
            Check::SynthesizerLock(b) => self.synth_lock(b).await?,
            Check::SynthesizerFrequency(b) => self.synth_frequency(b).await?,
            Check::IfLevel(b) => self.if_level(b).await?,
            Check::SamplerPower(b) => self.sampler_power(b).await?,
            Check::SamplerOffsets(b) => self.sampler_offsets(b).await?,
            Check::SamplerPhases => self.sampler_phases().await?,
            Check::Pps => self.pps().await?,
            Check::PpsBlocks(b) => self.pps_blocks(b).await?,
            Check::BitStatistics(b, freshness) => self.bit_statistics(b, freshness).await?,
        };
        debug!(
            check = %check.kind(),
            status = %item.status,
            exit = item.exit,
            "Check finished"
        );
        Ok(item)
    }

    /// Run one check into a single-item report.
    pub async fn check(&self, check: Check) -> Result<Report> {
        Ok(Report::from(self.run(check).await?))
    }

    /// Run `checks` in order into one report. A failing item never stops
    /// the run; an error does.
    pub async fn run_all(&self, checks: impl IntoIterator<Item = Check>) -> Result<Report> {
        let mut report = Report::new();
        for check in checks {
            report.push(self.run(check).await?);
        }
        Ok(report)
    }

    /// The full system check: PPS (DDC), then per board timesync,
    /// synthesizer lock and frequency, IF level, sampler power and
    /// offsets, then the sampler phases.
    pub async fn check_system(&self) -> Result<Report> {
        let mut checks = Vec::new();
        if self.supports(CheckKind::Pps) {
            checks.push(Check::Pps);
        }
        for board in self.session.boards().indices() {
            let b = BoardRef::Index(board);
            checks.extend([
                Check::Timesync(b),
                Check::SynthesizerLock(b),
                Check::SynthesizerFrequency(b),
                Check::IfLevel(b),
                Check::SamplerPower(b),
                Check::SamplerOffsets(b),
            ]);
        }
        checks.push(Check::SamplerPhases);
        self.composite("system", checks).await
    }

    /// Sampler power and offsets per board, then the sampler phases.
    pub async fn check_sampler(&self) -> Result<Report> {
        let mut checks = Vec::new();
        for board in self.session.boards().indices() {
            let b = BoardRef::Index(board);
            checks.extend([Check::SamplerPower(b), Check::SamplerOffsets(b)]);
        }
        checks.push(Check::SamplerPhases);
        self.composite("sampler", checks).await
    }

    /// Synthesizer lock and frequency per board.
    pub async fn check_synthesizer(&self) -> Result<Report> {
        let checks = self.session.boards().indices().flat_map(|board| {
            let b = BoardRef::Index(board);
            [Check::SynthesizerLock(b), Check::SynthesizerFrequency(b)]
        });
        self.composite("synthesizer", checks).await
    }

    async fn composite(&self, name: &str, checks: impl IntoIterator<Item = Check>) -> Result<Report> {
        let report = self.run_all(checks).await?;
        info!(
            composite = name,
            items = report.len(),
            problems = report.problems().count(),
            status = %report.status(),
            "Composite check finished"
        );
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Individual checks
    // ---------------------------------------------------------------

    fn letter(&self, board: BoardRef) -> Result<(usize, char)> {
        let boards = self.session.boards();
        let index = boards.resolve(board)?;
        Ok((index, boards.letter(index)?))
    }

    async fn timesync(&self, board: BoardRef) -> Result<Item> {
        let (index, letter) = self.letter(board)?;
        let reported = self.session.core3h_time(index).await?;
        Ok(rules::timesync(&self.config, letter, reported, (self.clock)()))
    }

    async fn synth_lock(&self, board: BoardRef) -> Result<Item> {
        let (index, letter) = self.letter(board)?;
        let locked = self.session.synth_lock(index).await?;
        Ok(rules::synth_lock(&self.config, letter, locked))
    }

    async fn synth_frequency(&self, board: BoardRef) -> Result<Item> {
        let (index, letter) = self.letter(board)?;
        let freq = self.session.synth_freq(index).await?;
        let expected = self.config.synth_frequencies.get(index).copied().flatten();
        Ok(rules::synth_frequency(&self.config, letter, freq, expected))
    }

    async fn if_level(&self, board: BoardRef) -> Result<Item> {
        let (index, letter) = self.letter(board)?;
        let settings = self.session.dbbcif(index).await?;
        Ok(rules::if_level(&self.config, letter, settings))
    }

    async fn sampler_power(&self, board: BoardRef) -> Result<Item> {
        let (index, letter) = self.letter(board)?;
        let powers = self.session.core3_power(index).await?;
        Ok(rules::sampler_power(&self.config, letter, powers))
    }

    async fn sampler_offsets(&self, board: BoardRef) -> Result<Item> {
        let (index, letter) = self.letter(board)?;
        let mut stats = Vec::with_capacity(SAMPLERS_PER_BOARD);
        for sampler in 0..SAMPLERS_PER_BOARD {
            stats.push(self.session.core3_bstat(index, sampler).await?);
        }
        Ok(rules::sampler_offsets(&self.config, letter, &stats))
    }

    async fn sampler_phases(&self) -> Result<Item> {
        let phase = self.session.checkphase().await?;
        Ok(rules::sampler_phases(&self.config, phase.in_sync, &phase.report))
    }

    async fn pps(&self) -> Result<Item> {
        let delays = self.session.pps_delay().await?;
        let boards = self.session.boards();
        let letters = boards
            .indices()
            .map(|i| boards.letter(i))
            .collect::<Result<Vec<char>>>()?;
        Ok(rules::pps(&self.config, &delays, &letters))
    }

    async fn pps_blocks(&self, board: BoardRef) -> Result<Item> {
        let (index, letter) = self.letter(board)?;
        let delays = self.session.pps_delay_blocks(index).await?;
        Ok(rules::pps_blocks(&self.config, letter, &delays))
    }

    async fn bit_statistics(&self, board: BoardRef, freshness: Freshness) -> Result<Item> {
        let (index, letter) = self.letter(board)?;
        let action = format!("bit statistics of board {letter}");

        let Some(snapshots) = &self.snapshots else {
            return Ok(rules::unavailable(
                &self.config,
                action,
                "no telemetry source attached".into(),
                "Start a multicast listener and attach it to the validation engine",
            ));
        };
        let snapshot: Option<Arc<Snapshot>> = match freshness {
            Freshness::Latest => snapshots.lock().await.latest(),
            Freshness::Fresh(timeout) => Some(snapshots.lock().await.poll_timeout(timeout).await?),
        };
        let Some(snapshot) = snapshot else {
            return Ok(rules::unavailable(
                &self.config,
                action,
                "no telemetry snapshot received yet".into(),
                "Check that the DBBC3 multicast reaches this host",
            ));
        };
        if snapshot.mode().family() != self.checks.family() {
            return Ok(rules::unavailable(
                &self.config,
                action,
                format!(
                    "telemetry reports mode {} but the session runs {}",
                    snapshot.mode(),
                    self.session.firmware().mode_version
                ),
                "Check that the multicast group belongs to this DBBC3",
            ));
        }
        match snapshot.board(index) {
            Some(state) => Ok(rules::bit_statistics(&self.config, letter, state)),
            None => Ok(rules::unavailable(
                &self.config,
                action,
                format!("board {letter} is not present in the telemetry"),
                "Check that the core board is installed and enabled in the DBBC3 configuration",
            )),
        }
    }
}
