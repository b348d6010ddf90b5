//! Thresholds and severities used by the checks.

use std::ops::RangeInclusive;
use std::time::Duration;

use dbbc3_core::MAX_BOARDS;

use crate::report::Severity;

/// Severity assigned to each kind of finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Severities {
    pub timesync: Severity,
    pub synth_lock: Severity,
    pub synth_frequency: Severity,
    /// IF level off target, wrong input type, AGC off.
    pub if_level: Severity,
    /// Attenuation outside the expected range.
    pub if_attenuation: Severity,
    /// Board reported as not connected.
    pub not_connected: Severity,
    /// All sampler powers zero, or zero bit statistics.
    pub sampler_zero: Severity,
    pub sampler_power_fail: Severity,
    pub sampler_power_warning: Severity,
    pub sampler_offset_fail: Severity,
    pub sampler_offset_warning: Severity,
    pub sampler_phases: Severity,
    pub pps_inactive: Severity,
    pub pps_offset: Severity,
    pub pps_blocks: Severity,
    pub bit_statistics_fail: Severity,
    pub bit_statistics_warning: Severity,
    /// A check that could not be evaluated.
    pub unavailable: Severity,
}

impl Default for Severities {
    fn default() -> Self {
        Self {
            timesync: Severity::Critical,
            synth_lock: Severity::Critical,
            synth_frequency: Severity::Critical,
            if_level: Severity::Critical,
            if_attenuation: Severity::Minor,
            not_connected: Severity::Critical,
            sampler_zero: Severity::Critical,
            sampler_power_fail: Severity::Major,
            sampler_power_warning: Severity::Minor,
            sampler_offset_fail: Severity::Critical,
            sampler_offset_warning: Severity::Minor,
            sampler_phases: Severity::Critical,
            pps_inactive: Severity::Minor,
            pps_offset: Severity::Critical,
            pps_blocks: Severity::Major,
            bit_statistics_fail: Severity::Major,
            bit_statistics_warning: Severity::Minor,
            unavailable: Severity::Major,
        }
    }
}

/// Validation settings.
///
/// Fractions are relative (0.05 = 5 %); bit statistics tolerances are in
/// percentage points.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    /// Largest accepted difference between board time and UTC.
    pub max_time_offset: Duration,
    /// Largest accepted `|target - count|` of the IF level.
    pub if_count_tolerance: u32,
    pub attenuation_range: RangeInclusive<u32>,
    /// The IF input should be the down-converted one (type 2).
    pub expect_downconversion: bool,
    /// Automatic gain control should be on.
    pub expect_agc: bool,
    /// Synthesizer LO per board in MHz, checked when set.
    pub synth_frequencies: [Option<u32>; MAX_BOARDS],
    pub sampler_power_warning: f64,
    pub sampler_power_fail: f64,
    pub sampler_offset_warning: f64,
    pub sampler_offset_fail: f64,
    /// Largest accepted PPS delay in nanoseconds.
    pub max_pps_delay: u32,
    /// Expected share of the levels 11, 10, 01, 00 in percent.
    pub ideal_bit_statistics: [f64; 4],
    pub bit_statistics_warning: f64,
    pub bit_statistics_fail: f64,
    pub severities: Severities,
    /// Items at or above this severity set the exit flag.
    pub exit_threshold: Severity,
    /// Never set the exit flag.
    pub ignore_errors: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_time_offset: Duration::from_secs(10),
            if_count_tolerance: 1000,
            attenuation_range: 20..=40,
            expect_downconversion: true,
            expect_agc: true,
            synth_frequencies: [None; MAX_BOARDS],
            sampler_power_warning: 0.05,
            sampler_power_fail: 0.20,
            sampler_offset_warning: 0.05,
            sampler_offset_fail: 0.10,
            max_pps_delay: 200,
            ideal_bit_statistics: [16.0, 34.0, 34.0, 16.0],
            bit_statistics_warning: 2.0,
            bit_statistics_fail: 5.0,
            severities: Severities::default(),
            exit_threshold: Severity::Critical,
            ignore_errors: false,
        }
    }
}

impl ValidationConfig {
    /// Expect the synthesizer serving `board` at `mhz`.
    pub fn with_synth_frequency(mut self, board: usize, mhz: u32) -> Self {
        if let Some(slot) = self.synth_frequencies.get_mut(board) {
            *slot = Some(mhz);
        }
        self
    }

    pub fn with_ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    pub fn with_exit_threshold(mut self, threshold: Severity) -> Self {
        self.exit_threshold = threshold;
        self
    }

    /// Exit flag for a finding of `severity`.
    pub fn exit_for(&self, severity: Severity) -> bool {
        !self.ignore_errors && severity >= self.exit_threshold
    }
}
