//! The rules behind each check.
//!
//! Every rule is a pure function from measured values and the
//! [`ValidationConfig`] to one [`Item`]. Gathering the values is the
//! engine's job.

use chrono::NaiveDateTime;
use dbbc3_control::{AgcMode, IfInput, IfSettings, SynthFrequency};
use dbbc3_multicast::BoardState;

use crate::config::ValidationConfig;
use crate::report::{Item, Severity, Status};

const RESTART: &str =
    "Restart the DBBC3 control software (no reload of firmware, re-initialize)";
const RETRY: &str = "If the problem persists retry restart up to 5 times.";
const HARDWARE_RESTART: &str = "If the problem persists do a full hardware restart.";

/// Collects findings for one item; the item takes the worst of them.
struct Findings<'a> {
    config: &'a ValidationConfig,
    status: Status,
    severity: Severity,
    messages: Vec<String>,
    resolutions: Vec<String>,
}

impl<'a> Findings<'a> {
    fn new(config: &'a ValidationConfig) -> Self {
        Self {
            config,
            status: Status::Ok,
            severity: Severity::Info,
            messages: Vec::new(),
            resolutions: Vec::new(),
        }
    }

    fn add(&mut self, status: Status, severity: Severity, message: String, resolution: &str) {
        self.status = self.status.max(status);
        self.severity = self.severity.max(severity);
        self.messages.push(message);
        for line in resolution.lines() {
            if !self.resolutions.iter().any(|r| r == line) {
                self.resolutions.push(line.to_string());
            }
        }
    }

    fn finish(self, action: String, ok_message: impl FnOnce() -> String) -> Item {
        if self.status == Status::Ok {
            return Item::ok(action, ok_message());
        }
        Item {
            action,
            status: self.status,
            severity: self.severity,
            message: self.messages.join("; "),
            exit: self.config.exit_for(self.severity),
            resolution: self.resolutions.join("\n"),
        }
    }
}

/// A single non-OK item.
fn finding(
    config: &ValidationConfig,
    action: String,
    status: Status,
    severity: Severity,
    message: String,
    resolution: &str,
) -> Item {
    let mut f = Findings::new(config);
    f.add(status, severity, message, resolution);
    f.finish(action, String::new)
}

/// An item for a check that could not be evaluated.
pub fn unavailable(
    config: &ValidationConfig,
    action: String,
    message: String,
    resolution: &str,
) -> Item {
    finding(
        config,
        action,
        Status::Error,
        config.severities.unavailable,
        message,
        resolution,
    )
}

pub fn timesync(
    config: &ValidationConfig,
    board: char,
    reported: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Item {
    let action = format!("time synchronisation of core board {board}");
    let severity = config.severities.timesync;
    let Some(reported) = reported else {
        return finding(
            config,
            action,
            Status::Fail,
            severity,
            format!("no timestamp could be obtained for core board {board}"),
            "Run core3h_timesync and re-check\nCheck that a GPS antenna is connected to the DBBC3",
        );
    };
    let offset = (now - reported).num_seconds().abs();
    let max = config.max_time_offset.as_secs() as i64;
    if offset > max {
        return finding(
            config,
            action,
            Status::Fail,
            severity,
            format!(
                "reported time {reported} differs from UTC by {offset} s (more than {max} s)"
            ),
            "Run core3h_timesync and re-check\nCheck that the local computer is synchronised via NTP",
        );
    }
    Item::ok(action, format!("reported time: {reported}"))
}

pub fn synth_lock(config: &ValidationConfig, board: char, locked: bool) -> Item {
    let action = format!("synthesizer lock of board {board}");
    if locked {
        return Item::ok(action, "locked");
    }
    finding(
        config,
        action,
        Status::Fail,
        config.severities.synth_lock,
        format!("synthesizer for board {board} is not locked"),
        "Check if 10MHz is connected",
    )
}

pub fn synth_frequency(
    config: &ValidationConfig,
    board: char,
    freq: SynthFrequency,
    expected: Option<u32>,
) -> Item {
    let action = format!("synthesizer frequency of board {board}");
    let severity = config.severities.synth_frequency;
    if freq.actual != freq.target {
        return finding(
            config,
            action,
            Status::Fail,
            severity,
            format!(
                "synthesizer of board {board} is tuned to {} MHz but should be {} MHz",
                freq.actual, freq.target
            ),
            "Check your hardware",
        );
    }
    match expected {
        Some(mhz) if mhz > 0 && mhz != freq.actual => finding(
            config,
            action,
            Status::Fail,
            severity,
            format!(
                "synthesizer of board {board} is tuned to {} MHz but according to the configuration it should be {mhz} MHz",
                freq.actual
            ),
            "Check the tuning frequencies in the DBBC3 configuration",
        ),
        _ => Item::ok(action, format!("frequency {} MHz", freq.actual)),
    }
}

pub fn if_level(config: &ValidationConfig, board: char, settings: IfSettings) -> Item {
    let mut f = Findings::new(config);
    let sev = &config.severities;

    if settings.target.abs_diff(settings.count) > config.if_count_tolerance {
        f.add(
            Status::Fail,
            sev.if_level,
            format!(
                "IF power not on target value, should be close to {} is {}",
                settings.target, settings.count
            ),
            "Check and adjust IF input power levels (should be @ -11dBm)",
        );
    }
    if config.expect_downconversion && settings.input != IfInput::DownConverted {
        f.add(
            Status::Fail,
            sev.if_level,
            format!(
                "wrong IF input setting, is {} should be 2 to enable downconversion",
                settings.input.code()
            ),
            "Select IF input 2 with dbbcif",
        );
    }
    if config.expect_agc && !settings.mode.is_agc() {
        let mode = match settings.mode {
            AgcMode::Fixed(step) => format!("fixed attenuation {step}"),
            other => other.to_string(),
        };
        f.add(
            Status::Fail,
            sev.if_level,
            format!("automatic gain control is disabled ({mode})"),
            "Enable automatic gain control with dbbcif",
        );
    }
    let range = &config.attenuation_range;
    if !range.contains(&settings.attenuation) {
        let direction = if settings.attenuation < *range.start() {
            "too low"
        } else {
            "too high"
        };
        f.add(
            Status::Warning,
            sev.if_attenuation,
            format!(
                "IF input power is {direction}, the attenuation should be in the range {}-{} but is {}",
                range.start(),
                range.end(),
                settings.attenuation
            ),
            "Adjust the IF input power so the attenuation settles inside the range",
        );
    }

    f.finish(format!("IF power level of core board {board}"), || {
        format!("count = {}", settings.count)
    })
}

fn restart_advice(last: &str) -> String {
    format!("{RESTART}\n{RETRY}\n{last}")
}

pub fn sampler_power(config: &ValidationConfig, board: char, powers: Option<[u64; 4]>) -> Item {
    let action = format!("sampler powers of board {board}");
    let sev = &config.severities;
    let Some(powers) = powers else {
        return finding(
            config,
            action,
            Status::Error,
            sev.not_connected,
            format!("board {board} is not connected"),
            "Check that the core board is installed and enabled in the DBBC3 configuration",
        );
    };
    let mean = powers.iter().map(|&p| p as f64).sum::<f64>() / powers.len() as f64;
    if mean == 0.0 {
        return finding(
            config,
            action,
            Status::Fail,
            sev.sampler_zero,
            format!("sampler powers are 0 for board {board}"),
            &restart_advice(HARDWARE_RESTART),
        );
    }

    let mut f = Findings::new(config);
    for (sampler, &power) in powers.iter().enumerate() {
        let dev = (1.0 - power as f64 / mean).abs();
        if dev > config.sampler_power_fail {
            f.add(
                Status::Fail,
                sev.sampler_power_fail,
                format!(
                    "large difference (>{:.0}%) in power of sampler {sampler}: {powers:?} {:.2}%",
                    config.sampler_power_fail * 100.0,
                    dev * 100.0
                ),
                &restart_advice(HARDWARE_RESTART),
            );
        } else if dev > config.sampler_power_warning {
            f.add(
                Status::Warning,
                sev.sampler_power_warning,
                format!(
                    "large difference (>{:.0}%) in power of sampler {sampler}: {powers:?} {:.2}%",
                    config.sampler_power_warning * 100.0,
                    dev * 100.0
                ),
                &restart_advice(
                    "Possibly do a gain calibration (cal_delay). Consult the documentation.",
                ),
            );
        }
    }
    f.finish(action, || format!("sampler powers = {powers:?}"))
}

/// `stats` holds the level counts (11, 10, 01, 00) of each sampler, `None`
/// if the board did not answer.
pub fn sampler_offsets(
    config: &ValidationConfig,
    board: char,
    stats: &[Option<[u64; 4]>],
) -> Item {
    let sev = &config.severities;
    let mut f = Findings::new(config);
    let mut asymmetries = Vec::with_capacity(stats.len());
    let resolution = restart_advice(HARDWARE_RESTART);

    for (sampler, counts) in stats.iter().enumerate() {
        let Some(c) = counts else {
            f.add(
                Status::Error,
                sev.not_connected,
                format!("sampler {sampler} of board {board} is not connected"),
                "Check that the core board is installed and enabled in the DBBC3 configuration",
            );
            continue;
        };
        let total: u64 = c.iter().sum();
        if total == 0 {
            f.add(
                Status::Fail,
                sev.sampler_zero,
                format!("sampler offsets of 0 found for sampler {sampler}: {c:?}"),
                RESTART,
            );
            continue;
        }
        let upper = (c[0] + c[1]) as f64;
        let lower = (c[2] + c[3]) as f64;
        let dev = ((upper - lower) / total as f64).abs();
        asymmetries.push(format!("{:.2}%", dev * 100.0));

        if dev > config.sampler_offset_fail {
            f.add(
                Status::Fail,
                sev.sampler_offset_fail,
                format!(
                    "asymmetric bit statistics (>{:.0}%) for sampler {sampler}: {c:?} {:.2}%",
                    config.sampler_offset_fail * 100.0,
                    dev * 100.0
                ),
                &resolution,
            );
        } else if dev > config.sampler_offset_warning {
            f.add(
                Status::Warning,
                sev.sampler_offset_warning,
                format!(
                    "asymmetric bit statistics (>{:.0}%) for sampler {sampler}: {c:?} {:.2}%",
                    config.sampler_offset_warning * 100.0,
                    dev * 100.0
                ),
                &resolution,
            );
        }
    }

    f.finish(format!("sampler offsets of board {board}"), || {
        format!("asymmetry = [{}]", asymmetries.join(", "))
    })
}

pub fn sampler_phases(config: &ValidationConfig, in_sync: bool, response: &str) -> Item {
    let action = "sampler phases".to_string();
    if in_sync {
        return Item::ok(action, "in sync");
    }
    let message = if response.trim().is_empty() {
        "samplers are out of sync".to_string()
    } else {
        response.trim().to_string()
    };
    finding(
        config,
        action,
        Status::Fail,
        config.severities.sampler_phases,
        message,
        &format!(
            "{RESTART}\n{RETRY}\nIf the problem persists check your 10MHz power level.\n{HARDWARE_RESTART}"
        ),
    )
}

/// `delays` is in board order, one entry per board.
pub fn pps(config: &ValidationConfig, delays: &[u32], letters: &[char]) -> Item {
    let sev = &config.severities;
    let mut inactive = Vec::new();
    let mut not_synced = Vec::new();
    for (&delay, &letter) in delays.iter().zip(letters) {
        if delay == 0 {
            inactive.push(letter.to_string());
        } else if delay > config.max_pps_delay {
            not_synced.push(letter.to_string());
        }
    }

    let mut f = Findings::new(config);
    if !inactive.is_empty() {
        f.add(
            Status::Warning,
            sev.pps_inactive,
            format!(
                "the following boards report pps_delay=0: {}",
                inactive.join(", ")
            ),
            "Check if these boards have been disabled in the DBBC3 configuration",
        );
    }
    if !not_synced.is_empty() {
        f.add(
            Status::Fail,
            sev.pps_offset,
            format!(
                "the following boards have PPS offsets > {} ns: {}",
                config.max_pps_delay,
                not_synced.join(", ")
            ),
            "Restart the DBBC3 control software (do not reload firmware, only re-initialize)\nIf the problem persists probably you have a hardware issue.",
        );
    }
    f.finish("1PPS synchronisation".to_string(), || {
        format!("PPS delays: {delays:?} ns")
    })
}

pub fn pps_blocks(config: &ValidationConfig, board: char, delays: &[u32]) -> Item {
    let action = format!("PPS delays of core board {board}");
    let differ = delays.windows(2).any(|w| w[0] != w[1]);
    if differ {
        return finding(
            config,
            action,
            Status::Fail,
            config.severities.pps_blocks,
            format!("PPS delays of the blocks differ: {delays:?} ns"),
            "This is a bug. Contact the maintainer of the DBBC3 software",
        );
    }
    Item::ok(action, format!("PPS delays per block: {delays:?} ns"))
}

/// Compare the filter level statistics of a board against the ideal 2-bit
/// distribution.
pub fn bit_statistics(config: &ValidationConfig, board: char, state: &BoardState) -> Item {
    let action = format!("bit statistics of board {board}");
    let sev = &config.severities;
    if state.filters.is_empty() {
        return unavailable(
            config,
            action,
            format!("telemetry carries no filter statistics for board {board}"),
            "Check that the DBBC3 runs an OCT mode firmware",
        );
    }

    let mut f = Findings::new(config);
    let mut summary = Vec::with_capacity(state.filters.len());
    for (n, filter) in state.filters.iter().enumerate() {
        let filter_no = n + 1;
        let percent = filter.stats.percent;
        summary.push(format!(
            "filter {filter_no}: {:.1}/{:.1}/{:.1}/{:.1}%",
            percent[0], percent[1], percent[2], percent[3]
        ));
        if filter.stats.total() == 0 {
            f.add(
                Status::Fail,
                sev.sampler_zero,
                format!("filter {filter_no} reports no samples"),
                RESTART,
            );
            continue;
        }
        let worst = percent
            .iter()
            .zip(config.ideal_bit_statistics)
            .map(|(actual, ideal)| (actual - ideal).abs())
            .fold(0.0, f64::max);
        let levels = format!(
            "{:.1}/{:.1}/{:.1}/{:.1}%",
            percent[0], percent[1], percent[2], percent[3]
        );
        if worst > config.bit_statistics_fail {
            f.add(
                Status::Fail,
                sev.bit_statistics_fail,
                format!(
                    "filter {filter_no} level distribution {levels} deviates by {worst:.1} points from the ideal"
                ),
                "Check the IF input level and the sampler offsets\nRe-initialize the DBBC3 control software",
            );
        } else if worst > config.bit_statistics_warning {
            f.add(
                Status::Warning,
                sev.bit_statistics_warning,
                format!(
                    "filter {filter_no} level distribution {levels} deviates by {worst:.1} points from the ideal"
                ),
                "Check the IF input level and the sampler offsets",
            );
        }
    }
    f.finish(action, || summary.join(", "))
}
