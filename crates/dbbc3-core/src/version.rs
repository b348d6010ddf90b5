//! Operating modes, firmware versions, and release-string parsing.
//!
//! The DBBC3 reports its running firmware as `MODE,MAJOR,Month DD YYYY`
//! both in the reply to the `version` command and in the header of every
//! multicast datagram. [`FirmwareInfo::from_fields`] parses the three parts.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};

/// Operating firmware family currently loaded on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    /// Digital down-converter, universal bandwidths.
    DdcU,
    /// Digital down-converter, VLBI (fixed 32 MHz BBCs).
    DdcV,
    /// Digital down-converter, legacy.
    DdcL,
    /// Octave mode with digital filtering.
    OctD,
    /// Octave mode, spectral.
    OctS,
}

impl Mode {
    /// The tag as the device spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::DdcU => "DDC_U",
            Mode::DdcV => "DDC_V",
            Mode::DdcL => "DDC_L",
            Mode::OctD => "OCT_D",
            Mode::OctS => "OCT_S",
        }
    }

    /// The command/validation family this mode belongs to.
    pub fn family(&self) -> Family {
        match self {
            Mode::DdcU | Mode::DdcV | Mode::DdcL => Family::Ddc,
            Mode::OctD | Mode::OctS => Family::Oct,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "DDC_U" => Ok(Mode::DdcU),
            "DDC_V" => Ok(Mode::DdcV),
            "DDC_L" => Ok(Mode::DdcL),
            "OCT_D" => Ok(Mode::OctD),
            "OCT_S" => Ok(Mode::OctS),
            other => Err(Error::InvalidParameter(format!("unknown mode {other:?}"))),
        }
    }
}

/// Broad firmware family. Grammars and checks are grouped by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Down-converter modes (DDC_U, DDC_V, DDC_L).
    Ddc,
    /// Octave modes (OCT_D, OCT_S).
    Oct,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Ddc => f.write_str("DDC"),
            Family::Oct => f.write_str("OCT"),
        }
    }
}

/// A mode together with its major firmware version.
///
/// Ordering is by mode first, then version, so comparisons are only
/// meaningful between values of the same mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModeVersion {
    pub mode: Mode,
    pub version: u32,
}

impl ModeVersion {
    pub fn new(mode: Mode, version: u32) -> Self {
        Self { mode, version }
    }
}

impl fmt::Display for ModeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.mode, self.version)
    }
}

/// Full firmware identification as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareInfo {
    pub mode_version: ModeVersion,
    /// Release date of the running build.
    pub release: NaiveDate,
    /// The release date exactly as reported, e.g. `"February 18th 2020"`.
    pub release_string: String,
}

impl FirmwareInfo {
    /// Parse the three comma-separated fields of a version report.
    ///
    /// An unknown mode yields [`Error::UnsupportedVersion`]; a malformed
    /// version number or date yields [`Error::InvalidParameter`] which the
    /// caller re-labels as a parse or decode failure.
    pub fn from_fields(mode: &str, major: &str, release: &str) -> Result<Self> {
        let major = major.trim();
        let version: u32 = major
            .parse()
            .map_err(|_| Error::InvalidParameter(format!("invalid major version {major:?}")))?;
        let mode = mode.trim().parse::<Mode>().map_err(|_| Error::UnsupportedVersion {
            mode: mode.trim().to_string(),
            version,
        })?;
        let release_string = release.trim().to_string();
        let release = parse_release_date(&release_string)?;
        Ok(Self {
            mode_version: ModeVersion::new(mode, version),
            release,
            release_string,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode_version.mode
    }

    pub fn version(&self) -> u32 {
        self.mode_version.version
    }

    /// Release date encoded as `YYMMDD`, e.g. `191001`.
    pub fn minor_version(&self) -> u32 {
        let yy = (self.release.year().rem_euclid(100)) as u32;
        yy * 10_000 + self.release.month() * 100 + self.release.day()
    }
}

impl fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} version {} ({})",
            self.mode_version.mode, self.mode_version.version, self.release_string
        )
    }
}

/// Parse a release date such as `"October 01 2019"` or `"February 18th 2020"`.
pub fn parse_release_date(s: &str) -> Result<NaiveDate> {
    let amended: Vec<String> = s.split_whitespace().map(strip_ordinal).collect();
    let amended = amended.join(" ");
    NaiveDate::parse_from_str(&amended, "%B %d %Y")
        .map_err(|e| Error::InvalidParameter(format!("invalid release date {s:?}: {e}")))
}

fn strip_ordinal(token: &str) -> String {
    let digits = token.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return token.to_string();
    }
    match &token[digits..] {
        "st" | "nd" | "rd" | "th" => format!("{:0>2}", &token[..digits]),
        _ => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trip() {
        for mode in [Mode::DdcU, Mode::DdcV, Mode::DdcL, Mode::OctD, Mode::OctS] {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
        assert!("DDC_X".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_families() {
        assert_eq!(Mode::DdcU.family(), Family::Ddc);
        assert_eq!(Mode::DdcV.family(), Family::Ddc);
        assert_eq!(Mode::OctD.family(), Family::Oct);
    }

    #[test]
    fn ordering_within_mode() {
        let a = ModeVersion::new(Mode::DdcV, 123);
        let b = ModeVersion::new(Mode::DdcV, 124);
        assert!(a < b);
        assert_eq!(b.to_string(), "DDC_V_124");
    }

    #[test]
    fn firmware_from_fields() {
        let fw = FirmwareInfo::from_fields("DDC_V", "124", "October 01 2019").unwrap();
        assert_eq!(fw.mode(), Mode::DdcV);
        assert_eq!(fw.version(), 124);
        assert_eq!(fw.minor_version(), 191001);
        assert_eq!(fw.release_string, "October 01 2019");
    }

    #[test]
    fn release_date_with_ordinal_suffix() {
        let d = parse_release_date("February 18th 2020").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2020, 2, 18).unwrap());
        let d = parse_release_date("July 3rd 2019").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2019, 7, 3).unwrap());
        let d = parse_release_date("March 1st 2021").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2021, 3, 1).unwrap());
    }

    #[test]
    fn unknown_mode_is_unsupported_version() {
        let err = FirmwareInfo::from_fields("FOO", "120", "July 03 2019").unwrap_err();
        match err {
            Error::UnsupportedVersion { mode, version } => {
                assert_eq!(mode, "FOO");
                assert_eq!(version, 120);
            }
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn malformed_major_or_date() {
        assert!(matches!(
            FirmwareInfo::from_fields("OCT_D", "x1", "July 03 2019"),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            FirmwareInfo::from_fields("OCT_D", "110", "Juli 03 2019"),
            Err(Error::InvalidParameter(_))
        ));
    }
}
