//! VDIF reference epochs.
//!
//! The core3h boards count time as a reference epoch (half-years since
//! 2000-01-01) plus seconds since the start of that epoch. Epoch `2n` starts
//! on January 1st and epoch `2n+1` on July 1st of year `2000 + n`.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// Start of VDIF reference epoch `half_years`, `None` if out of range.
pub fn epoch_start(half_years: u32) -> Option<NaiveDateTime> {
    let year = 2000 + i32::try_from(half_years / 2).ok()?;
    let month = if half_years % 2 == 0 { 1 } else { 7 };
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

/// UTC time of `seconds` into VDIF reference epoch `half_years`.
pub fn timestamp(half_years: u32, seconds: u64) -> Option<NaiveDateTime> {
    let offset = TimeDelta::try_seconds(i64::try_from(seconds).ok()?)?;
    epoch_start(half_years)?.checked_add_signed(offset)
}
