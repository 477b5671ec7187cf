//! Reply parsers. Terminated replies arrive here with the `#` already stripped.

use super::sexagesimal;
use crate::error::{MountError, MountResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// How the mount was aligned at power up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    AltAz,
    Polar,
    GermanPolar,
}

/// `:GW#` returns three bytes; only the first names the alignment.
pub fn parse_alignment(reply: &[u8]) -> MountResult<AlignmentMode> {
    match reply.first() {
        Some(b'A') => Ok(AlignmentMode::AltAz),
        Some(b'P') => Ok(AlignmentMode::Polar),
        Some(b'G') => Ok(AlignmentMode::GermanPolar),
        _ => Err(MountError::protocol(format!(
            "Unsupported alignment returned by the mount: {}",
            String::from_utf8_lossy(reply)
        ))),
    }
}

/// Set-target and site commands answer `'1'`, or binary 1 on some firmware.
pub fn is_accepted(flag: u8) -> bool {
    flag == b'1' || flag == 1
}

/// `:MS#` answers `'0'` when the goto starts; anything else is followed by
/// `#`-terminated error text.
pub fn goto_equatorial_started(flag: u8) -> bool {
    flag == b'0'
}

/// `:MA#` answers `'1'` on failure.
pub fn goto_altaz_failed(flag: u8) -> bool {
    flag == b'1'
}

/// `:D#` answers an empty string once the mount is no longer slewing.
pub fn is_hardware_slewing(reply: &str) -> bool {
    !reply.is_empty()
}

/// `:GT#` tracking frequency in Hz.
pub fn parse_tracking_frequency(reply: &str) -> MountResult<f64> {
    reply
        .trim()
        .parse()
        .map_err(|_| MountError::protocol(format!("Unrecognized tracking rate '{reply}'")))
}

pub fn parse_right_ascension(reply: &str) -> MountResult<f64> {
    sexagesimal::parse_hours(reply)
}

pub fn parse_angle(reply: &str) -> MountResult<f64> {
    sexagesimal::parse_degrees(reply)
}

/// `:GS#` `HH:MM:SS`.
pub fn parse_sidereal_time(reply: &str) -> MountResult<f64> {
    let time = NaiveTime::parse_from_str(reply.trim(), "%H:%M:%S")
        .map_err(|e| MountError::protocol(format!("bad sidereal time '{reply}': {e}")))?;
    Ok(f64::from(time.num_seconds_from_midnight()) / 3600.0)
}

/// Combine `:GC#` (`MM/DD/YY`), `:GL#` (`HH:MM:SS`) and `:GG#` (signed hours)
/// into a UTC instant. The offset is subtracted from the handbox's local time.
pub fn parse_utc(date: &str, time: &str, offset: &str) -> MountResult<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%m/%d/%y")
        .map_err(|e| MountError::protocol(format!("bad local date '{date}': {e}")))?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M:%S")
        .map_err(|e| MountError::protocol(format!("bad local time '{time}': {e}")))?;
    let offset_hours: f64 = offset
        .trim()
        .parse()
        .map_err(|_| MountError::protocol(format!("bad UTC offset '{offset}'")))?;

    let local = date.and_time(time);
    let utc = local - Duration::seconds((offset_hours * 3600.0).round() as i64);
    Ok(utc.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_alignment() {
        assert_eq!(parse_alignment(b"AT0").unwrap(), AlignmentMode::AltAz);
        assert_eq!(parse_alignment(b"PT1").unwrap(), AlignmentMode::Polar);
        assert_eq!(parse_alignment(b"GN0").unwrap(), AlignmentMode::GermanPolar);
        assert!(matches!(parse_alignment(b"X00"), Err(MountError::ProtocolFault(_))));
        assert!(parse_alignment(b"").is_err());
    }

    #[test]
    fn test_acknowledgement_flags() {
        assert!(is_accepted(b'1'));
        assert!(is_accepted(1));
        assert!(!is_accepted(b'0'));
        assert!(goto_equatorial_started(b'0'));
        assert!(!goto_equatorial_started(b'1'));
        assert!(goto_altaz_failed(b'1'));
        assert!(!goto_altaz_failed(b'0'));
    }

    #[test]
    fn test_tracking_frequency() {
        assert_eq!(parse_tracking_frequency("60.1").unwrap(), 60.1);
        assert_eq!(parse_tracking_frequency(" 57.9 ").unwrap(), 57.9);
        assert!(parse_tracking_frequency("").is_err());
    }

    #[test]
    fn test_sidereal_time() {
        assert_eq!(parse_sidereal_time("06:30:00").unwrap(), 6.5);
        assert!(parse_sidereal_time("6:3").is_err());
    }

    #[test]
    fn test_utc_subtracts_offset() {
        let utc = parse_utc("03/14/24", "20:15:30", "+05").unwrap();
        assert_eq!((utc.year(), utc.month(), utc.day()), (2024, 3, 14));
        assert_eq!((utc.hour(), utc.minute(), utc.second()), (15, 15, 30));

        let utc = parse_utc("12/31/23", "22:00:00", "-03").unwrap();
        assert_eq!((utc.year(), utc.month(), utc.day(), utc.hour()), (2024, 1, 1, 1));
    }

    #[test]
    fn test_utc_rejects_garbage() {
        assert!(parse_utc("13/45/24", "20:15:30", "0").is_err());
        assert!(parse_utc("03/14/24", "xx", "0").is_err());
        assert!(parse_utc("03/14/24", "20:15:30", "abc").is_err());
    }
}
