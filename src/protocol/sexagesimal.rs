//! Sexagesimal angle formatting and parsing.
//!
//! The handbox reports angles as `sDD*MM#`, `sDD*MM'SS#` or `HH:MM.T#`, with
//! the degree glyph varying by firmware and code page (`*`, `°`, `ß`, or the
//! raw Latin-1 byte `0xDF` which arrives as U+FFFD after lossy decoding). Replies
//! are normalised to colon-delimited fields before conversion.

use crate::error::{MountError, MountResult};
use once_cell::sync::Lazy;
use regex::Regex;

static COLON_FIELDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-])?(\d{1,3}):(\d{1,2})(?::(\d{1,2}(?:\.\d+)?))?\s*$")
        .expect("static regex")
});

static TENTHS_OF_MINUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{1,2})\.(\d)$").expect("static regex"));

/// Replace every degree/minute glyph variant with `:`.
pub fn normalize(reply: &str) -> String {
    reply
        .trim_end_matches('#')
        .chars()
        .map(|c| match c {
            '*' | '°' | 'ß' | '\'' | '\u{FFFD}' => ':',
            other => other,
        })
        .collect()
}

/// Pad a two-field `sDD:MM` value to `sDD:MM:00`.
pub fn pad_seconds(value: &str) -> String {
    if value.matches(':').count() == 1 {
        format!("{value}:00")
    } else {
        value.to_string()
    }
}

/// Parse a normalised `sD:M[:S]` string into a signed decimal value.
pub fn parse_fields(value: &str) -> MountResult<f64> {
    let padded = pad_seconds(value);
    let caps = COLON_FIELDS
        .captures(&padded)
        .ok_or_else(|| MountError::protocol(format!("unparseable angle '{value}'")))?;

    let negative = caps.get(1).is_some_and(|m| m.as_str() == "-");
    let whole: f64 = parse_number(&caps[2], value)?;
    let minutes: f64 = parse_number(&caps[3], value)?;
    let seconds: f64 = match caps.get(4) {
        Some(s) => parse_number(s.as_str(), value)?,
        None => 0.0,
    };
    if minutes >= 60.0 || seconds >= 60.0 {
        return Err(MountError::protocol(format!("angle field out of range in '{value}'")));
    }

    let magnitude = whole + minutes / 60.0 + seconds / 3600.0;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Parse any angle reply (`sDD*MM#`, `DDD*MM'SS#`, ...) into degrees.
pub fn parse_degrees(reply: &str) -> MountResult<f64> {
    parse_fields(&normalize(reply))
}

/// Parse an RA reply in either `HH:MM:SS` or low precision `HH:MM.T` form.
pub fn parse_hours(reply: &str) -> MountResult<f64> {
    let value = normalize(reply);
    if let Some(caps) = TENTHS_OF_MINUTE.captures(&value) {
        let tenths: u32 = parse_number(&caps[3], reply)?;
        return parse_fields(&format!("{}:{}:{:02}", &caps[1], &caps[2], tenths * 6));
    }
    parse_fields(&value)
}

fn parse_number<T: std::str::FromStr>(field: &str, whole: &str) -> MountResult<T> {
    field
        .parse()
        .map_err(|_| MountError::protocol(format!("bad numeric field '{field}' in '{whole}'")))
}

/// Split a non-negative value into whole units, minutes and rounded seconds,
/// carrying overflow upward.
fn split_units(value: f64) -> (u32, u32, u32) {
    let total_seconds = (value.abs() * 3600.0).round() as u64;
    let whole = (total_seconds / 3600) as u32;
    let minutes = ((total_seconds % 3600) / 60) as u32;
    let seconds = (total_seconds % 60) as u32;
    (whole, minutes, seconds)
}

fn split_units_dm(value: f64) -> (u32, u32) {
    let total_minutes = (value.abs() * 60.0).round() as u64;
    ((total_minutes / 60) as u32, (total_minutes % 60) as u32)
}

fn sign(value: f64) -> char {
    if value < 0.0 {
        '-'
    } else {
        '+'
    }
}

/// `HH:MM:SS`, wrapping at 24 hours.
pub fn hours_to_hms(hours: f64) -> String {
    let (h, m, s) = split_units(hours.rem_euclid(24.0));
    format!("{:02}:{:02}:{:02}", h % 24, m, s)
}

/// Low precision `HH:MM.T`, wrapping at 24 hours.
pub fn hours_to_hm_tenths(hours: f64) -> String {
    let tenths = (hours.rem_euclid(24.0) * 600.0).round() as u64;
    let h = (tenths / 600) % 24;
    let m = (tenths % 600) / 10;
    format!("{:02}:{:02}.{}", h, m, tenths % 10)
}

/// `sDD*MM:SS`, always signed.
pub fn degrees_to_signed_dms(degrees: f64) -> String {
    let (d, m, s) = split_units(degrees);
    format!("{}{:02}*{:02}:{:02}", sign(degrees), d, m, s)
}

/// `sDD*MM`, always signed.
pub fn degrees_to_signed_dm(degrees: f64) -> String {
    let (d, m) = split_units_dm(degrees);
    format!("{}{:02}*{:02}", sign(degrees), d, m)
}

/// `DDD*MM`; a leading `-` only for negative values.
pub fn degrees_to_ddd_mm(degrees: f64) -> String {
    let (d, m) = split_units_dm(degrees);
    let prefix = if degrees < 0.0 { "-" } else { "" };
    format!("{prefix}{:03}*{:02}", d, m)
}
