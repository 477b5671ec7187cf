//! Wire command builders for the Meade #497 (Autostar) command set.
//!
//! Every builder returns the complete command including the leading `:` and
//! the trailing `#`.

use super::sexagesimal;
use crate::guide::GuideDirection;
use crate::rates::{
    rates_approx_eq, SIDEREAL, SIDEREAL_X2, SLEW_SIX_POINT_FIVE_DEGREES, SLEW_THREE_DEGREES,
};
use crate::state::AxisRole;

pub const STOP_ALL: &str = ":Q#";
pub const PARK: &str = ":hP#";
pub const TRACK_SIDEREAL: &str = ":TQ#";
pub const TRACK_LUNAR: &str = ":TL#";
pub const GET_RA: &str = ":GR#";
pub const GET_DEC: &str = ":GD#";
pub const GET_ALTITUDE: &str = ":GA#";
pub const GET_AZIMUTH: &str = ":GZ#";
pub const GET_TRACKING_RATE: &str = ":GT#";
pub const GET_ALIGNMENT: &str = ":GW#";
pub const GET_SIDEREAL_TIME: &str = ":GS#";
pub const GET_LATITUDE: &str = ":Gt#";
pub const GET_LONGITUDE: &str = ":Gg#";
pub const GET_LOCAL_DATE: &str = ":GC#";
pub const GET_LOCAL_TIME: &str = ":GL#";
pub const GET_UTC_OFFSET: &str = ":GG#";
pub const SLEW_STATUS: &str = ":D#";
pub const GOTO_EQUATORIAL: &str = ":MS#";
pub const GOTO_ALTAZ: &str = ":MA#";
pub const SYNC: &str = ":CM#";

pub const RATE_GUIDE: &str = ":RG#";
pub const RATE_CENTER: &str = ":RC#";
pub const RATE_FIND: &str = ":RM#";
pub const RATE_SLEW: &str = ":RS#";

/// Start moving in `direction` at the currently selected rate.
pub fn move_direction(direction: GuideDirection) -> String {
    format!(":M{}#", direction.wire_char())
}

/// Stop motion in `direction` only.
pub fn stop_direction(direction: GuideDirection) -> String {
    format!(":Q{}#", direction.wire_char())
}

/// `directionCommand(axis, towardPositive)`.
pub fn axis_direction(axis: AxisRole, toward_positive: bool) -> String {
    move_direction(GuideDirection::for_axis(axis, toward_positive))
}

/// Rate-select command for a speed in degrees per second.
///
/// Presets map to `:RG#`, `:RC#`, `:RM#` and `:RS#`. Speeds strictly between
/// twice sidereal and 6.5°/s are sent as a signed custom rate on the axis,
/// negated when the axis is configured as reversed. Anything else falls back
/// to the fastest preset.
pub fn rate_select(axis: AxisRole, degrees_per_second: f64, reversed: bool) -> String {
    let rate = degrees_per_second.abs();
    if rates_approx_eq(rate, SIDEREAL) {
        RATE_GUIDE.to_string()
    } else if rates_approx_eq(rate, SIDEREAL_X2) {
        RATE_CENTER.to_string()
    } else if rates_approx_eq(rate, SLEW_THREE_DEGREES) {
        RATE_FIND.to_string()
    } else if rates_approx_eq(rate, SLEW_SIX_POINT_FIVE_DEGREES) {
        RATE_SLEW.to_string()
    } else if rate > SIDEREAL_X2 && rate < SLEW_SIX_POINT_FIVE_DEGREES {
        custom_rate(axis, rate, reversed)
    } else {
        RATE_SLEW.to_string()
    }
}

/// `:RA<rate>#` / `:RE<rate>#`.
pub fn custom_rate(axis: AxisRole, degrees_per_second: f64, reversed: bool) -> String {
    let signed = if reversed {
        -degrees_per_second
    } else {
        degrees_per_second
    };
    let prefix = match axis {
        AxisRole::Primary => "RA",
        AxisRole::Secondary => "RE",
    };
    format!(":{prefix}{}#", format_rate(signed))
}

/// At least one and at most five decimal places, trailing zeros trimmed.
pub fn format_rate(value: f64) -> String {
    let mut text = format!("{value:.5}");
    while text.ends_with('0') && !text.ends_with(".0") {
        text.pop();
    }
    if text == "-0.0" {
        text.remove(0);
    }
    text
}

/// `:Mg<d><ms>#`; durations are zero padded to four digits.
pub fn pulse_guide(direction: GuideDirection, duration_ms: u32) -> String {
    format!(":Mg{}{:04}#", direction.wire_char(), duration_ms)
}

pub fn set_target_ra(hours: f64) -> String {
    format!(":Sr{}#", sexagesimal::hours_to_hms(hours))
}

/// `:SrHH:MM.T#`, the form sync sends.
pub fn set_target_ra_low_precision(hours: f64) -> String {
    format!(":Sr{}#", sexagesimal::hours_to_hm_tenths(hours))
}

pub fn set_target_dec(degrees: f64) -> String {
    format!(":Sd{}#", sexagesimal::degrees_to_signed_dms(degrees))
}

pub fn set_target_azimuth(degrees: f64) -> String {
    format!(":Sz{}#", sexagesimal::degrees_to_ddd_mm(degrees))
}

pub fn set_target_altitude(degrees: f64) -> String {
    format!(":Sa{}#", sexagesimal::degrees_to_signed_dm(degrees))
}

pub fn set_latitude(degrees: f64) -> String {
    format!(":St{}#", sexagesimal::degrees_to_signed_dm(degrees))
}

pub fn set_longitude(degrees: f64) -> String {
    format!(":Sg{}#", sexagesimal::degrees_to_ddd_mm(degrees))
}
