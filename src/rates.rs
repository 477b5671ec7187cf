//! Axis slew rates and tracking modes.
//!
//! Rates are in degrees per second. The handbox exposes a small set of preset
//! rates; firmware patched for custom rates also accepts `:RA`/`:RE` with an
//! arbitrary value between twice sidereal and 6.5°/s.

use crate::error::{MountError, MountResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 360° per sidereal day, in degrees per (UTC) second.
pub const SIDEREAL: f64 = 360.0 / (86400.0 * 0.9972695664);
pub const SIDEREAL_X2: f64 = SIDEREAL * 2.0;
pub const SIDEREAL_X8: f64 = SIDEREAL * 8.0;
pub const SIDEREAL_X16: f64 = SIDEREAL * 16.0;
pub const SIDEREAL_X64: f64 = SIDEREAL * 64.0;
pub const SLEW_HALF_DEGREE: f64 = 0.5;
pub const SLEW_ONE_POINT_FIVE_DEGREES: f64 = 1.5;
pub const SLEW_THREE_DEGREES: f64 = 3.0;
pub const SLEW_SIX_POINT_FIVE_DEGREES: f64 = 6.5;

const RATE_TOLERANCE: f64 = 1e-10;

/// Rates closer than the matching tolerance are the same preset.
pub fn rates_approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < RATE_TOLERANCE
}

/// A rate range; discrete presets have `minimum == maximum`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub minimum: f64,
    pub maximum: f64,
}

impl Rate {
    pub const fn fixed(value: f64) -> Self {
        Self {
            minimum: value,
            maximum: value,
        }
    }

    pub const fn range(minimum: f64, maximum: f64) -> Self {
        Self { minimum, maximum }
    }

    pub fn is_discrete(&self) -> bool {
        rates_approx_eq(self.minimum, self.maximum)
    }
}

/// The rates `MoveAxis` accepts on either axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisRates {
    has_custom_rates: bool,
    rates: Vec<Rate>,
}

impl AxisRates {
    pub fn new(has_custom_rates: bool) -> Self {
        let rates = if has_custom_rates {
            vec![
                Rate::range(0.0, SLEW_SIX_POINT_FIVE_DEGREES),
                Rate::fixed(SIDEREAL),
                Rate::fixed(SIDEREAL_X2),
                Rate::fixed(SIDEREAL_X8),
                Rate::fixed(SIDEREAL_X16),
                Rate::fixed(SIDEREAL_X64),
                Rate::fixed(SLEW_HALF_DEGREE),
                Rate::fixed(SLEW_ONE_POINT_FIVE_DEGREES),
                Rate::fixed(SLEW_THREE_DEGREES),
                Rate::fixed(SLEW_SIX_POINT_FIVE_DEGREES),
            ]
        } else {
            vec![
                Rate::range(SIDEREAL, SLEW_SIX_POINT_FIVE_DEGREES),
                Rate::fixed(SIDEREAL),
                Rate::fixed(SIDEREAL_X2),
                Rate::fixed(SLEW_THREE_DEGREES),
                Rate::fixed(SLEW_SIX_POINT_FIVE_DEGREES),
            ]
        };
        Self {
            has_custom_rates,
            rates,
        }
    }

    pub fn rates(&self) -> &[Rate] {
        &self.rates
    }

    /// Resolve a requested speed (sign ignored) to the rate that will be
    /// commanded. Continuum values are only honoured where the firmware can
    /// express them as a custom rate.
    pub fn select(&self, degrees_per_second: f64) -> MountResult<Rate> {
        let speed = degrees_per_second.abs();
        if let Some(preset) = self
            .rates
            .iter()
            .filter(|r| r.is_discrete())
            .find(|r| rates_approx_eq(r.minimum, speed))
        {
            return Ok(*preset);
        }
        if self.has_custom_rates && speed > SIDEREAL_X2 && speed < SLEW_SIX_POINT_FIVE_DEGREES {
            return Ok(Rate::fixed(speed));
        }
        Err(MountError::invalid_value(format!(
            "Requested rate {degrees_per_second} is not supported"
        )))
    }
}

/// Hardware tracking rates the handbox supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    Sidereal,
    Lunar,
}

impl TrackingMode {
    pub const ALL: [TrackingMode; 2] = [TrackingMode::Sidereal, TrackingMode::Lunar];

    /// Classify the `:GT#` tracking frequency.
    pub fn from_frequency(hz: f64) -> MountResult<Self> {
        if hz > 58.0 && hz < 62.0 {
            Ok(Self::Sidereal)
        } else if hz <= 58.0 {
            Ok(Self::Lunar)
        } else {
            Err(MountError::invalid_value(format!("Unrecognized tracking rate {hz}")))
        }
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sidereal => write!(f, "sidereal"),
            Self::Lunar => write!(f, "lunar"),
        }
    }
}
