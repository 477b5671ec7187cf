//! Guide directions, guide algorithms and the guide-duration correction.

use crate::state::AxisRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shortest pulse the handbox will time.
pub const MIN_GUIDE_MS: u32 = 4;
/// Longest pulse accepted from a guiding client.
pub const MAX_GUIDE_MS: u32 = 32_000;

/// A compass direction on the sky; also names single-axis motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuideDirection {
    North,
    South,
    East,
    West,
}

impl GuideDirection {
    /// Direction of travel for a move on `axis`; positive rates move west or north.
    pub fn for_axis(axis: AxisRole, toward_positive: bool) -> Self {
        match (axis, toward_positive) {
            (AxisRole::Primary, true) => Self::West,
            (AxisRole::Primary, false) => Self::East,
            (AxisRole::Secondary, true) => Self::North,
            (AxisRole::Secondary, false) => Self::South,
        }
    }

    pub fn axis(self) -> AxisRole {
        match self {
            Self::East | Self::West => AxisRole::Primary,
            Self::North | Self::South => AxisRole::Secondary,
        }
    }

    pub fn is_toward_positive(self) -> bool {
        matches!(self, Self::West | Self::North)
    }

    /// The letter used in `:M?#`, `:Q?#` and `:Mg?nnnn#`.
    pub fn wire_char(self) -> char {
        match self {
            Self::North => 'n',
            Self::South => 's',
            Self::East => 'e',
            Self::West => 'w',
        }
    }
}

impl fmt::Display for GuideDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        };
        f.write_str(name)
    }
}

impl FromStr for GuideDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "n" | "north" => Ok(Self::North),
            "s" | "south" => Ok(Self::South),
            "e" | "east" => Ok(Self::East),
            "w" | "west" => Ok(Self::West),
            other => Err(format!("unknown guide direction '{other}'")),
        }
    }
}

/// How a pulse guide is driven on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideAlgorithm {
    /// `:Mg<d><ms>#`; the handbox times the pulse itself.
    #[default]
    PulseGuide,
    /// `:RA`/`:RE` at the guide rate, then a direction move stopped by the driver.
    CustomRate,
    /// `:RG#` sidereal move stopped by the driver, time scaled by the guide rate.
    MoveAxis,
}

impl GuideAlgorithm {
    /// Custom-rate guiding falls back to native pulses on stock firmware.
    pub fn effective(self, has_custom_rates: bool) -> Self {
        match self {
            Self::CustomRate if !has_custom_rates => Self::PulseGuide,
            other => other,
        }
    }

    /// Whether the driver must send a direction stop when the pulse ends.
    pub fn needs_explicit_stop(self) -> bool {
        !matches!(self, Self::PulseGuide)
    }
}

impl FromStr for GuideAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pulse_guide" => Ok(Self::PulseGuide),
            "custom_rate" => Ok(Self::CustomRate),
            "move_axis" => Ok(Self::MoveAxis),
            other => Err(format!("unknown guide algorithm '{other}'")),
        }
    }
}

/// Compensation for the mount guiding faster in one direction than the other.
///
/// The operator calibrates `coefficient` so that equal requested durations
/// move the guide star by equal amounts in both directions of the axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationCorrection {
    pub coefficient: f64,
    pub slow_direction: GuideDirection,
    pub guide_rate: f64,
    pub algorithm: GuideAlgorithm,
}

impl DurationCorrection {
    /// The duration in milliseconds actually commanded for `direction`.
    pub fn apply(&self, direction: GuideDirection, requested_ms: i64) -> u32 {
        let mut duration = requested_ms as f64;
        if direction == self.slow_direction && self.coefficient != 1.0 {
            duration = (duration * self.coefficient).round();
        }
        if self.algorithm == GuideAlgorithm::MoveAxis {
            duration = (duration * self.guide_rate).round();
        }
        clamp_duration(duration)
    }
}

/// Clamp to the pulse range the handbox accepts.
pub fn clamp_duration(duration_ms: f64) -> u32 {
    duration_ms.clamp(f64::from(MIN_GUIDE_MS), f64::from(MAX_GUIDE_MS)) as u32
}
