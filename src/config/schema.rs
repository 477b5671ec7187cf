//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::guide::{GuideAlgorithm, GuideDirection};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial link to the handbox
    pub serial: SerialConfig,
    /// Pulse guiding behaviour
    pub guiding: GuidingConfig,
    /// Axis rate capabilities and reversal
    pub axes: AxesConfig,
    /// Position read policy
    pub positions: PositionsConfig,
    /// Static site and optics values
    pub site: SiteConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the driver cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.port.trim().is_empty() {
            return Err(ConfigError::invalid("serial.port", "must not be empty"));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::invalid("serial.baud_rate", "must be positive"));
        }
        if self.serial.timeout_ms == 0 {
            return Err(ConfigError::invalid("serial.timeout_ms", "must be positive"));
        }
        if !(self.guiding.guide_rate > 0.0 && self.guiding.guide_rate <= 1.0) {
            return Err(ConfigError::invalid(
                "guiding.guide_rate",
                format!("{} is outside (0, 1]", self.guiding.guide_rate),
            ));
        }
        if !(self.guiding.coefficient > 0.0 && self.guiding.coefficient.is_finite()) {
            return Err(ConfigError::invalid(
                "guiding.coefficient",
                format!("{} must be a positive number", self.guiding.coefficient),
            ));
        }
        if !(0.0..=12_000.0).contains(&self.site.elevation_m) {
            return Err(ConfigError::invalid(
                "site.elevation_m",
                format!("{} is outside 0..=12000", self.site.elevation_m),
            ));
        }
        for (key, value) in [
            ("site.focal_length_mm", self.site.focal_length_mm),
            ("site.aperture_mm", self.site.aperture_mm),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::invalid(key, "must be positive"));
            }
        }
        if self.site.secondary_diameter_mm < 0.0
            || self.site.secondary_diameter_mm >= self.site.aperture_mm
        {
            return Err(ConfigError::invalid(
                "site.secondary_diameter_mm",
                "must be non-negative and smaller than the aperture",
            ));
        }
        Ok(())
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port the handbox is attached to
    pub port: String,
    /// Baud rate; the #497 handbox runs at 9600
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
    /// Length of each east/west jog issued while connecting
    pub priming_jog_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "COM1".to_string(),
            baud_rate: 9600,
            timeout_ms: 2000,
            priming_jog_ms: 50,
        }
    }
}

impl SerialConfig {
    /// Get the read timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn priming_jog(&self) -> Duration {
        Duration::from_millis(self.priming_jog_ms)
    }
}

/// Guiding configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidingConfig {
    /// How pulse guides are driven on the wire
    pub algorithm: GuideAlgorithm,
    /// Guide rate as a fraction of sidereal
    pub guide_rate: f64,
    /// Direction whose pulses are lengthened by `coefficient`
    pub slow_direction: GuideDirection,
    /// Duration multiplier for the slow direction
    pub coefficient: f64,
}

impl Default for GuidingConfig {
    fn default() -> Self {
        Self {
            algorithm: GuideAlgorithm::PulseGuide,
            guide_rate: 1.0,
            slow_direction: GuideDirection::East,
            coefficient: 1.0,
        }
    }
}

/// Axes configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxesConfig {
    /// Firmware accepts `:RA`/`:RE` custom rates
    pub has_custom_rates: bool,
    /// Negate custom rates on the primary axis (negative `:RA` moves east)
    pub reverse_primary: bool,
    /// Negate custom rates on the secondary axis (negative `:RE` moves north)
    pub reverse_secondary: bool,
}

impl Default for AxesConfig {
    fn default() -> Self {
        Self {
            has_custom_rates: true,
            reverse_primary: true,
            reverse_secondary: true,
        }
    }
}

/// Position read configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionsConfig {
    /// Retries of an RA/Dec read after a dropped or garbled reply; 0 retries forever
    pub max_read_retries: u32,
    /// Interval between slewing-status polls during a goto
    pub slew_poll_ms: u64,
}

impl Default for PositionsConfig {
    fn default() -> Self {
        Self {
            max_read_retries: 10,
            slew_poll_ms: 100,
        }
    }
}

impl PositionsConfig {
    pub fn slew_poll_interval(&self) -> Duration {
        Duration::from_millis(self.slew_poll_ms)
    }
}

/// Site and optics configuration section. Reported only, never sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub elevation_m: f64,
    pub focal_length_mm: f64,
    pub aperture_mm: f64,
    pub secondary_diameter_mm: f64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            elevation_m: 100.0,
            focal_length_mm: 3048.0,
            aperture_mm: 304.8,
            secondary_diameter_mm: 100.0,
        }
    }
}

impl SiteConfig {
    /// Clear aperture area in square metres, less the secondary obstruction.
    pub fn aperture_area_m2(&self) -> f64 {
        let radius = |d_mm: f64| d_mm / 2000.0;
        std::f64::consts::PI
            * (radius(self.aperture_mm).powi(2) - radius(self.secondary_diameter_mm).powi(2))
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log every query result at debug level
    pub verbose: bool,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
    /// Log file path (optional); rotated daily
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            verbose: false,
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}
