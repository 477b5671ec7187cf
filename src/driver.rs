//! Mount driver facade.
//!
//! `MountDriver` is the entry point for applications. Every call is wrapped
//! as a closure and run on the work serializer, so callers on any number of
//! threads see strictly ordered, non-interleaved exchanges with the handbox.
//!
//! # Architecture
//!
//! ```text
//! caller threads ─┐
//! pulse timers   ─┼──> WorkSerializer ──> MountCore ──> Transport ──> handbox
//! goto pollers   ─┘
//! ```

use crate::config::Config;
use crate::error::{MountError, MountResult};
use crate::guide::GuideDirection;
use crate::port::{PortConfiguration, PortOpener, SystemPortOpener};
use crate::protocol::AlignmentMode;
use crate::rates::{AxisRates, TrackingMode, SIDEREAL};
use crate::serializer::WorkSerializer;
use crate::state::{AxisRole, MountCore, MountSettings, StateSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ========== Result Types ==========

/// Snapshot of both axis slots and the derived flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MountStatus {
    pub connected: bool,
    pub parked: bool,
    pub tracking: bool,
    pub slewing: bool,
    pub pulse_guiding: bool,
    pub tracking_mode: Option<TrackingMode>,
    pub primary: StateSummary,
    pub secondary: StateSummary,
}

/// Current pointing, read in one serialized batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub right_ascension: f64,
    pub declination: f64,
    pub altitude: f64,
    pub azimuth: f64,
    pub sidereal_time: f64,
}

/// What this hardware generation can and cannot do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_move_primary: bool,
    pub can_move_secondary: bool,
    pub can_pulse_guide: bool,
    pub can_park: bool,
    pub can_unpark: bool,
    pub can_set_park: bool,
    pub can_find_home: bool,
    pub can_set_pier_side: bool,
    pub can_set_rate_offsets: bool,
    pub can_set_guide_rates: bool,
    pub can_set_tracking: bool,
    pub can_slew: bool,
    pub can_slew_async: bool,
    pub can_slew_altaz: bool,
    pub can_slew_altaz_async: bool,
    pub can_sync: bool,
    pub can_sync_altaz: bool,
}

impl Capabilities {
    pub const LX90: Capabilities = Capabilities {
        can_move_primary: true,
        can_move_secondary: true,
        can_pulse_guide: true,
        can_park: true,
        can_unpark: false,
        can_set_park: false,
        can_find_home: false,
        can_set_pier_side: false,
        can_set_rate_offsets: false,
        can_set_guide_rates: false,
        can_set_tracking: true,
        can_slew: false,
        can_slew_async: true,
        can_slew_altaz: false,
        can_slew_altaz_async: true,
        can_sync: true,
        can_sync_altaz: true,
    };
}

/// Static site and optics values from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Optics {
    pub site_elevation_m: f64,
    pub focal_length_m: f64,
    pub aperture_diameter_m: f64,
    pub aperture_area_m2: f64,
}

// ========== Driver ==========

/// Thread-safe handle to one mount.
///
/// Dropping the driver disconnects (cancelling any pending guide or goto)
/// and stops the worker thread.
pub struct MountDriver {
    serializer: WorkSerializer<MountCore>,
    config: Config,
}

impl std::fmt::Debug for MountDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountDriver")
            .field("port", &self.config.serial.port)
            .finish_non_exhaustive()
    }
}

impl MountDriver {
    /// Create a driver that opens real serial ports.
    pub fn new(config: Config) -> MountResult<Self> {
        let port_config = PortConfiguration {
            baud_rate: config.serial.baud_rate,
            ..PortConfiguration::autostar(config.serial.timeout())
        };
        Self::with_opener(config, Box::new(SystemPortOpener::new(port_config)))
    }

    /// Create a driver that obtains its port from `opener`.
    ///
    /// # Errors
    ///
    /// - `MountError::WorkerSpawn` if the worker thread cannot be started
    pub fn with_opener(config: Config, opener: Box<dyn PortOpener>) -> MountResult<Self> {
        let settings = MountSettings::from_config(&config);
        let serializer = WorkSerializer::spawn("lx90-mount", move |queue| {
            MountCore::new(settings, opener, queue)
        })?;
        Ok(Self { serializer, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `work` on the serializer without any guard. Intended for
    /// diagnostics that only read the core.
    pub fn inspect<R, F>(&self, work: F) -> MountResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&MountCore) -> R + Send + 'static,
    {
        self.serializer.submit(move |core| Ok(work(core)))
    }

    /// Run `work` only if the mount is connected and not parked.
    fn connected<R, F>(&self, work: F) -> MountResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut MountCore) -> MountResult<R> + Send + 'static,
    {
        self.serializer.submit(move |core| {
            ensure_connected(core)?;
            work(core)
        })
    }

    // ========== Lifecycle ==========

    /// Connect on `port_name`, prime the firmware and read the tracking rate.
    ///
    /// Connecting an already connected driver is a no-op.
    ///
    /// # Errors
    ///
    /// - `MountError::Port` if the port cannot be opened or the exchange fails
    /// - `MountError::InvalidValue` if the tracking rate is not recognised
    pub fn connect(&self, port_name: &str) -> MountResult<()> {
        let port_name = port_name.to_string();
        self.serializer.submit(move |core| core.connect(&port_name))
    }

    /// Connect on the configured port.
    pub fn connect_default(&self) -> MountResult<()> {
        self.connect(&self.config.serial.port)
    }

    pub fn disconnect(&self) -> MountResult<()> {
        self.serializer.submit(|core| core.disconnect())
    }

    /// Abort all motion, park and disconnect. The handbox must be power
    /// cycled before the mount can be used again.
    pub fn park(&self) -> MountResult<()> {
        self.connected(|core| core.park())
    }

    pub fn unpark(&self) -> MountResult<()> {
        Err(MountError::unsupported(
            "unpark; power cycle the mount and reconnect",
        ))
    }

    pub fn set_park(&self) -> MountResult<()> {
        Err(MountError::unsupported("set park position"))
    }

    pub fn find_home(&self) -> MountResult<()> {
        Err(MountError::unsupported("find home"))
    }

    // ========== State Queries ==========

    pub fn is_connected(&self) -> MountResult<bool> {
        self.inspect(|core| core.is_connected())
    }

    pub fn is_parked(&self) -> MountResult<bool> {
        self.inspect(|core| core.is_parked())
    }

    pub fn is_slewing(&self) -> MountResult<bool> {
        self.inspect(|core| core.is_slewing())
    }

    pub fn is_pulse_guiding(&self) -> MountResult<bool> {
        self.inspect(|core| core.is_pulse_guiding())
    }

    /// Tracking with neither axis moving.
    pub fn is_tracking(&self) -> MountResult<bool> {
        self.inspect(|core| core.is_tracking())
    }

    pub fn status(&self) -> MountResult<MountStatus> {
        self.inspect(|core| MountStatus {
            connected: core.is_connected(),
            parked: core.is_parked(),
            tracking: core.is_tracking(),
            slewing: core.is_slewing(),
            pulse_guiding: core.is_pulse_guiding(),
            tracking_mode: core.tracking_mode(),
            primary: core.primary().summary(),
            secondary: core.secondary().summary(),
        })
    }

    // ========== Tracking ==========

    pub fn tracking_mode(&self) -> MountResult<Option<TrackingMode>> {
        self.connected(|core| Ok(core.tracking_mode()))
    }

    pub fn set_tracking_mode(&self, mode: TrackingMode) -> MountResult<()> {
        self.connected(move |core| core.set_tracking_mode(mode))
    }

    /// The mount always tracks while connected; only enabling is accepted.
    pub fn set_tracking(&self, enabled: bool) -> MountResult<()> {
        if !enabled {
            return Err(MountError::unsupported("disabling tracking"));
        }
        self.connected(|_| Ok(()))
    }

    pub fn tracking_rates(&self) -> &'static [TrackingMode] {
        &TrackingMode::ALL
    }

    pub fn right_ascension_rate(&self) -> f64 {
        0.0
    }

    pub fn declination_rate(&self) -> f64 {
        0.0
    }

    pub fn set_right_ascension_rate(&self, _arcsec_per_second: f64) -> MountResult<()> {
        Err(MountError::unsupported("RA rate offset"))
    }

    pub fn set_declination_rate(&self, _arcsec_per_second: f64) -> MountResult<()> {
        Err(MountError::unsupported("Dec rate offset"))
    }

    // ========== Motion ==========

    /// Move `axis` at `degrees_per_second`; negative moves east or south and
    /// zero stops.
    ///
    /// # Errors
    ///
    /// - `MountError::InvalidValue` if the rate is not in `axis_rates`
    /// - `MountError::NotConnected` / `MountError::Parked`
    pub fn move_axis(&self, axis: AxisRole, degrees_per_second: f64) -> MountResult<()> {
        self.connected(move |core| core.move_axis(axis, degrees_per_second))
    }

    pub fn stop_move_axis(&self, axis: AxisRole) -> MountResult<()> {
        self.connected(move |core| core.stop_move_axis(axis))
    }

    /// Guide in `direction` for `duration_ms`, corrected and clamped to
    /// 4..=32000 ms. Returns once the guide has started.
    pub fn pulse_guide(&self, direction: GuideDirection, duration_ms: i64) -> MountResult<()> {
        self.connected(move |core| core.pulse_guide(direction, duration_ms))
    }

    pub fn slew_to_coordinates(&self, _ra_hours: f64, _dec_degrees: f64) -> MountResult<()> {
        Err(MountError::unsupported("synchronous slew; use slew_to_coordinates_async"))
    }

    /// Start a goto to RA (hours) / Dec (degrees). Poll `is_slewing` for
    /// completion.
    ///
    /// # Errors
    ///
    /// - `MountError::InvalidValue` if a coordinate is out of range or the
    ///   mount rejects the target; the mount is returned to tracking first
    pub fn slew_to_coordinates_async(&self, ra_hours: f64, dec_degrees: f64) -> MountResult<()> {
        self.connected(move |core| core.slew_to_coordinates(ra_hours, dec_degrees))
    }

    pub fn slew_to_altaz(&self, _azimuth: f64, _altitude: f64) -> MountResult<()> {
        Err(MountError::unsupported("synchronous slew; use slew_to_altaz_async"))
    }

    pub fn slew_to_altaz_async(&self, azimuth: f64, altitude: f64) -> MountResult<()> {
        self.connected(move |core| core.slew_to_altaz(azimuth, altitude))
    }

    pub fn sync_to_coordinates(&self, ra_hours: f64, dec_degrees: f64) -> MountResult<()> {
        self.connected(move |core| core.sync_to_coordinates(ra_hours, dec_degrees))
    }

    pub fn sync_to_altaz(&self, azimuth: f64, altitude: f64) -> MountResult<()> {
        self.connected(move |core| core.sync_to_altaz(azimuth, altitude))
    }

    /// Stop every motion and resume tracking. A no-op when nothing moves.
    pub fn abort_slew(&self) -> MountResult<()> {
        self.connected(|core| core.abort_slew())
    }

    // ========== Position, Time and Site ==========

    pub fn right_ascension(&self) -> MountResult<f64> {
        self.connected(|core| core.right_ascension())
    }

    pub fn declination(&self) -> MountResult<f64> {
        self.connected(|core| core.declination())
    }

    pub fn altitude(&self) -> MountResult<f64> {
        self.connected(|core| core.altitude())
    }

    pub fn azimuth(&self) -> MountResult<f64> {
        self.connected(|core| core.azimuth())
    }

    pub fn sidereal_time(&self) -> MountResult<f64> {
        self.connected(|core| core.sidereal_time())
    }

    pub fn position(&self) -> MountResult<Position> {
        self.connected(|core| {
            Ok(Position {
                right_ascension: core.right_ascension()?,
                declination: core.declination()?,
                altitude: core.altitude()?,
                azimuth: core.azimuth()?,
                sidereal_time: core.sidereal_time()?,
            })
        })
    }

    pub fn utc_date(&self) -> MountResult<DateTime<Utc>> {
        self.connected(|core| core.utc_date())
    }

    pub fn site_latitude(&self) -> MountResult<f64> {
        self.connected(|core| core.site_latitude())
    }

    pub fn set_site_latitude(&self, degrees: f64) -> MountResult<()> {
        self.connected(move |core| core.set_site_latitude(degrees))
    }

    pub fn site_longitude(&self) -> MountResult<f64> {
        self.connected(|core| core.site_longitude())
    }

    pub fn set_site_longitude(&self, degrees: f64) -> MountResult<()> {
        self.connected(move |core| core.set_site_longitude(degrees))
    }

    pub fn alignment_mode(&self) -> MountResult<AlignmentMode> {
        self.connected(|core| core.alignment_mode())
    }

    pub fn side_of_pier(&self) -> MountResult<()> {
        Err(MountError::unsupported("side of pier"))
    }

    // ========== Static Values ==========

    /// Rates accepted by `move_axis`. Both axes share one table.
    pub fn axis_rates(&self, _axis: AxisRole) -> AxisRates {
        AxisRates::new(self.config.axes.has_custom_rates)
    }

    pub fn guide_rate_degrees_per_second(&self) -> f64 {
        self.config.guiding.guide_rate * SIDEREAL
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::LX90
    }

    pub fn optics(&self) -> Optics {
        let site = &self.config.site;
        Optics {
            site_elevation_m: site.elevation_m,
            focal_length_m: site.focal_length_mm / 1000.0,
            aperture_diameter_m: site.aperture_mm / 1000.0,
            aperture_area_m2: site.aperture_area_m2(),
        }
    }
}

impl Drop for MountDriver {
    fn drop(&mut self) {
        match self.serializer.submit(|core| core.disconnect()) {
            Ok(()) => debug!(tag = "MountDriver", "driver dropped"),
            Err(e) => warn!(tag = "MountDriver", "disconnect on drop failed: {}", e),
        }
    }
}

fn ensure_connected(core: &MountCore) -> MountResult<()> {
    if core.is_parked() {
        Err(MountError::Parked)
    } else if !core.is_connected() {
        Err(MountError::not_connected("call connect first"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{MockSerialPort, PortError, SerialPortAdapter};

    fn driver_with(mock: &MockSerialPort) -> MountDriver {
        let port = mock.clone();
        let opener = move |_: &str| -> Result<Box<dyn SerialPortAdapter>, PortError> {
            Ok(Box::new(port.clone()))
        };
        let mut config = Config::default();
        config.serial.priming_jog_ms = 0;
        MountDriver::with_opener(config, Box::new(opener)).unwrap()
    }

    #[test]
    fn test_operations_require_connection() {
        let mock = MockSerialPort::new("MOCK0");
        let driver = driver_with(&mock);

        let result = driver.abort_slew();

        assert!(matches!(result, Err(MountError::NotConnected(_))));
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn test_park_requires_connection() {
        let mock = MockSerialPort::new("MOCK0");
        let driver = driver_with(&mock);

        let result = driver.park();

        assert!(matches!(result, Err(MountError::NotConnected(_))));
        assert!(!driver.is_parked().unwrap());
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn test_parked_driver_reports_parked() {
        let mut mock = MockSerialPort::new("MOCK0");
        mock.respond_always(":GT#", "60.0#");
        let driver = driver_with(&mock);
        driver.connect("MOCK0").unwrap();

        driver.park().unwrap();

        assert!(driver.is_parked().unwrap());
        assert!(matches!(driver.right_ascension(), Err(MountError::Parked)));
    }

    #[test]
    fn test_unsupported_operations() {
        let mock = MockSerialPort::new("MOCK0");
        let driver = driver_with(&mock);

        assert!(matches!(driver.unpark(), Err(MountError::Unsupported(_))));
        assert!(matches!(driver.find_home(), Err(MountError::Unsupported(_))));
        assert!(matches!(
            driver.slew_to_coordinates(1.0, 2.0),
            Err(MountError::Unsupported(_))
        ));
        assert!(matches!(driver.set_tracking(false), Err(MountError::Unsupported(_))));
    }

    #[test]
    fn test_static_values() {
        let mock = MockSerialPort::new("MOCK0");
        let driver = driver_with(&mock);

        assert_eq!(driver.axis_rates(AxisRole::Primary).rates().len(), 10);
        assert!((driver.guide_rate_degrees_per_second() - SIDEREAL).abs() < 1e-12);
        assert!((driver.optics().focal_length_m - 3.048).abs() < 1e-12);
        assert!(driver.capabilities().can_slew_async);
        assert!(!driver.capabilities().can_slew);
    }

    #[test]
    fn test_drop_disconnects() {
        let mut mock = MockSerialPort::new("MOCK0");
        mock.respond_always(":GT#", "60.0#");
        let driver = driver_with(&mock);
        driver.connect("MOCK0").unwrap();
        mock.clear_write_log();

        drop(driver);

        assert_eq!(mock.commands(), vec![":Q#".to_string()]);
    }
}
