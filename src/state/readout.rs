//! Position, time and site reads.

use super::transitions::check_range;
use super::MountCore;
use crate::error::{MountError, MountResult};
use crate::protocol::{commands, replies, AlignmentMode};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

impl MountCore {
    /// Current RA in hours.
    pub fn right_ascension(&mut self) -> MountResult<f64> {
        self.read_position(commands::GET_RA, replies::parse_right_ascension)
    }

    /// Current Dec in degrees.
    pub fn declination(&mut self) -> MountResult<f64> {
        self.read_position(commands::GET_DEC, replies::parse_angle)
    }

    pub fn altitude(&mut self) -> MountResult<f64> {
        let reply = self.transport()?.query(commands::GET_ALTITUDE)?;
        let value = replies::parse_angle(&reply)?;
        self.note("Altitude", value);
        Ok(value)
    }

    pub fn azimuth(&mut self) -> MountResult<f64> {
        let reply = self.transport()?.query(commands::GET_AZIMUTH)?;
        let value = replies::parse_angle(&reply)?;
        self.note("Azimuth", value);
        Ok(value)
    }

    /// Query and parse, retrying dropped or garbled replies up to
    /// `max_read_retries` times (0 retries without limit).
    fn read_position(
        &mut self,
        command: &str,
        parse: fn(&str) -> MountResult<f64>,
    ) -> MountResult<f64> {
        let limit = self.settings.max_read_retries;
        let mut retries = 0u32;
        loop {
            let result = self
                .transport()?
                .query(command)
                .and_then(|reply| parse(&reply));
            match result {
                Ok(value) => {
                    self.note(command, value);
                    return Ok(value);
                }
                Err(e) if e.is_transient() && (limit == 0 || retries < limit) => {
                    retries += 1;
                    debug!(tag = "Position", "retrying {} ({}): {}", command, retries, e);
                    self.transport()?.flush_input();
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Local sidereal time in hours; the last good value if the reply is bad.
    pub fn sidereal_time(&mut self) -> MountResult<f64> {
        let result = self
            .transport()?
            .query(commands::GET_SIDEREAL_TIME)
            .and_then(|reply| replies::parse_sidereal_time(&reply));
        match result {
            Ok(hours) => {
                self.last_sidereal_time = hours;
                self.note("SiderealTime", hours);
            }
            Err(e) => {
                warn!(tag = "SiderealTime", "keeping last value: {}", e);
                self.transport()?.flush_input();
            }
        }
        Ok(self.last_sidereal_time)
    }

    pub fn site_latitude(&mut self) -> MountResult<f64> {
        let reply = self.transport()?.query(commands::GET_LATITUDE)?;
        replies::parse_angle(&reply)
    }

    pub fn set_site_latitude(&mut self, degrees: f64) -> MountResult<()> {
        check_range("latitude", degrees, -90.0..=90.0)?;
        self.set_site_value(commands::set_latitude(degrees), "latitude", degrees)
    }

    pub fn site_longitude(&mut self) -> MountResult<f64> {
        let reply = self.transport()?.query(commands::GET_LONGITUDE)?;
        replies::parse_angle(&reply)
    }

    pub fn set_site_longitude(&mut self, degrees: f64) -> MountResult<()> {
        check_range("longitude", degrees, -180.0..=360.0)?;
        self.set_site_value(commands::set_longitude(degrees), "longitude", degrees)
    }

    fn set_site_value(&mut self, command: String, what: &str, degrees: f64) -> MountResult<()> {
        let flag = self.transport()?.query_flag(&command)?;
        if replies::is_accepted(flag) {
            debug!(tag = "Site", "{} set to {}", what, degrees);
            Ok(())
        } else {
            Err(MountError::invalid_value(format!(
                "Mount did not accept {degrees} ({command}) as a valid {what}"
            )))
        }
    }

    /// The handbox clock as UTC. Falls back to the host clock if any part of
    /// the reply is unreadable.
    pub fn utc_date(&mut self) -> MountResult<DateTime<Utc>> {
        match self.read_handbox_clock() {
            Ok(utc) => Ok(utc),
            Err(e @ MountError::NotConnected(_)) => Err(e),
            Err(e) => {
                warn!(tag = "UtcDate", "using host clock: {}", e);
                self.transport()?.flush_input();
                Ok(Utc::now())
            }
        }
    }

    fn read_handbox_clock(&mut self) -> MountResult<DateTime<Utc>> {
        let transport = self.transport()?;
        let date = transport.query(commands::GET_LOCAL_DATE)?;
        let time = transport.query(commands::GET_LOCAL_TIME)?;
        let offset = transport.query(commands::GET_UTC_OFFSET)?;
        replies::parse_utc(&date, &time, &offset)
    }

    pub fn alignment_mode(&mut self) -> MountResult<AlignmentMode> {
        let transport = self.transport()?;
        transport.transmit(commands::GET_ALIGNMENT)?;
        let reply = transport.receive_counted(3)?;
        replies::parse_alignment(&reply)
    }
}
