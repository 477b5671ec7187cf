//! Motion transitions: move axis, pulse guide, goto, sync and abort.
//!
//! Each operation matches on the slot(s) it needs and falls through to a
//! logged no-op for states that do not authorize it. Moving states carry
//! the resting state to return to; finalize closures from background jobs
//! only act while the job that queued them is still the one in the slot.

use super::{AxisGuide, AxisRole, AxisSlew, DualSlew, MountCore, MountState, Resting, SlewTarget};
use crate::error::{MountError, MountResult};
use crate::guide::{DurationCorrection, GuideAlgorithm, GuideDirection};
use crate::jobs;
use crate::protocol::{commands, replies};
use crate::rates::{AxisRates, SIDEREAL};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

impl MountCore {
    /// Move `axis` at `degrees_per_second`; the sign picks the direction and
    /// zero stops. Retargets an axis that is already moving.
    pub fn move_axis(&mut self, axis: AxisRole, degrees_per_second: f64) -> MountResult<()> {
        if !degrees_per_second.is_finite() {
            return Err(MountError::invalid_value(format!(
                "Requested rate {degrees_per_second} is not supported"
            )));
        }
        if degrees_per_second == 0.0 {
            return self.stop_move_axis(axis);
        }

        let rate = AxisRates::new(self.settings.axes.has_custom_rates).select(degrees_per_second)?;
        let direction = GuideDirection::for_axis(axis, degrees_per_second > 0.0);

        let (restore, previous) = match self.slot(axis) {
            MountState::Tracking(mode) => (Resting::Tracking(*mode), None),
            MountState::Quiet => (Resting::Quiet, None),
            MountState::Slewing(slew) => (slew.restore, Some(slew.direction)),
            other => {
                debug!(tag = "MoveAxis", "{:?} ignored while {:?}", axis, other.summary());
                return Ok(());
            }
        };
        if previous.is_none() && self.slot(axis.other()).is_pulse_guiding() {
            debug!(tag = "MoveAxis", "{:?} ignored while the other axis guides", axis);
            return Ok(());
        }

        self.set_slot(
            axis,
            MountState::Slewing(AxisSlew {
                axis,
                direction,
                restore,
            }),
        );

        let rate_command = commands::rate_select(axis, rate.minimum, self.reversed(axis));
        if let Err(e) = self.drive_axis(axis, previous, direction, rate_command) {
            warn!(tag = "MoveAxis", "move {} failed, stopping axis: {}", direction, e);
            if let Err(cleanup) = self.abort_axis(axis) {
                warn!(tag = "MoveAxis", "stop after failed move also failed: {}", cleanup);
            }
            return Err(e);
        }

        info!(
            tag = "MoveAxis",
            "{:?} moving {} at {} deg/s", axis, direction, rate.minimum
        );
        Ok(())
    }

    fn drive_axis(
        &mut self,
        axis: AxisRole,
        previous: Option<GuideDirection>,
        direction: GuideDirection,
        rate_command: String,
    ) -> MountResult<()> {
        if let Some(reversed) = previous.filter(|p| *p != direction) {
            self.send(&commands::stop_direction(reversed))?;
        }
        self.select_rate(axis, rate_command)?;
        self.send(&commands::move_direction(direction))
    }

    /// End a single-axis move on `axis`. Anything else is left alone.
    pub fn stop_move_axis(&mut self, axis: AxisRole) -> MountResult<()> {
        if self.slot(axis).is_single_axis_slew() {
            self.abort_axis(axis)
        } else {
            Ok(())
        }
    }

    /// Abort every motion in progress. Issues nothing when both axes rest.
    pub fn abort_slew(&mut self) -> MountResult<()> {
        let secondary = self.abort_axis(AxisRole::Secondary);
        let primary = self.abort_axis(AxisRole::Primary);
        secondary.and(primary)
    }

    /// Stop whatever `axis` is doing and resume its resting state. The slot
    /// is always restored, even when the stop command fails.
    fn abort_axis(&mut self, axis: AxisRole) -> MountResult<()> {
        match self.take_slot(axis) {
            MountState::Slewing(slew) => {
                let stopped = self.send(&commands::stop_direction(slew.direction));
                let resumed = self.resume(axis, slew.restore);
                stopped.and(resumed)
            }
            MountState::PulseGuiding(guide) => {
                guide.job.cancel();
                let stopped = self.send(&commands::stop_direction(guide.direction));
                let resumed = self.resume(axis, guide.restore);
                stopped.and(resumed)
            }
            MountState::DualSlewing(dual) => {
                self.set_slot(axis, MountState::DualSlewing(dual));
                self.abort_goto()
            }
            other => {
                self.set_slot(axis, other);
                Ok(())
            }
        }
    }

    fn abort_goto(&mut self) -> MountResult<()> {
        match self.take_slot(AxisRole::Primary) {
            MountState::DualSlewing(dual) => {
                dual.job.cancel();
                self.set_slot(AxisRole::Secondary, MountState::Quiet);
                let stopped = self.send(commands::STOP_ALL);
                let secondary = self.resume(AxisRole::Secondary, dual.saved_secondary);
                let primary = self.resume(AxisRole::Primary, dual.saved_primary);
                info!(tag = "Goto", "goto aborted");
                stopped.and(secondary).and(primary)
            }
            other => {
                self.set_slot(AxisRole::Primary, other);
                Ok(())
            }
        }
    }

    /// Start a timed guide correction. A guide already running on the same
    /// axis is stopped first.
    pub fn pulse_guide(&mut self, direction: GuideDirection, requested_ms: i64) -> MountResult<()> {
        let axis = direction.axis();
        if self.slot(axis).is_pulse_guiding() {
            self.abort_axis(axis)?;
        } else if self.slot(axis).resting().is_none() {
            let current = self.slot(axis).summary();
            debug!(tag = "PulseGuide", "{} ignored while {:?}", direction, current);
            return Ok(());
        }
        if self.slot(axis.other()).is_single_axis_slew() {
            debug!(tag = "PulseGuide", "{} ignored while the other axis moves", direction);
            return Ok(());
        }
        let Some(restore) = self.slot(axis).resting() else {
            return Ok(());
        };

        let guiding = &self.settings.guiding;
        let algorithm = guiding
            .algorithm
            .effective(self.settings.axes.has_custom_rates);
        let correction = DurationCorrection {
            coefficient: guiding.coefficient,
            slow_direction: guiding.slow_direction,
            guide_rate: guiding.guide_rate,
            algorithm,
        };
        let duration_ms = correction.apply(direction, requested_ms);

        if let Err(e) = self.start_guide(axis, direction, algorithm, duration_ms) {
            warn!(tag = "PulseGuide", "guide {} failed: {}", direction, e);
            self.abandon_guide(axis, direction, restore, algorithm.needs_explicit_stop());
            return Err(e);
        }

        let id = self.next_job_id();
        let job = match jobs::spawn_pulse_timer(
            self.queue.clone(),
            axis,
            id,
            Duration::from_millis(u64::from(duration_ms)),
        ) {
            Ok(job) => job,
            Err(e) => {
                self.abandon_guide(axis, direction, restore, true);
                return Err(e);
            }
        };
        self.set_slot(
            axis,
            MountState::PulseGuiding(AxisGuide {
                direction,
                duration_ms,
                algorithm,
                restore,
                job,
            }),
        );
        info!(
            tag = "PulseGuide",
            "{} for {} ms (requested {} ms)", direction, duration_ms, requested_ms
        );
        Ok(())
    }

    /// Undo a guide that started moving but will never be finalized.
    fn abandon_guide(&mut self, axis: AxisRole, direction: GuideDirection, restore: Resting, stop: bool) {
        if stop {
            if let Err(e) = self.send(&commands::stop_direction(direction)) {
                warn!(tag = "PulseGuide", "stop after failed guide also failed: {}", e);
            }
        }
        if let Err(e) = self.resume(axis, restore) {
            warn!(tag = "PulseGuide", "resume after failed guide also failed: {}", e);
        }
    }

    fn start_guide(
        &mut self,
        axis: AxisRole,
        direction: GuideDirection,
        algorithm: GuideAlgorithm,
        duration_ms: u32,
    ) -> MountResult<()> {
        match algorithm {
            GuideAlgorithm::PulseGuide => self.send(&commands::pulse_guide(direction, duration_ms)),
            GuideAlgorithm::CustomRate => {
                let rate = self.settings.guiding.guide_rate * SIDEREAL;
                let command = commands::custom_rate(axis, rate, self.reversed(axis));
                self.select_rate(axis, command)?;
                self.send(&commands::move_direction(direction))
            }
            GuideAlgorithm::MoveAxis => {
                self.select_rate(axis, commands::RATE_GUIDE.to_string())?;
                self.send(&commands::move_direction(direction))
            }
        }
    }

    /// Finalize the guide started as job `id`, if it is still running.
    pub fn complete_pulse_guide(&mut self, axis: AxisRole, id: u64) -> MountResult<()> {
        match self.take_slot(axis) {
            MountState::PulseGuiding(guide) if guide.job_id() == id => {
                let stopped = if guide.algorithm.needs_explicit_stop() {
                    self.send(&commands::stop_direction(guide.direction))
                } else {
                    Ok(())
                };
                let resumed = self.resume(axis, guide.restore);
                debug!(tag = "PulseGuide", "guide {} complete", guide.direction);
                stopped.and(resumed)
            }
            other => {
                self.set_slot(axis, other);
                debug!(tag = "PulseGuide", "stale completion for job {}", id);
                Ok(())
            }
        }
    }

    /// Goto RA (hours) / Dec (degrees). Returns once the mount has started.
    pub fn slew_to_coordinates(&mut self, ra_hours: f64, dec_degrees: f64) -> MountResult<()> {
        validate_ra(ra_hours)?;
        validate_dec(dec_degrees)?;
        self.start_goto(SlewTarget::Equatorial {
            ra_hours,
            dec_degrees,
        })
    }

    /// Goto azimuth / altitude in degrees. Returns once the mount has started.
    pub fn slew_to_altaz(&mut self, azimuth: f64, altitude: f64) -> MountResult<()> {
        validate_azimuth(azimuth)?;
        validate_altitude(altitude)?;
        self.start_goto(SlewTarget::Horizontal { azimuth, altitude })
    }

    fn start_goto(&mut self, target: SlewTarget) -> MountResult<()> {
        let (saved_primary, saved_secondary) = match (&self.primary, &self.secondary) {
            (MountState::Tracking(mode), MountState::Quiet) => {
                (Resting::Tracking(*mode), Resting::Quiet)
            }
            (primary, secondary) => {
                debug!(
                    tag = "Goto",
                    "goto ignored while {:?}/{:?}",
                    primary.summary(),
                    secondary.summary()
                );
                return Ok(());
            }
        };

        if let Err(e) = self.command_goto(target) {
            warn!(tag = "Goto", "goto failed, returning to tracking: {}", e);
            self.abandon_goto(saved_primary, saved_secondary);
            return Err(e);
        }

        let id = self.next_job_id();
        let job = match jobs::spawn_slew_poller(self.queue.clone(), id, self.settings.slew_poll_interval) {
            Ok(job) => job,
            Err(e) => {
                self.abandon_goto(saved_primary, saved_secondary);
                return Err(e);
            }
        };
        let dual = Arc::new(DualSlew {
            target,
            saved_primary,
            saved_secondary,
            job,
        });
        self.primary = MountState::DualSlewing(Arc::clone(&dual));
        self.secondary = MountState::DualSlewing(dual);
        info!(tag = "Goto", "goto started: {:?}", target);
        Ok(())
    }

    /// Stop a goto that may have started and put both axes back to rest.
    fn abandon_goto(&mut self, saved_primary: Resting, saved_secondary: Resting) {
        let stopped = self.send(commands::STOP_ALL);
        let secondary = self.resume(AxisRole::Secondary, saved_secondary);
        let primary = self.resume(AxisRole::Primary, saved_primary);
        if let Err(e) = stopped.and(secondary).and(primary) {
            warn!(tag = "Goto", "abort after failed goto also failed: {}", e);
        }
    }

    fn command_goto(&mut self, target: SlewTarget) -> MountResult<()> {
        match target {
            SlewTarget::Equatorial {
                ra_hours,
                dec_degrees,
            } => {
                let ra = commands::set_target_ra(ra_hours);
                let dec = commands::set_target_dec(dec_degrees);
                self.set_target(&ra, "RA", ra_hours)?;
                self.set_target(&dec, "Dec", dec_degrees)?;

                let flag = self.transport()?.query_flag(commands::GOTO_EQUATORIAL)?;
                if !replies::goto_equatorial_started(flag) {
                    let message = self.transport()?.receive_terminated().unwrap_or_default();
                    return Err(MountError::invalid_value(format!(
                        "Mount failed to slew to RA/Dec {}/{}: \"{}\"",
                        wire_value(&ra),
                        wire_value(&dec),
                        message.trim()
                    )));
                }
            }
            SlewTarget::Horizontal { azimuth, altitude } => {
                let az = commands::set_target_azimuth(azimuth);
                let alt = commands::set_target_altitude(altitude);
                self.set_target(&az, "azimuth", azimuth)?;
                self.set_target(&alt, "altitude", altitude)?;

                let flag = self.transport()?.query_flag(commands::GOTO_ALTAZ)?;
                if replies::goto_altaz_failed(flag) {
                    return Err(MountError::invalid_value(format!(
                        "Mount failed to slew to Az/Alt {}/{}",
                        wire_value(&az),
                        wire_value(&alt)
                    )));
                }
            }
        }
        Ok(())
    }

    /// Send a set-target command and check its acknowledgement byte.
    fn set_target(&mut self, command: &str, what: &str, value: f64) -> MountResult<()> {
        let flag = self.transport()?.query_flag(command)?;
        if replies::is_accepted(flag) {
            Ok(())
        } else {
            Err(MountError::invalid_value(format!(
                "Mount did not accept {what} {value} ({})",
                wire_value(command)
            )))
        }
    }

    /// Tell the mount it is pointing at RA/Dec. Only while tracking.
    pub fn sync_to_coordinates(&mut self, ra_hours: f64, dec_degrees: f64) -> MountResult<()> {
        validate_ra(ra_hours)?;
        validate_dec(dec_degrees)?;
        if !self.is_tracking() {
            debug!(tag = "Sync", "sync ignored while not tracking");
            return Ok(());
        }
        self.set_target(&commands::set_target_ra_low_precision(ra_hours), "RA", ra_hours)?;
        self.set_target(&commands::set_target_dec(dec_degrees), "Dec", dec_degrees)?;
        self.finish_sync()
    }

    /// Tell the mount it is pointing at Az/Alt. Only while tracking.
    pub fn sync_to_altaz(&mut self, azimuth: f64, altitude: f64) -> MountResult<()> {
        validate_azimuth(azimuth)?;
        validate_altitude(altitude)?;
        if !self.is_tracking() {
            debug!(tag = "Sync", "sync ignored while not tracking");
            return Ok(());
        }
        self.set_target(&commands::set_target_azimuth(azimuth), "azimuth", azimuth)?;
        self.set_target(&commands::set_target_altitude(altitude), "altitude", altitude)?;
        self.finish_sync()
    }

    fn finish_sync(&mut self) -> MountResult<()> {
        let confirmation = self.transport()?.query(commands::SYNC)?;
        info!(tag = "Sync", "synced: {}", confirmation.trim());
        Ok(())
    }

    fn is_current_goto(&self, id: u64) -> bool {
        matches!(&self.primary, MountState::DualSlewing(dual) if dual.job_id() == id)
    }

    /// One poll of the live slewing indicator for goto `id`. `None` once the
    /// goto is no longer current.
    pub fn poll_slew(&mut self, id: u64) -> MountResult<Option<bool>> {
        if !self.is_current_goto(id) {
            return Ok(None);
        }
        let reply = self.transport()?.query(commands::SLEW_STATUS)?;
        Ok(Some(replies::is_hardware_slewing(&reply)))
    }

    /// The mount reported goto `id` finished; resume both axes.
    pub fn complete_slew(&mut self, id: u64) -> MountResult<()> {
        if !self.is_current_goto(id) {
            debug!(tag = "Goto", "stale completion for job {}", id);
            return Ok(());
        }
        match self.take_slot(AxisRole::Primary) {
            MountState::DualSlewing(dual) => {
                self.set_slot(AxisRole::Secondary, MountState::Quiet);
                let secondary = self.resume(AxisRole::Secondary, dual.saved_secondary);
                let primary = self.resume(AxisRole::Primary, dual.saved_primary);
                info!(tag = "Goto", "goto complete");
                secondary.and(primary)
            }
            other => {
                self.set_slot(AxisRole::Primary, other);
                Ok(())
            }
        }
    }

    /// Goto `id` could not be polled; stop it.
    pub fn abort_slew_job(&mut self, id: u64) -> MountResult<()> {
        if self.is_current_goto(id) {
            self.abort_goto()
        } else {
            Ok(())
        }
    }
}

/// The argument part of a wire command, e.g. `05:34:30` for `:Sr05:34:30#`.
fn wire_value(command: &str) -> &str {
    command
        .get(3..command.len().saturating_sub(1))
        .unwrap_or(command)
}

pub(super) fn check_range(what: &str, value: f64, range: std::ops::RangeInclusive<f64>) -> MountResult<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(MountError::invalid_value(format!(
            "{what} {value} is outside {}..={}",
            range.start(),
            range.end()
        )))
    }
}

fn validate_ra(hours: f64) -> MountResult<()> {
    if (0.0..24.0).contains(&hours) {
        Ok(())
    } else {
        Err(MountError::invalid_value(format!("RA {hours} is outside 0..24")))
    }
}

fn validate_dec(degrees: f64) -> MountResult<()> {
    check_range("Dec", degrees, -90.0..=90.0)
}

fn validate_azimuth(degrees: f64) -> MountResult<()> {
    if (0.0..360.0).contains(&degrees) {
        Ok(())
    } else {
        Err(MountError::invalid_value(format!("azimuth {degrees} is outside 0..360")))
    }
}

fn validate_altitude(degrees: f64) -> MountResult<()> {
    check_range("altitude", degrees, -90.0..=90.0)
}
