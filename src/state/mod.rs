//! Per-axis mount state and the core that owns it.
//!
//! `MountCore` lives on the work serializer's thread and is the only place
//! mount state is read or written. It holds one `MountState` per axis slot;
//! a goto occupies both slots with the same `Arc<DualSlew>`.
//!
//! Transitions are split across this module (connection lifecycle and
//! queries), `transitions` (motion) and `readout` (position, site and time).

mod readout;
mod transitions;

use crate::config::{AxesConfig, Config, GuidingConfig};
use crate::error::{MountError, MountResult};
use crate::guide::{GuideAlgorithm, GuideDirection};
use crate::jobs::PendingJob;
use crate::port::PortOpener;
use crate::protocol::{commands, replies};
use crate::rates::TrackingMode;
use crate::serializer::{WorkQueue, WorkTarget};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One of the mount's two mechanical axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisRole {
    /// RA or azimuth
    Primary,
    /// Dec or altitude
    Secondary,
}

impl AxisRole {
    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }
}

impl std::str::FromStr for AxisRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "ra" | "az" | "0" => Ok(Self::Primary),
            "secondary" | "dec" | "alt" | "1" => Ok(Self::Secondary),
            other => Err(format!("unknown axis '{other}'")),
        }
    }
}

/// The quiescent state an axis returns to when motion ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resting {
    Tracking(TrackingMode),
    Quiet,
}

impl Resting {
    pub fn state(self) -> MountState {
        match self {
            Self::Tracking(mode) => MountState::Tracking(mode),
            Self::Quiet => MountState::Quiet,
        }
    }
}

/// A single-axis `MoveAxis` in progress.
#[derive(Debug)]
pub struct AxisSlew {
    pub axis: AxisRole,
    pub direction: GuideDirection,
    pub restore: Resting,
}

/// A timed guide correction in progress.
#[derive(Debug)]
pub struct AxisGuide {
    pub direction: GuideDirection,
    pub duration_ms: u32,
    pub algorithm: GuideAlgorithm,
    pub restore: Resting,
    job: PendingJob,
}

impl AxisGuide {
    pub fn job_id(&self) -> u64 {
        self.job.id()
    }
}

/// Where a goto is headed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum SlewTarget {
    Equatorial { ra_hours: f64, dec_degrees: f64 },
    Horizontal { azimuth: f64, altitude: f64 },
}

/// A goto moving both axes; the same instance occupies both slots.
#[derive(Debug)]
pub struct DualSlew {
    pub target: SlewTarget,
    pub saved_primary: Resting,
    pub saved_secondary: Resting,
    job: PendingJob,
}

impl DualSlew {
    pub fn job_id(&self) -> u64 {
        self.job.id()
    }
}

/// State of one axis slot.
#[derive(Debug)]
pub enum MountState {
    /// No serial link. `parked` is set after a park until the next connect.
    Disconnected { parked: bool },
    /// Primary axis under hardware tracking.
    Tracking(TrackingMode),
    /// Secondary axis at rest.
    Quiet,
    /// Single-axis move at a commanded rate.
    Slewing(AxisSlew),
    /// Goto in progress on both axes.
    DualSlewing(Arc<DualSlew>),
    /// Timed guide correction.
    PulseGuiding(AxisGuide),
}

impl MountState {
    pub fn is_slewing(&self) -> bool {
        matches!(self, Self::Slewing(_) | Self::DualSlewing(_))
    }

    pub fn is_single_axis_slew(&self) -> bool {
        matches!(self, Self::Slewing(_))
    }

    pub fn is_pulse_guiding(&self) -> bool {
        matches!(self, Self::PulseGuiding(_))
    }

    /// The quiescent state this slot is in, if it is not moving.
    pub fn resting(&self) -> Option<Resting> {
        match self {
            Self::Tracking(mode) => Some(Resting::Tracking(*mode)),
            Self::Quiet => Some(Resting::Quiet),
            _ => None,
        }
    }

    pub fn summary(&self) -> StateSummary {
        match self {
            Self::Disconnected { parked: false } => StateSummary::Disconnected,
            Self::Disconnected { parked: true } => StateSummary::Parked,
            Self::Tracking(mode) => StateSummary::Tracking { mode: *mode },
            Self::Quiet => StateSummary::Quiet,
            Self::Slewing(slew) => StateSummary::Slewing {
                direction: slew.direction,
            },
            Self::DualSlewing(dual) => StateSummary::DualSlewing {
                target: dual.target,
            },
            Self::PulseGuiding(guide) => StateSummary::PulseGuiding {
                direction: guide.direction,
                duration_ms: guide.duration_ms,
            },
        }
    }
}

/// Copyable view of a slot for callers outside the worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StateSummary {
    Disconnected,
    Parked,
    Tracking { mode: TrackingMode },
    Quiet,
    Slewing { direction: GuideDirection },
    DualSlewing { target: SlewTarget },
    PulseGuiding { direction: GuideDirection, duration_ms: u32 },
}

/// Runtime settings the core reads on every operation.
#[derive(Debug, Clone)]
pub struct MountSettings {
    pub priming_jog: Duration,
    pub guiding: GuidingConfig,
    pub axes: AxesConfig,
    pub max_read_retries: u32,
    pub slew_poll_interval: Duration,
    pub verbose: bool,
}

impl MountSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            priming_jog: config.serial.priming_jog(),
            guiding: config.guiding.clone(),
            axes: config.axes.clone(),
            max_read_retries: config.positions.max_read_retries,
            slew_poll_interval: config.positions.slew_poll_interval(),
            verbose: config.logging.verbose,
        }
    }
}

impl Default for MountSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Owner of the serial link and both axis slots.
pub struct MountCore {
    settings: MountSettings,
    opener: Box<dyn PortOpener>,
    transport: Option<Transport>,
    primary: MountState,
    secondary: MountState,
    /// Last rate-select command in effect per axis.
    last_rate: [Option<String>; 2],
    queue: WorkQueue<MountCore>,
    next_job_id: u64,
    last_sidereal_time: f64,
}

impl std::fmt::Debug for MountCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountCore")
            .field("primary", &self.primary.summary())
            .field("secondary", &self.secondary.summary())
            .field("connected", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

impl WorkTarget for MountCore {
    fn recover(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.flush_input();
        }
    }
}

impl MountCore {
    pub fn new(
        settings: MountSettings,
        opener: Box<dyn PortOpener>,
        queue: WorkQueue<MountCore>,
    ) -> Self {
        Self {
            settings,
            opener,
            transport: None,
            primary: MountState::Disconnected { parked: false },
            secondary: MountState::Disconnected { parked: false },
            last_rate: [None, None],
            queue,
            next_job_id: 1,
            last_sidereal_time: 0.0,
        }
    }

    pub fn settings(&self) -> &MountSettings {
        &self.settings
    }

    pub fn primary(&self) -> &MountState {
        &self.primary
    }

    pub fn secondary(&self) -> &MountState {
        &self.secondary
    }

    pub fn slot(&self, axis: AxisRole) -> &MountState {
        match axis {
            AxisRole::Primary => &self.primary,
            AxisRole::Secondary => &self.secondary,
        }
    }

    fn slot_mut(&mut self, axis: AxisRole) -> &mut MountState {
        match axis {
            AxisRole::Primary => &mut self.primary,
            AxisRole::Secondary => &mut self.secondary,
        }
    }

    /// Move a slot's state out, leaving a placeholder the caller must replace.
    fn take_slot(&mut self, axis: AxisRole) -> MountState {
        std::mem::replace(self.slot_mut(axis), MountState::Disconnected { parked: false })
    }

    fn set_slot(&mut self, axis: AxisRole, state: MountState) {
        *self.slot_mut(axis) = state;
    }

    /// True when both slots hold the same goto instance.
    pub fn dual_slew_shared(&self) -> bool {
        match (&self.primary, &self.secondary) {
            (MountState::DualSlewing(a), MountState::DualSlewing(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn transport(&mut self) -> MountResult<&mut Transport> {
        self.transport
            .as_mut()
            .ok_or_else(|| MountError::not_connected("serial link is closed"))
    }

    fn send(&mut self, command: &str) -> MountResult<()> {
        self.transport()?.transmit(command)
    }

    fn next_job_id(&mut self) -> u64 {
        let id = self.next_job_id;
        self.next_job_id += 1;
        id
    }

    fn reversed(&self, axis: AxisRole) -> bool {
        match axis {
            AxisRole::Primary => self.settings.axes.reverse_primary,
            AxisRole::Secondary => self.settings.axes.reverse_secondary,
        }
    }

    /// Issue a rate-select command unless it is already in effect on `axis`.
    /// Preset rates apply to both axes; custom rates only to their own.
    fn select_rate(&mut self, axis: AxisRole, command: String) -> MountResult<()> {
        if self.last_rate[axis.index()].as_deref() == Some(command.as_str()) {
            return Ok(());
        }
        self.last_rate[axis.index()] = None;
        self.send(&command)?;
        if command.starts_with(":RA") || command.starts_with(":RE") {
            self.last_rate[axis.index()] = Some(command);
        } else {
            self.last_rate = [Some(command.clone()), Some(command)];
        }
        Ok(())
    }

    /// Put `axis` back into `rest` and tell the mount to resume it.
    fn resume(&mut self, axis: AxisRole, rest: Resting) -> MountResult<()> {
        self.set_slot(axis, rest.state());
        match rest {
            Resting::Tracking(mode) => self.send(tracking_command(mode)),
            Resting::Quiet => {
                self.send(&commands::stop_direction(GuideDirection::North))?;
                self.send(&commands::stop_direction(GuideDirection::South))
            }
        }
    }

    fn note(&self, what: &str, value: impl std::fmt::Display) {
        if self.settings.verbose {
            debug!(tag = what, "{}", value);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn is_parked(&self) -> bool {
        matches!(self.primary, MountState::Disconnected { parked: true })
    }

    pub fn is_slewing(&self) -> bool {
        self.primary.is_slewing() || self.secondary.is_slewing()
    }

    pub fn is_pulse_guiding(&self) -> bool {
        self.primary.is_pulse_guiding() || self.secondary.is_pulse_guiding()
    }

    /// Tracking with neither axis moving.
    pub fn is_tracking(&self) -> bool {
        matches!(
            (&self.primary, &self.secondary),
            (MountState::Tracking(_), MountState::Quiet)
        )
    }

    /// The tracking rate in effect, or the one motion will return to.
    pub fn tracking_mode(&self) -> Option<TrackingMode> {
        let rest = match &self.primary {
            MountState::Tracking(mode) => return Some(*mode),
            MountState::Slewing(slew) => slew.restore,
            MountState::PulseGuiding(guide) => guide.restore,
            MountState::DualSlewing(dual) => dual.saved_primary,
            MountState::Quiet | MountState::Disconnected { .. } => return None,
        };
        match rest {
            Resting::Tracking(mode) => Some(mode),
            Resting::Quiet => None,
        }
    }

    /// Open the link, prime the firmware and classify the tracking rate.
    ///
    /// On failure the link is closed again and both slots are left as they
    /// were.
    pub fn connect(&mut self, port_name: &str) -> MountResult<()> {
        if self.is_connected() {
            debug!(tag = "Connect", "already connected");
            return Ok(());
        }

        info!(tag = "Connect", "opening {}", port_name);
        let port = self.opener.open(port_name)?;
        self.transport = Some(Transport::new(port));
        self.last_rate = [None, None];

        match self.establish() {
            Ok(mode) => {
                self.primary = MountState::Tracking(mode);
                self.secondary = MountState::Quiet;
                info!(tag = "Connect", "connected on {}, tracking {}", port_name, mode);
                Ok(())
            }
            Err(e) => {
                warn!(tag = "Connect", "connection to {} failed: {}", port_name, e);
                self.transport = None;
                Err(e)
            }
        }
    }

    fn establish(&mut self) -> MountResult<TrackingMode> {
        let jog = self.settings.priming_jog;
        let transport = self.transport()?;
        transport.flush_input();

        // The firmware ignores custom rates until a directional command has
        // been seen.
        for direction in [GuideDirection::East, GuideDirection::West] {
            transport.transmit(&commands::move_direction(direction))?;
            thread::sleep(jog);
            transport.transmit(&commands::stop_direction(direction))?;
        }

        transport.transmit(commands::STOP_ALL)?;
        let reply = transport.query(commands::GET_TRACKING_RATE)?;
        let hz = replies::parse_tracking_frequency(&reply)?;
        self.note("TrackingRate", format!("{hz} Hz"));
        TrackingMode::from_frequency(hz)
    }

    /// Stop all motion and close the link. Any pending job is cancelled.
    pub fn disconnect(&mut self) -> MountResult<()> {
        if !self.is_connected() {
            return Ok(());
        }

        self.primary = MountState::Disconnected { parked: false };
        self.secondary = MountState::Disconnected { parked: false };
        if let Err(e) = self.send(commands::STOP_ALL) {
            warn!(tag = "Disconnect", "stop before disconnect failed: {}", e);
        }
        self.transport = None;
        info!(tag = "Disconnect", "serial link closed");
        Ok(())
    }

    /// Abort all motion, park the mount and close the link.
    ///
    /// The handbox must be power cycled before the mount will move again.
    pub fn park(&mut self) -> MountResult<()> {
        if !self.is_connected() {
            return Ok(());
        }

        if let Err(e) = self.abort_slew() {
            warn!(tag = "Park", "abort before park failed: {}", e);
        }
        self.send(commands::PARK)?;

        self.transport = None;
        self.primary = MountState::Disconnected { parked: true };
        self.secondary = MountState::Disconnected { parked: true };
        info!(tag = "Park", "mount parked; power cycle the handbox to continue");
        Ok(())
    }

    /// Switch between sidereal and lunar tracking. Any motion in progress is
    /// aborted first.
    pub fn set_tracking_mode(&mut self, mode: TrackingMode) -> MountResult<()> {
        if !self.is_connected() {
            return Err(MountError::not_connected("Mount is not connected"));
        }
        if let Err(e) = self.abort_slew() {
            warn!(tag = "Tracking", "abort before rate change failed: {}", e);
        }
        self.primary = MountState::Tracking(mode);
        self.send(tracking_command(mode))
    }
}

fn tracking_command(mode: TrackingMode) -> &'static str {
    match mode {
        TrackingMode::Sidereal => commands::TRACK_SIDEREAL,
        TrackingMode::Lunar => commands::TRACK_LUNAR,
    }
}
