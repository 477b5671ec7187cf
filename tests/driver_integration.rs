//! End-to-end driver tests against a scripted mock handbox.
//!
//! Each test drives `MountDriver` exactly as an application would and checks
//! both the resulting state and the exact command sequence on the wire.

mod common;

use common::*;
use lx90_mount::guide::GuideAlgorithm;
use lx90_mount::port::{PortError, SerialPortAdapter};
use lx90_mount::rates::{SIDEREAL, SLEW_HALF_DEGREE};
use lx90_mount::{
    AxisRole, GuideDirection, MountDriver, MountError, StateSummary, TrackingMode,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;

const SIDEREAL_TRACKING: StateSummary = StateSummary::Tracking {
    mode: TrackingMode::Sidereal,
};

fn slots(driver: &MountDriver) -> (StateSummary, StateSummary) {
    let status = driver.status().unwrap();
    (status.primary, status.secondary)
}

// ========== Connect / Disconnect / Park ==========

#[test]
fn test_connect_at_sixty_hertz_tracks_sidereal() {
    let mock = mock_mount("60.0#");
    let driver = driver_for(&mock, test_config());

    driver.connect(MOCK_PORT).unwrap();

    assert_eq!(slots(&driver), (SIDEREAL_TRACKING, StateSummary::Quiet));
    assert!(driver.is_tracking().unwrap());
    assert_eq!(
        mock.commands(),
        vec![":Me#", ":Qe#", ":Mw#", ":Qw#", ":Q#", ":GT#"]
    );
}

#[test]
fn test_unrecognized_tracking_rate_leaves_driver_disconnected() {
    let mock = mock_mount("75.0#");
    let driver = driver_for(&mock, test_config());

    let result = driver.connect(MOCK_PORT);

    assert!(matches!(result, Err(MountError::InvalidValue(_))));
    assert!(!driver.is_connected().unwrap());
    assert_eq!(slots(&driver), (StateSummary::Disconnected, StateSummary::Disconnected));
    assert!(matches!(
        driver.abort_slew(),
        Err(MountError::NotConnected(_))
    ));
}

#[test]
fn test_port_open_failure_is_reported() {
    let opener = |name: &str| -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Err(PortError::not_found(name))
    };
    let driver = MountDriver::with_opener(test_config(), Box::new(opener)).unwrap();

    let result = driver.connect("/dev/ttyMISSING");

    assert!(matches!(result, Err(MountError::Port(PortError::NotFound(_)))));
    assert!(!driver.is_connected().unwrap());
}

#[test]
fn test_park_then_operations_report_parked() {
    let (driver, mock) = connected_driver(test_config());

    driver.park().unwrap();

    assert_eq!(mock.commands(), vec![":hP#"]);
    assert!(driver.is_parked().unwrap());
    assert!(!driver.is_connected().unwrap());
    assert!(matches!(
        driver.pulse_guide(GuideDirection::East, 100),
        Err(MountError::Parked)
    ));    assert!(matches!(driver.park(), Err(MountError::Parked)));
}

#[test]
fn test_park_aborts_motion_first() {
    let (driver, mock) = connected_driver(test_config());
    driver.move_axis(AxisRole::Secondary, 3.0).unwrap();

    driver.park().unwrap();

    assert_eq!(
        mock.commands(),
        vec![":RM#", ":Mn#", ":Qn#", ":Qn#", ":Qs#", ":hP#"]
    );
}

// ========== Move Axis ==========

#[test]
fn test_move_then_stop_returns_to_tracking() {
    let (driver, mock) = connected_driver(test_config());

    driver.move_axis(AxisRole::Primary, SIDEREAL).unwrap();
    assert_eq!(
        slots(&driver).0,
        StateSummary::Slewing {
            direction: GuideDirection::West
        }
    );
    driver.move_axis(AxisRole::Primary, 0.0).unwrap();

    assert_eq!(mock.commands(), vec![":RG#", ":Mw#", ":Qw#", ":TQ#"]);
    assert_eq!(slots(&driver), (SIDEREAL_TRACKING, StateSummary::Quiet));
}

#[test]
fn test_repeated_rate_is_not_reissued() {
    let (driver, mock) = connected_driver(test_config());

    driver.move_axis(AxisRole::Primary, SLEW_HALF_DEGREE).unwrap();
    driver.stop_move_axis(AxisRole::Primary).unwrap();
    driver.move_axis(AxisRole::Primary, SLEW_HALF_DEGREE).unwrap();

    assert_eq!(
        mock.commands(),
        vec![":RA-0.5#", ":Mw#", ":Qw#", ":TQ#", ":Mw#"]
    );
}

#[test]
fn test_both_axes_can_move_independently() {
    let (driver, mock) = connected_driver(test_config());

    driver.move_axis(AxisRole::Primary, -3.0).unwrap();
    driver.move_axis(AxisRole::Secondary, 1.5).unwrap();
    driver.abort_slew().unwrap();

    assert_eq!(
        mock.commands(),
        vec![":RM#", ":Me#", ":RE-1.5#", ":Mn#", ":Qn#", ":Qn#", ":Qs#", ":Qe#", ":TQ#"]
    );
    assert!(!driver.is_slewing().unwrap());
}

// ========== Pulse Guide ==========

#[test]
fn test_slow_direction_coefficient_lengthens_guide() {
    let mut config = test_config();
    config.guiding.coefficient = 1.75;
    config.guiding.slow_direction = GuideDirection::East;
    let (driver, mock) = connected_driver(config);

    driver.pulse_guide(GuideDirection::East, 1000).unwrap();
    driver.abort_slew().unwrap();
    driver.pulse_guide(GuideDirection::West, 1000).unwrap();

    let commands = mock.commands();
    assert_eq!(commands[0], ":Mge1750#");
    assert_eq!(commands.last().map(String::as_str), Some(":Mgw1000#"));
}

#[test]
fn test_reguide_on_same_axis_stops_previous_guide() {
    let (driver, mock) = connected_driver(test_config());

    driver.pulse_guide(GuideDirection::North, 5000).unwrap();
    driver.pulse_guide(GuideDirection::North, 200).unwrap();

    assert_eq!(
        mock.commands(),
        vec![":Mgn5000#", ":Qn#", ":Qn#", ":Qs#", ":Mgn0200#"]
    );
    wait_until(|| !driver.is_pulse_guiding().unwrap());
    assert_eq!(slots(&driver).1, StateSummary::Quiet);
}

#[test]
fn test_concurrent_guides_are_strictly_ordered() {
    let (driver, mock) = connected_driver(test_config());
    let driver = Arc::new(driver);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let driver = Arc::clone(&driver);
            thread::spawn(move || driver.pulse_guide(GuideDirection::North, 1000))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let mut expected = vec![":Mgn1000#".to_string()];
    for _ in 0..7 {
        expected.extend([":Qn#", ":Qn#", ":Qs#", ":Mgn1000#"].map(String::from));
    }
    assert_eq!(mock.commands(), expected);
}

#[test]
fn test_guides_on_both_axes_run_together() {
    let (driver, mock) = connected_driver(test_config());

    driver.pulse_guide(GuideDirection::East, 200).unwrap();
    driver.pulse_guide(GuideDirection::South, 200).unwrap();
    assert!(driver.is_pulse_guiding().unwrap());

    wait_until(|| !driver.is_pulse_guiding().unwrap());
    let commands = mock.commands();
    assert_eq!(&commands[..2], &[":Mge0200#", ":Mgs0200#"]);
    assert_eq!(mock.count(":TQ#"), 1);
    assert_eq!(mock.count(":Qs#"), 1);
    assert_eq!(slots(&driver), (SIDEREAL_TRACKING, StateSummary::Quiet));
}

#[test]
fn test_custom_rate_guide_stops_explicitly() {
    let mut config = test_config();
    config.guiding.algorithm = GuideAlgorithm::CustomRate;
    config.guiding.guide_rate = 0.5;
    let (driver, mock) = connected_driver(config);

    driver.pulse_guide(GuideDirection::West, 10).unwrap();
    wait_until(|| !driver.is_pulse_guiding().unwrap());

    assert_eq!(
        mock.commands(),
        vec![":RA-0.00209#", ":Mw#", ":Qw#", ":TQ#"]
    );
}

#[test]
fn test_move_axis_guide_scales_duration_by_guide_rate() {
    let mut config = test_config();
    config.guiding.algorithm = GuideAlgorithm::MoveAxis;
    config.guiding.guide_rate = 0.5;
    let (driver, mock) = connected_driver(config);

    driver.pulse_guide(GuideDirection::East, 4000).unwrap();
    let status = driver.status().unwrap();
    driver.abort_slew().unwrap();

    assert_eq!(
        status.primary,
        StateSummary::PulseGuiding {
            direction: GuideDirection::East,
            duration_ms: 2000
        }
    );
    assert_eq!(mock.commands(), vec![":RG#", ":Me#", ":Qe#", ":TQ#"]);
}

#[test]
fn test_custom_rate_guide_falls_back_without_custom_rates() {
    let mut config = test_config();
    config.guiding.algorithm = GuideAlgorithm::CustomRate;
    config.axes.has_custom_rates = false;
    let (driver, mock) = connected_driver(config);

    driver.pulse_guide(GuideDirection::South, 300).unwrap();

    assert_eq!(mock.commands(), vec![":Mgs0300#"]);
}

// ========== Goto / Sync ==========

#[test]
fn test_goto_occupies_both_axes_until_mount_stops() {
    let (driver, mut mock) = connected_driver(test_config());
    accept_targets(&mut mock, &[":Sr05:34:30#", ":Sd+22*00:00#"]);
    mock.respond(":MS#", "0");
    mock.respond_always(":D#", "|#");

    driver.slew_to_coordinates_async(5.575, 22.0).unwrap();

    assert!(driver.is_slewing().unwrap());
    assert!(!driver.is_tracking().unwrap());
    assert!(driver.inspect(|core| core.dual_slew_shared()).unwrap());
    driver.pulse_guide(GuideDirection::North, 100).unwrap();
    assert_eq!(mock.count(":Mgn0100#"), 0);

    mock.respond_always(":D#", "#");
    wait_until(|| !driver.is_slewing().unwrap());

    assert_eq!(slots(&driver), (SIDEREAL_TRACKING, StateSummary::Quiet));
    assert_eq!(mock.count(":Q#"), 0);
}

#[test]
fn test_rejected_ra_target_raises_and_keeps_tracking() {
    let (driver, mut mock) = connected_driver(test_config());
    mock.respond(":Sr05:34:30#", "0");

    let result = driver.slew_to_coordinates_async(5.575, 22.0);

    match result {
        Err(MountError::InvalidValue(message)) => {
            assert!(message.contains("05:34:30"), "{message}")
        }
        other => panic!("expected InvalidValue, got {other:?}"),
    }
    assert_eq!(slots(&driver), (SIDEREAL_TRACKING, StateSummary::Quiet));
    assert!(!driver.is_slewing().unwrap());
}

#[test]
fn test_failed_goto_start_reports_mount_text() {
    let (driver, mut mock) = connected_driver(test_config());
    accept_targets(&mut mock, &[":Sr05:34:30#", ":Sd+22*00:00#"]);
    mock.respond(":MS#", "1Object below horizon#");

    let result = driver.slew_to_coordinates_async(5.575, 22.0);

    assert!(matches!(
        result,
        Err(MountError::InvalidValue(ref message)) if message.contains("below horizon")
    ));
    assert_eq!(slots(&driver), (SIDEREAL_TRACKING, StateSummary::Quiet));
}

#[test]
fn test_altaz_goto_failure_flag() {
    let (driver, mut mock) = connected_driver(test_config());
    accept_targets(&mut mock, &[":Sz090*00#", ":Sa+30*00#"]);
    mock.respond(":MA#", "1");

    let result = driver.slew_to_altaz_async(90.0, 30.0);

    assert!(matches!(result, Err(MountError::InvalidValue(_))));
    assert!(!driver.is_slewing().unwrap());
}

#[test]
fn test_abort_during_goto_resumes_both_axes() {
    let (driver, mut mock) = connected_driver(test_config());
    accept_targets(&mut mock, &[":Sz090*00#", ":Sa+30*00#"]);
    mock.respond(":MA#", "0");
    mock.respond_always(":D#", "|#");
    driver.slew_to_altaz_async(90.0, 30.0).unwrap();
    mock.clear_write_log();

    driver.abort_slew().unwrap();

    let commands: Vec<String> = mock
        .commands()
        .into_iter()
        .filter(|c| c != ":D#")
        .collect();
    assert_eq!(commands, vec![":Q#", ":Qn#", ":Qs#", ":TQ#"]);
    assert_eq!(slots(&driver), (SIDEREAL_TRACKING, StateSummary::Quiet));
}

#[test]
fn test_abort_with_nothing_moving_issues_no_commands() {
    let (driver, mock) = connected_driver(test_config());

    driver.abort_slew().unwrap();
    driver.abort_slew().unwrap();

    assert_eq!(mock.commands().len(), 0);
    assert_eq!(slots(&driver), (SIDEREAL_TRACKING, StateSummary::Quiet));
}

#[test]
fn test_sync_to_coordinates() {
    let (driver, mut mock) = connected_driver(test_config());
    accept_targets(&mut mock, &[":Sr12:00.0#", ":Sd-05*30:00#"]);
    mock.respond(":CM#", "Coordinates matched.        #");

    driver.sync_to_coordinates(12.0, -5.5).unwrap();

    assert_eq!(mock.commands(), vec![":Sr12:00.0#", ":Sd-05*30:00#", ":CM#"]);
}

// ========== Readout ==========

#[test]
fn test_position_snapshot() {
    let (driver, mut mock) = connected_driver(test_config());
    mock.respond(":GR#", "05:34:32#");
    mock.respond(":GD#", "+22*00'52#");
    mock.respond(":GA#", "+45*10#");
    mock.respond(":GZ#", "180*00#");
    mock.respond(":GS#", "06:00:00#");

    let position = driver.position().unwrap();

    assert!((position.right_ascension - (5.0 + 34.0 / 60.0 + 32.0 / 3600.0)).abs() < 1e-9);
    assert!((position.declination - (22.0 + 52.0 / 3600.0)).abs() < 1e-9);
    assert!((position.altitude - (45.0 + 10.0 / 60.0)).abs() < 1e-9);
    assert_eq!(position.azimuth, 180.0);
    assert_eq!(position.sidereal_time, 6.0);
}

#[test]
fn test_truncated_ra_reply_is_retried() {
    let (driver, mut mock) = connected_driver(test_config());
    mock.respond(":GR#", "05:3");
    mock.respond(":GR#", "05:34:32#");

    let ra = driver.right_ascension().unwrap();

    assert!((ra - 5.575_555_555).abs() < 1e-6);
    assert_eq!(mock.count(":GR#"), 2);
}

#[test]
fn test_tracking_mode_switch() {
    let (driver, mock) = connected_driver(test_config());

    driver.set_tracking_mode(TrackingMode::Lunar).unwrap();

    assert_eq!(driver.tracking_mode().unwrap(), Some(TrackingMode::Lunar));
    assert_eq!(mock.commands(), vec![":TL#"]);
}
