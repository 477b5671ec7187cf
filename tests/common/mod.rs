//! Shared test utilities for the mount driver integration tests.
//!
//! This module provides common test infrastructure including:
//! - A scripted mock handbox answering the connect handshake
//! - Driver builders wired to the mock instead of a real port
//! - Polling helpers for background completion

#![allow(dead_code)]

use lx90_mount::config::Config;
use lx90_mount::port::{MockSerialPort, PortError, SerialPortAdapter};
use lx90_mount::MountDriver;
use std::thread;
use std::time::{Duration, Instant};

pub const MOCK_PORT: &str = "MOCK0";

/// Create a mock handbox that reports the given `:GT#` tracking frequency.
///
/// # Example
/// ```ignore
/// let mock = mock_mount("60.0#");
/// ```
pub fn mock_mount(tracking_reply: &str) -> MockSerialPort {
    let mut mock = MockSerialPort::new(MOCK_PORT);
    mock.respond_always(":GT#", tracking_reply);
    mock
}

/// Defaults with the connect jog and goto poll shortened for tests.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.serial.priming_jog_ms = 0;
    config.positions.slew_poll_ms = 5;
    config
}

/// A driver whose every connect hands out a clone of `mock`.
pub fn driver_for(mock: &MockSerialPort, config: Config) -> MountDriver {
    let port = mock.clone();
    let opener = move |_: &str| -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(port.clone()))
    };
    MountDriver::with_opener(config, Box::new(opener)).expect("driver should start")
}

/// A connected driver with the write log cleared after the handshake.
pub fn connected_driver(config: Config) -> (MountDriver, MockSerialPort) {
    let mut mock = mock_mount("60.0#");
    let driver = driver_for(&mock, config);
    driver.connect(MOCK_PORT).expect("connect should succeed");
    mock.clear_write_log();
    (driver, mock)
}

/// Acknowledge every set-target command of a goto or sync.
pub fn accept_targets(mock: &mut MockSerialPort, commands: &[&str]) {
    for command in commands {
        mock.respond_always(command, "1");
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}
