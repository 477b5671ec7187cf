//! Port-specific error types.
//!
//! Kept separate from the mount error taxonomy so the transport can be
//! exercised and tested without any knowledge of the state machine.

use std::time::Duration;
use thiserror::Error;

/// Failures below the protocol: opening, reading and writing the device.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Serial port not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device refused the line settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No reply within the port timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout(duration)
    }

    /// True when the mount simply did not answer in time.
    ///
    /// Native ports report `TimedOut`; the mock port reports `WouldBlock`
    /// when its read queue is empty.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB0");

        let err = PortError::config("Invalid baud rate");
        assert_eq!(err.to_string(), "Configuration error: Invalid baud rate");

    }

    #[test]
    fn test_timeout_classification() {
        assert!(PortError::timeout(Duration::from_millis(500)).is_timeout());
        assert!(PortError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut)).is_timeout());
        assert!(PortError::Io(std::io::Error::from(std::io::ErrorKind::WouldBlock)).is_timeout());
        assert!(!PortError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).is_timeout());
        assert!(!PortError::config("bad baud").is_timeout());
    }
}
