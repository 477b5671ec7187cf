use crate::port::PortError;
use thiserror::Error;

/// Convenient Result type for mount operations.
pub type MountResult<T> = Result<T, MountError>;

/// Errors surfaced to callers of the mount driver.
#[derive(Debug, Error)]
pub enum MountError {
    /// The operation requires a connected mount.
    #[error("Mount is not connected: {0}")]
    NotConnected(String),

    /// The operation requires an unparked mount.
    #[error("Mount is parked; power cycle the mount and reconnect")]
    Parked,

    /// An argument is out of domain, or the mount rejected a value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The mount answered with something that could not be parsed.
    #[error("Malformed reply from mount: {0}")]
    ProtocolFault(String),

    /// The hardware generation does not support the capability.
    #[error("Not supported by this mount: {0}")]
    Unsupported(String),

    /// A serial port error occurred.
    #[error("Serial port error: {0}")]
    Port(#[from] PortError),

    /// The work serializer has shut down or dropped the request.
    #[error("Mount worker is no longer running")]
    WorkerStopped,

    /// The worker thread could not be started.
    #[error("Failed to start mount worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

impl MountError {
    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::NotConnected(message.into())
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolFault(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// A dropped or garbled reply; position reads retry on these.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ProtocolFault(_) => true,
            Self::Port(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transient_classification() {
        assert!(MountError::protocol("short reply").is_transient());
        assert!(MountError::from(PortError::timeout(Duration::from_millis(10))).is_transient());
        assert!(!MountError::from(PortError::not_found("COM7")).is_transient());
        assert!(!MountError::invalid_value("RA").is_transient());
        assert!(!MountError::Parked.is_transient());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            MountError::not_connected("RightAscension").to_string(),
            "Mount is not connected: RightAscension"
        );
        assert_eq!(
            MountError::invalid_value("Mount rejected RA 25").to_string(),
            "Invalid value: Mount rejected RA 25"
        );
        assert_eq!(
            MountError::unsupported("SlewToCoordinates").to_string(),
            "Not supported by this mount: SlewToCoordinates"
        );
    }
}
