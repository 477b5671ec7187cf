//! The port traits the transport and connect depend on.
//!
//! Connect obtains a `SerialPortAdapter` through a `PortOpener`, so the whole
//! state machine runs unchanged against the scripted mock.

use super::error::PortError;
use super::native::NativePort;
use std::time::Duration;

/// Line settings for the handbox. Framing is fixed at 8N1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfiguration {
    pub baud_rate: u32,
    /// Applies to every read and write.
    pub timeout: Duration,
}

impl PortConfiguration {
    /// 9600 baud with the given timeout.
    pub fn autostar(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            timeout: Duration::from_secs(2),
        }
    }
}

/// Byte-level access to the handbox link.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write all of `data`, returning its length.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read whatever is available into `buffer`, blocking up to the timeout.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    fn name(&self) -> &str;

    /// Discard unread input, e.g. a late reply to an abandoned query.
    fn clear_input(&mut self) -> Result<(), PortError>;
}

/// Opens the port named by the configuration when the mount connects.
pub trait PortOpener: Send {
    fn open(&self, port_name: &str) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}

impl<F> PortOpener for F
where
    F: Fn(&str) -> Result<Box<dyn SerialPortAdapter>, PortError> + Send,
{
    fn open(&self, port_name: &str) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        self(port_name)
    }
}

/// Opens real hardware through the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SystemPortOpener {
    config: PortConfiguration,
}

impl SystemPortOpener {
    pub fn new(config: PortConfiguration) -> Self {
        Self { config }
    }
}

impl PortOpener for SystemPortOpener {
    fn open(&self, port_name: &str) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let port = NativePort::open(port_name, &self.config)?;
        Ok(Box::new(port))
    }
}
