//! The handbox on a real serial device, through the `serialport` crate.

use super::error::PortError;
use super::traits::{PortConfiguration, SerialPortAdapter};
use std::io::{Read, Write};

/// An open serial device. The #497 link is always 8N1 without flow control.
pub struct NativePort {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl NativePort {
    /// Open `port_name` with the handbox line settings.
    ///
    /// # Example
    /// ```no_run
    /// use lx90_mount::port::{NativePort, PortConfiguration};
    ///
    /// let port = NativePort::open("/dev/ttyUSB0", &PortConfiguration::default())?;
    /// # Ok::<(), lx90_mount::PortError>(())
    /// ```
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }
}

impl SerialPortAdapter for NativePort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        Ok(self.port.read(buffer)?)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        Ok(self.port.clear(serialport::ClearBuffer::Input)?)
    }
}

impl std::fmt::Debug for NativePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativePort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate())
            .finish()
    }
}
