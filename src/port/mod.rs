//! Serial port seam.
//!
//! The transport talks to a `SerialPortAdapter`; connect obtains one through a
//! `PortOpener`, which is either the real device or a scripted mock.

pub mod error;
pub mod mock;
pub mod native;
pub mod traits;

pub use error::PortError;
pub use mock::MockSerialPort;
pub use native::NativePort;
pub use traits::*;
