//! LX90 Mount Library
//!
//! Control core for Meade #497 (Autostar) telescope mounts such as the LX90
//! and ETX: a per-axis state machine driven through a single-writer work
//! serializer, with background completion jobs for pulse guides and gotos.
//!
//! # Modules
//!
//! - `driver`: `MountDriver`, the thread-safe entry point
//! - `state`: Axis states and the transition table (`MountCore`)
//! - `serializer`: Single-consumer work queue
//! - `jobs`: Cancellable pulse-guide timers and goto pollers
//! - `protocol`: Wire command builders and reply parsers
//! - `transport`: Terminated and fixed-length exchanges over a serial port
//! - `port`: Port abstraction layer for serial communication
//! - `guide`: Guide directions, algorithms and duration correction
//! - `rates`: Axis rates and tracking modes
//! - `config`: Configuration management with TOML support
//! - `logging`: Tracing subscriber setup
//! - `error`: Unified error handling
//!
//! # Example
//!
//! ```rust,no_run
//! use lx90_mount::{Config, GuideDirection, MountDriver};
//!
//! let driver = MountDriver::new(Config::default())?;
//! driver.connect("/dev/ttyUSB0")?;
//! driver.pulse_guide(GuideDirection::East, 500)?;
//! # Ok::<(), lx90_mount::MountError>(())
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod guide;
pub mod jobs;
pub mod logging;
pub mod port;
pub mod protocol;
pub mod rates;
pub mod serializer;
pub mod state;
pub mod transport;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigLoader};
pub use driver::{Capabilities, MountDriver, MountStatus, Optics, Position};
pub use error::{MountError, MountResult};
pub use guide::{GuideAlgorithm, GuideDirection};
pub use port::{MockSerialPort, PortConfiguration, PortError, PortOpener, SerialPortAdapter};
pub use protocol::AlignmentMode;
pub use rates::{AxisRates, Rate, TrackingMode};
pub use state::{AxisRole, StateSummary};
