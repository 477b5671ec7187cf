//! Configuration for the mount driver.
//!
//! This module provides TOML-based configuration with environment variable
//! overrides. It stands in for the named options a setup dialog would persist:
//! serial port, guide algorithm and coefficient, axis reversal flags and
//! custom-rate availability.
//!
//! # Configuration Resolution
//!
//! 1. `LX90_MOUNT_CONFIG` environment variable (explicit path)
//! 2. `./lx90-mount.toml` (current directory)
//! 3. `<platform config dir>/lx90-mount/config.toml`
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `LX90_MOUNT_<SECTION>_<KEY>`, e.g.
//! `LX90_MOUNT_SERIAL_PORT=/dev/ttyUSB0` or `LX90_MOUNT_GUIDING_COEFFICIENT=1.75`.
//!
//! # Example
//!
//! ```rust,no_run
//! use lx90_mount::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! println!("Mount port: {}", loader.config().serial.port);
//! # Ok::<(), lx90_mount::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    AxesConfig, Config, GuidingConfig, LogFormat, LoggingConfig, PositionsConfig, SerialConfig,
    SiteConfig,
};
