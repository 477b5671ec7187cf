//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "LX90_MOUNT";

/// Config file name in the working directory
const LOCAL_CONFIG_FILE: &str = "lx90-mount.toml";

/// Config file name inside the platform config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "LX90_MOUNT_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `LX90_MOUNT_CONFIG` environment variable (explicit path)
    /// 2. `./lx90-mount.toml` (current directory)
    /// 3. `<platform config dir>/lx90-mount/config.toml`
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables then override individual values, and the result
    /// is validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file, no overrides).
    pub fn with_defaults() -> Self {
        Self {
            config_path: None,
            config: Config::default(),
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to the file it was loaded from.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or(ConfigError::NoPath)?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        self.config.validate()?;
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|p| p.exists())
}

/// Platform config directory for the driver.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "lx90-mount").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

fn env_var(section: &str, key: &str) -> String {
    format!(
        "{}_{}_{}",
        ENV_PREFIX,
        section.to_ascii_uppercase(),
        key.to_ascii_uppercase()
    )
}

/// Overwrite `target` from `LX90_MOUNT_<SECTION>_<KEY>` when set.
fn override_value<T>(section: &str, key: &str, target: &mut T) -> ConfigResult<()>
where
    T: FromStr,
    T::Err: Display,
{
    let var = env_var(section, key);
    if let Ok(val) = std::env::var(&var) {
        *target = val
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::env_override(&var, e.to_string()))?;
    }
    Ok(())
}

fn override_flag(section: &str, key: &str, target: &mut bool) -> ConfigResult<()> {
    let var = env_var(section, key);
    if let Ok(val) = std::env::var(&var) {
        *target = match val.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => return Err(ConfigError::env_override(var, "expected true or false")),
        };
    }
    Ok(())
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `LX90_MOUNT_<SECTION>_<KEY>`
/// For example:
/// - `LX90_MOUNT_SERIAL_PORT=/dev/ttyUSB0`
/// - `LX90_MOUNT_GUIDING_ALGORITHM=move_axis`
/// - `LX90_MOUNT_GUIDING_COEFFICIENT=1.75`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    override_value("serial", "port", &mut config.serial.port)?;
    override_value("serial", "baud_rate", &mut config.serial.baud_rate)?;
    override_value("serial", "timeout_ms", &mut config.serial.timeout_ms)?;
    override_value("serial", "priming_jog_ms", &mut config.serial.priming_jog_ms)?;

    override_value("guiding", "algorithm", &mut config.guiding.algorithm)?;
    override_value("guiding", "guide_rate", &mut config.guiding.guide_rate)?;
    override_value("guiding", "slow_direction", &mut config.guiding.slow_direction)?;
    override_value("guiding", "coefficient", &mut config.guiding.coefficient)?;

    override_flag("axes", "has_custom_rates", &mut config.axes.has_custom_rates)?;
    override_flag("axes", "reverse_primary", &mut config.axes.reverse_primary)?;
    override_flag("axes", "reverse_secondary", &mut config.axes.reverse_secondary)?;

    override_value("positions", "max_read_retries", &mut config.positions.max_read_retries)?;
    override_value("positions", "slew_poll_ms", &mut config.positions.slew_poll_ms)?;

    override_value("site", "elevation_m", &mut config.site.elevation_m)?;
    override_value("site", "focal_length_mm", &mut config.site.focal_length_mm)?;
    override_value("site", "aperture_mm", &mut config.site.aperture_mm)?;
    override_value(
        "site",
        "secondary_diameter_mm",
        &mut config.site.secondary_diameter_mm,
    )?;

    override_value("logging", "level", &mut config.logging.level)?;
    override_flag("logging", "verbose", &mut config.logging.verbose)?;
    override_value("logging", "format", &mut config.logging.format)?;
    if let Ok(val) = std::env::var(env_var("logging", "file")) {
        config.logging.file = (!val.trim().is_empty()).then(|| PathBuf::from(val));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guide::GuideAlgorithm;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.port, "COM1");
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("LX90_MOUNT_SERIAL_PORT", "/dev/ttyS9");
        env::set_var("LX90_MOUNT_GUIDING_ALGORITHM", "move_axis");
        env::set_var("LX90_MOUNT_AXES_HAS_CUSTOM_RATES", "no");

        let mut config = Config::default();
        let result = apply_env_overrides(&mut config);

        env::remove_var("LX90_MOUNT_SERIAL_PORT");
        env::remove_var("LX90_MOUNT_GUIDING_ALGORITHM");
        env::remove_var("LX90_MOUNT_AXES_HAS_CUSTOM_RATES");

        result.unwrap();
        assert_eq!(config.serial.port, "/dev/ttyS9");
        assert_eq!(config.guiding.algorithm, GuideAlgorithm::MoveAxis);
        assert!(!config.axes.has_custom_rates);
    }

    #[test]
    #[serial]
    fn test_bad_env_value_is_reported() {
        env::set_var("LX90_MOUNT_GUIDING_COEFFICIENT", "fast");

        let mut config = Config::default();
        let result = apply_env_overrides(&mut config);

        env::remove_var("LX90_MOUNT_GUIDING_COEFFICIENT");

        match result {
            Err(ConfigError::EnvOverride { var, .. }) => {
                assert_eq!(var, "LX90_MOUNT_GUIDING_COEFFICIENT")
            }
            other => panic!("expected env parse error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lx90.toml");

        let mut loader = ConfigLoader::with_defaults();
        loader.config_mut().guiding.coefficient = 1.25;
        loader.config_mut().serial.port = "/dev/ttyUSB1".to_string();
        loader.save_to(&path).unwrap();

        let reloaded = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(reloaded.config(), loader.config());
        assert_eq!(reloaded.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    #[serial]
    fn test_load_from_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[guiding]\nguide_rate = 2.5\n").unwrap();

        assert!(matches!(
            ConfigLoader::load_from(&path),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
