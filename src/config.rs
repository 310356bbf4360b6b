use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::madlib::SimulatorConfig;
use crate::types::Axis;

/// Upper bound on settle retries, whatever the configuration asks for.
pub const MAX_SETTLE_ATTEMPTS: u32 = 10;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    pub stage: StageConfig,
    pub motion: MotionConfig,
    pub logging: LoggingConfig,
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StageConfig {
    /// Use the library's init-or-reuse call instead of strict init.
    pub reuse_existing_handle: bool,
    pub axes: AxesConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AxesConfig {
    pub x: AxisConfig,
    pub y: AxisConfig,
    pub z: AxisConfig,
}

/// Empirical per-axis corrections for one deployment.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct AxisConfig {
    /// Added to every commanded position before validation and transmission.
    pub offset_um: f64,
    /// Accepted deviation between target and measurement when settling.
    pub tolerance_um: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotionConfig {
    /// Retries after the first command before a settle gives up. Values
    /// above [`MAX_SETTLE_ATTEMPTS`] are capped.
    pub max_settle_attempts: u32,
    pub retry_interval_ms: u64,
    /// Delay between consecutive samples of an averaged read.
    pub sample_interval_ms: u64,
    /// Samples blended into the first reading of a verified move.
    pub verify_samples: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            reuse_existing_handle: true,
            axes: AxesConfig::default(),
        }
    }
}

impl AxesConfig {
    pub fn get(&self, axis: Axis) -> &AxisConfig {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            offset_um: 0.0,
            tolerance_um: 0.1,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_settle_attempts: MAX_SETTLE_ATTEMPTS,
            retry_interval_ms: 10,
            sample_interval_ms: 1,
            verify_samples: 1,
        }
    }
}

impl MotionConfig {
    /// Retry budget actually used by settle loops.
    pub fn settle_attempts(&self) -> u32 {
        self.max_settle_attempts.min(MAX_SETTLE_ATTEMPTS)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Load configuration from file with layered fallbacks
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else {
        for path in ["nanodrive.toml", "config.toml"] {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
                break;
            }
        }
    }

    // Environment overrides, e.g. NANODRIVE__STAGE__AXES__X__OFFSET_UM=0.06
    builder = builder.add_source(
        Environment::with_prefix("NANODRIVE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize::<AppConfig>()
}

/// Load configuration with better error handling and defaults
pub fn load_config_or_default(config_path: Option<&Path>) -> AppConfig {
    match load_config(config_path) {
        Ok(config) => {
            log::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert!(config.stage.reuse_existing_handle);
        assert_eq!(config.motion.max_settle_attempts, 10);
        assert_eq!(config.motion.retry_interval(), Duration::from_millis(10));
        assert_eq!(config.stage.axes.get(Axis::Z).tolerance_um, 0.1);
    }

    #[test]
    fn test_file_overrides_per_axis_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[stage]
reuse_existing_handle = false

[stage.axes.x]
offset_um = 0.06
tolerance_um = 0.0125

[motion]
max_settle_attempts = 4
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert!(!config.stage.reuse_existing_handle);
        assert_eq!(config.stage.axes.x.offset_um, 0.06);
        assert_eq!(config.stage.axes.x.tolerance_um, 0.0125);
        assert_eq!(config.stage.axes.y, AxisConfig::default());
        assert_eq!(config.motion.max_settle_attempts, 4);
        assert_eq!(config.motion.retry_interval_ms, 10);
    }

    #[test]
    fn test_settle_attempts_are_capped() {
        let mut motion = MotionConfig {
            max_settle_attempts: 50,
            ..Default::default()
        };
        assert_eq!(motion.settle_attempts(), MAX_SETTLE_ATTEMPTS);
        motion.max_settle_attempts = 3;
        assert_eq!(motion.settle_attempts(), 3);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_config(Some(Path::new("/definitely/not/here.toml")));
        assert!(result.is_err());
        let fallback = load_config_or_default(Some(Path::new("/definitely/not/here.toml")));
        assert_eq!(fallback.logging.log_level, "info");
    }
}
