//! Runtime settings
//!
//! The mapping table itself lives in [`crate::mapping::profile`]; this file
//! only carries the knobs around it. Settings come from the TOML file named
//! by `PADMAP_CONFIG`, else `<config_dir>/padmap/config.toml`, else defaults.

use crate::controller::{BoardSettings, DeviceSettings};
use crate::output::PointerSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CONFIG_ENV: &str = "PADMAP_CONFIG";
const CONFIG_DIR: &str = "padmap";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub gamepad: GamepadConfig,
    pub board: BoardConfig,
    pub pointers: PointerConfig,
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GamepadConfig {
    pub enabled: bool,
    pub poll_interval_ms: u64,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 2,
        }
    }
}

impl GamepadConfig {
    pub fn device_settings(&self) -> DeviceSettings {
        DeviceSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..DeviceSettings::default()
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BoardConfig {
    pub enabled: bool,
    /// Serial device path; the first USB serial port when unset
    pub port: Option<String>,
    pub baud_rate: u32,
    pub poll_interval_ms: u64,
    pub retry_interval_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: None,
            baud_rate: 57_600,
            poll_interval_ms: 2,
            retry_interval_ms: 1000,
        }
    }
}

impl BoardConfig {
    pub fn device_settings(&self) -> DeviceSettings {
        DeviceSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..DeviceSettings::default()
        }
    }

    pub fn board_settings(&self) -> BoardSettings {
        BoardSettings {
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            ..BoardSettings::default()
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PointerConfig {
    pub standard: PointerSettings,
    pub fast: PointerSettings,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            standard: PointerSettings::standard(),
            fast: PointerSettings::fast(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Log actions instead of creating a uinput device
    pub dry_run: bool,
}

impl Settings {
    /// Loads settings from the first location that exists
    pub async fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => {
                Self::load_from(&path).await
            }
            Some(path) => {
                info!("No settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading settings from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let settings: Settings = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        debug!("Settings loaded: {:?}", settings);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gamepad.poll_interval_ms == 0 {
            return Err(invalid("gamepad.poll_interval_ms", "must be at least 1"));
        }
        if self.board.poll_interval_ms == 0 {
            return Err(invalid("board.poll_interval_ms", "must be at least 1"));
        }
        if self.board.retry_interval_ms == 0 {
            return Err(invalid("board.retry_interval_ms", "must be at least 1"));
        }
        if self.board.baud_rate == 0 {
            return Err(invalid("board.baud_rate", "must be positive"));
        }
        for (field, pointer) in [
            ("pointers.standard", &self.pointers.standard),
            ("pointers.fast", &self.pointers.fast),
        ] {
            if pointer.delay_ms == 0 {
                return Err(invalid(field, "delay_ms must be at least 1"));
            }
            if !pointer.speed_modifier.is_finite() {
                return Err(invalid(field, "speed_modifier must be finite"));
            }
        }
        Ok(())
    }
}

/// Debug logging is on when `APP_ENV=DEV`
pub fn debug_enabled() -> bool {
    std::env::var("APP_ENV").is_ok_and(|value| value == "DEV")
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
