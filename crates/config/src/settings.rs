// Application settings
// Loaded from ~/.config/gridview/settings.toml

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::FileStore;

/// Upper bound for `mount_delay_ms`
pub const MAX_MOUNT_DELAY_MS: u64 = 5_000;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug)]
pub enum SettingsError {
    /// Reading the settings file failed
    Io(String),
    /// TOML parse / deserialization error
    Parse(String),
    /// A value is out of range
    Validation(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "settings I/O error: {msg}"),
            Self::Parse(msg) => write!(f, "settings parse error: {msg}"),
            Self::Validation(msg) => write!(f, "invalid settings: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Storage file; None = ~/.config/gridview/storage.json
    pub store_path: Option<PathBuf>,

    /// Delay before announcing a restored preset, for slow-mounting widgets
    pub mount_delay_ms: u64,

    /// Dark mode when the user never chose one explicitly
    pub prefer_dark_when_unset: bool,

    /// off | error | warn | info | debug | trace (RUST_LOG wins when set)
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: None,
            mount_delay_ms: 0,
            prefer_dark_when_unset: false,
            log_level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridview")
            .join("settings.toml")
    }

    pub fn from_toml(input: &str) -> Result<Self, SettingsError> {
        let settings: Settings =
            toml::from_str(input).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.mount_delay_ms > MAX_MOUNT_DELAY_MS {
            return Err(SettingsError::Validation(format!(
                "mount_delay_ms must be at most {}, got {}",
                MAX_MOUNT_DELAY_MS, self.mount_delay_ms
            )));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(SettingsError::Validation(format!(
                "log_level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log_level
            )));
        }
        Ok(())
    }

    /// Load settings from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| SettingsError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
    }

    /// Storage file the CLI should open
    pub fn effective_store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(FileStore::default_path)
    }
}
