use crate::error::{KeyfoldError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DB_FILENAME: &str = "snippets.json";
pub const SETTINGS_FILENAME: &str = "settings.json";
pub const HOME_ENV: &str = "KEYFOLD_HOME";

/// Loopback port the matching service listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 5055;
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Get the keyfold configuration directory
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = env::var(HOME_ENV) {
        return PathBuf::from(dir);
    }
    env::var("HOME")
        .map(|home| PathBuf::from(home).join(".keyfold"))
        .unwrap_or_else(|_| PathBuf::from(".keyfold"))
}

/// Get the path to the snippet database file
pub fn get_db_file_path() -> PathBuf {
    get_config_dir().join(DB_FILENAME)
}

/// Get the path to the settings file
pub fn get_settings_file_path() -> PathBuf {
    get_config_dir().join(SETTINGS_FILENAME)
}

/// Runtime settings shared by the matching service and the capture daemon.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// When false the service answers pings but never expands.
    pub engine_enabled: bool,
    pub port: u16,
    pub buffer_capacity: usize,
    pub reconnect_delay_ms: u64,
    /// `None` keeps reconnecting forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Wait between the paste gesture and restoring the previous clipboard.
    pub paste_settle_ms: u64,
    pub key_delay_ms: u64,
    /// How long a synthesized key stays marked while waiting to be observed.
    pub synthetic_ttl_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine_enabled: true,
            port: DEFAULT_PORT,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            reconnect_delay_ms: 1000,
            max_reconnect_attempts: None,
            paste_settle_ms: 50,
            key_delay_ms: 2,
            synthetic_ttl_ms: 500,
        }
    }
}

impl Settings {
    /// Load settings from the default location, falling back to defaults
    /// when no settings file exists.
    pub fn load() -> Result<Self> {
        Self::load_from(&get_settings_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| KeyfoldError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(KeyfoldError::InvalidConfig(
                "buffer_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn paste_settle(&self) -> Duration {
        Duration::from_millis(self.paste_settle_ms)
    }

    pub fn key_delay(&self) -> Duration {
        Duration::from_millis(self.key_delay_ms)
    }

    pub fn synthetic_ttl(&self) -> Duration {
        Duration::from_millis(self.synthetic_ttl_ms)
    }
}
