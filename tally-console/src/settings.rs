//! Application settings

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tally_core::ChannelMap;
use tally_engine::DEFAULT_BAUD_RATE;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Last switcher address
    #[serde(default)]
    pub switcher_address: String,
    /// Serial port of the lamp panel
    #[serde(default)]
    pub lamp_port: String,
    /// Lamp panel baud rate
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// Slot to lamp assignments
    #[serde(default)]
    pub channel_map: ChannelMap,
    /// Connect to the switcher on startup
    #[serde(default)]
    pub auto_connect_switcher: bool,
    /// Open the lamp panel on startup
    #[serde(default)]
    pub auto_open_lamps: bool,
}

fn default_baud() -> u32 {
    DEFAULT_BAUD_RATE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            switcher_address: String::new(),
            lamp_port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            channel_map: ChannelMap::default(),
            auto_connect_switcher: false,
            auto_open_lamps: false,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for tally-bridge
    /// Uses $XDG_CONFIG_HOME/tally-bridge on Linux/macOS, falls back to ~/.config/tally-bridge
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("tally-bridge"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("tally-bridge"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path =
            Self::settings_path().ok_or_else(|| "Could not determine settings path".to_string())?;
        self.save_to(&path)
    }

    /// Save settings to a file
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(())
    }

    /// Save if anything differs from `previous`
    /// Returns any error message for display
    pub fn auto_save_if_changed(&self, previous: &Settings) -> Option<String> {
        if self != previous {
            if let Err(e) = self.save() {
                return Some(e);
            }
        }
        None
    }
}
