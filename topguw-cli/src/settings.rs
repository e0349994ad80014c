//! Application settings

use std::path::{Path, PathBuf};

use anyhow::Context;
use gsm_channels::{DecoderConfig, DeviceConfig};
use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// External decoder program and parsing policy
    #[serde(default)]
    pub decoder: DecoderConfig,
    /// Receiver the captures are made with
    #[serde(default)]
    pub device: DeviceConfig,
}

impl Settings {
    /// Get the XDG config directory for topguw
    /// Uses $XDG_CONFIG_HOME/topguw on Linux/macOS, falls back to ~/.config/topguw
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("topguw"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("topguw"))
    }

    /// Get the default settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings {}", path.display()))
    }

    /// Save settings to `path`, creating its directory if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create settings directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use gsm_channels::{MalformedPolicy, DEFAULT_DECODER};

    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.decoder.program, PathBuf::from(DEFAULT_DECODER));
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{
            "decoder": { "program": "python3", "program_args": ["/opt/airprobe_decode.py"],
                         "malformed_policy": "abort" },
            "device": { "ppm": 42 }
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.decoder.program, PathBuf::from("python3"));
        assert_eq!(settings.decoder.malformed_policy, MalformedPolicy::Abort);
        assert_eq!(settings.decoder.poll_interval_ms, 50);
        assert_eq!(settings.device.ppm, 42);
        assert_eq!(settings.device.sample_rate, 1_000_000);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("topguw-settings-{}", std::process::id()))
            .join("settings.json");

        let mut settings = Settings::default();
        settings.device.gain = Some(40.0);
        settings.save(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
