//! Application settings

use std::path::{Path, PathBuf};

use pdlens_pipeline::PipelineConfig;
use pdlens_sim::{MeterTiming, VirtualMeterConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

/// Errors from persisting settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not determine settings path")]
    NoConfigDir,

    #[error("failed to write settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Update rate and queue capacity
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Simulated meter
    #[serde(default)]
    pub meter: VirtualMeterConfig,
    /// Simulated report pacing
    #[serde(default)]
    pub timing: MeterTiming,
    /// Decoder start-up delay in milliseconds (0 = ready immediately)
    #[serde(default = "default_warmup_ms")]
    pub decoder_warmup_ms: u64,
    /// Stop after this many seconds (0 = run until Ctrl-C)
    #[serde(default)]
    pub run_seconds: u64,
    /// Milliseconds between status lines
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
    /// Print the parse tree under every protocol log row
    #[serde(default)]
    pub show_trees: bool,
    /// Lowest level of project diagnostics shown on the status line
    /// ("off", "error", "warn", "info", "debug", "trace")
    #[serde(default = "default_diagnostic_level")]
    pub diagnostic_level: String,
}

fn default_warmup_ms() -> u64 {
    750
}

fn default_status_interval_ms() -> u64 {
    1000
}

fn default_diagnostic_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            meter: VirtualMeterConfig::default(),
            timing: MeterTiming::default(),
            decoder_warmup_ms: default_warmup_ms(),
            run_seconds: 0,
            status_interval_ms: default_status_interval_ms(),
            show_trees: false,
            diagnostic_level: default_diagnostic_level(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for pdlens
    /// Uses $XDG_CONFIG_HOME/pdlens on Linux/macOS, falls back to ~/.config/pdlens
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("pdlens"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("pdlens"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings to a specific file, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Diagnostic level as a tracing level; `None` turns diagnostics off
    pub fn diagnostic_level(&self) -> Option<Level> {
        match self.diagnostic_level.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => None,
            other => other.parse().ok().or(Some(Level::WARN)),
        }
    }
}
