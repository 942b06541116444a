//! Player settings
//!
//! Stored as XML in the user's config directory, or passed explicitly with
//! `--config`. Every field has a default, so partial files are fine.

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::output::SurfaceConfig;
use crate::telemetry::LogConfig;

/// Window, presentation and logging options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "LoopPlayerSettings")]
pub struct PlayerSettings {
    /// Output width in pixels
    #[serde(rename = "windowWidth", default = "default_window_width")]
    pub window_width: u32,

    /// Output height in pixels
    #[serde(rename = "windowHeight", default = "default_window_height")]
    pub window_height: u32,

    #[serde(rename = "windowTitle", default = "default_window_title")]
    pub window_title: String,

    /// Whether presentation waits for the display's vertical blank
    #[serde(rename = "vsyncEnabled", default = "default_true")]
    pub vsync_enabled: bool,

    /// Default log filter when no environment override is set
    #[serde(rename = "logLevel", default = "default_log_level")]
    pub log_level: String,

    /// Also write logs to this file
    #[serde(rename = "logFile", default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,

    #[serde(rename = "logJson", default)]
    pub log_json: bool,
}

fn default_window_width() -> u32 {
    352
}

fn default_window_height() -> u32 {
    288
}

fn default_window_title() -> String {
    "Loop Player".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            window_title: default_window_title(),
            vsync_enabled: true,
            log_level: default_log_level(),
            log_file: None,
            log_json: false,
        }
    }
}

impl PlayerSettings {
    /// `<config_dir>/LoopPlayer/player.xml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("LoopPlayer");
            p.push("player.xml");
            p
        })
    }

    /// Load from `path` if given, otherwise from the default location
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let mut settings: Self = from_str(&contents)?;

        settings.window_width = settings.window_width.max(1);
        settings.window_height = settings.window_height.max(1);

        Ok(settings)
    }

    /// Save settings to an XML file, creating parent directories
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let xml = to_string(self)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);

        fs::write(path, formatted)?;
        Ok(())
    }

    pub fn surface_config(&self) -> SurfaceConfig {
        SurfaceConfig {
            width: self.window_width,
            height: self.window_height,
            title: self.window_title.clone(),
            vsync: self.vsync_enabled,
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            file_enabled: self.log_file.is_some(),
            file_path: self.log_file.as_ref().map(PathBuf::from),
            json_format: self.log_json,
            default_level: self.log_level.clone(),
            ..LogConfig::default()
        }
    }
}

/// Settings-related errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
}
