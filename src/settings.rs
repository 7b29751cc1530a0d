//! Persisted CLI settings, stored in the OS config directory.

use std::fmt;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Single server hosts both the palette API and the relay endpoints.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

const SETTINGS_VERSION: u32 = 1;
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Json(serde_json::Error),
    NoConfigDir,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "settings I/O error: {e}"),
            SettingsError::Json(e) => write!(f, "settings parse error: {e}"),
            SettingsError::NoConfigDir => write!(f, "no usable config directory on this system"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<std::io::Error> for SettingsError {
    fn from(e: std::io::Error) -> Self {
        SettingsError::Io(e)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Json(e)
    }
}

/// Application-level settings stored in the OS config directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub version: u32,
    /// Base URL of the command server (palette API + relay).
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Delimiter appended after each forwarded JSON command, if any.
    #[serde(default)]
    pub send_delimiter: Option<String>,
    /// Palette to preselect on startup.
    #[serde(default)]
    pub last_palette: Option<String>,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            server_url: default_server_url(),
            send_delimiter: None,
            last_palette: None,
        }
    }
}

/// OS config directory for this application.
pub fn config_dir() -> Result<PathBuf, SettingsError> {
    ProjectDirs::from("com", "commander", "commander")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(SettingsError::NoConfigDir)
}

fn settings_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILE)
}

/// Load settings from the config directory. Returns None if no settings
/// file exists; a corrupt file is an error, not a silent reset.
pub fn load_settings(dir: &Path) -> Result<Option<AppSettings>, SettingsError> {
    let path = settings_path(dir);
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Save settings (atomic write: temp file then rename).
pub fn save_settings(dir: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
    std::fs::create_dir_all(dir)?;
    let path = settings_path(dir);
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(settings)?)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}
