// Application settings
// Loaded from ~/.config/gridbook/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Browser local storage budget, used when no quota is configured.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // History
    #[serde(rename = "history.capacity")]
    pub history_capacity: usize,

    // File
    #[serde(rename = "file.defaultFilename")]
    pub default_filename: String,

    #[serde(rename = "file.autoSave")]
    pub auto_save: bool,

    #[serde(rename = "file.autoSaveInterval")]
    pub auto_save_interval: u32, // seconds

    // Storage
    #[serde(rename = "storage.path")]
    pub storage_path: Option<PathBuf>, // None = data dir

    #[serde(rename = "storage.quotaBytes")]
    pub quota_bytes: Option<usize>, // None = unlimited

    // Import
    #[serde(rename = "import.delimiter")]
    pub import_delimiter: Option<char>, // None = sniff

    #[serde(rename = "import.encoding")]
    pub import_encoding: Option<String>, // None = UTF-8, then Windows-1252

    #[serde(rename = "import.hasHeader")]
    pub import_has_header: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_capacity: 20,
            default_filename: "Untitled spreadsheet".to_string(),
            auto_save: true,
            auto_save_interval: 30,
            storage_path: None,
            quota_bytes: Some(DEFAULT_QUOTA_BYTES),
            import_delimiter: None,
            import_encoding: None,
            import_has_header: false,
        }
    }
}

const DEFAULT_CONFIG: &str = r#"{
    // Undo/redo snapshots kept per stack
    "history.capacity": 20,

    // File handling
    "file.defaultFilename": "Untitled spreadsheet",
    "file.autoSave": true,
    "file.autoSaveInterval": 30,

    // Saved documents (null path = platform data dir, null quota = unlimited)
    "storage.path": null,
    "storage.quotaBytes": 5242880,

    // CSV import (null delimiter = detect, null encoding = UTF-8)
    "import.delimiter": null,
    "import.encoding": null,
    "import.hasHeader": false
}
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridbook")
            .join("settings.json")
    }

    /// Load settings from the default location, writing a commented default
    /// file on first run.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            if let Err(e) = write_default_file(&path) {
                log::warn!("could not write default settings to {}: {}", path.display(), e);
            }
            return Self::default();
        }
        Self::load_from(&path)
    }

    /// Load settings from `path`, falling back to defaults on any error.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                log::warn!("error parsing {}: {}; using default settings", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                log::warn!("error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON. Lines starting with `//` are comments.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Save current settings to the default location
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Where saved documents live: `storage.path`, else the platform data dir.
    pub fn storage_file(&self) -> PathBuf {
        self.storage_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("gridbook")
                .join("documents.sqlite3")
        })
    }

    /// Configured delimiter as a byte, if it is ASCII.
    pub fn delimiter_byte(&self) -> Option<u8> {
        self.import_delimiter.filter(char::is_ascii).map(|c| c as u8)
    }
}

fn write_default_file(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_CONFIG)
}
