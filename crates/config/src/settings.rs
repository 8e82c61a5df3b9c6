// Sheet settings
// Loaded from ~/.config/websheet/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Errors raised while reading or writing the settings file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Grid metrics
    #[serde(rename = "grid.defaultColumnWidth")]
    pub default_column_width: f64,

    #[serde(rename = "grid.defaultRowHeight")]
    pub default_row_height: f64,

    /// Smallest size a column or row can be dragged down to
    #[serde(rename = "grid.minimumResizeSize")]
    pub minimum_resize_size: f64,

    // Sheet default appearance
    #[serde(rename = "appearance.fontName")]
    pub font_name: String,

    #[serde(rename = "appearance.fontSize")]
    pub font_size: f64,

    #[serde(rename = "appearance.textColor")]
    pub text_color: String,

    #[serde(rename = "appearance.background")]
    pub background: Option<String>,

    // Formula
    #[serde(rename = "formula.autoRecalc")]
    pub auto_recalc: bool,

    /// Nested reference depth after which evaluation is reported as circular
    #[serde(rename = "formula.maxEvaluationDepth")]
    pub max_evaluation_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Grid
            default_column_width: 100.0,
            default_row_height: 30.0,
            minimum_resize_size: 5.0,
            // Appearance
            font_name: String::from("lato"),
            font_size: 12.0,
            text_color: String::from("#444444"),
            background: None,
            // Formula
            auto_recalc: true,
            max_evaluation_depth: 256,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("websheet");
        config_dir.join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file.
    ///
    /// Lines starting with `//` are treated as comments and ignored.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse settings JSON, stripping `//` comment lines first.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Save settings to a specific file, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save current settings to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_sheet_baseline() {
        let settings = Settings::default();
        assert_eq!(settings.default_column_width, 100.0);
        assert_eq!(settings.default_row_height, 30.0);
        assert_eq!(settings.font_name, "lato");
        assert_eq!(settings.font_size, 12.0);
        assert_eq!(settings.text_color, "#444444");
        assert!(settings.background.is_none());
        assert!(settings.auto_recalc);
    }

    #[test]
    fn test_parse_strips_comment_lines() {
        let json = r#"{
    // Grid metrics
    "grid.defaultColumnWidth": 64,
    // Formula
    "formula.autoRecalc": false
}"#;
        let settings = Settings::parse(json).unwrap();
        assert_eq!(settings.default_column_width, 64.0);
        assert!(!settings.auto_recalc);
        // Unspecified keys keep their defaults
        assert_eq!(settings.default_row_height, 30.0);
        assert_eq!(settings.max_evaluation_depth, 256);
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(Settings::parse("{ \"grid.defaultRowHeight\": }").is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            default_row_height: 22.0,
            font_name: String::from("mono"),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.json"));
    }
}
