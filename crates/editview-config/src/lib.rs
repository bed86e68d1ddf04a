use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Browser behaviours the descriptor tree has to work around when it
/// writes the native selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserQuirks {
    /// Firefox: collapsing after a `<br>` is unreliable, and a focus in
    /// front of an uneditable node must always be rewritten.
    pub gecko: bool,
    /// Safari: caret lags behind its reported position after a `<br>`.
    pub safari: bool,
    /// Whether `Selection.extend` is available. When false, inverted
    /// selections fall back to a range-based write.
    pub selection_extend: bool,
}

impl Default for BrowserQuirks {
    fn default() -> Self {
        Self {
            gecko: false,
            safari: false,
            selection_extend: true,
        }
    }
}

/// Settings for one editor view session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub editable: bool,
    /// How long selection notifications are ignored after the view itself
    /// wrote to the DOM.
    pub suppression_window_ms: u64,
    pub hide_selection_class: String,
    pub root_class: String,
    pub scroll_margin: f64,
    pub browser: BrowserQuirks,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            editable: true,
            suppression_window_ms: 50,
            hide_selection_class: "ProseMirror-hideselection".to_string(),
            root_class: "ProseMirror".to_string(),
            scroll_margin: 5.0,
            browser: BrowserQuirks::default(),
        }
    }
}

impl ViewConfig {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: ViewConfig =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/editview");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    pub fn suppression_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.suppression_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = ViewConfig::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/editview/config.toml"));
    }

    #[test]
    fn test_defaults() {
        let config = ViewConfig::default();
        assert!(config.editable);
        assert_eq!(config.suppression_window_ms, 50);
        assert_eq!(config.hide_selection_class, "ProseMirror-hideselection");
        assert!(config.browser.selection_extend);
        assert!(!config.browser.gecko);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config_content = r#"
suppression_window_ms = 120

[browser]
gecko = true
"#;

        let config: ViewConfig = toml::from_str(config_content).unwrap();

        assert_eq!(config.suppression_window_ms, 120);
        assert!(config.browser.gecko);
        assert!(config.browser.selection_extend);
        assert_eq!(config.root_class, "ProseMirror");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let original = ViewConfig {
            editable: false,
            browser: BrowserQuirks {
                safari: true,
                selection_extend: false,
                ..BrowserQuirks::default()
            },
            ..ViewConfig::default()
        };

        let toml_str = toml::to_string(&original).unwrap();
        let deserialized: ViewConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = ViewConfig::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_load_invalid_config_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "suppression_window_ms = \"soon\"").unwrap();

        let err = ViewConfig::load_from_path(&config_file).unwrap_err();

        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let test_config = ViewConfig {
            suppression_window_ms: 10,
            ..ViewConfig::default()
        };

        test_config.save_to_path(&config_file).unwrap();

        let loaded_config = ViewConfig::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config, test_config);
        assert_eq!(
            loaded_config.suppression_window(),
            std::time::Duration::from_millis(10)
        );
    }
}
