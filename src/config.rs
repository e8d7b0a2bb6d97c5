//! Configuration management for confab.
//!
//! Loads persisted preferences from ${CONFAB_HOME}/config.toml with sensible
//! defaults. Preferences are written back one key at a time so that comments
//! and formatting in the file survive.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::paths;

/// Default config template with comments, embedded at compile time.
const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("default_config.toml");

/// Persisted preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bridge server URL (overridable via CONFAB_BACKEND_URL)
    pub backend_url: Option<String>,

    /// Default model identifier; empty means "first model the bridge lists"
    pub model: String,

    /// Sampling temperature
    pub temperature: f64,

    /// Nucleus sampling (top-p)
    pub top_p: f64,

    /// Optional default system prompt
    pub system_prompt: Option<String>,

    /// Whether the bridge may augment prompts with web search results
    pub enable_search: bool,
}

impl Config {
    const DEFAULT_TEMPERATURE: f64 = 1.0;
    const DEFAULT_TOP_P: f64 = 1.0;
    const DEFAULT_ENABLE_SEARCH: bool = true;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Returns the effective backend URL from config, if set.
    /// Empty strings are treated as unset.
    pub fn effective_backend_url(&self) -> Option<&str> {
        self.backend_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the effective system prompt; empty/whitespace is unset.
    pub fn effective_system_prompt(&self) -> Option<String> {
        let trimmed = self.system_prompt.as_deref().unwrap_or("").trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Saves only the model field to the default config file.
    pub fn save_model(model: &str) -> Result<()> {
        Self::save_key_to(&paths::config_path(), "model", toml_edit::value(model))
    }

    /// Saves only the system_prompt field to the default config file.
    pub fn save_system_prompt(prompt: &str) -> Result<()> {
        Self::save_key_to(
            &paths::config_path(),
            "system_prompt",
            toml_edit::value(prompt),
        )
    }

    /// Saves only the temperature field to the default config file.
    pub fn save_temperature(temperature: f64) -> Result<()> {
        Self::save_key_to(
            &paths::config_path(),
            "temperature",
            toml_edit::value(temperature),
        )
    }

    /// Saves only the top_p field to the default config file.
    pub fn save_top_p(top_p: f64) -> Result<()> {
        Self::save_key_to(&paths::config_path(), "top_p", toml_edit::value(top_p))
    }

    /// Updates a single key in the config file.
    ///
    /// Creates the file with the default template if it doesn't exist.
    /// Preserves existing fields and comments using toml_edit.
    pub fn save_key_to(path: &Path, key: &str, value: toml_edit::Item) -> Result<()> {
        use toml_edit::DocumentMut;

        // Read existing file or use default template
        let contents = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            DEFAULT_CONFIG_TEMPLATE.to_string()
        };

        // Parse as editable document (preserves comments and formatting)
        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc[key] = value;

        Self::write_config(path, &doc.to_string())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, DEFAULT_CONFIG_TEMPLATE)
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            model: String::new(),
            temperature: Self::DEFAULT_TEMPERATURE,
            top_p: Self::DEFAULT_TOP_P,
            system_prompt: None,
            enable_search: Self::DEFAULT_ENABLE_SEARCH,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    /// Config loading: missing file returns defaults.
    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.model, "");
        assert!((config.temperature - 1.0).abs() < f64::EPSILON);
        assert!(config.enable_search);
    }

    /// Config loading: partial config merges with defaults.
    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "model = \"llama3:8b\"\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.model, "llama3:8b");
        assert!((config.top_p - 1.0).abs() < f64::EPSILON); // default preserved
    }

    /// Config init: creates file with defaults, creates parent dirs.
    #[test]
    fn test_init_creates_config_with_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        assert!(config_path.exists());
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# confab Configuration"));
        assert!(contents.contains("enable_search"));
    }

    /// Config init: fails if file exists (no silent overwrite).
    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "").unwrap();

        let result = Config::init(&config_path);
        assert!(result.is_err());
    }

    /// save_key: creates new config file with template if it doesn't exist.
    #[test]
    fn test_save_key_creates_file_with_template() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        Config::save_key_to(&config_path, "model", toml_edit::value("mistral")).unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.model, "mistral");

        // Verify template comments are preserved
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# confab Configuration"));
        assert!(contents.contains("# Sampling temperature"));
    }

    /// save_key: preserves other fields and comments in existing config.
    #[test]
    fn test_save_key_preserves_other_fields_and_comments() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            r#"# My config file
model = "old-model"
# This is important
temperature = 0.7
"#,
        )
        .unwrap();

        Config::save_key_to(&config_path, "model", toml_edit::value("new-model")).unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.model, "new-model");
        assert!((config.temperature - 0.7).abs() < f64::EPSILON); // preserved

        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# My config file"));
        assert!(contents.contains("# This is important"));
    }

    /// Backend URL: empty/whitespace treated as unset.
    #[test]
    fn test_backend_url_empty_is_none() {
        let config = Config {
            backend_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_backend_url(), None);

        let config = Config {
            backend_url: Some("http://localhost:9000".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.effective_backend_url(),
            Some("http://localhost:9000")
        );
    }

    /// System prompt: whitespace-only is unset.
    #[test]
    fn test_system_prompt_whitespace_is_none() {
        let config = Config {
            system_prompt: Some("  \n ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_system_prompt(), None);

        let config = Config {
            system_prompt: Some(" be terse ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.effective_system_prompt(),
            Some("be terse".to_string())
        );
    }
}
