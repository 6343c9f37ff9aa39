//! Configuration management for strand.
//!
//! Loads configuration from ${STRAND_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_BASE_URL;

/// Default generation model when config does not name one.
pub const DEFAULT_MODEL: &str = "qwen2.5-coder";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Ollama-compatible backend.
    pub base_url: String,
    /// Default model for generation requests.
    pub model: String,
    /// Optional system prompt prepended to chat requests.
    pub system_prompt: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
        }
    }
}

pub mod paths {
    //! Path resolution for strand configuration.
    //!
    //! STRAND_HOME resolution order:
    //! 1. STRAND_HOME environment variable (if set)
    //! 2. ~/.config/strand (default)

    use std::path::PathBuf;

    /// Returns the strand home directory.
    ///
    /// Checks STRAND_HOME env var first, falls back to ~/.config/strand
    pub fn strand_home() -> PathBuf {
        if let Ok(home) = std::env::var("STRAND_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("strand"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        strand_home().join("config.toml")
    }
}

impl Config {
    /// Loads the configuration from the default location.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads the configuration from an explicit path, falling back to
    /// defaults when the file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
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

    /// Writes a default config file unless one is already present.
    ///
    /// # Errors
    /// Returns an error if directories or the file cannot be created.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Config::default()).context("serialize default config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Resolves the effective base URL with precedence:
    /// explicit override > env > config.
    ///
    /// The OLLAMA_BASE_URL environment variable overrides the config
    /// value, matching the backend's own convention; a caller-supplied
    /// override (e.g. a CLI flag) beats both.
    ///
    /// # Errors
    /// Returns an error if the resolved value is not a well-formed URL.
    pub fn effective_base_url(&self, override_url: Option<&str>) -> Result<String> {
        if let Some(url) = override_url {
            let trimmed = url.trim();
            validate_url(trimmed)?;
            return Ok(trimmed.to_string());
        }

        if let Ok(env_url) = std::env::var("OLLAMA_BASE_URL") {
            let trimmed = env_url.trim();
            if !trimmed.is_empty() {
                validate_url(trimmed)?;
                return Ok(trimmed.to_string());
            }
        }

        let trimmed = self.base_url.trim();
        validate_url(trimmed)?;
        Ok(trimmed.to_string())
    }
}

fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid backend base URL: {url}"))?;
    Ok(())
}
