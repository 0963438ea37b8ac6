//! Settings file: interpreter limits and seed packs to load at startup.
//!
//! Settings live in an optional `piper.toml`:
//!
//! ```toml
//! seed_packs = ["regions"]
//! seeds_dir = "seeds"
//!
//! [interpreter]
//! max_steps = 10000
//! max_depth = 256
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interpreter::InterpreterConfig;

/// Default settings file name looked up in the working directory.
pub const SETTINGS_FILE: &str = "piper.toml";

/// Errors from reading or writing settings.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read settings: {path}")]
    #[diagnostic(
        code(piper::config::read),
        help("Ensure the settings file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {path}: {message}")]
    #[diagnostic(
        code(piper::config::parse),
        help("Check the TOML syntax. Known keys: seed_packs, seeds_dir, [interpreter] max_steps, max_depth.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write settings: {path}")]
    #[diagnostic(
        code(piper::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid setting `{key}`: {message}")]
    #[diagnostic(
        code(piper::config::invalid),
        help("max_steps and max_depth must both be at least 1.")
    )]
    Invalid { key: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level settings, persisted as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Seed pack IDs applied when an interpreter is built from these settings.
    #[serde(default = "default_seed_packs")]
    pub seed_packs: Vec<String>,
    /// Extra directory scanned for external seed packs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeds_dir: Option<PathBuf>,
    /// Interpreter limits.
    #[serde(default)]
    pub interpreter: InterpreterConfig,
}

fn default_seed_packs() -> Vec<String> {
    vec!["regions".into()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed_packs: default_seed_packs(),
            seeds_dir: None,
            interpreter: InterpreterConfig::default(),
        }
    }
}

impl Settings {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Load `path` if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Replace the step budget, rejecting values `load` would reject.
    pub fn override_max_steps(&mut self, max_steps: usize) -> ConfigResult<()> {
        self.interpreter.max_steps = max_steps;
        self.validate()
    }

    /// Check the limits an interpreter needs to make progress.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.interpreter.max_steps == 0 {
            return Err(ConfigError::Invalid {
                key: "interpreter.max_steps".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.interpreter.max_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "interpreter.max_depth".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
