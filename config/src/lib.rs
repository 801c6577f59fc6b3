//! User configuration for the Tern editor shell.
//!
//! Two keys in `~/.tern/config.toml`:
//!
//! ```toml
//! server_path = "/opt/tern/tern-language-server"
//! check_for_updates = false
//! ```
//!
//! An absent file is not an error (`Ok(None)`); a present but unreadable
//! or malformed file is.

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

// Default value function for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

/// Settings consumed by the resolver, update checker, and fleet.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Custom server executable path. Relative paths resolve against the
    /// first open workspace folder's root. When set, update checks are
    /// skipped (a custom path is assumed user-managed).
    #[serde(default)]
    pub server_path: Option<String>,
    /// Offer an update when crates.io reports a different published
    /// version than the installed binary. Default: true.
    #[serde(default = "default_true")]
    pub check_for_updates: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_path: None,
            check_for_updates: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl Settings {
    /// Load settings from the default location.
    ///
    /// `Ok(None)` when no home directory is known or no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match Self::path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    /// Load settings from an explicit file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Default config location: `~/.tern/config.toml`, overridable through
    /// the `TERN_CONFIG` environment variable.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        if let Ok(custom) = env::var("TERN_CONFIG")
            && !custom.is_empty()
        {
            return Some(PathBuf::from(custom));
        }
        dirs::home_dir().map(|home| home.join(".tern").join("config.toml"))
    }
}
