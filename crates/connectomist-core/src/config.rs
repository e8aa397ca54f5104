//! Configuration for locating and running Connectomist.
//!
//! Settings are read from a TOML file, resolved in this order:
//!
//! 1. an explicit path (`--config` on the command line),
//! 2. the `CONNECTOMIST_CONFIG` environment variable,
//! 3. `<config dir>/connectomist/config.toml` (see [`dirs::config_dir`]).
//!
//! A missing file yields the defaults. `CONNECTOMIST_PATH` overrides the
//! launcher location whatever the file says.
//!
//! ```toml
//! connectomist_path = "/i2bm/local/Ubuntu-14.04-x86_64/ptk/bin/connectomist"
//!
//! [environment]
//! LD_LIBRARY_PATH = "/i2bm/local/ptk/lib"
//!
//! [logging]
//! level = "info"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::wrapper::{Connectomist, DEFAULT_CONNECTOMIST_PATH, ProcessRunner};

/// Environment variable pointing at the configuration file.
pub const CONFIG_ENV_VAR: &str = "CONNECTOMIST_CONFIG";

/// Environment variable overriding the launcher location.
pub const PATH_ENV_VAR: &str = "CONNECTOMIST_PATH";

/// Configuration loading and export, shared by the `config` subcommands.
pub trait ConfigManager: Default + Serialize + DeserializeOwned {
    /// Name of the binary, used in hints printed to the user.
    fn project_name() -> String;

    /// Default location of the configuration file, if the platform has one.
    fn default_config_path() -> Option<PathBuf>;

    /// Resolves the configuration file from an explicit path, the
    /// environment or the platform default.
    fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf>;

    /// Loads the configuration, falling back to defaults when no file exists.
    fn load(explicit: Option<&str>) -> Result<Self>;

    /// Serializes the configuration as TOML.
    fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Environment variables equivalent to this configuration.
    fn to_env_vars(&self) -> Result<Vec<(String, String)>>;
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Connectomist settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path of the Connectomist launcher script.
    pub connectomist_path: PathBuf,

    /// Extra environment variables for every Connectomist and PTK call.
    pub environment: BTreeMap<String, String>,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connectomist_path: PathBuf::from(DEFAULT_CONNECTOMIST_PATH),
            environment: BTreeMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Parses settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Reads settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Applies environment overrides found through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(PATH_ENV_VAR).filter(|p| !p.is_empty()) {
            tracing::debug!(path = %path, "Connectomist path overridden from environment");
            self.connectomist_path = PathBuf::from(path);
        }
    }

    /// A process runner carrying the configured environment.
    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new().with_envs(self.environment.clone())
    }

    /// Checks the configured launcher and returns a ready wrapper.
    pub async fn connect(&self) -> Result<Connectomist> {
        Connectomist::connect(&self.connectomist_path, Arc::new(self.runner())).await
    }
}

impl ConfigManager for Settings {
    fn project_name() -> String {
        "connectomist".to_string()
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("connectomist").join("config.toml"))
    }

    fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }
        Self::default_config_path()
    }

    fn load(explicit: Option<&str>) -> Result<Self> {
        let mut settings = match Self::resolve_config_path(explicit) {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "Loading configuration");
                Self::from_file(&path)?
            }
            Some(path) if explicit.is_some() => {
                return Err(Error::config(format!(
                    "Config file does not exist at {}",
                    path.display()
                )));
            }
            _ => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let mut vars = vec![
            (
                PATH_ENV_VAR.to_string(),
                self.connectomist_path.to_string_lossy().into_owned(),
            ),
            ("RUST_LOG".to_string(), self.logging.level.clone()),
        ];
        vars.extend(
            self.environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Ok(vars)
    }
}
